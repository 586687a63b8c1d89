//! In-process counters for task dispatch

use crate::models::TaskStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Raw dispatch counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchMetrics {
    /// Terminal tasks keyed by "status/model"
    pub tasks: BTreeMap<String, u64>,
    /// Comparison runs
    pub comparisons: u64,
    /// Scrape-and-analyze runs
    pub scrapes: u64,
    /// Upstream calls that returned, successfully or not
    pub upstream_calls: u64,
    /// Sum of upstream call latencies
    pub upstream_latency_ms: u64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_task(&mut self, status: TaskStatus, model: &str) {
        *self.tasks.entry(format!("{status}/{model}")).or_insert(0) += 1;
    }

    pub fn record_upstream(&mut self, latency: Duration) {
        self.upstream_calls += 1;
        self.upstream_latency_ms += latency.as_millis() as u64;
    }

    pub fn count_status(&self, status: TaskStatus) -> u64 {
        let prefix = format!("{status}/");
        self.tasks
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, n)| n)
            .sum()
    }

    pub fn average_latency_ms(&self) -> f64 {
        if self.upstream_calls == 0 {
            return 0.0;
        }
        self.upstream_latency_ms as f64 / self.upstream_calls as f64
    }
}

/// Thread-safe metrics tracker
#[derive(Clone, Default)]
pub struct MetricsTracker {
    inner: Arc<Mutex<DispatchMetrics>>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_task(&self, status: TaskStatus, model: &str) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.record_task(status, model);
        }
    }

    pub fn record_upstream(&self, latency: Duration) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.record_upstream(latency);
        }
    }

    pub fn record_comparison(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.comparisons += 1;
        }
    }

    pub fn record_scrape(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.scrapes += 1;
        }
    }

    pub fn get_metrics(&self) -> DispatchMetrics {
        self.inner
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> MetricsSummary {
        let metrics = self.get_metrics();
        MetricsSummary {
            completed: metrics.count_status(TaskStatus::Completed),
            failed: metrics.count_status(TaskStatus::Failed),
            comparisons: metrics.comparisons,
            scrapes: metrics.scrapes,
            upstream_calls: metrics.upstream_calls,
            avg_upstream_latency_ms: metrics.average_latency_ms(),
            by_status_and_model: metrics.tasks,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub completed: u64,
    pub failed: u64,
    pub comparisons: u64,
    pub scrapes: u64,
    pub upstream_calls: u64,
    pub avg_upstream_latency_ms: f64,
    pub by_status_and_model: BTreeMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Metrics Summary ===")?;
        writeln!(f, "Tasks completed: {}", self.completed)?;
        writeln!(f, "Tasks failed: {}", self.failed)?;
        writeln!(f, "Comparisons: {}", self.comparisons)?;
        writeln!(f, "Scrapes: {}", self.scrapes)?;
        writeln!(f, "Upstream calls: {}", self.upstream_calls)?;
        writeln!(f, "Avg upstream latency: {:.1} ms", self.avg_upstream_latency_ms)?;
        for (key, count) in &self.by_status_and_model {
            writeln!(f, "  {key}: {count}")?;
        }
        Ok(())
    }
}
