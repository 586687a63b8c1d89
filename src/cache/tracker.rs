//! Cache tracking and metrics for monitoring read-cache efficiency

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Metrics for cache performance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheMetrics {
    /// Reads served from the cache
    pub cache_hits: u64,
    /// Reads that fell through to the store
    pub cache_misses: u64,
    /// Values written
    pub cache_writes: u64,
    /// Backend failures (each also counted as a miss on reads)
    pub cache_errors: u64,
    /// Keys removed after writes
    pub invalidations: u64,
    /// Cache hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

impl CacheMetrics {
    pub fn record_hit(&mut self) {
        self.cache_hits += 1;
        self.update_hit_rate();
    }

    pub fn record_miss(&mut self) {
        self.cache_misses += 1;
        self.update_hit_rate();
    }

    pub fn record_write(&mut self) {
        self.cache_writes += 1;
    }

    pub fn record_error(&mut self) {
        self.cache_errors += 1;
    }

    pub fn record_invalidation(&mut self) {
        self.invalidations += 1;
    }

    fn update_hit_rate(&mut self) {
        let total = self.cache_hits + self.cache_misses;
        self.hit_rate = if total > 0 {
            self.cache_hits as f64 / total as f64
        } else {
            0.0
        };
    }
}

impl std::fmt::Display for CacheMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Cache Metrics ===")?;
        writeln!(f, "Cache hits: {}", self.cache_hits)?;
        writeln!(f, "Cache misses: {}", self.cache_misses)?;
        writeln!(f, "Hit rate: {:.1}%", self.hit_rate * 100.0)?;
        writeln!(f, "Backend errors: {}", self.cache_errors)?;
        writeln!(f, "Invalidations: {}", self.invalidations)?;
        Ok(())
    }
}

/// Key family, e.g. `agent` for `agent_<id>`
fn family(key: &str) -> &str {
    match key.rfind('_') {
        Some(idx) if key[idx + 1..].contains('-') => &key[..idx],
        _ => key,
    }
}

/// Tracks cache outcomes across reads, grouped by key family
#[derive(Clone)]
pub struct CacheTracker {
    metrics: Arc<Mutex<CacheMetrics>>,
    hits_by_family: Arc<Mutex<HashMap<String, (u64, u64)>>>,
    started: Instant,
}

impl CacheTracker {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(Mutex::new(CacheMetrics::default())),
            hits_by_family: Arc::new(Mutex::new(HashMap::new())),
            started: Instant::now(),
        }
    }

    fn count_family(&self, key: &str, hit: bool) {
        if let Ok(mut families) = self.hits_by_family.lock() {
            let entry = families.entry(family(key).to_string()).or_default();
            if hit {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }
    }

    pub fn record_hit(&self, key: &str) {
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.record_hit();
        }
        self.count_family(key, true);
    }

    pub fn record_miss(&self, key: &str) {
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.record_miss();
        }
        self.count_family(key, false);
    }

    pub fn record_write(&self) {
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.record_write();
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.record_error();
        }
    }

    pub fn record_invalidation(&self) {
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.record_invalidation();
        }
    }

    /// Get current metrics
    pub fn get_metrics(&self) -> CacheMetrics {
        self.metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Reset metrics
    pub fn reset_metrics(&self) {
        if let Ok(mut metrics) = self.metrics.lock() {
            *metrics = CacheMetrics::default();
        }
        if let Ok(mut families) = self.hits_by_family.lock() {
            families.clear();
        }
    }

    /// Get a summary of cache state
    pub fn summary(&self) -> CacheSummary {
        let metrics = self.get_metrics();
        let mut families: Vec<(String, u64, u64)> = self
            .hits_by_family
            .lock()
            .map(|f| f.iter().map(|(k, (h, m))| (k.clone(), *h, *m)).collect())
            .unwrap_or_default();
        families.sort();

        CacheSummary {
            total_hits: metrics.cache_hits,
            total_misses: metrics.cache_misses,
            hit_rate: metrics.hit_rate,
            errors: metrics.cache_errors,
            families,
            uptime: self.started.elapsed(),
        }
    }
}

impl Default for CacheTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of cache state
#[derive(Debug, Serialize)]
pub struct CacheSummary {
    pub total_hits: u64,
    pub total_misses: u64,
    pub hit_rate: f64,
    pub errors: u64,
    /// (key family, hits, misses)
    pub families: Vec<(String, u64, u64)>,
    #[serde(skip)]
    pub uptime: Duration,
}

impl std::fmt::Display for CacheSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Cache Summary ===")?;
        writeln!(f, "Total hits: {}", self.total_hits)?;
        writeln!(f, "Total misses: {}", self.total_misses)?;
        writeln!(f, "Hit rate: {:.1}%", self.hit_rate * 100.0)?;
        writeln!(f, "Backend errors: {}", self.errors)?;
        for (family, hits, misses) in &self.families {
            writeln!(f, "  {family}: {hits} hits / {misses} misses")?;
        }
        writeln!(f, "Uptime: {:?}", self.uptime)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_hit_rate() {
        let mut metrics = CacheMetrics::default();

        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();

        assert!((metrics.hit_rate - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_key_families() {
        assert_eq!(family("agents_list"), "agents_list");
        assert_eq!(family("agent_0b7c6f1e-5d1a-4b8e-9f3a-2c4d5e6f7a8b"), "agent");
        assert_eq!(family("agent_tasks_0b7c6f1e-5d1a-4b8e-9f3a-2c4d5e6f7a8b"), "agent_tasks");
    }

    #[test]
    fn test_tracker_summary() {
        let tracker = CacheTracker::new();
        tracker.record_hit("agent_1-2");
        tracker.record_miss("agent_3-4");
        tracker.record_miss("agents_list");
        tracker.record_error();

        let summary = tracker.summary();
        assert_eq!(summary.total_hits, 1);
        assert_eq!(summary.total_misses, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(
            summary.families,
            vec![("agent".to_string(), 1, 1), ("agents_list".to_string(), 0, 1)]
        );

        tracker.reset_metrics();
        assert_eq!(tracker.get_metrics().cache_hits, 0);
    }
}
