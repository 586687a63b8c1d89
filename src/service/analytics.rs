//! Dashboard rollup over agents, tasks and files

use crate::models::{Agent, AgentStatus, Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentCounts {
    pub total: usize,
    pub active: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub processing: usize,
    /// Completed over total, in percent, two decimals
    pub success_rate: f64,
}

/// Latency over completed tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTime {
    pub avg_ms: f64,
    pub max_ms: u64,
    pub min_ms: u64,
}

/// Heuristic quality scores; raw numbers only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub average: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub agents: AgentCounts,
    pub tasks: TaskCounts,
    pub processing_time: ProcessingTime,
    pub model_usage: BTreeMap<String, u64>,
    pub category_distribution: BTreeMap<String, u64>,
    pub intelligence: ScoreStats,
    /// Mean of memory length over the memory cap, across agents
    pub memory_utilization: f64,
    pub files_processed: usize,
    pub generated_at: DateTime<Utc>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

impl Analytics {
    pub fn compute(agents: &[Agent], tasks: &[Task], files_processed: usize, memory_cap: usize) -> Self {
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
        let completed = count(TaskStatus::Completed);
        let success_rate = if tasks.is_empty() {
            0.0
        } else {
            round2(completed as f64 / tasks.len() as f64 * 100.0)
        };

        let latencies: Vec<u64> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .filter_map(|t| t.performance.as_ref().map(|p| p.latency_ms))
            .collect();
        let processing_time = ProcessingTime {
            avg_ms: round2(mean(latencies.iter().map(|&ms| ms as f64)).unwrap_or(0.0)),
            max_ms: latencies.iter().copied().max().unwrap_or(0),
            min_ms: latencies.iter().copied().min().unwrap_or(0),
        };

        let mut model_usage = BTreeMap::new();
        let mut category_distribution = BTreeMap::new();
        for task in tasks {
            *model_usage.entry(task.model.clone()).or_insert(0) += 1;
            *category_distribution
                .entry(task.category.as_str().to_string())
                .or_insert(0) += 1;
        }

        let scores: Vec<f64> = tasks.iter().filter_map(|t| t.quality_score).collect();
        let intelligence = ScoreStats {
            average: round2(mean(scores.iter().copied()).unwrap_or(0.0)),
            max: scores.iter().copied().fold(0.0, f64::max),
        };

        let memory_utilization = if memory_cap == 0 {
            0.0
        } else {
            let ratios = agents
                .iter()
                .map(|a| a.memory.len().min(memory_cap) as f64 / memory_cap as f64);
            round2(mean(ratios).unwrap_or(0.0))
        };

        Self {
            agents: AgentCounts {
                total: agents.len(),
                active: agents.iter().filter(|a| a.status == AgentStatus::Active).count(),
            },
            tasks: TaskCounts {
                total: tasks.len(),
                completed,
                failed: count(TaskStatus::Failed),
                processing: count(TaskStatus::Processing),
                success_rate,
            },
            processing_time,
            model_usage,
            category_distribution,
            intelligence,
            memory_utilization,
            files_processed,
            generated_at: Utc::now(),
        }
    }
}
