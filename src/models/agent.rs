//! Agent records and their running aggregates

use crate::routing::{TaskCategory, AUTO_MODEL};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Inactive,
}

/// One remembered interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub task_id: String,
    pub prompt: String,
    pub response: String,
    pub recorded_at: DateTime<Utc>,
    pub latency_ms: u64,
}

/// Per-agent generation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Free-form keys carried through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Running aggregates over completed tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub tasks_completed: u64,
    pub avg_latency_ms: f64,
    pub avg_quality_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    /// Concrete model identifier, or `auto`
    pub model: String,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<TaskCategory>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub memory: Vec<MemoryEntry>,
    #[serde(default)]
    pub settings: AgentSettings,
    #[serde(default)]
    pub performance: PerformanceMetrics,
}

/// Input for creating an agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAgent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub system_prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub specialization: Option<TaskCategory>,
    #[serde(default)]
    pub settings: AgentSettings,
}

impl Agent {
    pub fn new(input: CreateAgent) -> Self {
        let model = input
            .model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| AUTO_MODEL.to_string());

        Self {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            description: input.description,
            system_prompt: input.system_prompt,
            model,
            status: AgentStatus::Active,
            specialization: input.specialization,
            created_at: Utc::now(),
            memory: Vec::new(),
            settings: input.settings,
            performance: PerformanceMetrics::default(),
        }
    }

    pub fn uses_auto_model(&self) -> bool {
        self.model.eq_ignore_ascii_case(AUTO_MODEL)
    }

    /// Fold one completed task into the aggregates.
    ///
    /// Memory is a bounded FIFO: after this call its length is at most `update.memory_cap`.
    pub fn apply_update(&mut self, update: AgentTaskUpdate) {
        let perf = &mut self.performance;
        let n = perf.tasks_completed as f64;
        perf.avg_latency_ms = (perf.avg_latency_ms * n + update.latency_ms as f64) / (n + 1.0);
        perf.avg_quality_score = (perf.avg_quality_score * n + update.quality_score) / (n + 1.0);
        perf.tasks_completed += 1;

        self.memory.push(update.memory);
        let cap = update.memory_cap.max(1);
        if self.memory.len() > cap {
            let excess = self.memory.len() - cap;
            self.memory.drain(..excess);
        }
    }
}

/// Aggregate update applied after a completed task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTaskUpdate {
    pub latency_ms: u64,
    pub quality_score: f64,
    pub memory: MemoryEntry,
    pub memory_cap: usize,
}
