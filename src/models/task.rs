//! Task records and their lifecycle

use crate::context::ContextStats;
use crate::routing::TaskCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// `Pending -> Processing -> Completed | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("task {id} is already {status}")]
pub struct TaskTransitionError {
    pub id: String,
    pub status: TaskStatus,
}

/// Optional behaviours requested for one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default)]
    pub web_augmentation: bool,
    #[serde(default)]
    pub reasoning_mode: bool,
    #[serde(default = "default_true")]
    pub context_optimization: bool,
    #[serde(default)]
    pub visualization: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            web_augmentation: false,
            reasoning_mode: false,
            context_optimization: true,
            visualization: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMeta {
    pub complexity: usize,
    pub confidence: f64,
    pub auto_selected: bool,
    pub escalated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AugmentationMeta {
    pub urls_fetched: usize,
    pub urls_failed: usize,
    pub files_described: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub classification: ClassificationMeta,
    pub features: FeatureFlags,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub augmentation: Option<AugmentationMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<VisualizationHint>,
}

/// Chart suggestion attached when a response looks like it carries data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualizationHint {
    pub message: String,
    pub suggested_charts: Vec<String>,
}

impl VisualizationHint {
    /// A hint for responses mentioning `data:` or `chart`, case-insensitively
    pub fn detect(response: &str) -> Option<Self> {
        let lowered = response.to_lowercase();
        if !(lowered.contains("data:") || lowered.contains("chart")) {
            return None;
        }
        Some(Self {
            message: "Visualization available: data detected in response".to_string(),
            suggested_charts: ["bar", "line", "pie"].iter().map(|c| c.to_string()).collect(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceData {
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_estimate: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub agent_id: String,
    pub prompt: String,
    pub response: Option<String>,
    pub status: TaskStatus,
    pub category: TaskCategory,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub metadata: TaskMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// A task enters the store already `Processing`
    pub fn processing(
        agent_id: impl Into<String>,
        prompt: impl Into<String>,
        category: TaskCategory,
        model: impl Into<String>,
        conversation_id: Option<String>,
        metadata: TaskMetadata,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            prompt: prompt.into(),
            response: None,
            status: TaskStatus::Processing,
            category,
            model: model.into(),
            conversation_id,
            metadata,
            performance: None,
            quality_score: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    fn ensure_open(&self) -> Result<(), TaskTransitionError> {
        if self.status.is_terminal() {
            return Err(TaskTransitionError {
                id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    pub fn complete(
        &mut self,
        response: impl Into<String>,
        performance: PerformanceData,
        quality_score: f64,
    ) -> Result<(), TaskTransitionError> {
        self.ensure_open()?;
        self.response = Some(response.into());
        self.performance = Some(performance);
        self.quality_score = Some(quality_score);
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Stores `Error: {error}` as the response
    pub fn fail(
        &mut self,
        error: impl fmt::Display,
        latency_ms: u64,
    ) -> Result<(), TaskTransitionError> {
        self.ensure_open()?;
        self.response = Some(format!("Error: {error}"));
        self.performance = Some(PerformanceData {
            latency_ms,
            tokens_estimate: None,
        });
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

/// Filter for task listings; results are newest first
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub agent_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub limit: Option<usize>,
}

impl TaskFilter {
    pub fn for_agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            ..Default::default()
        }
    }

    pub fn recent(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.agent_id.as_deref().map_or(true, |id| task.agent_id == id)
            && self.status.map_or(true, |status| task.status == status)
    }
}
