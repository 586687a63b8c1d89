//! Persisted records: agents, tasks, conversations and uploads

mod agent;
mod conversation;
mod file;
mod task;
mod template;

pub use agent::{
    Agent, AgentSettings, AgentStatus, AgentTaskUpdate, CreateAgent, MemoryEntry,
    PerformanceMetrics,
};
pub use conversation::Conversation;
pub use file::{sanitize_filename, FileKind, UploadedFile};
pub use task::{
    AugmentationMeta, ClassificationMeta, FeatureFlags, PerformanceData, Task, TaskFilter,
    TaskMetadata, TaskStatus, TaskTransitionError, VisualizationHint,
};
pub use template::{find_template, template_key, AgentTemplate, TEMPLATES};
