//! Document store for agents, tasks, conversations and uploaded files

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::api::Message;
use crate::models::{Agent, AgentTaskUpdate, Conversation, Task, TaskFilter, UploadedFile};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Collections keyed by identifier; every listing is newest first.
///
/// Aggregate updates are atomic per call but not serialized across tasks:
/// concurrent tasks on one agent resolve last-writer-wins.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_agent(&self, agent: &Agent) -> Result<(), StoreError>;

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, StoreError>;

    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError>;

    /// Removes the agent with its tasks and conversations. Returns whether it existed.
    async fn delete_agent(&self, id: &str) -> Result<bool, StoreError>;

    /// Folds a completed task into the agent's aggregates and bounded memory
    async fn apply_agent_update(
        &self,
        id: &str,
        update: AgentTaskUpdate,
    ) -> Result<Agent, StoreError>;

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError>;

    async fn update_task(&self, task: &Task) -> Result<(), StoreError>;

    async fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError>;

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError>;

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError>;

    /// Appends messages in order; the message list only ever grows
    async fn append_messages(
        &self,
        id: &str,
        messages: Vec<Message>,
    ) -> Result<Conversation, StoreError>;

    async fn insert_file(&self, file: &UploadedFile) -> Result<(), StoreError>;

    async fn get_file(&self, id: &str) -> Result<Option<UploadedFile>, StoreError>;

    async fn list_files(&self) -> Result<Vec<UploadedFile>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Behaviour shared by every store implementation
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use crate::models::{
        ClassificationMeta, CreateAgent, FeatureFlags, MemoryEntry, PerformanceData, TaskMetadata,
        TaskStatus,
    };
    use crate::routing::TaskCategory;
    use chrono::{Duration, Utc};

    pub fn agent(name: &str) -> Agent {
        Agent::new(CreateAgent {
            name: name.to_string(),
            system_prompt: "You help.".to_string(),
            ..Default::default()
        })
    }

    pub fn task(agent_id: &str, prompt: &str) -> Task {
        Task::processing(
            agent_id,
            prompt,
            TaskCategory::FastResponse,
            "llama-3.1-8b-instant",
            None,
            TaskMetadata {
                classification: ClassificationMeta {
                    complexity: 0,
                    confidence: 0.0,
                    auto_selected: true,
                    escalated: false,
                },
                features: FeatureFlags::default(),
                file_ids: Vec::new(),
                context: None,
                augmentation: None,
                visualization: None,
            },
        )
    }

    fn update(n: u64) -> AgentTaskUpdate {
        AgentTaskUpdate {
            latency_ms: n * 10,
            quality_score: 0.5,
            memory: MemoryEntry {
                task_id: format!("task-{n}"),
                prompt: "p".to_string(),
                response: "r".to_string(),
                recorded_at: Utc::now(),
                latency_ms: n * 10,
            },
            memory_cap: 3,
        }
    }

    pub async fn agents_roundtrip(store: &dyn DocumentStore) {
        let mut older = agent("older");
        older.created_at = Utc::now() - Duration::seconds(60);
        let newer = agent("newer");
        store.insert_agent(&older).await.unwrap();
        store.insert_agent(&newer).await.unwrap();

        let fetched = store.get_agent(&newer.id).await.unwrap().unwrap();
        assert_eq!(fetched, newer);
        assert!(store.get_agent("ghost-agent").await.unwrap().is_none());

        let names: Vec<String> = store.list_agents().await.unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["newer", "older"]);
    }

    pub async fn agent_update_is_bounded(store: &dyn DocumentStore) {
        let agent = agent("bounded");
        store.insert_agent(&agent).await.unwrap();

        for n in 0..5 {
            store.apply_agent_update(&agent.id, update(n)).await.unwrap();
        }

        let stored = store.get_agent(&agent.id).await.unwrap().unwrap();
        assert_eq!(stored.performance.tasks_completed, 5);
        assert!((stored.performance.avg_latency_ms - 20.0).abs() < 1e-9);
        assert_eq!(stored.memory.len(), 3);
        assert_eq!(stored.memory[0].task_id, "task-2");

        let err = store.apply_agent_update("ghost-agent", update(9)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "agent", .. }));
    }

    pub async fn delete_cascades(store: &dyn DocumentStore) {
        let keep = agent("keep");
        let drop = agent("drop");
        store.insert_agent(&keep).await.unwrap();
        store.insert_agent(&drop).await.unwrap();

        store.insert_task(&task(&keep.id, "kept")).await.unwrap();
        store.insert_task(&task(&drop.id, "dropped")).await.unwrap();
        let conversation = Conversation::new(&drop.id);
        store.insert_conversation(&conversation).await.unwrap();

        assert!(store.delete_agent(&drop.id).await.unwrap());
        assert!(!store.delete_agent(&drop.id).await.unwrap());

        assert!(store.get_agent(&drop.id).await.unwrap().is_none());
        assert!(store.get_conversation(&conversation.id).await.unwrap().is_none());
        let remaining = store.list_tasks(&TaskFilter::default()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].prompt, "kept");
    }

    pub async fn task_lifecycle(store: &dyn DocumentStore) {
        let agent = agent("worker");
        store.insert_agent(&agent).await.unwrap();

        let mut first = task(&agent.id, "first");
        first.created_at = Utc::now() - Duration::seconds(5);
        let mut second = task(&agent.id, "second");
        store.insert_task(&first).await.unwrap();
        store.insert_task(&second).await.unwrap();
        store.insert_task(&task("other-agent", "third")).await.unwrap();

        second
            .complete("done", PerformanceData { latency_ms: 5, tokens_estimate: Some(2) }, 0.3)
            .unwrap();
        store.update_task(&second).await.unwrap();

        let stored = store.get_task(&second.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.response.as_deref(), Some("done"));

        let for_agent = store.list_tasks(&TaskFilter::for_agent(&agent.id)).await.unwrap();
        let prompts: Vec<&str> = for_agent.iter().map(|t| t.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["second", "first"]);

        let completed = store
            .list_tasks(&TaskFilter {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);

        assert_eq!(store.list_tasks(&TaskFilter::recent(2)).await.unwrap().len(), 2);

        let ghost = task(&agent.id, "never inserted");
        assert!(matches!(
            store.update_task(&ghost).await,
            Err(StoreError::NotFound { kind: "task", .. })
        ));
    }

    pub async fn conversation_grows(store: &dyn DocumentStore) {
        let conversation = Conversation::new("agent-1");
        store.insert_conversation(&conversation).await.unwrap();

        store
            .append_messages(&conversation.id, vec![Message::user("q1"), Message::assistant("a1")])
            .await
            .unwrap();
        let updated = store
            .append_messages(&conversation.id, vec![Message::user("q2"), Message::assistant("a2")])
            .await
            .unwrap();

        assert_eq!(updated.messages.len(), 4);
        let stored = store.get_conversation(&conversation.id).await.unwrap().unwrap();
        assert_eq!(stored.messages, updated.messages);
        assert_eq!(stored.messages[2].content, "q2");

        assert!(store.append_messages("missing", vec![Message::user("x")]).await.is_err());
    }

    pub async fn files_roundtrip(store: &dyn DocumentStore) {
        let dir = std::path::Path::new("/tmp/uploads");
        let file = UploadedFile::new("a.txt", "text/plain", b"abc", dir);
        store.insert_file(&file).await.unwrap();

        assert_eq!(store.get_file(&file.id).await.unwrap(), Some(file.clone()));
        assert_eq!(store.list_files().await.unwrap(), vec![file]);
        assert!(store.get_file("nope").await.unwrap().is_none());
        store.ping().await.unwrap();
    }
}
