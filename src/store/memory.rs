//! In-process document store

use super::{DocumentStore, StoreError};
use crate::api::Message;
use crate::models::{Agent, AgentTaskUpdate, Conversation, Task, TaskFilter, UploadedFile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Record plus its insertion sequence, used to break created_at ties
struct Slot<T> {
    seq: u64,
    record: T,
}

type Collection<T> = RwLock<HashMap<String, Slot<T>>>;

/// Document store backed by `RwLock`-guarded maps. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    seq: AtomicU64,
    agents: Collection<Agent>,
    tasks: Collection<Task>,
    conversations: Collection<Conversation>,
    files: Collection<UploadedFile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot<T>(&self, record: T) -> Slot<T> {
        Slot {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            record,
        }
    }
}

fn newest_first<T: Clone>(
    map: &HashMap<String, Slot<T>>,
    created_at: impl Fn(&T) -> DateTime<Utc>,
    keep: impl Fn(&T) -> bool,
) -> Vec<T> {
    let mut slots: Vec<&Slot<T>> = map.values().filter(|s| keep(&s.record)).collect();
    slots.sort_by(|a, b| {
        created_at(&b.record)
            .cmp(&created_at(&a.record))
            .then(b.seq.cmp(&a.seq))
    });
    slots.into_iter().map(|s| s.record.clone()).collect()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_agent(&self, agent: &Agent) -> Result<(), StoreError> {
        let slot = self.slot(agent.clone());
        self.agents.write().await.insert(agent.id.clone(), slot);
        Ok(())
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, StoreError> {
        Ok(self.agents.read().await.get(id).map(|s| s.record.clone()))
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        Ok(newest_first(&*self.agents.read().await, |a| a.created_at, |_| true))
    }

    async fn delete_agent(&self, id: &str) -> Result<bool, StoreError> {
        let existed = self.agents.write().await.remove(id).is_some();
        self.tasks.write().await.retain(|_, s| s.record.agent_id != id);
        self.conversations.write().await.retain(|_, s| s.record.agent_id != id);
        Ok(existed)
    }

    async fn apply_agent_update(
        &self,
        id: &str,
        update: AgentTaskUpdate,
    ) -> Result<Agent, StoreError> {
        let mut agents = self.agents.write().await;
        let slot = agents.get_mut(id).ok_or_else(|| StoreError::not_found("agent", id))?;
        slot.record.apply_update(update);
        Ok(slot.record.clone())
    }

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        let slot = self.slot(task.clone());
        self.tasks.write().await.insert(task.id.clone(), slot);
        Ok(())
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let slot = tasks.get_mut(&task.id).ok_or_else(|| StoreError::not_found("task", &task.id))?;
        slot.record = task.clone();
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.read().await.get(id).map(|s| s.record.clone()))
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let mut tasks = newest_first(&*self.tasks.read().await, |t| t.created_at, |t| filter.matches(t));
        if let Some(limit) = filter.limit {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let slot = self.slot(conversation.clone());
        self.conversations
            .write()
            .await
            .insert(conversation.id.clone(), slot);
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self.conversations.read().await.get(id).map(|s| s.record.clone()))
    }

    async fn append_messages(
        &self,
        id: &str,
        messages: Vec<Message>,
    ) -> Result<Conversation, StoreError> {
        let mut conversations = self.conversations.write().await;
        let slot = conversations
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("conversation", id))?;
        slot.record.append(messages);
        Ok(slot.record.clone())
    }

    async fn insert_file(&self, file: &UploadedFile) -> Result<(), StoreError> {
        let slot = self.slot(file.clone());
        self.files.write().await.insert(file.id.clone(), slot);
        Ok(())
    }

    async fn get_file(&self, id: &str) -> Result<Option<UploadedFile>, StoreError> {
        Ok(self.files.read().await.get(id).map(|s| s.record.clone()))
    }

    async fn list_files(&self) -> Result<Vec<UploadedFile>, StoreError> {
        Ok(newest_first(&*self.files.read().await, |f| f.uploaded_at, |_| true))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
