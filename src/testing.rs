//! Test doubles shared by unit tests across the crate

use crate::api::{ApiError, ChatProvider, ChatRequest, ChatResponse, Message, TokenUsage};
use crate::augment::{AugmentError, PageFetcher};
use crate::cache::{CacheError, CacheStore};
use crate::models::{Agent, AgentTaskUpdate, Conversation, Task, TaskFilter, UploadedFile};
use crate::store::{DocumentStore, MemoryStore, StoreError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Upstream model that answers with a fixed reply and records every request
pub struct ScriptedProvider {
    reply: String,
    failing_models: HashSet<String>,
    failing: AtomicBool,
    available: AtomicBool,
    delay: Option<Duration>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            failing_models: HashSet::new(),
            failing: AtomicBool::new(false),
            available: AtomicBool::new(true),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests for `model` fail with a provider error
    pub fn failing_for(mut self, model: &str) -> Self {
        self.failing_models.insert(model.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every request until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) || self.failing_models.contains(&request.model) {
            return Err(ApiError::Provider(format!("500: model {} unavailable", request.model)));
        }

        Ok(ChatResponse {
            content: self.reply.clone(),
            usage: TokenUsage::new(request.char_len() as u32 / 4, self.reply.len() as u32 / 4),
            model: request.model,
            truncated: false,
        })
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Serves canned HTML per URL; any other URL answers 404
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AugmentError> {
        self.pages.get(url).cloned().ok_or_else(|| AugmentError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Cache backend that is never reachable
pub struct FailingCache;

#[async_trait]
impl CacheStore for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

/// Memory store whose agent aggregate updates always fail
#[derive(Default)]
pub struct RejectingAgentUpdates {
    pub inner: MemoryStore,
}

#[async_trait]
impl DocumentStore for RejectingAgentUpdates {
    async fn insert_agent(&self, agent: &Agent) -> Result<(), StoreError> {
        self.inner.insert_agent(agent).await
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, StoreError> {
        self.inner.get_agent(id).await
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        self.inner.list_agents().await
    }

    async fn delete_agent(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.delete_agent(id).await
    }

    async fn apply_agent_update(
        &self,
        id: &str,
        _update: AgentTaskUpdate,
    ) -> Result<Agent, StoreError> {
        Err(StoreError::not_found("agent", id))
    }

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.inner.insert_task(task).await
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        self.inner.update_task(task).await
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        self.inner.get_task(id).await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        self.inner.list_tasks(filter).await
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.inner.insert_conversation(conversation).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        self.inner.get_conversation(id).await
    }

    async fn append_messages(
        &self,
        id: &str,
        messages: Vec<Message>,
    ) -> Result<Conversation, StoreError> {
        self.inner.append_messages(id, messages).await
    }

    async fn insert_file(&self, file: &UploadedFile) -> Result<(), StoreError> {
        self.inner.insert_file(file).await
    }

    async fn get_file(&self, id: &str) -> Result<Option<UploadedFile>, StoreError> {
        self.inner.get_file(id).await
    }

    async fn list_files(&self) -> Result<Vec<UploadedFile>, StoreError> {
        self.inner.list_files().await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}
