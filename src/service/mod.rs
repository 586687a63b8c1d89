//! Platform facade
//!
//! Owns every operation the CLI exposes. Reads go through the read cache and
//! fall back to the document store; writes invalidate the keys they touch.

mod analytics;
mod health;

pub use analytics::{AgentCounts, Analytics, ProcessingTime, ScoreStats, TaskCounts};
pub use health::{ComponentStatus, HealthReport, OverallHealth, UpstreamStatus};

use crate::api::{ChatProvider, GroqClient};
use crate::augment::{HttpPageFetcher, PageFetcher};
use crate::cache::{keys, CacheSummary, MemoryCache, ReadCache};
use crate::config::{Config, StorageBackend};
use crate::error::PlatformError;
use crate::metrics::{MetricsSummary, MetricsTracker};
use crate::models::{
    find_template, Agent, Conversation, CreateAgent, Task, TaskFilter, UploadedFile, TEMPLATES,
};
use crate::orchestrator::{ComparisonReport, ScrapeAnalysis, TaskOrchestrator, TaskRequest};
use crate::routing::TaskCategory;
use crate::store::{DocumentStore, MemoryStore, SqliteStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Tasks returned by the recent-task listing
pub const RECENT_TASK_LIMIT: usize = 100;

/// A built-in template as listed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub key: String,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub category: TaskCategory,
    pub suggested_model: String,
}

pub struct Platform {
    config: Config,
    store: Arc<dyn DocumentStore>,
    cache: Arc<ReadCache>,
    metrics: MetricsTracker,
    orchestrator: TaskOrchestrator,
}

impl Platform {
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn ChatProvider>,
        fetcher: Arc<dyn PageFetcher>,
        cache: ReadCache,
    ) -> Self {
        let cache = Arc::new(cache);
        let metrics = MetricsTracker::new();
        let orchestrator = TaskOrchestrator::new(
            &config,
            Arc::clone(&store),
            provider,
            fetcher,
            Arc::clone(&cache),
            metrics.clone(),
        );

        Self {
            config,
            store,
            cache,
            metrics,
            orchestrator,
        }
    }

    /// Build every collaborator from configuration
    pub async fn from_config(config: Config) -> Result<Self, PlatformError> {
        let store: Arc<dyn DocumentStore> = match config.storage.backend {
            StorageBackend::Sqlite => {
                Arc::new(SqliteStore::connect(&config.storage.database_url).await?)
            }
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        };

        let provider = Arc::new(GroqClient::new(config.upstream.client_config())?);
        let fetcher = Arc::new(HttpPageFetcher::new(config.augmentation.fetch_timeout_secs)?);
        let cache = ReadCache::connect(
            &config.cache,
            Arc::new(MemoryCache::new(config.cache.max_entries)),
        )
        .await;

        Ok(Self::new(config, store, provider, fetcher, cache))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSummary {
        self.metrics.summary()
    }

    pub fn cache_summary(&self) -> CacheSummary {
        self.cache.tracker().summary()
    }

    // Agents

    pub async fn create_agent(&self, input: CreateAgent) -> Result<Agent, PlatformError> {
        if input.name.trim().is_empty() {
            return Err(PlatformError::validation("agent name must not be empty"));
        }
        if input.system_prompt.trim().is_empty() {
            return Err(PlatformError::validation("system prompt must not be empty"));
        }

        let agent = Agent::new(input);
        self.store.insert_agent(&agent).await?;
        self.cache
            .invalidate(&[keys::AGENTS_LIST, keys::DASHBOARD_ANALYTICS])
            .await;
        info!("Created agent {} ({})", agent.name, agent.id);

        Ok(agent)
    }

    pub async fn create_agent_from_template(
        &self,
        template_key: &str,
        name: Option<String>,
    ) -> Result<Agent, PlatformError> {
        let template = find_template(template_key)
            .ok_or_else(|| PlatformError::not_found("template", template_key))?;

        self.create_agent(CreateAgent {
            name: name.unwrap_or_else(|| template.name.to_string()),
            description: template.description.to_string(),
            system_prompt: template.system_prompt.to_string(),
            model: Some(template.suggested_model.to_string()),
            specialization: Some(template.category),
            ..Default::default()
        })
        .await
    }

    pub async fn list_templates(&self) -> Vec<TemplateInfo> {
        if let Some(templates) = self.cache.get(keys::AGENT_TEMPLATES).await {
            return templates;
        }

        let templates: Vec<TemplateInfo> = TEMPLATES
            .iter()
            .map(|t| TemplateInfo {
                key: t.key(),
                name: t.name.to_string(),
                description: t.description.to_string(),
                system_prompt: t.system_prompt.to_string(),
                category: t.category,
                suggested_model: t.suggested_model.to_string(),
            })
            .collect();
        self.cache
            .put(keys::AGENT_TEMPLATES, &templates, self.cache.settings().templates_ttl_secs)
            .await;
        templates
    }

    pub async fn get_agent(&self, id: &str) -> Result<Agent, PlatformError> {
        let key = keys::agent(id);
        if let Some(agent) = self.cache.get(&key).await {
            return Ok(agent);
        }

        let agent = self
            .store
            .get_agent(id)
            .await?
            .ok_or_else(|| PlatformError::not_found("agent", id))?;
        self.cache
            .put(&key, &agent, self.cache.settings().agent_ttl_secs)
            .await;
        Ok(agent)
    }

    pub async fn list_agents(&self) -> Result<Vec<Agent>, PlatformError> {
        if let Some(agents) = self.cache.get(keys::AGENTS_LIST).await {
            return Ok(agents);
        }

        let agents = self.store.list_agents().await?;
        self.cache
            .put(keys::AGENTS_LIST, &agents, self.cache.settings().list_ttl_secs)
            .await;
        Ok(agents)
    }

    /// Removes the agent with its tasks and conversations
    pub async fn delete_agent(&self, id: &str) -> Result<(), PlatformError> {
        if !self.store.delete_agent(id).await? {
            return Err(PlatformError::not_found("agent", id));
        }
        self.cache.invalidate(&keys::agent_scope(id)).await;
        info!("Deleted agent {}", id);
        Ok(())
    }

    // Conversations

    pub async fn create_conversation(&self, agent_id: &str) -> Result<Conversation, PlatformError> {
        let agent = self.get_agent(agent_id).await?;
        let conversation = Conversation::new(agent.id);
        self.store.insert_conversation(&conversation).await?;
        info!("Created conversation {} for agent {}", conversation.id, conversation.agent_id);
        Ok(conversation)
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Conversation, PlatformError> {
        self.store
            .get_conversation(id)
            .await?
            .ok_or_else(|| PlatformError::not_found("conversation", id))
    }

    // Tasks

    pub async fn execute_task(&self, request: TaskRequest) -> Result<Task, PlatformError> {
        self.orchestrator.execute_task(request).await
    }

    pub async fn list_agent_tasks(&self, agent_id: &str) -> Result<Vec<Task>, PlatformError> {
        let key = keys::agent_tasks(agent_id);
        if let Some(tasks) = self.cache.get(&key).await {
            return Ok(tasks);
        }

        let agent = self.get_agent(agent_id).await?;
        let tasks = self.store.list_tasks(&TaskFilter::for_agent(agent.id)).await?;
        self.cache
            .put(&key, &tasks, self.cache.settings().tasks_ttl_secs)
            .await;
        Ok(tasks)
    }

    pub async fn list_recent_tasks(&self) -> Result<Vec<Task>, PlatformError> {
        if let Some(tasks) = self.cache.get(keys::ALL_TASKS).await {
            return Ok(tasks);
        }

        let tasks = self
            .store
            .list_tasks(&TaskFilter::recent(RECENT_TASK_LIMIT))
            .await?;
        self.cache
            .put(keys::ALL_TASKS, &tasks, self.cache.settings().tasks_ttl_secs)
            .await;
        Ok(tasks)
    }

    pub async fn get_task(&self, id: &str) -> Result<Task, PlatformError> {
        self.store
            .get_task(id)
            .await?
            .ok_or_else(|| PlatformError::not_found("task", id))
    }

    pub async fn compare_models(
        &self,
        agent_id: &str,
        prompt: &str,
        models: &[String],
    ) -> Result<ComparisonReport, PlatformError> {
        self.orchestrator.compare_models(agent_id, prompt, models).await
    }

    pub async fn scrape_and_analyze(
        &self,
        agent_id: &str,
        url: &str,
        prompt: Option<&str>,
    ) -> Result<ScrapeAnalysis, PlatformError> {
        self.orchestrator.scrape_and_analyze(agent_id, url, prompt).await
    }

    // Files

    /// Write an upload to `{upload_dir}/{id}_{name}` and record it
    pub async fn upload_file(
        &self,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<UploadedFile, PlatformError> {
        if bytes.is_empty() {
            return Err(PlatformError::validation("uploaded file is empty"));
        }
        let limit = self.config.augmentation.max_upload_bytes;
        if bytes.len() > limit {
            return Err(PlatformError::validation(format!(
                "uploaded file is {} bytes; the limit is {limit}",
                bytes.len()
            )));
        }

        let upload_dir = &self.config.augmentation.upload_dir;
        tokio::fs::create_dir_all(upload_dir).await?;
        let file = UploadedFile::new(filename, content_type, bytes, upload_dir);
        tokio::fs::write(&file.path, bytes).await?;

        if let Err(e) = self.store.insert_file(&file).await {
            if let Err(cleanup) = tokio::fs::remove_file(&file.path).await {
                warn!("Could not remove orphaned upload {}: {}", file.path.display(), cleanup);
            }
            return Err(e.into());
        }

        self.cache
            .put(&keys::file(&file.id), &file, self.cache.settings().agent_ttl_secs)
            .await;
        self.cache.invalidate(&[keys::DASHBOARD_ANALYTICS]).await;
        info!("Stored upload {} as {:?} ({} bytes)", file.filename, file.kind, file.size_bytes);

        Ok(file)
    }

    pub async fn get_file(&self, id: &str) -> Result<UploadedFile, PlatformError> {
        let key = keys::file(id);
        if let Some(file) = self.cache.get(&key).await {
            return Ok(file);
        }

        let file = self
            .store
            .get_file(id)
            .await?
            .ok_or_else(|| PlatformError::not_found("file", id))?;
        self.cache
            .put(&key, &file, self.cache.settings().agent_ttl_secs)
            .await;
        Ok(file)
    }

    pub async fn list_files(&self) -> Result<Vec<UploadedFile>, PlatformError> {
        Ok(self.store.list_files().await?)
    }

    // Operations

    pub async fn analytics(&self) -> Result<Analytics, PlatformError> {
        if let Some(analytics) = self.cache.get(keys::DASHBOARD_ANALYTICS).await {
            return Ok(analytics);
        }

        let agents = self.store.list_agents().await?;
        let tasks = self.store.list_tasks(&TaskFilter::default()).await?;
        let files = self.store.list_files().await?;
        let analytics =
            Analytics::compute(&agents, &tasks, files.len(), self.config.context.memory_cap);

        self.cache
            .put(
                keys::DASHBOARD_ANALYTICS,
                &analytics,
                self.cache.settings().analytics_ttl_secs,
            )
            .await;
        Ok(analytics)
    }

    pub async fn health(&self) -> HealthReport {
        let store_ok = match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Store ping failed: {}", e);
                false
            }
        };

        HealthReport::assess(
            store_ok,
            self.cache.status().await,
            self.orchestrator.upstream_available().await,
            self.orchestrator.provider_name(),
            self.orchestrator.circuit(),
        )
    }
}
