//! Task orchestration
//!
//! Coordinates one task end to end:
//! - classify the prompt and resolve a model
//! - assemble a bounded context window and merge augmentation into the user turn
//! - issue exactly one upstream call through the circuit breaker
//! - settle the outcome into the task, the agent aggregates and the conversation
//!
//! Also runs the multi-model comparison and the standalone scrape-and-analyze flow.

mod breaker;
mod scoring;

pub use breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};
pub use scoring::{score_response, QualityScore};

use crate::api::{estimate_tokens, ApiError, ChatProvider, ChatRequest, ChatResponse, Message};
use crate::augment::{Augmenter, PageFetcher};
use crate::cache::{keys, ReadCache};
use crate::config::{Config, UpstreamSettings};
use crate::context::{truncate_chars, ContextWindowManager};
use crate::error::PlatformError;
use crate::metrics::MetricsTracker;
use crate::models::{
    Agent, AgentTaskUpdate, AugmentationMeta, ClassificationMeta, Conversation, FeatureFlags,
    MemoryEntry, PerformanceData, Task, TaskMetadata, UploadedFile, VisualizationHint,
};
use crate::routing::{KeywordClassifier, ModelChoice, ModelSelector, TaskCategory};
use crate::store::{DocumentStore, StoreError};
use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Upper bound on file references per task
pub const MAX_FILES_PER_TASK: usize = 10;

/// Characters of scraped text echoed back in a scrape analysis
pub const SCRAPE_PREVIEW_CHARS: usize = 500;

pub const REASONING_SUFFIX: &str =
    "Think through the problem step by step, stating your reasoning before the final answer.";

const DEFAULT_SCRAPE_PROMPT: &str = "Summarize the key points of this page.";

/// Input to [`TaskOrchestrator::execute_task`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRequest {
    pub agent_id: String,
    pub prompt: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

impl TaskRequest {
    pub fn new(agent_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    pub fn with_files(mut self, file_ids: Vec<String>) -> Self {
        self.file_ids = file_ids;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// One model's result in a comparison run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOutcome {
    pub status: OutcomeStatus,
    /// The model's answer, or the error text on failure
    pub response: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub prompt: String,
    pub results: BTreeMap<String, ModelOutcome>,
    pub processing_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeAnalysis {
    pub url: String,
    pub model: String,
    pub content_preview: String,
    pub analysis: String,
    pub processing_ms: u64,
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

async fn bounded_complete(
    provider: Arc<dyn ChatProvider>,
    request: ChatRequest,
    timeout: Duration,
) -> Result<ChatResponse, ApiError> {
    match tokio::time::timeout(timeout, provider.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout(timeout.as_secs())),
    }
}

/// Runs tasks against the upstream provider
pub struct TaskOrchestrator {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn ChatProvider>,
    cache: Arc<ReadCache>,
    metrics: MetricsTracker,
    augmenter: Augmenter,
    breaker: CircuitBreaker,
    classifier: KeywordClassifier,
    selector: ModelSelector,
    context: ContextWindowManager,
    upstream: UpstreamSettings,
}

impl TaskOrchestrator {
    pub fn new(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn ChatProvider>,
        fetcher: Arc<dyn PageFetcher>,
        cache: Arc<ReadCache>,
        metrics: MetricsTracker,
    ) -> Self {
        Self {
            store,
            provider,
            cache,
            metrics,
            augmenter: Augmenter::new(fetcher, config.augmentation.clone()),
            breaker: CircuitBreaker::from_settings(&config.breaker),
            classifier: KeywordClassifier::new(),
            selector: ModelSelector::new(config.routing.clone()),
            context: ContextWindowManager::new(config.context.clone()),
            upstream: config.upstream.clone(),
        }
    }

    pub fn circuit(&self) -> CircuitSnapshot {
        self.breaker.snapshot()
    }

    pub async fn upstream_available(&self) -> bool {
        self.provider.is_available().await
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// One upstream call, bounded by the configured timeout and gated by the breaker
    async fn call_upstream(&self, request: ChatRequest) -> Result<ChatResponse, ApiError> {
        let timeout = Duration::from_secs(self.upstream.timeout_secs);
        let provider = Arc::clone(&self.provider);
        let started = Instant::now();

        let result = self
            .breaker
            .call(move || bounded_complete(provider, request, timeout))
            .await;

        if !matches!(result, Err(ApiError::CircuitOpen { .. })) {
            self.metrics.record_upstream(started.elapsed());
        }
        result
    }

    /// Like [`Self::call_upstream`] but outside the breaker. Comparison runs use
    /// it, so one model's failure never short-circuits the others.
    async fn call_ungated(&self, request: ChatRequest) -> Result<ChatResponse, ApiError> {
        let timeout = Duration::from_secs(self.upstream.timeout_secs);
        let started = Instant::now();
        let result = bounded_complete(Arc::clone(&self.provider), request, timeout).await;
        self.metrics.record_upstream(started.elapsed());
        result
    }

    async fn load_agent(&self, agent_id: &str) -> Result<Agent, PlatformError> {
        self.store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("agent", agent_id))
    }

    /// Run one task to a terminal state.
    ///
    /// Lookup and validation failures return `Err` before anything is persisted.
    /// Once the task is stored, upstream and settlement failures end in a `Failed`
    /// task rather than an error.
    pub async fn execute_task(&self, request: TaskRequest) -> Result<Task, PlatformError> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(PlatformError::validation("prompt must not be empty"));
        }
        if request.file_ids.len() > MAX_FILES_PER_TASK {
            return Err(PlatformError::validation(format!(
                "at most {MAX_FILES_PER_TASK} files may be attached to a task"
            )));
        }

        let agent = self.load_agent(&request.agent_id).await?;

        let conversation = match &request.conversation_id {
            Some(id) => Some(
                self.store
                    .get_conversation(id)
                    .await?
                    .filter(|c| c.agent_id == agent.id)
                    .ok_or_else(|| PlatformError::not_found("conversation", id.as_str()))?,
            ),
            None => None,
        };

        let mut files = Vec::with_capacity(request.file_ids.len());
        for id in &request.file_ids {
            let file = self
                .store
                .get_file(id)
                .await?
                .ok_or_else(|| PlatformError::not_found("file", id.as_str()))?;
            files.push(file);
        }

        let classification = self.classifier.classify(prompt);
        let choice = self.selector.resolve(
            &agent.model,
            classification.category,
            self.selector.complexity(prompt),
            request.features.reasoning_mode,
        );
        info!(
            "Selected {} for {} task (complexity {}, escalated: {})",
            choice.model, choice.category, choice.complexity, choice.escalated
        );

        let metadata = TaskMetadata {
            classification: ClassificationMeta {
                complexity: choice.complexity,
                confidence: classification.confidence,
                auto_selected: choice.auto_selected,
                escalated: choice.escalated,
            },
            features: request.features,
            file_ids: request.file_ids.clone(),
            context: None,
            augmentation: None,
            visualization: None,
        };
        let mut task = Task::processing(
            &agent.id,
            prompt,
            choice.category,
            &choice.model,
            request.conversation_id.clone(),
            metadata,
        );
        self.store.insert_task(&task).await?;
        self.cache
            .invalidate(&[keys::ALL_TASKS.to_string(), keys::agent_tasks(&agent.id)])
            .await;
        info!("Task {} created for agent {}", task.id, agent.id);

        let started = Instant::now();
        let transition = match self
            .generate(&agent, conversation.as_ref(), &files, &choice, &mut task)
            .await
        {
            Ok(response) => {
                let latency_ms = elapsed_ms(started);
                match self.settle(&agent, &task, &response.content, latency_ms).await {
                    Ok(score) => {
                        if task.metadata.features.visualization {
                            task.metadata.visualization = VisualizationHint::detect(&response.content);
                        }
                        let performance = PerformanceData {
                            latency_ms,
                            tokens_estimate: Some(estimate_tokens(&response.content)),
                        };
                        task.complete(response.content, performance, score.total)
                    }
                    Err(e) => {
                        warn!("Task {} could not be settled: {}", task.id, e);
                        task.fail(e, latency_ms)
                    }
                }
            }
            Err(e) => {
                warn!("Task {} upstream call failed: {}", task.id, e);
                task.fail(e, elapsed_ms(started))
            }
        };
        transition.map_err(|e| PlatformError::validation(e.to_string()))?;

        self.store.update_task(&task).await?;
        self.metrics.record_task(task.status, &task.model);
        self.cache.invalidate(&keys::agent_scope(&agent.id)).await;
        info!("Task {} finished as {}", task.id, task.status);

        Ok(task)
    }

    /// Build the outgoing messages and make the single upstream call
    async fn generate(
        &self,
        agent: &Agent,
        conversation: Option<&Conversation>,
        files: &[UploadedFile],
        choice: &ModelChoice,
        task: &mut Task,
    ) -> Result<ChatResponse, ApiError> {
        let features = task.metadata.features;

        let system_prompt = if features.reasoning_mode {
            format!("{}\n\n{}", agent.system_prompt, REASONING_SUFFIX)
        } else {
            agent.system_prompt.clone()
        };
        let history = conversation.map_or(&[][..], |c| c.messages.as_slice());

        let mut window = self.context.build(
            &system_prompt,
            history,
            &agent.memory,
            &task.prompt,
            features.context_optimization,
        );
        if window.stats.trimmed {
            info!(
                "Context for task {} trimmed from {} to {} chars ({} messages dropped)",
                task.id,
                window.stats.original_chars,
                window.stats.final_chars,
                window.stats.dropped_messages
            );
        }
        task.metadata.context = Some(window.stats.clone());

        if features.web_augmentation || !files.is_empty() {
            let augmented = self
                .augmenter
                .augment(&task.prompt, features.web_augmentation, files)
                .await;
            for note in &augmented.report.notes {
                info!("Augmentation note for task {}: {} ({})", task.id, note.source, note.reason);
            }
            task.metadata.augmentation = Some(AugmentationMeta::from(&augmented.report));
            if let Some(user_turn) = window.messages.last_mut() {
                user_turn.content = augmented.prompt;
            }
        }

        let request = ChatRequest::new(choice.model.clone(), window.messages)
            .with_max_tokens(agent.settings.max_tokens.unwrap_or(self.upstream.max_tokens))
            .with_temperature(agent.settings.temperature.unwrap_or(self.upstream.temperature));
        debug!("Sending {} chars to {}", request.char_len(), request.model);

        self.call_upstream(request).await
    }

    /// Persist everything a successful response touches, short of the task itself.
    ///
    /// The conversation grows last, so a task that fails here leaves no turn behind.
    async fn settle(
        &self,
        agent: &Agent,
        task: &Task,
        response: &str,
        latency_ms: u64,
    ) -> Result<QualityScore, StoreError> {
        let score = score_response(response, task.category);

        let update = AgentTaskUpdate {
            latency_ms,
            quality_score: score.total,
            memory: MemoryEntry {
                task_id: task.id.clone(),
                prompt: task.prompt.clone(),
                response: response.to_string(),
                recorded_at: Utc::now(),
                latency_ms,
            },
            memory_cap: self.context.settings().memory_cap,
        };
        self.store.apply_agent_update(&agent.id, update).await?;
        self.cache.invalidate(&keys::agent_scope(&agent.id)).await;

        if let Some(conversation_id) = &task.conversation_id {
            self.store
                .append_messages(
                    conversation_id,
                    vec![Message::user(task.prompt.clone()), Message::assistant(response)],
                )
                .await?;
        }

        Ok(score)
    }

    /// Send the same prompt to each distinct model concurrently.
    ///
    /// Upstream failures are reported per model and never fail the run.
    pub async fn compare_models(
        &self,
        agent_id: &str,
        prompt: &str,
        models: &[String],
    ) -> Result<ComparisonReport, PlatformError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(PlatformError::validation("prompt must not be empty"));
        }
        let models: BTreeSet<&str> = models
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .collect();
        if models.is_empty() {
            return Err(PlatformError::validation("at least one model is required"));
        }

        let agent = self.load_agent(agent_id).await?;
        let started = Instant::now();
        info!("Comparing {} models for agent {}", models.len(), agent.id);

        let runs = models.into_iter().map(|model| {
            let request = ChatRequest::new(
                model,
                vec![Message::system(agent.system_prompt.clone()), Message::user(prompt)],
            )
            .with_max_tokens(self.upstream.comparison_max_tokens)
            .with_temperature(agent.settings.temperature.unwrap_or(self.upstream.temperature));

            async move {
                let call_started = Instant::now();
                let result = self.call_ungated(request).await;
                let latency_ms = elapsed_ms(call_started);
                let outcome = match result {
                    Ok(response) => ModelOutcome {
                        status: OutcomeStatus::Success,
                        response: response.content,
                        latency_ms,
                    },
                    Err(e) => {
                        warn!("Comparison call to {} failed: {}", model, e);
                        ModelOutcome {
                            status: OutcomeStatus::Failed,
                            response: format!("Error: {e}"),
                            latency_ms,
                        }
                    }
                };
                (model.to_string(), outcome)
            }
        });
        let results = join_all(runs).await.into_iter().collect();

        self.metrics.record_comparison();
        Ok(ComparisonReport {
            prompt: prompt.to_string(),
            results,
            processing_ms: elapsed_ms(started),
        })
    }

    /// Fetch one page and ask the web-retrieval model to analyze it
    pub async fn scrape_and_analyze(
        &self,
        agent_id: &str,
        url: &str,
        prompt: Option<&str>,
    ) -> Result<ScrapeAnalysis, PlatformError> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(PlatformError::validation(format!("not an http(s) URL: {url}")));
        }

        let agent = self.load_agent(agent_id).await?;
        let started = Instant::now();

        let text = self.augmenter.fetch_text(url).await?;
        let instruction = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_SCRAPE_PROMPT);

        let model = self.selector.base_model(TaskCategory::WebRetrieval).to_string();
        let request = ChatRequest::new(
            model.clone(),
            vec![
                Message::system(agent.system_prompt.clone()),
                Message::user(format!("{instruction}\n\nWeb content from {url}:\n{text}")),
            ],
        )
        .with_max_tokens(self.upstream.max_tokens)
        .with_temperature(agent.settings.temperature.unwrap_or(self.upstream.temperature));

        let response = self.call_upstream(request).await?;
        self.metrics.record_scrape();
        info!("Analyzed {} with {}", url, model);

        Ok(ScrapeAnalysis {
            url: url.to_string(),
            model,
            content_preview: truncate_chars(&text, SCRAPE_PREVIEW_CHARS).to_string(),
            analysis: response.content,
            processing_ms: elapsed_ms(started),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateAgent, TaskFilter, TaskStatus};
    use crate::store::MemoryStore;
    use crate::testing::{RejectingAgentUpdates, ScriptedProvider, StaticFetcher};

    struct Harness {
        orchestrator: TaskOrchestrator,
        store: Arc<MemoryStore>,
        provider: Arc<ScriptedProvider>,
    }

    fn harness_with(config: Config, provider: ScriptedProvider, fetcher: StaticFetcher) -> Harness {
        let store = Arc::new(MemoryStore::default());
        let provider = Arc::new(provider);
        let orchestrator = TaskOrchestrator::new(
            &config,
            store.clone(),
            provider.clone(),
            Arc::new(fetcher),
            Arc::new(ReadCache::disabled()),
            MetricsTracker::new(),
        );
        Harness {
            orchestrator,
            store,
            provider,
        }
    }

    fn harness(provider: ScriptedProvider) -> Harness {
        harness_with(Config::default(), provider, StaticFetcher::new())
    }

    async fn agent(store: &MemoryStore, model: Option<&str>) -> Agent {
        let agent = Agent::new(CreateAgent {
            name: "Writer".to_string(),
            system_prompt: "You write.".to_string(),
            model: model.map(str::to_string),
            ..Default::default()
        });
        store.insert_agent(&agent).await.unwrap();
        agent
    }

    #[tokio::test]
    async fn test_empty_prompt_persists_nothing() {
        let h = harness(ScriptedProvider::replying("ok"));
        let agent = agent(&h.store, None).await;

        let err = h
            .orchestrator
            .execute_task(TaskRequest::new(&agent.id, "   "))
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Validation(_)));
        assert!(h.store.list_tasks(&TaskFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_agent() {
        let h = harness(ScriptedProvider::replying("ok"));
        let err = h
            .orchestrator
            .execute_task(TaskRequest::new("ghost-agent", "hello"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(h.store.list_tasks(&TaskFilter::default()).await.unwrap().is_empty());
        assert!(h.provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_too_many_files() {
        let h = harness(ScriptedProvider::replying("ok"));
        let agent = agent(&h.store, None).await;
        let files = (0..11).map(|i| format!("f{i}")).collect();

        let err = h
            .orchestrator
            .execute_task(TaskRequest::new(&agent.id, "describe").with_files(files))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Validation(_)));
    }

    #[tokio::test]
    async fn test_successful_task_updates_everything() {
        let h = harness(ScriptedProvider::replying("Once upon a time, a dragon wrote a story."));
        let agent = agent(&h.store, None).await;
        let conversation = Conversation::new(&agent.id);
        h.store.insert_conversation(&conversation).await.unwrap();

        let task = h
            .orchestrator
            .execute_task(
                TaskRequest::new(&agent.id, "write a short story").in_conversation(&conversation.id),
            )
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.category, TaskCategory::Creative);
        assert_eq!(task.model, "llama3-70b-8192");
        assert_eq!(task.response.as_deref(), Some("Once upon a time, a dragon wrote a story."));
        assert!(task.quality_score.is_some());
        assert_eq!(task.performance.as_ref().unwrap().tokens_estimate, Some(12));

        let stored = h.store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);

        let agent = h.store.get_agent(&agent.id).await.unwrap().unwrap();
        assert_eq!(agent.performance.tasks_completed, 1);
        assert_eq!(agent.memory.len(), 1);
        assert_eq!(agent.memory[0].task_id, task.id);

        let conversation = h.store.get_conversation(&conversation.id).await.unwrap().unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].content, "write a short story");
    }

    #[tokio::test]
    async fn test_explicit_model_is_used() {
        let h = harness(ScriptedProvider::replying("ok"));
        let agent = agent(&h.store, Some("mixtral-8x7b-32768")).await;

        let task = h
            .orchestrator
            .execute_task(TaskRequest::new(&agent.id, "write a poem"))
            .await
            .unwrap();

        assert_eq!(task.model, "mixtral-8x7b-32768");
        assert!(!task.metadata.classification.auto_selected);
        assert_eq!(h.provider.requests()[0].model, "mixtral-8x7b-32768");
    }

    #[tokio::test]
    async fn test_upstream_failure_fails_task_without_touching_agent() {
        let provider = ScriptedProvider::replying("unused");
        provider.set_failing(true);
        let h = harness(provider);
        let agent = agent(&h.store, None).await;

        let task = h
            .orchestrator
            .execute_task(TaskRequest::new(&agent.id, "hello there"))
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.response.as_deref().unwrap().starts_with("Error: "));
        assert!(task.quality_score.is_none());

        let agent = h.store.get_agent(&agent.id).await.unwrap().unwrap();
        assert_eq!(agent.performance.tasks_completed, 0);
        assert!(agent.memory.is_empty());
    }

    #[tokio::test]
    async fn test_foreign_conversation_is_not_found() {
        let h = harness(ScriptedProvider::replying("ok"));
        let agent = agent(&h.store, None).await;
        let other = Conversation::new("someone-else");
        h.store.insert_conversation(&other).await.unwrap();

        let err = h
            .orchestrator
            .execute_task(TaskRequest::new(&agent.id, "hi").in_conversation(&other.id))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { kind: "conversation", .. }));
    }

    #[tokio::test]
    async fn test_reasoning_mode_escalates_and_extends_system_prompt() {
        let h = harness(ScriptedProvider::replying("ok"));
        let agent = agent(&h.store, None).await;
        let features = FeatureFlags {
            reasoning_mode: true,
            ..Default::default()
        };

        let task = h
            .orchestrator
            .execute_task(TaskRequest::new(&agent.id, "hello").with_features(features))
            .await
            .unwrap();

        assert!(task.metadata.classification.escalated);
        let requests = h.provider.requests();
        assert!(requests[0].messages[0].content.ends_with(REASONING_SUFFIX));
    }

    #[tokio::test]
    async fn test_web_augmentation_reaches_upstream() {
        let fetcher = StaticFetcher::new().with_page("https://docs.test/page", "<p>Fresh facts</p>");
        let h = harness_with(Config::default(), ScriptedProvider::replying("ok"), fetcher);
        let agent = agent(&h.store, None).await;
        let features = FeatureFlags {
            web_augmentation: true,
            ..Default::default()
        };

        let task = h
            .orchestrator
            .execute_task(
                TaskRequest::new(&agent.id, "summarize https://docs.test/page and https://gone.test")
                    .with_features(features),
            )
            .await
            .unwrap();

        let user_turn = h.provider.requests()[0].messages.last().unwrap().content.clone();
        assert!(user_turn.contains("Scraped content from https://docs.test/page:\nFresh facts"));
        assert!(user_turn.contains("Note: Could not retrieve content from https://gone.test"));

        let meta = task.metadata.augmentation.unwrap();
        assert_eq!(meta.urls_fetched, 1);
        assert_eq!(meta.urls_failed, 1);
        // the stored prompt stays as submitted
        assert!(!task.prompt.contains("Scraped content"));
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast() {
        let mut config = Config::default();
        config.breaker.failure_threshold = 1;
        let provider = ScriptedProvider::replying("ok");
        provider.set_failing(true);
        let h = harness_with(config, provider, StaticFetcher::new());
        let agent = agent(&h.store, None).await;

        h.orchestrator
            .execute_task(TaskRequest::new(&agent.id, "first"))
            .await
            .unwrap();
        let second = h
            .orchestrator
            .execute_task(TaskRequest::new(&agent.id, "second"))
            .await
            .unwrap();

        assert_eq!(second.status, TaskStatus::Failed);
        assert!(second.response.unwrap().contains("Circuit open"));
        assert_eq!(h.provider.requests().len(), 1);
        assert_eq!(h.orchestrator.circuit().state, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let mut config = Config::default();
        config.upstream.timeout_secs = 1;
        let provider = ScriptedProvider::replying("late").with_delay(Duration::from_secs(5));
        let h = harness_with(config, provider, StaticFetcher::new());
        let agent = agent(&h.store, None).await;

        let task = h
            .orchestrator
            .execute_task(TaskRequest::new(&agent.id, "hello"))
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.response.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_compare_models_isolates_failures() {
        let mut config = Config::default();
        config.breaker.failure_threshold = 1;
        let provider = ScriptedProvider::replying("answer").failing_for("bad-model");
        let h = harness_with(config, provider, StaticFetcher::new());
        let agent = agent(&h.store, None).await;
        let models = vec![
            "bad-model".to_string(),
            "llama-a".to_string(),
            "llama-b".to_string(),
        ];

        for _ in 0..2 {
            let report = h
                .orchestrator
                .compare_models(&agent.id, "explain tides", &models)
                .await
                .unwrap();

            let successes = report
                .results
                .values()
                .filter(|o| o.status == OutcomeStatus::Success)
                .count();
            assert_eq!(report.results.len(), 3);
            assert_eq!(successes, 2);
            assert_eq!(report.results["llama-a"].response, "answer");
            let failed = &report.results["bad-model"];
            assert_eq!(failed.status, OutcomeStatus::Failed);
            assert!(failed.response.starts_with("Error: "));
        }

        assert_eq!(h.provider.requests().len(), 6);
        assert_eq!(h.orchestrator.circuit().state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_compare_models_dedupes() {
        let provider = ScriptedProvider::replying("answer").failing_for("broken-model");
        let h = harness(provider);
        let agent = agent(&h.store, None).await;
        let models = vec![
            "llama3-70b-8192".to_string(),
            "broken-model".to_string(),
            "llama3-70b-8192".to_string(),
        ];

        let report = h
            .orchestrator
            .compare_models(&agent.id, "explain tides", &models)
            .await
            .unwrap();

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results["llama3-70b-8192"].status, OutcomeStatus::Success);
        assert_eq!(report.results["llama3-70b-8192"].response, "answer");
        assert_eq!(report.results["broken-model"].status, OutcomeStatus::Failed);
        assert_eq!(h.provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_settlement_leaves_conversation_untouched() {
        let store = Arc::new(RejectingAgentUpdates::default());
        let provider = Arc::new(ScriptedProvider::replying("Here you go."));
        let orchestrator = TaskOrchestrator::new(
            &Config::default(),
            store.clone(),
            provider,
            Arc::new(StaticFetcher::new()),
            Arc::new(ReadCache::disabled()),
            MetricsTracker::new(),
        );
        let agent = agent(&store.inner, None).await;
        let conversation = Conversation::new(&agent.id);
        store.insert_conversation(&conversation).await.unwrap();

        let task = orchestrator
            .execute_task(TaskRequest::new(&agent.id, "hello").in_conversation(&conversation.id))
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(store.get_task(&task.id).await.unwrap().unwrap().status, TaskStatus::Failed);
        let conversation = store.get_conversation(&conversation.id).await.unwrap().unwrap();
        assert!(conversation.messages.is_empty());
    }

    #[tokio::test]
    async fn test_visualization_hint_on_data_responses() {
        let h = harness(ScriptedProvider::replying("Revenue data: 10, 20, 30"));
        let agent = agent(&h.store, None).await;
        let features = FeatureFlags {
            visualization: true,
            ..Default::default()
        };

        let task = h
            .orchestrator
            .execute_task(TaskRequest::new(&agent.id, "report revenue").with_features(features))
            .await
            .unwrap();
        let hint = task.metadata.visualization.unwrap();
        assert_eq!(hint.suggested_charts, vec!["bar", "line", "pie"]);

        // flag off: no hint even for data-like responses
        let task = h
            .orchestrator
            .execute_task(TaskRequest::new(&agent.id, "report revenue"))
            .await
            .unwrap();
        assert!(task.metadata.visualization.is_none());
    }

    #[tokio::test]
    async fn test_compare_requires_models() {
        let h = harness(ScriptedProvider::replying("answer"));
        let agent = agent(&h.store, None).await;
        let err = h
            .orchestrator
            .compare_models(&agent.id, "hi", &[" ".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Validation(_)));
    }

    #[tokio::test]
    async fn test_scrape_and_analyze() {
        let fetcher = StaticFetcher::new()
            .with_page("https://news.test", "<html><body><h1>Headline</h1><p>Body</p></body></html>");
        let h = harness_with(Config::default(), ScriptedProvider::replying("It is news."), fetcher);
        let agent = agent(&h.store, None).await;

        let analysis = h
            .orchestrator
            .scrape_and_analyze(&agent.id, "https://news.test", None)
            .await
            .unwrap();

        assert_eq!(analysis.analysis, "It is news.");
        assert_eq!(analysis.content_preview, "Headline Body");
        assert_eq!(analysis.model, "llama3-70b-8192");
        let sent = h.provider.requests()[0].messages[1].content.clone();
        assert!(sent.starts_with(DEFAULT_SCRAPE_PROMPT));
    }

    #[tokio::test]
    async fn test_scrape_fetch_failure() {
        let h = harness(ScriptedProvider::replying("unused"));
        let agent = agent(&h.store, None).await;

        let err = h
            .orchestrator
            .scrape_and_analyze(&agent.id, "https://down.test", Some("what is here?"))
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Augmentation(_)));
        assert!(h.provider.requests().is_empty());
    }
}
