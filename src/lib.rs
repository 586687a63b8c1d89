//! agent-dispatch - Dispatch agent tasks to hosted LLMs
//!
//! Agents pair a system prompt with a model preference. Each task sent to an
//! agent is classified by keyword, routed to a model, given a bounded context
//! window and optionally augmented with scraped pages and uploaded files before
//! a single upstream call.
//!
//! ## Key Features
//!
//! - **Keyword Routing**: Classify prompts into task categories and pick a model per category
//! - **Bounded Context**: Keep conversation history and agent memory under a character budget
//! - **Augmentation**: Merge web page text and file descriptions into the user turn
//! - **Read Cache**: Best-effort cached reads that fall through to the document store
//! - **Circuit Breaker**: Short-circuit upstream calls after repeated failures

pub mod api;
pub mod augment;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod routing;
pub mod service;
pub mod store;

#[cfg(test)]
mod testing;

pub use api::{ChatProvider, GroqClient, GroqConfig};
pub use config::{Config, ConfigBuilder, ConfigError};
pub use error::PlatformError;
pub use models::{Agent, Conversation, CreateAgent, FeatureFlags, Task, TaskStatus, UploadedFile};
pub use orchestrator::{ComparisonReport, ScrapeAnalysis, TaskOrchestrator, TaskRequest};
pub use routing::{KeywordClassifier, ModelSelector, TaskCategory};
pub use service::{Analytics, HealthReport, Platform};
