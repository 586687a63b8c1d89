//! Hosted LLM API layer
//!
//! Everything upstream of the orchestrator talks to a [`ChatProvider`]: a role-tagged
//! message list plus a model identifier in, one generated text out.

mod client;
mod request;
mod response;

pub use client::{GroqClient, GroqConfig};
pub use request::{ChatRequest, Message, Role};
pub use response::{estimate_tokens, ChatResponse, TokenUsage};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Upstream call timed out after {0} seconds")]
    Timeout(u64),

    #[error("Circuit open: upstream calls suspended for {retry_after_secs} more seconds")]
    CircuitOpen { retry_after_secs: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Trait for hosted chat-completion providers
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Issue exactly one generation call
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ApiError>;

    /// Cheap reachability probe used by health checks
    async fn is_available(&self) -> bool;

    /// Provider name for logging
    fn name(&self) -> &str;
}
