//! OpenAI-compatible chat client for Groq-hosted models

use super::{ApiError, ChatProvider, ChatRequest, ChatResponse, TokenUsage};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Connection settings for the hosted API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    pub api_key: String,
    /// Base URL (default: https://api.groq.com/openai/v1)
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Chat-completion client for an OpenAI-compatible endpoint
pub struct GroqClient {
    config: GroqConfig,
    client: Client,
}

impl GroqClient {
    pub fn new(config: GroqConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn build_request(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.as_str(),
                    "content": msg.content
                })
            })
            .collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }

    fn parse_response(&self, json: Value, requested_model: &str) -> Result<ChatResponse, ApiError> {
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ApiError::Provider("response contained no message content".to_string()))?
            .to_string();

        let usage = TokenUsage::new(
            json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        );

        Ok(ChatResponse {
            content,
            usage,
            model: json["model"].as_str().unwrap_or(requested_model).to_string(),
            truncated: json["choices"][0]["finish_reason"].as_str() == Some("length"),
        })
    }
}

#[async_trait]
impl ChatProvider for GroqClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ApiError> {
        let url = format!("{}/chat/completions", self.base_url());
        let body = self.build_request(&request);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            let json: Value = response.json().await?;
            self.parse_response(json, &request.model)
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(60);
            Err(ApiError::RateLimited { retry_after_secs })
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let error_text = response.text().await.unwrap_or_default();
            Err(ApiError::Auth(format!("{}: {}", status, error_text)))
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(ApiError::Provider(format!("{}: {}", status, error_text)))
        }
    }

    async fn is_available(&self) -> bool {
        if self.config.api_key.is_empty() {
            return false;
        }

        self.client
            .get(format!("{}/models", self.base_url()))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "Groq"
    }
}
