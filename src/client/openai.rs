use super::{CompletionClient, CompletionRequest};
use crate::{config::Config, error::AiError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Chat-completions client for an OpenAI-style endpoint.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn from_config(cfg: &Config) -> Result<Self, AiError> {
        let api_key = std::env::var(&cfg.openai.api_key_env)
            .map_err(|_| AiError::Auth(format!("{} is not set", cfg.openai.api_key_env)))?;
        if api_key.trim().is_empty() {
            return Err(AiError::Auth(format!("{} is empty", cfg.openai.api_key_env)));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.openai.request_timeout_seconds))
            .build()
            .map_err(|e| AiError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: cfg.openai.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, req: &CompletionRequest) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &req.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &req.system,
                },
                ChatMessage {
                    role: "user",
                    content: &req.prompt,
                },
            ],
            max_tokens: req.max_tokens,
            temperature: req.temperature,
        };

        debug!(model = %req.model, max_tokens = req.max_tokens, "completion request");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AiError::classify(
                Some(status.as_u16()),
                &format!("HTTP {status}: {text}"),
            ));
        }

        let parsed: ChatResponse = resp.json().await?;
        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or("")
            .trim()
            .to_string();
        Ok(content)
    }
}
