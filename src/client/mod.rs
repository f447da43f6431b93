pub mod openai;

use crate::error::AiError;
use async_trait::async_trait;

pub use openai::OpenAiClient;

/// One text-completion request, sent once per batch.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the request and return the raw response text.
    async fn complete(&self, req: &CompletionRequest) -> Result<String, AiError>;
}
