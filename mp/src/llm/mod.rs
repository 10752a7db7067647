//! LLM client module
//!
//! Provides the streaming LLM client abstraction and the OpenRouter implementation.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod openrouter;
mod types;

pub use client::{LlmClient, STREAM_CHANNEL_CAPACITY};
pub use error::LlmError;
pub use openrouter::OpenRouterClient;
pub use types::{CompletionRequest, CompletionResponse, FinishReason, Message, ResponseSchema, Role, StreamChunk};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "openrouter" => {
            debug!("create_client: creating OpenRouter client");
            Ok(Arc::new(OpenRouterClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::InvalidResponse(format!(
                "Unknown LLM provider: '{}'. Supported: openrouter",
                other
            )))
        }
    }
}
