//! Conversational planning assistant
//!
//! A thin layer over [`LlmClient`]: a fixed assistant system prompt, optional
//! JSON context as a second system message, then the caller's history.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Message, StreamChunk};
use crate::pipeline::prompts::CHAT_SYSTEM_PROMPT;

/// One chat turn from the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Arbitrary JSON describing the mission being discussed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

pub struct PlannerChat {
    llm: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl PlannerChat {
    pub fn new(llm: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        Self { llm, max_tokens }
    }

    /// Build the upstream request for a chat turn
    pub fn build_request(&self, request: &ChatRequest) -> CompletionRequest {
        let model = request
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.llm.default_model().to_string());
        debug!(%model, messages = request.messages.len(), has_context = request.context.is_some(), "build_request: called");

        let mut messages = vec![Message::system(CHAT_SYSTEM_PROMPT.trim_end())];
        if let Some(context) = &request.context {
            messages.push(Message::system(format!("Current context: {context}")));
        }
        messages.extend(request.messages.iter().cloned());

        CompletionRequest {
            model,
            system_prompt: None,
            messages,
            response_schema: None,
            include_reasoning: false,
            max_tokens: self.max_tokens,
        }
    }

    /// Stream the assistant reply as deltas
    pub async fn stream(
        &self,
        request: &ChatRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        self.llm.stream(self.build_request(request), chunk_tx).await
    }

    /// Full assistant reply
    pub async fn reply(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let response = self.llm.complete(self.build_request(request)).await?;
        Ok(response.content)
    }
}
