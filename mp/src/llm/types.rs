//! LLM request/response types
//!
//! These types model an OpenAI-compatible chat completion call but stay
//! provider-agnostic: a message history, an optional system prompt, an optional
//! JSON-schema constraint on the output, and a reasoning toggle.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A completion request - everything needed for one LLM call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier (provider specific, e.g. "google/gemini-2.5-pro")
    pub model: String,

    /// System prompt, prepended unless `messages` already carries one
    pub system_prompt: Option<String>,

    /// Conversation history (a single user message for pipeline phases)
    pub messages: Vec<Message>,

    /// Constrain the output to a JSON schema
    pub response_schema: Option<ResponseSchema>,

    /// Ask the upstream for reasoning tokens
    pub include_reasoning: bool,

    /// Max tokens for response
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Build a request from a single user prompt
    pub fn from_prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        let model = model.into();
        debug!(%model, "CompletionRequest::from_prompt: called");
        Self {
            model,
            system_prompt: None,
            messages: vec![Message::user(prompt)],
            response_schema: None,
            include_reasoning: false,
            max_tokens: 4096,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_reasoning(mut self, include_reasoning: bool) -> Self {
        self.include_reasoning = include_reasoning;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Messages as sent upstream: the system prompt goes first unless the
    /// history already contains a system message
    pub fn effective_messages(&self) -> Vec<Message> {
        let has_system = self.messages.iter().any(|m| m.role == Role::System);
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        match &self.system_prompt {
            Some(system) if !has_system => {
                debug!("CompletionRequest::effective_messages: prepending system prompt");
                messages.push(Message::system(system.clone()));
            }
            Some(_) => {
                debug!("CompletionRequest::effective_messages: history has a system message, ignoring system prompt");
            }
            None => {}
        }
        messages.extend(self.messages.iter().cloned());
        messages
    }

    /// Total characters across all message bodies, for logging
    pub fn prompt_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.len()).sum()
    }
}

/// JSON-schema constraint for structured output
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub strict: bool,
    pub schema: serde_json::Value,
}

impl ResponseSchema {
    pub fn new(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            strict: true,
            schema,
        }
    }

    /// OpenAI-compatible `response_format` value
    pub fn to_response_format(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": self.name,
                "strict": self.strict,
                "schema": self.schema,
            }
        })
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Other(String),
}

impl FinishReason {
    /// Parse from an OpenAI-compatible finish_reason string
    pub fn from_openai(s: &str) -> Self {
        match s {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            "tool_calls" => FinishReason::ToolCalls,
            other => FinishReason::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Other(s) => s,
        }
    }
}

/// Streaming event delivered while a completion is in flight
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Output text being generated
    ContentDelta(String),

    /// Reasoning text being generated
    ReasoningDelta(String),

    /// The upstream signalled the end of generation
    Finished { finish_reason: FinishReason },
}

/// Accumulated result of one streamed completion
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// All content deltas concatenated
    pub content: String,

    /// All reasoning deltas concatenated
    pub reasoning: String,

    /// Set once the finished signal arrived
    pub finish_reason: Option<FinishReason>,
}

impl CompletionResponse {
    /// Fold one streaming event into the accumulated response
    pub fn absorb(&mut self, chunk: &StreamChunk) {
        match chunk {
            StreamChunk::ContentDelta(text) => self.content.push_str(text),
            StreamChunk::ReasoningDelta(text) => self.reasoning.push_str(text),
            StreamChunk::Finished { finish_reason } => self.finish_reason = Some(finish_reason.clone()),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finish_reason.is_some()
    }
}
