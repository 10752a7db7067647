//! OpenRouter API client implementation
//!
//! Streams OpenAI-compatible chat completions over SSE. Supports JSON-schema
//! constrained output (`response_format`) and reasoning tokens (`reasoning`),
//! which OpenRouter delivers as `delta.reasoning` next to `delta.content`.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource, retry::Never};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{CompletionRequest, CompletionResponse, FinishReason, LlmClient, LlmError, StreamChunk};
use crate::config::LlmConfig;

/// Fallback wait when a 429 carries no usable retry-after header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// OpenRouter API client
pub struct OpenRouterClient {
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    site_url: Option<String>,
    site_title: Option<String>,
}

impl OpenRouterClient {
    /// Create a new client from configuration
    ///
    /// A missing API key is not an error here: every call then fails with
    /// [`LlmError::MissingCredentials`] so the caller can report it in-stream.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "from_config: called");
        let api_key = config.api_key();
        if api_key.is_none() {
            warn!(env_var = %config.api_key_env, "from_config: API key not set, LLM calls will fail");
        }

        let http = Client::builder().timeout(config.timeout()).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
            site_url: config.site_url.clone(),
            site_title: config.site_title.clone(),
        })
    }

    /// Build the request body for the chat completions endpoint
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(model = %request.model, max_tokens = %request.max_tokens, "build_request_body: called");

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.effective_messages(),
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "stream": true,
        });

        if let Some(schema) = &request.response_schema {
            debug!(schema_name = %schema.name, strict = schema.strict, "build_request_body: structured output");
            body["response_format"] = schema.to_response_format();
        }

        if request.include_reasoning {
            debug!("build_request_body: requesting reasoning tokens");
            body["reasoning"] = serde_json::json!({});
        }

        body
    }
}

/// Parse one SSE `data:` payload into streaming events
///
/// Reasoning is reported before content for the same delta. Payloads that do not
/// look like a completion chunk are skipped; an explicit `error` object fails.
fn parse_stream_data(data: &str) -> Result<Vec<StreamChunk>, LlmError> {
    let chunk: OpenRouterStreamChunk = match serde_json::from_str(data) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "parse_stream_data: skipping unparsable payload");
            return Ok(Vec::new());
        }
    };

    if let Some(error) = chunk.error {
        return Err(LlmError::Stream(error.message));
    }

    let mut events = Vec::new();
    if let Some(choice) = chunk.choices.into_iter().next() {
        if let Some(delta) = choice.delta {
            if let Some(reasoning) = delta.reasoning.filter(|r| !r.is_empty()) {
                events.push(StreamChunk::ReasoningDelta(reasoning));
            }
            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                events.push(StreamChunk::ContentDelta(content));
            }
        }
        if let Some(reason) = choice.finish_reason {
            events.push(StreamChunk::Finished {
                finish_reason: FinishReason::from_openai(&reason),
            });
        }
    }
    Ok(events)
}

/// Map a non-success HTTP status to an error
fn error_for_status(status: u16, retry_after: Option<u64>, message: String, used_schema: bool) -> LlmError {
    if status == 429 {
        return LlmError::RateLimited {
            retry_after: Duration::from_secs(retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS)),
        };
    }

    let lowered = message.to_lowercase();
    if used_schema
        && matches!(status, 400 | 422)
        && (lowered.contains("response_format") || lowered.contains("schema") || lowered.contains("structured"))
    {
        warn!(%status, "error_for_status: upstream rejected the structured output schema");
        return LlmError::SchemaRejected(message);
    }

    LlmError::ApiError { status, message }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        debug!(model = %request.model, prompt_chars = request.prompt_chars(), "stream: called");
        let api_key = self.api_key.as_ref().ok_or_else(|| LlmError::MissingCredentials {
            env_var: self.api_key_env.clone(),
        })?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(&request);
        let used_schema = request.response_schema.is_some();

        let mut builder = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(&body);
        if let Some(site_url) = &self.site_url {
            builder = builder.header("HTTP-Referer", site_url);
        }
        if let Some(site_title) = &self.site_title {
            builder = builder.header("X-Title", site_title);
        }

        let mut source = EventSource::new(builder).map_err(|e| LlmError::Stream(e.to_string()))?;
        // Retries are owned by the caller's retry policy
        source.set_retry_policy(Box::new(Never));

        let mut response = CompletionResponse::default();
        let mut event_count = 0usize;

        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => {
                    info!(model = %request.model, "stream: connection established");
                }
                Ok(Event::Message(message)) => {
                    if message.data.trim() == "[DONE]" {
                        debug!("stream: [DONE]");
                        break;
                    }
                    let events = match parse_stream_data(&message.data) {
                        Ok(events) => events,
                        Err(e) => {
                            source.close();
                            return Err(e);
                        }
                    };
                    for chunk in events {
                        event_count += 1;
                        response.absorb(&chunk);
                        let _ = chunk_tx.send(chunk).await;
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    debug!("stream: stream ended");
                    break;
                }
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, resp)) => {
                    source.close();
                    let retry_after = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok());
                    let text = resp.text().await.unwrap_or_default();
                    debug!(status = %status, "stream: non-success status");
                    return Err(error_for_status(status.as_u16(), retry_after, text, used_schema));
                }
                Err(e) => {
                    source.close();
                    warn!(error = %e, "stream: transport failure");
                    return Err(LlmError::Stream(e.to_string()));
                }
            }
        }
        source.close();

        debug!(
            event_count,
            content_chars = response.content.len(),
            reasoning_chars = response.reasoning.len(),
            finished = response.is_finished(),
            "stream: completed"
        );
        Ok(response)
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

// OpenRouter streaming types

#[derive(Debug, Deserialize)]
struct OpenRouterStreamChunk {
    #[serde(default)]
    choices: Vec<OpenRouterStreamChoice>,
    #[serde(default)]
    error: Option<OpenRouterError>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterStreamChoice {
    #[serde(default)]
    delta: Option<OpenRouterStreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "reasoning_content")]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Message, ResponseSchema};

    fn client() -> OpenRouterClient {
        OpenRouterClient {
            model: "google/gemini-2.5-pro".to_string(),
            api_key: Some("test-key".to_string()),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            http: Client::new(),
            max_tokens: 4096,
            site_url: None,
            site_title: None,
        }
    }

    #[test]
    fn test_build_request_body_basic() {
        let request = CompletionRequest::from_prompt("google/gemini-2.5-pro", "Hello").with_system_prompt("You plan");

        let body = client().build_request_body(&request);

        assert_eq!(body["model"], "google/gemini-2.5-pro");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You plan");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body.get("response_format").is_none());
        assert!(body.get("reasoning").is_none());
    }

    #[test]
    fn test_build_request_body_schema_and_reasoning() {
        let request = CompletionRequest::from_prompt("m", "x")
            .with_schema(ResponseSchema::new("detailed_mission_plan", serde_json::json!({"type": "object"})))
            .with_reasoning(true);

        let body = client().build_request_body(&request);
        assert_eq!(body["response_format"]["json_schema"]["name"], "detailed_mission_plan");
        assert_eq!(body["reasoning"], serde_json::json!({}));
    }

    #[test]
    fn test_max_tokens_capped() {
        let mut request = CompletionRequest::from_prompt("m", "x").with_max_tokens(50_000);
        request.messages.push(Message::assistant("prior"));
        let body = client().build_request_body(&request);
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["messages"].as_array().map(|m| m.len()), Some(2));
    }

    #[test]
    fn test_parse_stream_data_content_and_reasoning() {
        let data = r#"{"choices":[{"delta":{"content":"{\"a\"","reasoning":"hmm"},"finish_reason":null}]}"#;
        let events = parse_stream_data(data).unwrap();
        assert_eq!(
            events,
            vec![
                StreamChunk::ReasoningDelta("hmm".to_string()),
                StreamChunk::ContentDelta("{\"a\"".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_stream_data_reasoning_content_alias() {
        let data = r#"{"choices":[{"delta":{"reasoning_content":"step 1"}}]}"#;
        let events = parse_stream_data(data).unwrap();
        assert_eq!(events, vec![StreamChunk::ReasoningDelta("step 1".to_string())]);
    }

    #[test]
    fn test_parse_stream_data_finish() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let events = parse_stream_data(data).unwrap();
        assert_eq!(
            events,
            vec![StreamChunk::Finished {
                finish_reason: FinishReason::Stop
            }]
        );
    }

    #[test]
    fn test_parse_stream_data_error_object() {
        let data = r#"{"error":{"message":"provider overloaded","code":502}}"#;
        assert!(matches!(parse_stream_data(data), Err(LlmError::Stream(m)) if m == "provider overloaded"));
    }

    #[test]
    fn test_parse_stream_data_skips_garbage() {
        assert!(parse_stream_data("not json").unwrap().is_empty());
    }

    #[test]
    fn test_error_for_status() {
        assert!(error_for_status(429, Some(5), String::new(), false).is_rate_limit());
        assert_eq!(
            error_for_status(429, None, String::new(), false).retry_after(),
            Some(Duration::from_secs(DEFAULT_RETRY_AFTER_SECS))
        );
        assert!(matches!(
            error_for_status(400, None, "response_format not supported".to_string(), true),
            LlmError::SchemaRejected(_)
        ));
        assert!(matches!(
            error_for_status(400, None, "response_format not supported".to_string(), false),
            LlmError::ApiError { status: 400, .. }
        ));
        assert!(matches!(
            error_for_status(401, None, "no auth".to_string(), true),
            LlmError::ApiError { status: 401, .. }
        ));
    }

    #[tokio::test]
    async fn test_stream_without_key_is_missing_credentials() {
        let mut client = client();
        client.api_key = None;
        let (tx, _rx) = mpsc::channel(4);
        let err = client.stream(CompletionRequest::from_prompt("m", "x"), tx).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
