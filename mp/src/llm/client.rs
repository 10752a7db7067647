//! LlmClient trait definition

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{CompletionRequest, CompletionResponse, LlmError, StreamChunk};

/// Capacity of the per-call delta channel
pub const STREAM_CHANNEL_CAPACITY: usize = 100;

/// Stateless streaming LLM client - each call is independent
///
/// Implementations send content/reasoning deltas to `chunk_tx` as they arrive,
/// send a final [`StreamChunk::Finished`] when the upstream signals the end of
/// generation, and return the accumulated response. A returned response whose
/// `finish_reason` is `None` means the stream ended without a finished signal.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Streaming completion
    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError>;

    /// Model used when the caller does not override it
    fn default_model(&self) -> &str;

    /// Run a completion to the end, discarding the individual deltas
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(model = %request.model, "complete: called");
        let (chunk_tx, mut chunk_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let drain = async move { while chunk_rx.recv().await.is_some() {} };
        let (result, ()) = tokio::join!(self.stream(request, chunk_tx), drain);
        result
    }
}
