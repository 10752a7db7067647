//! Ordered, cancellable chunk emission for one run
//!
//! [`ChunkSink`] assigns the sequence number and sends the chunk while holding
//! one lock, so assignment order equals delivery order. After a final chunk
//! or a cancellation the sink refuses further chunks.

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::chunk::{ChunkType, StreamingChunk};

/// Why a chunk could not be emitted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkSinkError {
    #[error("run was cancelled")]
    Cancelled,

    #[error("consumer dropped the stream")]
    ReceiverDropped,

    #[error("a final chunk was already emitted")]
    AlreadyFinal,
}

/// Strictly increasing sequence numbers starting at 0
#[derive(Debug, Default)]
pub struct Sequencer {
    next: u64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> u64 {
        let seq = self.next;
        self.next += 1;
        seq
    }

    /// Number of sequence numbers handed out so far
    pub fn issued(&self) -> u64 {
        self.next
    }
}

struct SinkState {
    sequencer: Sequencer,
    finished: bool,
}

/// The single writer of a run's output stream
pub struct ChunkSink {
    state: Mutex<SinkState>,
    tx: mpsc::Sender<StreamingChunk>,
    cancel: CancellationToken,
}

impl ChunkSink {
    pub fn new(tx: mpsc::Sender<StreamingChunk>, cancel: CancellationToken) -> Self {
        Self {
            state: Mutex::new(SinkState {
                sequencer: Sequencer::new(),
                finished: false,
            }),
            tx,
            cancel,
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Assign the next sequence number and deliver the chunk
    pub async fn emit(
        &self,
        chunk_type: ChunkType,
        content: Option<String>,
        data: Option<Value>,
        is_final: bool,
    ) -> Result<u64, ChunkSinkError> {
        let mut state = self.state.lock().await;
        if self.cancel.is_cancelled() {
            return Err(ChunkSinkError::Cancelled);
        }
        if state.finished {
            return Err(ChunkSinkError::AlreadyFinal);
        }

        let sequence = state.sequencer.next();
        let chunk = StreamingChunk {
            chunk_type,
            content,
            data,
            sequence,
            is_final,
        };
        debug!(%chunk_type, sequence, is_final, "emit: sending chunk");

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ChunkSinkError::Cancelled),
            sent = self.tx.send(chunk) => sent.map_err(|_| ChunkSinkError::ReceiverDropped)?,
        }
        if is_final {
            state.finished = true;
        }
        Ok(sequence)
    }

    /// Emit a non-final `status` chunk
    pub async fn status(&self, content: impl Into<String>, data: Value) -> Result<u64, ChunkSinkError> {
        self.emit(ChunkType::Status, Some(content.into()), Some(data), false).await
    }

    pub async fn is_finished(&self) -> bool {
        self.state.lock().await.finished
    }
}
