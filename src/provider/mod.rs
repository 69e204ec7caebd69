//! Provider: The generation back end behind one narrow seam.
//!
//! The engine asks a [`Provider`] for text, either as a single awaited
//! call or as a stream of chunks. Chunk payloads may be incremental
//! deltas or full snapshots of the text so far; the driving loop folds
//! both into one running accumulated string, so providers with either
//! shape plug in unchanged.

mod scripted;

pub use scripted::ScriptedProvider;

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;

use crate::cancel::StopSignal;

/// Errors surfaced by a generation back end.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The generation request was rejected outright.
    #[error("generation request failed: {0}")]
    Request(String),
    /// The stream broke after it had started.
    #[error("generation stream failed: {0}")]
    Stream(String),
}

/// Text carried by one streamed chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkPayload {
    /// An increment to append to the text so far.
    Delta(String),
    /// A full replacement of the text so far.
    Snapshot(String),
}

/// One unit of streamed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    /// The chunk's text.
    pub payload: ChunkPayload,
    /// Whether this is the last chunk of the response.
    pub is_final: bool,
}

impl StreamChunk {
    /// An intermediate delta chunk.
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            payload: ChunkPayload::Delta(text.into()),
            is_final: false,
        }
    }

    /// An intermediate full-snapshot chunk.
    pub fn snapshot(text: impl Into<String>) -> Self {
        Self {
            payload: ChunkPayload::Snapshot(text.into()),
            is_final: false,
        }
    }

    /// Mark this chunk as the final one.
    #[must_use]
    pub fn finishing(mut self) -> Self {
        self.is_final = true;
        self
    }
}

/// Tuning knobs forwarded to the back end.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Model identifier, if the host selected one.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Output length cap.
    pub max_tokens: Option<u32>,
}

/// One generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// The fully built prompt.
    pub prompt: String,
    /// Back-end tuning knobs.
    pub options: GenerationOptions,
}

/// A stream of generation chunks, backed by a channel.
///
/// Providers push `Result<StreamChunk, ProviderError>` items into the
/// sending half from their own task; the engine consumes this half with
/// `StreamExt::next`.
pub struct GenerationStream {
    rx: mpsc::Receiver<Result<StreamChunk, ProviderError>>,
}

/// Sending half handed to provider tasks.
pub type ChunkSender = mpsc::Sender<Result<StreamChunk, ProviderError>>;

impl GenerationStream {
    /// Create a bounded chunk channel and its consuming stream.
    pub fn channel(buffer: usize) -> (ChunkSender, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

impl Stream for GenerationStream {
    type Item = Result<StreamChunk, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// A generation back end.
///
/// `stop` is the invocation's shared cancellation flag; implementations
/// should abandon network or compute work promptly once it is raised.
/// Aborted work may simply end the stream early; the engine decides the
/// outcome from the flag, not from how the stream ended.
#[async_trait]
pub trait Provider {
    /// Produce the full response in one awaited call.
    async fn generate(
        &self,
        request: &GenerationRequest,
        stop: StopSignal,
    ) -> Result<String, ProviderError>;

    /// Produce the response as a stream of chunks.
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        stop: StopSignal,
    ) -> Result<GenerationStream, ProviderError>;
}
