//! A provider that replays a fixed chunk script.
//!
//! Used by the demos and by every engine test that needs deterministic
//! provider behavior: ordered chunks, optional per-chunk delay, and
//! scripted failures.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use super::{
    ChunkPayload, GenerationRequest, GenerationStream, Provider, ProviderError, StreamChunk,
};
use crate::cancel::StopSignal;

/// A [`Provider`] that replays a preset sequence of chunks.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    script: Vec<Result<StreamChunk, ProviderError>>,
    chunk_delay: Duration,
}

impl ScriptedProvider {
    /// Replay the given items verbatim.
    pub fn from_script(script: Vec<Result<StreamChunk, ProviderError>>) -> Self {
        Self {
            script,
            chunk_delay: Duration::ZERO,
        }
    }

    /// Stream the given texts as full snapshots, marking the last final.
    pub fn snapshots(texts: &[&str]) -> Self {
        let last = texts.len().saturating_sub(1);
        let script = texts
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let chunk = StreamChunk::snapshot(*text);
                Ok(if index == last { chunk.finishing() } else { chunk })
            })
            .collect();
        Self::from_script(script)
    }

    /// Stream the given texts as deltas, marking the last final.
    pub fn deltas(parts: &[&str]) -> Self {
        let last = parts.len().saturating_sub(1);
        let script = parts
            .iter()
            .enumerate()
            .map(|(index, part)| {
                let chunk = StreamChunk::delta(*part);
                Ok(if index == last { chunk.finishing() } else { chunk })
            })
            .collect();
        Self::from_script(script)
    }

    /// Fail immediately with a request error.
    pub fn failing(message: &str) -> Self {
        Self::from_script(vec![Err(ProviderError::Request(message.to_string()))])
    }

    /// Wait this long before each chunk.
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    async fn pause(&self, stop: &StopSignal) -> bool {
        if self.chunk_delay.is_zero() {
            return stop.is_signalled();
        }
        tokio::select! {
            () = stop.cancelled() => true,
            () = tokio::time::sleep(self.chunk_delay) => false,
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn generate(
        &self,
        _request: &GenerationRequest,
        stop: StopSignal,
    ) -> Result<String, ProviderError> {
        let mut accumulated = String::new();
        for item in &self.script {
            if self.pause(&stop).await {
                debug!("scripted generation abandoned after stop signal");
                break;
            }
            match item {
                Ok(chunk) => match &chunk.payload {
                    ChunkPayload::Delta(delta) => accumulated.push_str(delta),
                    ChunkPayload::Snapshot(snapshot) => accumulated = snapshot.clone(),
                },
                Err(err) => return Err(err.clone()),
            }
        }
        Ok(accumulated)
    }

    async fn generate_stream(
        &self,
        _request: &GenerationRequest,
        stop: StopSignal,
    ) -> Result<GenerationStream, ProviderError> {
        let (tx, stream) = GenerationStream::channel(16);
        let script = self.script.clone();
        let chunk_delay = self.chunk_delay;

        tokio::spawn(async move {
            for item in script {
                if !chunk_delay.is_zero() {
                    tokio::select! {
                        () = stop.cancelled() => break,
                        () = tokio::time::sleep(chunk_delay) => {}
                    }
                }
                if stop.is_signalled() {
                    debug!("scripted stream abandoned after stop signal");
                    break;
                }
                if tx.send(item).await.is_err() {
                    // Receiver went away; the session is over.
                    break;
                }
            }
        });

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_scripted_single_shot_folds_deltas() {
        let provider = ScriptedProvider::deltas(&["Hel", "lo"]);
        let text = provider
            .generate(&GenerationRequest::default(), StopSignal::new())
            .await
            .unwrap();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn test_scripted_single_shot_surfaces_failure() {
        let provider = ScriptedProvider::failing("no credit");
        let result = provider
            .generate(&GenerationRequest::default(), StopSignal::new())
            .await;
        assert_eq!(result, Err(ProviderError::Request("no credit".into())));
    }

    #[tokio::test]
    async fn test_scripted_stream_marks_last_chunk_final() {
        let provider = ScriptedProvider::snapshots(&["a", "ab"]);
        let mut stream = provider
            .generate_stream(&GenerationRequest::default(), StopSignal::new())
            .await
            .unwrap();

        assert!(!stream.next().await.unwrap().unwrap().is_final);
        assert!(stream.next().await.unwrap().unwrap().is_final);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_scripted_stream_stops_on_signal() {
        let stop = StopSignal::new();
        stop.signal();
        let provider = ScriptedProvider::deltas(&["never", "sent"]);
        let mut stream = provider
            .generate_stream(&GenerationRequest::default(), stop)
            .await
            .unwrap();
        assert!(stream.next().await.is_none());
    }
}
