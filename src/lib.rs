//! # Redraft
//!
//! A streaming text-rewrite engine for AI editor plugins.
//!
//! Redraft is the core of an editor plugin that applies AI-driven text
//! transformations (grammar fix, rewrite, tone change, expand/condense,
//! custom instruction) to a selection, streaming the result into the
//! document as it is generated.
//!
//! ## Core Concepts
//!
//! - **Live replacement**: every chunk replaces the whole output region
//!   with the full accumulated text, so chunk boundaries never corrupt
//!   multi-line offsets
//! - **Thinking handoff**: an animated placeholder occupies the output
//!   location until the first real chunk arrives
//! - **Cooperative cancellation**: one stop signal shared by the host UI,
//!   the provider, and the chunk loop; cancelling restores the original
//!   text
//! - **Single writer**: at most one session may stream into a buffer at
//!   a time
//!
//! ## Example
//!
//! ```rust,ignore
//! use redraft::{ActionRunner, ActionRequest, RunnerConfig};
//!
//! let mut runner = ActionRunner::new(RunnerConfig::default());
//! let outcome = runner
//!     .run(&mut buffer, &mut notifier, &mut host, &mut sink, &provider, request)
//!     .await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod action;
pub mod adapter;
pub mod cancel;
pub mod position;
pub mod provider;
pub mod runner;
pub mod session;
pub mod thinking;

// Re-exports for convenience
pub use action::{build_prompt, ActionKind, PromptInputs, Tone};
pub use adapter::{
    BufferError, MemoryBuffer, MemoryHost, MemoryNotifier, NoticeHandle, Notifier, OutcomeKind,
    OutcomeRecord, OutcomeSink, ProcessingState, RecordingSink, TextBuffer,
};
pub use cancel::StopSignal;
pub use position::{Position, Range};
pub use provider::{
    ChunkPayload, GenerationOptions, GenerationRequest, GenerationStream, Provider, ProviderError,
    ScriptedProvider, StreamChunk,
};
pub use runner::{ActionRequest, ActionRunner, Delivery, Outcome, RegionLock, RunnerConfig};
pub use session::{SessionError, SessionPhase, StreamSession};
pub use thinking::{ThinkingIndicator, ThinkingMode};
