//! Session: The state machine for one streaming buffer edit.
//!
//! A [`StreamSession`] owns a single replacement region from the moment
//! an action starts until it reaches a terminal phase. Every chunk
//! replaces the whole region with the full accumulated text: chunk
//! boundaries are not trusted to align with line breaks, so the live
//! end of the region is recomputed from the accumulated text instead of
//! delta arithmetic. Restoration of the original text is centralized
//! here and runs on both the cancel and failure paths.

use log::{debug, warn};

use crate::action::ActionKind;
use crate::adapter::{BufferError, Notifier, TextBuffer};
use crate::position::{Position, Range};
use crate::thinking::{ThinkingIndicator, ThinkingMode};

/// Errors surfaced by a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The host buffer rejected a mutation.
    #[error(transparent)]
    Buffer(#[from] BufferError),
    /// Generation finished without producing usable text.
    #[error("the model returned no usable text")]
    EmptyResult,
}

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created but not started.
    Idle,
    /// Started; no real output yet, placeholder showing.
    AwaitingFirstChunk,
    /// At least one chunk applied.
    Streaming,
    /// Final text applied, cursor placed.
    Completed,
    /// Aborted by the user; original text restored.
    Cancelled,
    /// Provider or buffer failure; original text restored.
    Failed,
}

impl SessionPhase {
    /// Whether the phase is terminal.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// One in-flight streaming edit against one buffer region.
pub struct StreamSession {
    phase: SessionPhase,
    /// Fixed start of the output region; never moves after `start`.
    anchor: Position,
    /// End of the region currently occupied by session output.
    live_end: Position,
    /// Text that occupied the original range, for restoration.
    original: String,
    original_range: Range,
    thinking: ThinkingIndicator,
    smooth_scroll: bool,
}

impl StreamSession {
    /// Create a session bound to `range`, holding its pre-session text.
    pub fn new(
        kind: ActionKind,
        range: Range,
        original: String,
        mode: ThinkingMode,
        smooth_scroll: bool,
    ) -> Self {
        Self {
            phase: SessionPhase::Idle,
            anchor: range.from,
            live_end: range.from,
            original,
            original_range: range,
            thinking: ThinkingIndicator::new(kind, mode),
            smooth_scroll,
        }
    }

    /// Current phase.
    #[inline]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether the session is waiting for its first real chunk.
    #[inline]
    pub const fn is_awaiting_first_chunk(&self) -> bool {
        matches!(self.phase, SessionPhase::AwaitingFirstChunk)
    }

    /// Span currently occupied by session output.
    #[inline]
    pub fn output_range(&self) -> Range {
        Range::new(self.anchor, self.live_end)
    }

    /// Begin the session: clear any selected text and show the placeholder.
    ///
    /// A non-empty range is cleared first (selection-replace mode); the
    /// range start becomes the anchor. No-op if already started.
    pub fn start(
        &mut self,
        buffer: &mut dyn TextBuffer,
        notifier: &mut dyn Notifier,
    ) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Idle {
            debug!("session start ignored in phase {:?}", self.phase);
            return Ok(());
        }

        if !self.original_range.is_empty() {
            if let Err(err) = buffer.replace_range("", self.original_range) {
                // Nothing was written, so there is nothing to restore.
                warn!("could not clear selection at session start: {err}");
                self.phase = SessionPhase::Failed;
                return Err(err.into());
            }
        }
        self.anchor = self.original_range.from;
        self.live_end = self.anchor;
        // From here on the cleared selection must be restorable.
        self.phase = SessionPhase::AwaitingFirstChunk;

        if let Err(err) = self.thinking.start(buffer, notifier, self.anchor) {
            return Err(self.mutation_failed(buffer, notifier, err));
        }
        Ok(())
    }

    /// Apply the full accumulated text over the session's region.
    ///
    /// The first call removes the placeholder before writing. A final
    /// call additionally places the cursor at the new end of the region
    /// and scrolls it into view. Calls on a terminal session are no-ops.
    pub fn update(
        &mut self,
        buffer: &mut dyn TextBuffer,
        notifier: &mut dyn Notifier,
        accumulated: &str,
        is_final: bool,
    ) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::AwaitingFirstChunk => {
                // Placeholder must be gone before the first real write.
                if let Err(err) = self.thinking.stop(buffer, notifier) {
                    return Err(self.mutation_failed(buffer, notifier, err));
                }
                self.phase = SessionPhase::Streaming;
            }
            SessionPhase::Streaming => {}
            SessionPhase::Idle => {
                debug!("session update ignored before start");
                return Ok(());
            }
            _ => return Ok(()),
        }

        if let Err(err) = buffer.replace_range(accumulated, self.output_range()) {
            return Err(self.mutation_failed(buffer, notifier, err));
        }
        self.live_end = self.anchor.end_of_insertion(accumulated);

        if is_final {
            // Content is already applied; caret and scroll are best effort.
            if let Err(err) = buffer.set_cursor(self.live_end) {
                warn!("could not place cursor after rewrite: {err}");
            }
            if let Err(err) = buffer.scroll_into_view(self.output_range(), self.smooth_scroll) {
                debug!("could not scroll rewrite into view: {err}");
            }
            self.phase = SessionPhase::Completed;
        }
        Ok(())
    }

    /// Drive the placeholder animation while awaiting the first chunk.
    pub fn tick_thinking(
        &mut self,
        buffer: &mut dyn TextBuffer,
        notifier: &mut dyn Notifier,
    ) -> Result<(), SessionError> {
        if !self.is_awaiting_first_chunk() {
            return Ok(());
        }
        if let Err(err) = self.thinking.tick(buffer, notifier) {
            return Err(self.mutation_failed(buffer, notifier, err));
        }
        Ok(())
    }

    /// Abort the session and restore the original text.
    ///
    /// No-op on a terminal session. Restoration problems are logged and
    /// swallowed; the user's stop action must never surface an error.
    pub fn cancel(&mut self, buffer: &mut dyn TextBuffer, notifier: &mut dyn Notifier) {
        if self.phase.is_terminal() {
            return;
        }
        self.unwind(buffer, notifier);
        self.phase = SessionPhase::Cancelled;
    }

    /// Fail the session and restore the original text.
    ///
    /// The triggering error stays with the caller; this only performs
    /// the restoration and the phase transition.
    pub fn fail(&mut self, buffer: &mut dyn TextBuffer, notifier: &mut dyn Notifier) {
        if self.phase.is_terminal() {
            return;
        }
        self.unwind(buffer, notifier);
        self.phase = SessionPhase::Failed;
    }

    /// Remove the placeholder and put the original text back, best effort.
    fn unwind(&mut self, buffer: &mut dyn TextBuffer, notifier: &mut dyn Notifier) {
        if let Err(err) = self.thinking.stop(buffer, notifier) {
            debug!("could not remove placeholder during unwind: {err}");
        }
        if self.phase == SessionPhase::Idle {
            // Nothing was written; there is nothing to restore.
            return;
        }
        match buffer.replace_range(&self.original, self.output_range()) {
            Ok(()) => {
                self.live_end = self.anchor.end_of_insertion(&self.original);
            }
            Err(err) => {
                // The document may already be gone; losing the restore
                // must not take the host down with it.
                warn!("could not restore original text: {err}");
            }
        }
    }

    /// Buffer mutation failed: log, restore best effort, move to Failed.
    fn mutation_failed(
        &mut self,
        buffer: &mut dyn TextBuffer,
        notifier: &mut dyn Notifier,
        err: BufferError,
    ) -> SessionError {
        warn!("buffer mutation failed mid-session: {err}");
        self.unwind(buffer, notifier);
        self.phase = SessionPhase::Failed;
        SessionError::Buffer(err)
    }
}
