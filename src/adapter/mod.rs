//! Adapter: Capability traits for the host editor and its UI surfaces.
//!
//! The engine never touches a concrete host type. Everything it needs
//! from the outside world comes through the traits in this module: a
//! mutable text buffer, a transient notification surface, a processing
//! flag the host can wire to a stop affordance, and a sink for outcome
//! records.

mod memory;

pub use memory::{MemoryBuffer, MemoryHost, MemoryNotifier, RecordingSink};

use unicode_segmentation::UnicodeSegmentation;

use crate::action::ActionKind;
use crate::cancel::StopSignal;
use crate::position::{Position, Range};

/// Errors surfaced by a host buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// The document backing the buffer is no longer available.
    #[error("the document is no longer open")]
    Detached,
    /// A position does not address valid buffer content.
    #[error("position out of bounds: line {line}, column {column}")]
    OutOfBounds {
        /// Offending line index.
        line: u32,
        /// Offending column.
        column: u32,
    },
}

/// A mutable text document, addressed by line/column positions.
///
/// Hosts adapt their own editor handle to this surface. Every method is
/// fallible because the underlying document can be closed at any time;
/// implementations should return [`BufferError::Detached`] once the
/// document is gone rather than panicking.
pub trait TextBuffer {
    /// Current caret position.
    fn cursor(&self) -> Result<Position, BufferError>;

    /// Current selection; a caret is reported as an empty range.
    fn selection(&self) -> Result<Range, BufferError>;

    /// Text covered by the current selection.
    fn selected_text(&self) -> Result<String, BufferError>;

    /// Content of a single line, without its trailing line break.
    fn line(&self, line: u32) -> Result<String, BufferError>;

    /// Number of lines in the document.
    fn line_count(&self) -> Result<u32, BufferError>;

    /// Replace `range` with `text`.
    fn replace_range(&mut self, text: &str, range: Range) -> Result<(), BufferError>;

    /// Move the caret.
    fn set_cursor(&mut self, position: Position) -> Result<(), BufferError>;

    /// Bring a span into the viewport.
    fn scroll_into_view(&mut self, range: Range, smooth: bool) -> Result<(), BufferError>;
}

/// Opaque identity of a transient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoticeHandle(
    /// Host-assigned notice id.
    pub u64,
);

/// A transient, non-buffer notification surface.
pub trait Notifier {
    /// Show a notice and return its handle.
    fn show(&mut self, message: &str) -> NoticeHandle;

    /// Replace the text of a live notice. Unknown handles are ignored.
    fn update(&mut self, handle: NoticeHandle, message: &str);

    /// Dismiss a notice. Unknown handles are ignored.
    fn dismiss(&mut self, handle: NoticeHandle);
}

/// Host-visible processing state for one invocation.
///
/// `processing_started` hands the host a clone of the invocation's
/// [`StopSignal`] so a stop button can abort the stream; the flag goes
/// down again via `processing_finished` on every exit path.
pub trait ProcessingState {
    /// An invocation began; wire `stop` to the stop affordance.
    fn processing_started(&mut self, stop: StopSignal);

    /// The invocation reached a terminal outcome.
    fn processing_finished(&mut self);
}

/// How an invocation ended, as reported to the outcome sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// The transformation was applied.
    Success,
    /// The transformation failed; the original text was restored.
    Error,
    /// The user aborted the transformation.
    Cancelled,
}

/// One chat-log entry describing a finished invocation.
#[derive(Debug, Clone)]
pub struct OutcomeRecord {
    /// How the invocation ended.
    pub kind: OutcomeKind,
    /// Which action ran.
    pub action: ActionKind,
    /// Truncated preview of the original text.
    pub preview: String,
    /// Result preview on success, error message on failure.
    pub detail: Option<String>,
}

/// Receiver for outcome records (chat history, log pane, etc.).
pub trait OutcomeSink {
    /// Record one finished invocation.
    fn record(&mut self, record: OutcomeRecord);
}

/// Truncate `text` to at most `max` graphemes for log previews.
///
/// Truncation happens on grapheme boundaries and appends an ellipsis
/// when anything was cut.
pub fn preview(text: &str, max: usize) -> String {
    let mut graphemes = text.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
