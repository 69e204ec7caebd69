//! In-memory host implementations for tests and demos.
//!
//! [`MemoryBuffer`] is a faithful line/column document good enough to
//! exercise every engine path, including detaching mid-stream. The
//! notifier, processing-state, and sink doubles record what the engine
//! did to them.

use super::{
    BufferError, NoticeHandle, Notifier, OutcomeRecord, OutcomeSink, ProcessingState, TextBuffer,
};
use crate::cancel::StopSignal;
use crate::position::{Position, Range};

/// An in-memory text document.
#[derive(Debug, Clone)]
pub struct MemoryBuffer {
    lines: Vec<String>,
    cursor: Position,
    selection: Range,
    detached: bool,
    scrolled_to: Option<Range>,
}

impl MemoryBuffer {
    /// Create a buffer holding `text`, split on `'\n'`.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
            cursor: Position::ZERO,
            selection: Range::caret(Position::ZERO),
            detached: false,
            scrolled_to: None,
        }
    }

    /// Create an empty single-line buffer.
    pub fn new() -> Self {
        Self::from_text("")
    }

    /// Full document content joined with `'\n'`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Set the selection (and move the cursor to its end).
    pub fn set_selection(&mut self, range: Range) {
        self.selection = range;
        self.cursor = range.to;
    }

    /// Simulate the user closing the document.
    pub fn detach(&mut self) {
        self.detached = true;
    }

    /// Span passed to the last `scroll_into_view` call, if any.
    pub fn scrolled_to(&self) -> Option<Range> {
        self.scrolled_to
    }

    fn guard(&self) -> Result<(), BufferError> {
        if self.detached {
            Err(BufferError::Detached)
        } else {
            Ok(())
        }
    }

    /// Byte offset of a character column within a line.
    fn offset_in(&self, position: Position) -> Result<usize, BufferError> {
        let out_of_bounds = || BufferError::OutOfBounds {
            line: position.line,
            column: position.column,
        };
        let line = self
            .lines
            .get(position.line as usize)
            .ok_or_else(out_of_bounds)?;

        if position.column == 0 {
            return Ok(0);
        }
        let mut seen = 0u32;
        for (index, ch) in line.char_indices() {
            seen += 1;
            if seen == position.column {
                return Ok(index + ch.len_utf8());
            }
        }
        Err(out_of_bounds())
    }

    fn text_in(&self, range: Range) -> Result<String, BufferError> {
        let start = self.offset_in(range.from)?;
        let end = self.offset_in(range.to)?;
        if range.from.line == range.to.line {
            return Ok(self.lines[range.from.line as usize][start..end].to_string());
        }

        let mut out = self.lines[range.from.line as usize][start..].to_string();
        for line in &self.lines[(range.from.line as usize + 1)..(range.to.line as usize)] {
            out.push('\n');
            out.push_str(line);
        }
        out.push('\n');
        out.push_str(&self.lines[range.to.line as usize][..end]);
        Ok(out)
    }
}

impl Default for MemoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer for MemoryBuffer {
    fn cursor(&self) -> Result<Position, BufferError> {
        self.guard()?;
        Ok(self.cursor)
    }

    fn selection(&self) -> Result<Range, BufferError> {
        self.guard()?;
        Ok(self.selection)
    }

    fn selected_text(&self) -> Result<String, BufferError> {
        self.guard()?;
        self.text_in(self.selection)
    }

    fn line(&self, line: u32) -> Result<String, BufferError> {
        self.guard()?;
        self.lines
            .get(line as usize)
            .cloned()
            .ok_or(BufferError::OutOfBounds { line, column: 0 })
    }

    fn line_count(&self) -> Result<u32, BufferError> {
        self.guard()?;
        Ok(u32::try_from(self.lines.len()).unwrap_or(u32::MAX))
    }

    fn replace_range(&mut self, text: &str, range: Range) -> Result<(), BufferError> {
        self.guard()?;
        let start = self.offset_in(range.from)?;
        let end = self.offset_in(range.to)?;

        let prefix = &self.lines[range.from.line as usize][..start];
        let suffix = &self.lines[range.to.line as usize][end..];
        let combined = format!("{prefix}{text}{suffix}");

        let replacement: Vec<String> = combined.split('\n').map(str::to_string).collect();
        self.lines
            .splice(range.from.line as usize..=range.to.line as usize, replacement);
        Ok(())
    }

    fn set_cursor(&mut self, position: Position) -> Result<(), BufferError> {
        self.guard()?;
        // Validates the position against current content.
        self.offset_in(position)?;
        self.cursor = position;
        self.selection = Range::caret(position);
        Ok(())
    }

    fn scroll_into_view(&mut self, range: Range, _smooth: bool) -> Result<(), BufferError> {
        self.guard()?;
        self.scrolled_to = Some(range);
        Ok(())
    }
}

/// A notifier that records every notice it is asked to show.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    next: u64,
    live: Vec<(NoticeHandle, String)>,
    dismissed: Vec<NoticeHandle>,
}

impl MemoryNotifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Texts of all currently live notices.
    pub fn live_messages(&self) -> Vec<&str> {
        self.live.iter().map(|(_, text)| text.as_str()).collect()
    }

    /// Whether a notice has been dismissed.
    pub fn is_dismissed(&self, handle: NoticeHandle) -> bool {
        self.dismissed.contains(&handle)
    }
}

impl Notifier for MemoryNotifier {
    fn show(&mut self, message: &str) -> NoticeHandle {
        let handle = NoticeHandle(self.next);
        self.next += 1;
        self.live.push((handle, message.to_string()));
        handle
    }

    fn update(&mut self, handle: NoticeHandle, message: &str) {
        if let Some(entry) = self.live.iter_mut().find(|(h, _)| *h == handle) {
            entry.1 = message.to_string();
        }
    }

    fn dismiss(&mut self, handle: NoticeHandle) {
        self.live.retain(|(h, _)| *h != handle);
        self.dismissed.push(handle);
    }
}

/// A processing-state double that remembers the stop signal it was given.
#[derive(Debug, Default)]
pub struct MemoryHost {
    stop: Option<StopSignal>,
    processing: bool,
    transitions: u32,
}

impl MemoryHost {
    /// Create an idle host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the processing flag is currently up.
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Stop signal from the most recent invocation.
    pub fn stop_signal(&self) -> Option<StopSignal> {
        self.stop.clone()
    }

    /// Number of started invocations seen.
    pub fn starts_seen(&self) -> u32 {
        self.transitions
    }
}

impl ProcessingState for MemoryHost {
    fn processing_started(&mut self, stop: StopSignal) {
        self.stop = Some(stop);
        self.processing = true;
        self.transitions += 1;
    }

    fn processing_finished(&mut self) {
        self.processing = false;
    }
}

/// An outcome sink that stores every record.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Vec<OutcomeRecord>,
}

impl RecordingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records seen so far.
    pub fn records(&self) -> &[OutcomeRecord] {
        &self.records
    }
}

impl OutcomeSink for RecordingSink {
    fn record(&mut self, record: OutcomeRecord) {
        self.records.push(record);
    }
}
