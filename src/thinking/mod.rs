//! Thinking: Animated placeholder shown before the first real chunk.
//!
//! While generation has produced nothing yet, the user sees a short
//! verb phrase with a growing trail of dots. Inline mode writes the
//! placeholder into the buffer at the anchor so it occupies the eventual
//! output location; popup mode uses a transient notice and leaves the
//! buffer untouched. Ticks are driven externally by the runner's timer,
//! and the session state machine guarantees [`ThinkingIndicator::stop`]
//! runs on every exit path.

use rand::Rng;

use crate::action::ActionKind;
use crate::adapter::{BufferError, NoticeHandle, Notifier, TextBuffer};
use crate::position::{Position, Range};

/// Dot counter wraps after this many dots.
pub const MAX_DOTS: u8 = 5;

const GENERIC_PHRASES: &[&str] = &["Thinking", "Working on it", "Writing"];
const IMPROVE_PHRASES: &[&str] = &["Polishing the wording", "Refining", "Improving the text"];
const LENGTHEN_PHRASES: &[&str] = &["Expanding the text", "Adding detail", "Elaborating"];
const SHORTEN_PHRASES: &[&str] = &["Condensing", "Trimming", "Tightening the wording"];
const RETONE_PHRASES: &[&str] = &["Adjusting the tone", "Finding the right voice", "Rephrasing"];
const CUSTOM_PHRASES: &[&str] = &["Following your instruction", "Applying the edit", "On it"];
const CRITIQUE_PHRASES: &[&str] = &["Reading critically", "Weighing the argument", "Looking for gaps"];
const GRAMMAR_PHRASES: &[&str] = &["Checking grammar", "Proofreading", "Fixing typos"];
const REWRITE_PHRASES: &[&str] = &["Rewriting", "Redrafting", "Rethinking the wording"];

const fn phrases_for(kind: ActionKind) -> &'static [&'static str] {
    match kind {
        ActionKind::Improve => IMPROVE_PHRASES,
        ActionKind::Lengthen => LENGTHEN_PHRASES,
        ActionKind::Shorten => SHORTEN_PHRASES,
        ActionKind::Retone => RETONE_PHRASES,
        ActionKind::CustomInstruction => CUSTOM_PHRASES,
        ActionKind::Critique => CRITIQUE_PHRASES,
        ActionKind::GrammarFix => GRAMMAR_PHRASES,
        ActionKind::Rewrite => REWRITE_PHRASES,
        ActionKind::GenericAdd | ActionKind::GenericEdit | ActionKind::Delete => GENERIC_PHRASES,
    }
}

/// Where the placeholder is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThinkingMode {
    /// Write the placeholder into the buffer at the anchor position.
    #[default]
    Inline,
    /// Show the placeholder in a transient notice; buffer stays untouched.
    Popup,
}

/// Render target currently owned by the indicator.
#[derive(Debug)]
enum Surface {
    Idle,
    Inline {
        /// Exact span last written; re-renders replace precisely this.
        span: Range,
    },
    Popup {
        handle: NoticeHandle,
    },
}

/// The animated "work in progress" placeholder.
#[derive(Debug)]
pub struct ThinkingIndicator {
    mode: ThinkingMode,
    phrases: &'static [&'static str],
    phrase_index: usize,
    dots: u8,
    surface: Surface,
}

impl ThinkingIndicator {
    /// Create an indicator for an action, starting on a random phrase.
    pub fn new(kind: ActionKind, mode: ThinkingMode) -> Self {
        let phrases = phrases_for(kind);
        let phrase_index = rand::rng().random_range(0..phrases.len());
        Self {
            mode,
            phrases,
            phrase_index,
            dots: 1,
            surface: Surface::Idle,
        }
    }

    /// Whether a placeholder is currently shown.
    pub const fn is_active(&self) -> bool {
        !matches!(self.surface, Surface::Idle)
    }

    fn message(&self) -> String {
        let phrase = self.phrases[self.phrase_index];
        let dots = ".".repeat(self.dots as usize);
        format!("{phrase}{dots}")
    }

    /// Show the placeholder.
    ///
    /// Inline mode writes at `anchor` and records the exact span written
    /// so later re-renders cannot touch adjacent content.
    pub fn start(
        &mut self,
        buffer: &mut dyn TextBuffer,
        notifier: &mut dyn Notifier,
        anchor: Position,
    ) -> Result<(), BufferError> {
        if self.is_active() {
            return Ok(());
        }
        self.dots = 1;
        let message = self.message();
        match self.mode {
            ThinkingMode::Inline => {
                buffer.replace_range(&message, Range::caret(anchor))?;
                let span = Range::new(anchor, anchor.end_of_insertion(&message));
                self.surface = Surface::Inline { span };
            }
            ThinkingMode::Popup => {
                let handle = notifier.show(&message);
                self.surface = Surface::Popup { handle };
            }
        }
        Ok(())
    }

    /// Advance the animation by one tick.
    ///
    /// The dot counter runs 1..=[`MAX_DOTS`] then wraps; popup mode also
    /// advances to the next phrase on each wrap.
    pub fn tick(
        &mut self,
        buffer: &mut dyn TextBuffer,
        notifier: &mut dyn Notifier,
    ) -> Result<(), BufferError> {
        let wrapped = self.dots >= MAX_DOTS;
        self.dots = if wrapped { 1 } else { self.dots + 1 };
        if wrapped && matches!(self.mode, ThinkingMode::Popup) {
            self.phrase_index = (self.phrase_index + 1) % self.phrases.len();
        }

        let message = self.message();
        match &mut self.surface {
            Surface::Idle => {}
            Surface::Inline { span } => {
                let anchor = span.from;
                buffer.replace_range(&message, *span)?;
                *span = Range::new(anchor, anchor.end_of_insertion(&message));
            }
            Surface::Popup { handle } => notifier.update(*handle, &message),
        }
        Ok(())
    }

    /// Remove the placeholder. Idempotent.
    pub fn stop(
        &mut self,
        buffer: &mut dyn TextBuffer,
        notifier: &mut dyn Notifier,
    ) -> Result<(), BufferError> {
        match std::mem::replace(&mut self.surface, Surface::Idle) {
            Surface::Idle => Ok(()),
            Surface::Inline { span } => {
                if let Err(err) = buffer.replace_range("", span) {
                    // Keep the span so a later stop can still try.
                    self.surface = Surface::Inline { span };
                    return Err(err);
                }
                Ok(())
            }
            Surface::Popup { handle } => {
                notifier.dismiss(handle);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MemoryBuffer, MemoryNotifier};

    fn indicator(mode: ThinkingMode) -> ThinkingIndicator {
        ThinkingIndicator::new(ActionKind::Improve, mode)
    }

    #[test]
    fn test_inline_start_writes_placeholder_at_anchor() {
        let mut buffer = MemoryBuffer::from_text("before after");
        let mut notifier = MemoryNotifier::new();
        let mut thinking = indicator(ThinkingMode::Inline);

        thinking
            .start(&mut buffer, &mut notifier, Position::new(0, 7))
            .unwrap();

        let text = buffer.text();
        assert!(text.starts_with("before "));
        assert!(text.ends_with("after"));
        assert!(text.len() > "before after".len());
        assert!(text.contains('.'));
        assert!(notifier.live_messages().is_empty());
    }

    #[test]
    fn test_inline_stop_restores_surroundings() {
        let mut buffer = MemoryBuffer::from_text("before after");
        let mut notifier = MemoryNotifier::new();
        let mut thinking = indicator(ThinkingMode::Inline);

        thinking
            .start(&mut buffer, &mut notifier, Position::new(0, 7))
            .unwrap();
        thinking.tick(&mut buffer, &mut notifier).unwrap();
        thinking.stop(&mut buffer, &mut notifier).unwrap();

        assert_eq!(buffer.text(), "before after");
        // Stopping again is a no-op.
        thinking.stop(&mut buffer, &mut notifier).unwrap();
        assert_eq!(buffer.text(), "before after");
    }

    #[test]
    fn test_dots_wrap_at_max() {
        let mut buffer = MemoryBuffer::from_text("x");
        let mut notifier = MemoryNotifier::new();
        let mut thinking = indicator(ThinkingMode::Inline);
        thinking
            .start(&mut buffer, &mut notifier, Position::new(0, 1))
            .unwrap();

        for _ in 0..usize::from(MAX_DOTS) {
            thinking.tick(&mut buffer, &mut notifier).unwrap();
        }
        // After MAX_DOTS ticks the counter has wrapped back to one dot.
        let text = buffer.text();
        let dots = text.chars().rev().take_while(|c| *c == '.').count();
        assert_eq!(dots, 1);
    }

    #[test]
    fn test_popup_mode_leaves_buffer_untouched() {
        let mut buffer = MemoryBuffer::from_text("untouched");
        let mut notifier = MemoryNotifier::new();
        let mut thinking = indicator(ThinkingMode::Popup);

        thinking
            .start(&mut buffer, &mut notifier, Position::ZERO)
            .unwrap();
        thinking.tick(&mut buffer, &mut notifier).unwrap();

        assert_eq!(buffer.text(), "untouched");
        assert_eq!(notifier.live_messages().len(), 1);

        thinking.stop(&mut buffer, &mut notifier).unwrap();
        assert!(notifier.live_messages().is_empty());
    }

    #[test]
    fn test_popup_advances_phrase_on_wrap() {
        let mut buffer = MemoryBuffer::from_text("x");
        let mut notifier = MemoryNotifier::new();
        let mut thinking = ThinkingIndicator::new(ActionKind::Delete, ThinkingMode::Popup);
        thinking
            .start(&mut buffer, &mut notifier, Position::ZERO)
            .unwrap();
        let first_index = thinking.phrase_index;

        for _ in 0..usize::from(MAX_DOTS) {
            thinking.tick(&mut buffer, &mut notifier).unwrap();
        }
        let expected = (first_index + 1) % GENERIC_PHRASES.len();
        assert_eq!(thinking.phrase_index, expected);
    }

    #[test]
    fn test_detached_buffer_surfaces_error() {
        let mut buffer = MemoryBuffer::from_text("x");
        let mut notifier = MemoryNotifier::new();
        let mut thinking = indicator(ThinkingMode::Inline);
        buffer.detach();

        let result = thinking.start(&mut buffer, &mut notifier, Position::ZERO);
        assert_eq!(result, Err(BufferError::Detached));
    }
}
