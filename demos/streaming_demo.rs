//! Streaming Demo: A live AI rewrite streamed into a document.
//!
//! This example drives the full engine against an in-memory document,
//! mirroring every buffer mutation to the terminal: the thinking
//! placeholder animates in place, the rewrite streams over it chunk by
//! chunk, and a second run is stopped mid-stream to show restoration.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::{cursor, execute, terminal};

use redraft::{
    ActionKind, ActionRequest, ActionRunner, BufferError, Delivery, GenerationOptions,
    MemoryBuffer, MemoryHost, MemoryNotifier, Outcome, Position, ProcessingState, Range,
    RecordingSink, RunnerConfig, ScriptedProvider, StopSignal, TextBuffer, ThinkingMode,
};

const DOCUMENT: &str = "# Notes\nThe old house sat upon the hill in a manner most antiquated.\nMore notes follow below.";

const REWRITE_CHUNKS: &[&str] = &[
    "The old",
    " house",
    " perched",
    " on the",
    " hill,",
    " weathered",
    " but",
    " dignified.",
];

/// A document that repaints itself in the terminal after every mutation.
struct MirrorBuffer {
    inner: MemoryBuffer,
    painted_lines: u16,
}

impl MirrorBuffer {
    fn new(text: &str) -> Self {
        Self {
            inner: MemoryBuffer::from_text(text),
            painted_lines: 0,
        }
    }

    fn repaint(&mut self) {
        let mut stdout = io::stdout();
        if self.painted_lines > 0 {
            let _ = execute!(
                stdout,
                cursor::MoveToColumn(0),
                cursor::MoveUp(self.painted_lines),
                terminal::Clear(terminal::ClearType::FromCursorDown)
            );
        }
        let text = self.inner.text();
        let mut lines = 0u16;
        for line in text.split('\n') {
            let _ = writeln!(stdout, "{line}");
            lines += 1;
        }
        self.painted_lines = lines;
        let _ = stdout.flush();
    }
}

impl TextBuffer for MirrorBuffer {
    fn cursor(&self) -> Result<Position, BufferError> {
        self.inner.cursor()
    }

    fn selection(&self) -> Result<Range, BufferError> {
        self.inner.selection()
    }

    fn selected_text(&self) -> Result<String, BufferError> {
        self.inner.selected_text()
    }

    fn line(&self, line: u32) -> Result<String, BufferError> {
        self.inner.line(line)
    }

    fn line_count(&self) -> Result<u32, BufferError> {
        self.inner.line_count()
    }

    fn replace_range(&mut self, text: &str, range: Range) -> Result<(), BufferError> {
        self.inner.replace_range(text, range)?;
        self.repaint();
        Ok(())
    }

    fn set_cursor(&mut self, position: Position) -> Result<(), BufferError> {
        self.inner.set_cursor(position)
    }

    fn scroll_into_view(&mut self, range: Range, smooth: bool) -> Result<(), BufferError> {
        self.inner.scroll_into_view(range, smooth)
    }
}

/// Host whose stop button fires on a timer.
struct StopAfter {
    delay: Duration,
}

impl ProcessingState for StopAfter {
    fn processing_started(&mut self, stop: StopSignal) {
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            stop.signal();
        });
    }

    fn processing_finished(&mut self) {}
}

fn rewrite_request(line: u32, line_text: &str, delivery: Delivery) -> ActionRequest {
    let columns = u32::try_from(line_text.chars().count()).unwrap_or(u32::MAX);
    ActionRequest {
        kind: ActionKind::Improve,
        range: Range::new(Position::new(line, 0), Position::new(line, columns)),
        original_text: line_text.to_string(),
        prompt: "Improve the writing of the following text.".to_string(),
        options: GenerationOptions::default(),
        mode: ThinkingMode::Inline,
        delivery,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("Redraft Streaming Demo");
    println!("======================");
    println!("Watch line 2 get rewritten in place.\n");

    let mut buffer = MirrorBuffer::new(DOCUMENT);
    let mut notifier = MemoryNotifier::new();
    let mut sink = RecordingSink::new();
    let mut runner = ActionRunner::new(RunnerConfig::default());
    let target_line = buffer.line(1).unwrap_or_default();

    buffer.repaint();
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Run 1: a slow provider so the thinking placeholder is visible,
    // then the rewrite streams in chunk by chunk.
    let provider = ScriptedProvider::deltas(REWRITE_CHUNKS)
        .with_chunk_delay(Duration::from_millis(250));
    let mut host = MemoryHost::new();
    let outcome = runner
        .run(
            &mut buffer,
            &mut notifier,
            &mut host,
            &mut sink,
            &provider,
            rewrite_request(1, &target_line, Delivery::Streaming),
        )
        .await;
    println!("\nfirst run: {outcome:?}\n");
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Run 2: the same rewrite, stopped mid-stream. The original line
    // comes back untouched.
    let rewritten = buffer.line(1).unwrap_or_default();
    // Re-anchor the painted block below the status line.
    buffer.painted_lines = 0;
    buffer.repaint();
    let provider = ScriptedProvider::deltas(REWRITE_CHUNKS)
        .with_chunk_delay(Duration::from_millis(400));
    let mut host = StopAfter {
        delay: Duration::from_millis(1800),
    };
    let outcome = runner
        .run(
            &mut buffer,
            &mut notifier,
            &mut host,
            &mut sink,
            &provider,
            rewrite_request(1, &rewritten, Delivery::Streaming),
        )
        .await;
    println!("\nsecond run: {outcome:?}");
    assert_eq!(outcome, Outcome::Cancelled);

    println!("\noutcome log:");
    for record in sink.records() {
        println!("  {:?} {:?}: {}", record.kind, record.action, record.preview);
    }
}
