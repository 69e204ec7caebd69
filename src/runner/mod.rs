//! Runner: Drives one transformation from menu action to terminal outcome.
//!
//! [`ActionRunner::run`] is the per-invocation coordinator: it claims
//! the buffer region, creates the stop signal and the session together,
//! asks the provider for text, and forwards chunks into the session from
//! a single `select!` loop that also animates the thinking placeholder
//! and polls the stop signal. Success, provider failure, detached
//! buffer, or user stop: the loop converges to exactly one [`Outcome`]
//! and one record in the outcome sink.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use log::{debug, warn};
use tokio::time::{interval_at, Instant};

use crate::action::ActionKind;
use crate::adapter::{
    preview, BufferError, Notifier, OutcomeKind, OutcomeRecord, OutcomeSink, ProcessingState,
    TextBuffer,
};
use crate::cancel::StopSignal;
use crate::position::Range;
use crate::provider::{ChunkPayload, GenerationOptions, GenerationRequest, Provider};
use crate::session::{SessionError, StreamSession};
use crate::thinking::ThinkingMode;

/// How one invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The final text now occupies the target region.
    Success(String),
    /// The user aborted; the original text was restored.
    Cancelled,
    /// Something went wrong; the original text was restored.
    Failed(String),
}

/// How the provider is asked for text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Incremental chunks applied live.
    #[default]
    Streaming,
    /// One awaited call applied in a single final update.
    SingleShot,
}

/// Tuning for the runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Interval between thinking-placeholder ticks.
    pub tick_interval: Duration,
    /// Minimum time the placeholder stays visible before the first real
    /// write, to avoid a flicker. Never delays cancellation.
    pub min_first_output: Duration,
    /// Smooth-scroll the finished output into view.
    pub smooth_scroll: bool,
    /// Grapheme budget for outcome-record previews.
    pub preview_graphemes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(400),
            min_first_output: Duration::from_millis(150),
            smooth_scroll: true,
            preview_graphemes: 80,
        }
    }
}

/// One fully described invocation.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    /// Which transformation is running.
    pub kind: ActionKind,
    /// The region being replaced (a caret range for insertions).
    pub range: Range,
    /// Text occupying the region before the session, for restoration.
    pub original_text: String,
    /// The fully built prompt.
    pub prompt: String,
    /// Provider tuning knobs.
    pub options: GenerationOptions,
    /// Placeholder render target.
    pub mode: ThinkingMode,
    /// Streaming or single-shot provider path.
    pub delivery: Delivery,
}

impl ActionRequest {
    /// Capture the buffer's current selection as a rewrite request.
    ///
    /// The selection range and its text are read once, here; they become
    /// the session's target region and restoration text.
    pub fn from_selection(
        buffer: &dyn TextBuffer,
        kind: ActionKind,
        prompt: String,
    ) -> Result<Self, BufferError> {
        Ok(Self {
            kind,
            range: buffer.selection()?,
            original_text: buffer.selected_text()?,
            prompt,
            options: GenerationOptions::default(),
            mode: ThinkingMode::default(),
            delivery: Delivery::default(),
        })
    }

    /// Capture the caret as an insertion request (nothing to restore).
    pub fn at_cursor(
        buffer: &dyn TextBuffer,
        kind: ActionKind,
        prompt: String,
    ) -> Result<Self, BufferError> {
        Ok(Self {
            kind,
            range: Range::caret(buffer.cursor()?),
            original_text: String::new(),
            prompt,
            options: GenerationOptions::default(),
            mode: ThinkingMode::default(),
            delivery: Delivery::default(),
        })
    }
}

/// Guard over the buffer's active-session slot.
///
/// One lock instance belongs to one buffer. Claiming succeeds only while
/// no other session is active, which is what keeps two streams from
/// interleaving writes into the same document. A second session, even
/// over a disjoint range, would invalidate the first session's tracked
/// positions the moment it inserts a line.
#[derive(Debug, Clone, Default)]
pub struct RegionLock {
    active: Arc<Mutex<Option<Range>>>,
}

impl RegionLock {
    /// Create an unclaimed lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a session currently holds the lock.
    pub fn is_claimed(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> Option<Range> {
        *self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn claim(&self, region: Range) -> Option<RegionClaim> {
        let mut slot = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return None;
        }
        *slot = Some(region);
        drop(slot);
        Some(RegionClaim { lock: self.clone() })
    }
}

/// RAII claim; releases the slot when dropped.
struct RegionClaim {
    lock: RegionLock,
}

impl Drop for RegionClaim {
    fn drop(&mut self) {
        *self
            .lock
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Per-invocation coordinator.
pub struct ActionRunner {
    config: RunnerConfig,
    regions: RegionLock,
}

impl ActionRunner {
    /// Create a runner with its own region lock.
    pub fn new(config: RunnerConfig) -> Self {
        Self::with_regions(config, RegionLock::new())
    }

    /// Create a runner sharing a region lock with other runners that
    /// target the same buffer.
    pub fn with_regions(config: RunnerConfig, regions: RegionLock) -> Self {
        Self { config, regions }
    }

    /// Run one transformation to its terminal outcome.
    ///
    /// The buffer is only ever mutated through the session, so the
    /// original text survives every non-success path.
    pub async fn run(
        &mut self,
        buffer: &mut dyn TextBuffer,
        notifier: &mut dyn Notifier,
        host: &mut dyn ProcessingState,
        sink: &mut dyn OutcomeSink,
        provider: &dyn Provider,
        request: ActionRequest,
    ) -> Outcome {
        let Some(claim) = self.regions.claim(request.range) else {
            let message = "another rewrite is still running in this buffer".to_string();
            warn!("refusing {:?}: {message}", request.kind);
            let outcome = Outcome::Failed(message);
            self.record(sink, &request, &outcome);
            return outcome;
        };

        let stop = StopSignal::new();
        host.processing_started(stop.clone());

        let outcome = self
            .drive(buffer, notifier, provider, &request, &stop)
            .await;

        host.processing_finished();
        self.record(sink, &request, &outcome);
        drop(claim);
        outcome
    }

    async fn drive(
        &self,
        buffer: &mut dyn TextBuffer,
        notifier: &mut dyn Notifier,
        provider: &dyn Provider,
        request: &ActionRequest,
        stop: &StopSignal,
    ) -> Outcome {
        let mut session = StreamSession::new(
            request.kind,
            request.range,
            request.original_text.clone(),
            request.mode,
            self.config.smooth_scroll,
        );
        if let Err(err) = session.start(buffer, notifier) {
            return Outcome::Failed(err.to_string());
        }

        let generation = GenerationRequest {
            prompt: request.prompt.clone(),
            options: request.options.clone(),
        };

        match request.delivery {
            Delivery::Streaming => {
                self.drive_stream(buffer, notifier, provider, &generation, stop, &mut session)
                    .await
            }
            Delivery::SingleShot => {
                self.drive_single(buffer, notifier, provider, &generation, stop, &mut session)
                    .await
            }
        }
    }

    /// Forward a chunk stream into the session.
    async fn drive_stream(
        &self,
        buffer: &mut dyn TextBuffer,
        notifier: &mut dyn Notifier,
        provider: &dyn Provider,
        generation: &GenerationRequest,
        stop: &StopSignal,
        session: &mut StreamSession,
    ) -> Outcome {
        let mut stream = match provider.generate_stream(generation, stop.clone()).await {
            Ok(stream) => stream,
            Err(err) => {
                session.fail(buffer, notifier);
                return Outcome::Failed(err.to_string());
            }
        };

        let started = Instant::now();
        let mut ticker = self.ticker();
        let mut accumulated = String::new();

        loop {
            tokio::select! {
                () = stop.cancelled() => {
                    session.cancel(buffer, notifier);
                    return Outcome::Cancelled;
                }
                _ = ticker.tick(), if session.is_awaiting_first_chunk() => {
                    if let Err(err) = session.tick_thinking(buffer, notifier) {
                        return Outcome::Failed(err.to_string());
                    }
                }
                item = stream.next() => match item {
                    // Stream dried up without a final marker; treat what
                    // arrived as the full result.
                    None => break,
                    Some(Err(err)) => {
                        session.fail(buffer, notifier);
                        return Outcome::Failed(err.to_string());
                    }
                    Some(Ok(chunk)) => {
                        match chunk.payload {
                            ChunkPayload::Delta(delta) => accumulated.push_str(&delta),
                            ChunkPayload::Snapshot(snapshot) => accumulated = snapshot,
                        }
                        // Don't forward chunks that raced the stop signal.
                        if stop.is_signalled() {
                            session.cancel(buffer, notifier);
                            return Outcome::Cancelled;
                        }
                        if chunk.is_final {
                            return self
                                .finish(buffer, notifier, stop, session, started, accumulated)
                                .await;
                        }
                        if session.is_awaiting_first_chunk()
                            && self.hold_first_output(started, stop).await
                        {
                            session.cancel(buffer, notifier);
                            return Outcome::Cancelled;
                        }
                        if let Err(err) =
                            session.update(buffer, notifier, &accumulated, false)
                        {
                            return Outcome::Failed(err.to_string());
                        }
                    }
                },
            }
        }

        self.finish(buffer, notifier, stop, session, started, accumulated)
            .await
    }

    /// Await the whole response, then apply it as one final update.
    async fn drive_single(
        &self,
        buffer: &mut dyn TextBuffer,
        notifier: &mut dyn Notifier,
        provider: &dyn Provider,
        generation: &GenerationRequest,
        stop: &StopSignal,
        session: &mut StreamSession,
    ) -> Outcome {
        let started = Instant::now();
        let mut ticker = self.ticker();
        let generate = provider.generate(generation, stop.clone());
        tokio::pin!(generate);

        loop {
            tokio::select! {
                () = stop.cancelled() => {
                    session.cancel(buffer, notifier);
                    return Outcome::Cancelled;
                }
                _ = ticker.tick() => {
                    if let Err(err) = session.tick_thinking(buffer, notifier) {
                        return Outcome::Failed(err.to_string());
                    }
                }
                result = &mut generate => match result {
                    Err(err) => {
                        session.fail(buffer, notifier);
                        return Outcome::Failed(err.to_string());
                    }
                    Ok(text) => {
                        if stop.is_signalled() {
                            session.cancel(buffer, notifier);
                            return Outcome::Cancelled;
                        }
                        return self
                            .finish(buffer, notifier, stop, session, started, text)
                            .await;
                    }
                },
            }
        }
    }

    /// Validate and apply the final text.
    async fn finish(
        &self,
        buffer: &mut dyn TextBuffer,
        notifier: &mut dyn Notifier,
        stop: &StopSignal,
        session: &mut StreamSession,
        started: Instant,
        text: String,
    ) -> Outcome {
        if text.trim().is_empty() {
            debug!("generation finished with no usable text");
            session.fail(buffer, notifier);
            return Outcome::Failed(SessionError::EmptyResult.to_string());
        }
        if session.is_awaiting_first_chunk() && self.hold_first_output(started, stop).await {
            session.cancel(buffer, notifier);
            return Outcome::Cancelled;
        }
        if let Err(err) = session.update(buffer, notifier, &text, true) {
            return Outcome::Failed(err.to_string());
        }
        Outcome::Success(text)
    }

    /// Keep the placeholder visible for its minimum duration.
    ///
    /// Returns `true` if the stop signal fired during the wait.
    async fn hold_first_output(&self, started: Instant, stop: &StopSignal) -> bool {
        let elapsed = started.elapsed();
        let Some(remaining) = self.config.min_first_output.checked_sub(elapsed) else {
            return stop.is_signalled();
        };
        if remaining.is_zero() {
            return stop.is_signalled();
        }
        tokio::select! {
            () = stop.cancelled() => true,
            () = tokio::time::sleep(remaining) => false,
        }
    }

    fn ticker(&self) -> tokio::time::Interval {
        // First tick lands one interval out, not immediately.
        interval_at(
            Instant::now() + self.config.tick_interval,
            self.config.tick_interval,
        )
    }

    fn record(&self, sink: &mut dyn OutcomeSink, request: &ActionRequest, outcome: &Outcome) {
        let budget = self.config.preview_graphemes;
        let record = match outcome {
            Outcome::Success(text) => OutcomeRecord {
                kind: OutcomeKind::Success,
                action: request.kind,
                preview: preview(&request.original_text, budget),
                detail: Some(preview(text, budget)),
            },
            Outcome::Cancelled => OutcomeRecord {
                kind: OutcomeKind::Cancelled,
                action: request.kind,
                preview: preview(&request.original_text, budget),
                detail: None,
            },
            Outcome::Failed(message) => OutcomeRecord {
                kind: OutcomeKind::Error,
                action: request.kind,
                preview: preview(&request.original_text, budget),
                detail: Some(message.clone()),
            },
        };
        sink.record(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MemoryBuffer, MemoryHost, MemoryNotifier, RecordingSink};
    use crate::position::Position;
    use crate::provider::{ProviderError, ScriptedProvider, StreamChunk};

    const FINAL_TEXT: &str =
        "This is a modern introduction paragraph with contemporary language.";

    fn fast_config() -> RunnerConfig {
        RunnerConfig {
            min_first_output: Duration::ZERO,
            ..RunnerConfig::default()
        }
    }

    /// Buffer with a 10-character prefix before the rewrite target.
    fn scenario_buffer(selection: &str) -> (MemoryBuffer, ActionRequest) {
        let text = format!("intro:    {selection} trailing");
        let from = Position::new(0, 10);
        let to = Position::new(0, 10 + selection.chars().count() as u32);
        let buffer = MemoryBuffer::from_text(&text);
        let request = ActionRequest {
            kind: ActionKind::Rewrite,
            range: Range::new(from, to),
            original_text: selection.to_string(),
            prompt: "rewrite it".to_string(),
            options: GenerationOptions::default(),
            mode: ThinkingMode::Popup,
            delivery: Delivery::Streaming,
        };
        (buffer, request)
    }

    async fn run_with(
        provider: &ScriptedProvider,
        buffer: &mut MemoryBuffer,
        request: ActionRequest,
    ) -> (Outcome, RecordingSink, MemoryHost) {
        let mut runner = ActionRunner::new(fast_config());
        let mut notifier = MemoryNotifier::new();
        let mut host = MemoryHost::new();
        let mut sink = RecordingSink::new();
        let outcome = runner
            .run(buffer, &mut notifier, &mut host, &mut sink, provider, request)
            .await;
        (outcome, sink, host)
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_streaming_snapshots_end_to_end() {
        let selection = "this is the introduction paragraph with old-fashioned language.";
        let (mut buffer, request) = scenario_buffer(selection);
        let provider = ScriptedProvider::snapshots(&["This", "This is a", FINAL_TEXT]);

        let (outcome, sink, host) = run_with(&provider, &mut buffer, request).await;

        assert_eq!(outcome, Outcome::Success(FINAL_TEXT.to_string()));
        assert_eq!(buffer.text(), format!("intro:    {FINAL_TEXT} trailing"));
        assert_eq!(
            buffer.cursor().unwrap(),
            Position::new(0, 10 + FINAL_TEXT.chars().count() as u32)
        );
        assert!(!host.is_processing());
        assert_eq!(host.starts_seen(), 1);
        assert_eq!(sink.records().len(), 1);
        assert_eq!(sink.records()[0].kind, OutcomeKind::Success);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_streaming_deltas_accumulate() {
        let (mut buffer, request) = scenario_buffer("old text here xyzabcdefgh");
        let provider = ScriptedProvider::deltas(&["New", " text", " here"]);

        let (outcome, _, _) = run_with(&provider, &mut buffer, request).await;

        assert_eq!(outcome, Outcome::Success("New text here".to_string()));
        assert_eq!(buffer.text(), "intro:    New text here trailing");
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_empty_result_fails_and_restores() {
        let (mut buffer, mut request) = scenario_buffer("keep me safe");
        let original = buffer.text();
        request.delivery = Delivery::SingleShot;
        let provider = ScriptedProvider::snapshots(&[""]);

        let (outcome, sink, _) = run_with(&provider, &mut buffer, request).await;

        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(buffer.text(), original);
        assert_eq!(sink.records()[0].kind, OutcomeKind::Error);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_provider_error_fails_and_restores() {
        let (mut buffer, request) = scenario_buffer("keep me safe");
        let original = buffer.text();
        let provider = ScriptedProvider::from_script(vec![
            Ok(StreamChunk::snapshot("part")),
            Err(ProviderError::Stream("connection reset".into())),
        ]);

        let (outcome, sink, _) = run_with(&provider, &mut buffer, request).await;

        assert_eq!(
            outcome,
            Outcome::Failed("generation stream failed: connection reset".to_string())
        );
        assert_eq!(buffer.text(), original);
        assert_eq!(sink.records()[0].kind, OutcomeKind::Error);
        assert_eq!(
            sink.records()[0].detail.as_deref(),
            Some("generation stream failed: connection reset")
        );
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_stop_mid_stream_cancels_and_restores() {
        let (mut buffer, request) = scenario_buffer("Hello world of text");
        let original = buffer.text();
        let provider = ScriptedProvider::snapshots(&["Hola", "Hola mundo"])
            .with_chunk_delay(Duration::from_millis(200));

        let mut runner = ActionRunner::new(fast_config());
        let mut notifier = MemoryNotifier::new();
        let mut host = StopAfter::new(Duration::from_millis(300));
        let mut sink = RecordingSink::new();

        let outcome = runner
            .run(
                &mut buffer,
                &mut notifier,
                &mut host,
                &mut sink,
                &provider,
                request,
            )
            .await;

        // One partial chunk landed before the stop fired.
        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(buffer.text(), original);
        assert_eq!(sink.records()[0].kind, OutcomeKind::Cancelled);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_stop_before_first_chunk_cancels() {
        let (mut buffer, request) = scenario_buffer("Hello world of text");
        let original = buffer.text();
        let provider = ScriptedProvider::snapshots(&["never lands"])
            .with_chunk_delay(Duration::from_secs(60));

        let mut runner = ActionRunner::new(fast_config());
        let mut notifier = MemoryNotifier::new();
        let mut host = StopAfter::new(Duration::from_millis(50));
        let mut sink = RecordingSink::new();

        let outcome = runner
            .run(
                &mut buffer,
                &mut notifier,
                &mut host,
                &mut sink,
                &provider,
                request,
            )
            .await;

        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(buffer.text(), original);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_single_shot_success() {
        let (mut buffer, mut request) = scenario_buffer("something old xyzabc");
        request.delivery = Delivery::SingleShot;
        let provider = ScriptedProvider::deltas(&["something new"]);

        let (outcome, _, _) = run_with(&provider, &mut buffer, request).await;

        assert_eq!(outcome, Outcome::Success("something new".to_string()));
        assert_eq!(buffer.text(), "intro:    something new trailing");
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_request_captured_from_selection() {
        let mut buffer = MemoryBuffer::from_text("pick me not others");
        buffer.set_selection(Range::new(Position::new(0, 5), Position::new(0, 7)));
        let request =
            ActionRequest::from_selection(&buffer, ActionKind::Improve, "improve".to_string())
                .unwrap();
        assert_eq!(request.original_text, "me");

        let provider = ScriptedProvider::snapshots(&["us"]);
        let (outcome, _, _) = run_with(&provider, &mut buffer, request).await;

        assert_eq!(outcome, Outcome::Success("us".to_string()));
        assert_eq!(buffer.text(), "pick us not others");
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_request_captured_at_cursor() {
        let mut buffer = MemoryBuffer::from_text("prefix ");
        buffer.set_cursor(Position::new(0, 7)).unwrap();
        let request =
            ActionRequest::at_cursor(&buffer, ActionKind::GenericAdd, "continue".to_string())
                .unwrap();

        let provider = ScriptedProvider::deltas(&["and", " suffix"]);
        let (outcome, _, _) = run_with(&provider, &mut buffer, request).await;

        assert_eq!(outcome, Outcome::Success("and suffix".to_string()));
        assert_eq!(buffer.text(), "prefix and suffix");
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_busy_region_is_refused() {
        let (mut buffer, request) = scenario_buffer("contested text block");
        let original = buffer.text();
        let lock = RegionLock::new();
        let _claim = lock.claim(Range::caret(Position::ZERO)).unwrap();

        let mut runner = ActionRunner::with_regions(fast_config(), lock.clone());
        let mut notifier = MemoryNotifier::new();
        let mut host = MemoryHost::new();
        let mut sink = RecordingSink::new();
        let provider = ScriptedProvider::snapshots(&["intruder"]);

        let outcome = runner
            .run(
                &mut buffer,
                &mut notifier,
                &mut host,
                &mut sink,
                &provider,
                request,
            )
            .await;

        assert!(matches!(outcome, Outcome::Failed(_)));
        // The refused run never touched the buffer or the host state.
        assert_eq!(buffer.text(), original);
        assert_eq!(host.starts_seen(), 0);
        assert_eq!(sink.records()[0].kind, OutcomeKind::Error);
        assert!(lock.is_claimed());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_region_lock_released_after_run() {
        let (mut buffer, request) = scenario_buffer("released after xyzab");
        let lock = RegionLock::new();
        let mut runner = ActionRunner::with_regions(fast_config(), lock.clone());
        let mut notifier = MemoryNotifier::new();
        let mut host = MemoryHost::new();
        let mut sink = RecordingSink::new();
        let provider = ScriptedProvider::snapshots(&["done"]);

        runner
            .run(
                &mut buffer,
                &mut notifier,
                &mut host,
                &mut sink,
                &provider,
                request,
            )
            .await;

        assert!(!lock.is_claimed());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_inline_thinking_ticks_then_hands_off() {
        let (mut buffer, mut request) = scenario_buffer("slow reply expected");
        request.mode = ThinkingMode::Inline;
        let provider = ScriptedProvider::snapshots(&["quick reply instead"])
            .with_chunk_delay(Duration::from_secs(2));

        let (outcome, _, _) = run_with(&provider, &mut buffer, request).await;

        // Several ticks ran during the two-second wait; none of the
        // placeholder text may survive the handoff.
        assert_eq!(outcome, Outcome::Success("quick reply instead".to_string()));
        assert_eq!(buffer.text(), "intro:    quick reply instead trailing");
    }

    /// Host double whose stop button fires on a timer.
    struct StopAfter {
        delay: Duration,
    }

    impl StopAfter {
        fn new(delay: Duration) -> Self {
            Self { delay }
        }
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
}
