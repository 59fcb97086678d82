use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::capture::domain::display_sink::{AnnotatedFrame, DisplaySink};
use crate::capture::domain::stream_source::{SourceEvent, StreamSource};
use crate::events::domain::event_sink::EventSink;
use crate::pipeline::pipeline_executor::{
    ExecutionConfig, PipelineExecutor, SessionClock, WatchReport,
};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::triple_processor::{SavedEvent, TripleProcessor};
use crate::shared::frame::SequenceId;
use crate::synchronization::domain::stream_record::StreamKind;
use crate::synchronization::domain::stream_synchronizer::StreamSynchronizer;
use crate::synchronization::domain::triple::Triple;

const DEFAULT_EVENT_CAPACITY: usize = 32;
const DEFAULT_DISPLAY_CAPACITY: usize = 2;
const BACKPRESSURE_STEP: Duration = Duration::from_millis(2);

/// Runs a watch session with one thread per source plus dedicated sink
/// threads.
///
/// Layout: `sources → synchronizer → main [match/throttle] → event sink`,
/// with annotated frames handed to a display thread on the side.
///
/// Producers feed the synchronizer directly and wake the main loop through
/// a single-slot channel. Events are never dropped; display frames are
/// dropped while the display thread is busy.
pub struct ThreadedStreamExecutor {
    event_capacity: usize,
    display_capacity: usize,
}

impl ThreadedStreamExecutor {
    pub fn new() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            display_capacity: DEFAULT_DISPLAY_CAPACITY,
        }
    }
}

impl Default for ThreadedStreamExecutor {
    fn default() -> Self {
        Self::new()
    }
}

struct SourceOutcome {
    records: u64,
    errors: u64,
}

struct SinkOutcome {
    delivered: u64,
    failures: u64,
}

/// Shared state the producer threads need.
#[derive(Clone)]
struct ProducerContext {
    synchronizer: Arc<StreamSynchronizer>,
    wake_tx: Sender<()>,
    active: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
    max_stall: Option<Duration>,
}

impl ProducerContext {
    fn should_stop(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || self.stop.load(Ordering::Relaxed)
    }

    /// Holds a replay producer back while its stream is a full window
    /// ahead of the others.
    fn wait_for_room(&self, kind: StreamKind) {
        let Some(max_stall) = self.max_stall else {
            return;
        };
        let deadline = Instant::now() + max_stall;
        while !self.synchronizer.has_room(kind) && Instant::now() < deadline && !self.should_stop()
        {
            std::thread::sleep(BACKPRESSURE_STEP);
        }
    }

    fn wake(&self) {
        // A full slot already guarantees a wake-up.
        let _ = self.wake_tx.try_send(());
    }
}

/// Places processed triples on the throttler's timeline.
struct Timeline {
    clock: SessionClock,
    start: Instant,
    first_sequence: Option<SequenceId>,
}

impl Timeline {
    fn new(clock: SessionClock) -> Self {
        Self {
            clock,
            start: Instant::now(),
            first_sequence: None,
        }
    }

    fn timestamp(&mut self, sequence_id: SequenceId) -> Duration {
        match self.clock {
            SessionClock::Wall => self.start.elapsed(),
            SessionClock::FrameRate(fps) => {
                let first = *self.first_sequence.get_or_insert(sequence_id);
                let frames = sequence_id.saturating_sub(first) as f64;
                Duration::try_from_secs_f64(frames / fps).unwrap_or(Duration::MAX)
            }
        }
    }
}

impl PipelineExecutor for ThreadedStreamExecutor {
    fn execute(
        &self,
        sources: Vec<Box<dyn StreamSource>>,
        synchronizer: StreamSynchronizer,
        mut processor: TripleProcessor,
        event_sink: Box<dyn EventSink>,
        display_sink: Option<Box<dyn DisplaySink>>,
        logger: &mut dyn PipelineLogger,
        config: ExecutionConfig,
    ) -> Result<WatchReport, Box<dyn std::error::Error>> {
        let synchronizer = Arc::new(synchronizer);
        let (wake_tx, wake_rx) = crossbeam_channel::bounded::<()>(1);
        let (event_tx, event_rx) = crossbeam_channel::bounded::<SavedEvent>(self.event_capacity);

        let ctx = ProducerContext {
            synchronizer: synchronizer.clone(),
            wake_tx,
            active: Arc::new(AtomicUsize::new(sources.len())),
            cancelled: config.cancelled.clone(),
            stop: Arc::new(AtomicBool::new(false)),
            poll_interval: config.poll_interval,
            max_stall: config.max_stall,
        };

        let source_handles: Vec<_> = sources
            .into_iter()
            .map(|source| spawn_source(source, ctx.clone()))
            .collect();
        let sink_handle = spawn_event_sink(event_sink, event_rx);
        let (display_tx, display_handle) = match display_sink {
            Some(sink) => {
                let (tx, rx) = crossbeam_channel::bounded(self.display_capacity);
                (Some(tx), Some(spawn_display(sink, rx)))
            }
            None => (None, None),
        };

        let mut report = WatchReport::default();
        let main_error = run_main_loop(
            &synchronizer,
            &mut processor,
            &wake_rx,
            &ctx,
            &event_tx,
            display_tx.as_ref(),
            logger,
            &config,
            &mut report,
        );

        ctx.stop.store(true, Ordering::Relaxed);
        drop(event_tx);
        drop(display_tx);

        let result = join_threads(
            source_handles,
            sink_handle,
            display_handle,
            &mut report,
            main_error,
        );

        report.sync = synchronizer.stats();
        report.processor = processor.stats();
        report.enrollment_write_failures = processor.matcher().write_failures();
        result.map(|()| report)
    }
}

fn spawn_source(
    mut source: Box<dyn StreamSource>,
    ctx: ProducerContext,
) -> JoinHandle<SourceOutcome> {
    std::thread::spawn(move || {
        let kind = source.kind();
        let mut outcome = SourceOutcome {
            records: 0,
            errors: 0,
        };
        while !ctx.should_stop() {
            match source.next_record(ctx.poll_interval) {
                Ok(SourceEvent::Record(record)) => {
                    if record.kind() != kind {
                        log::warn!("Dropping {} record from {kind} source", record.kind());
                        continue;
                    }
                    ctx.wait_for_room(kind);
                    ctx.synchronizer.add_record(record);
                    outcome.records += 1;
                    ctx.wake();
                }
                Ok(SourceEvent::Idle) => {}
                Ok(SourceEvent::Closed) => break,
                Err(e) => {
                    log::warn!("{kind} source: {e}");
                    outcome.errors += 1;
                }
            }
        }
        source.close();
        log::debug!("{kind} source finished after {} records", outcome.records);
        ctx.active.fetch_sub(1, Ordering::SeqCst);
        ctx.wake();
        outcome
    })
}

fn spawn_event_sink(
    mut sink: Box<dyn EventSink>,
    event_rx: Receiver<SavedEvent>,
) -> JoinHandle<SinkOutcome> {
    std::thread::spawn(move || {
        let mut outcome = SinkOutcome {
            delivered: 0,
            failures: 0,
        };
        for saved in event_rx {
            match sink.save(&saved.event, &saved.crop) {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    log::warn!("Failed to save event for {}: {e}", saved.event.label);
                    outcome.failures += 1;
                }
            }
        }
        outcome
    })
}

fn spawn_display(
    mut sink: Box<dyn DisplaySink>,
    display_rx: Receiver<AnnotatedFrame>,
) -> JoinHandle<SinkOutcome> {
    std::thread::spawn(move || {
        let mut outcome = SinkOutcome {
            delivered: 0,
            failures: 0,
        };
        for annotated in display_rx {
            match sink.show(&annotated) {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    log::warn!("Display failed: {e}");
                    outcome.failures += 1;
                }
            }
        }
        outcome
    })
}

/// Drains complete triples until every source has closed or the session is
/// cancelled.
#[allow(clippy::too_many_arguments)]
fn run_main_loop(
    synchronizer: &StreamSynchronizer,
    processor: &mut TripleProcessor,
    wake_rx: &Receiver<()>,
    ctx: &ProducerContext,
    event_tx: &Sender<SavedEvent>,
    display_tx: Option<&Sender<AnnotatedFrame>>,
    logger: &mut dyn PipelineLogger,
    config: &ExecutionConfig,
    report: &mut WatchReport,
) -> Option<Box<dyn std::error::Error>> {
    let mut timeline = Timeline::new(config.clock);
    let display_every = u64::from(config.display_every.max(1));

    loop {
        // Read before draining so records added by a producer that has
        // since finished are still drained below.
        let sources_done = ctx.active.load(Ordering::SeqCst) == 0;

        while let Some(triple) = synchronizer.poll() {
            let handled = handle_triple(
                triple,
                &mut timeline,
                processor,
                event_tx,
                display_tx,
                display_every,
                logger,
                report,
            );
            if let Err(e) = handled {
                return Some(e);
            }
        }

        if config.cancelled.load(Ordering::Relaxed) {
            logger.info("Session cancelled");
            return None;
        }
        if sources_done {
            return None;
        }

        // `ctx` keeps a sender alive, so this only ever wakes or times out.
        let _ = wake_rx.recv_timeout(config.poll_interval);
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_triple(
    triple: Triple,
    timeline: &mut Timeline,
    processor: &mut TripleProcessor,
    event_tx: &Sender<SavedEvent>,
    display_tx: Option<&Sender<AnnotatedFrame>>,
    display_every: u64,
    logger: &mut dyn PipelineLogger,
    report: &mut WatchReport,
) -> Result<(), Box<dyn std::error::Error>> {
    let timestamp = timeline.timestamp(triple.sequence_id());
    let t0 = Instant::now();
    let mut processed = processor.process(&triple, timestamp);
    logger.triple(
        triple.sequence_id(),
        processed.sightings.len(),
        processed.events.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    report.triples_processed += 1;

    for saved in processed.events.drain(..) {
        report.events_fired += 1;
        event_tx
            .send(saved)
            .map_err(|_| "Event sink channel closed unexpectedly")?;
    }

    if let Some(tx) = display_tx {
        if (report.triples_processed - 1) % display_every == 0 {
            match tx.try_send(processed.annotate(triple.into_frame())) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => {
                    return Err("Display channel closed unexpectedly".into());
                }
            }
        }
    }
    Ok(())
}

/// Joins all session threads and coalesces the first error encountered.
fn join_threads(
    source_handles: Vec<JoinHandle<SourceOutcome>>,
    sink_handle: JoinHandle<SinkOutcome>,
    display_handle: Option<JoinHandle<SinkOutcome>>,
    report: &mut WatchReport,
    mut first_error: Option<Box<dyn std::error::Error>>,
) -> Result<(), Box<dyn std::error::Error>> {
    fn set_if_none(slot: &mut Option<Box<dyn std::error::Error>>, err: Box<dyn std::error::Error>) {
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    for handle in source_handles {
        match handle.join() {
            Ok(outcome) => {
                report.records_received += outcome.records;
                report.source_errors += outcome.errors;
            }
            Err(_) => set_if_none(&mut first_error, "Source thread panicked".into()),
        }
    }

    match sink_handle.join() {
        Ok(outcome) => {
            report.events_saved = outcome.delivered;
            report.sink_failures = outcome.failures;
        }
        Err(_) => set_if_none(&mut first_error, "Event sink thread panicked".into()),
    }

    if let Some(handle) = display_handle {
        match handle.join() {
            Ok(outcome) => {
                report.frames_shown = outcome.delivered;
                report.display_failures = outcome.failures;
            }
            Err(_) => set_if_none(&mut first_error, "Display thread panicked".into()),
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
