use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::capture::domain::display_sink::DisplaySink;
use crate::capture::domain::stream_source::StreamSource;
use crate::events::domain::event_sink::EventSink;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::triple_processor::{ProcessorStats, TripleProcessor};
use crate::synchronization::domain::stream_synchronizer::{StreamSynchronizer, SyncStats};

/// Source of the timestamps the event throttler sees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SessionClock {
    /// Wall time since the session started. Right for live sources.
    #[default]
    Wall,
    /// Sequence ids counted from the first processed triple, at this many
    /// frames per second. Replays read faster than real time, so wall time
    /// would collapse their cooldowns.
    FrameRate(f64),
}

/// Configuration for one watch session run.
pub struct ExecutionConfig {
    /// Show only every Nth processed triple.
    pub display_every: u32,
    /// Upper bound on how long a thread waits before re-checking for
    /// cancellation.
    pub poll_interval: Duration,
    /// When set, a producer whose stream is a full window ahead waits up to
    /// this long for the other streams before buffering anyway. Used when
    /// replaying recordings, which are read faster than they were captured.
    pub max_stall: Option<Duration>,
    pub clock: SessionClock,
    pub cancelled: Arc<AtomicBool>,
}

/// What a finished session did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WatchReport {
    pub triples_processed: u64,
    pub events_fired: u64,
    pub events_saved: u64,
    pub sink_failures: u64,
    pub frames_shown: u64,
    pub display_failures: u64,
    pub records_received: u64,
    pub source_errors: u64,
    pub sync: SyncStats,
    pub processor: ProcessorStats,
    pub enrollment_write_failures: u64,
}

/// Abstracts how the sources → synchronize → process → sink session runs.
///
/// This is a port (application-layer interface). Infrastructure provides
/// concrete implementations.
pub trait PipelineExecutor: Send {
    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        sources: Vec<Box<dyn StreamSource>>,
        synchronizer: StreamSynchronizer,
        processor: TripleProcessor,
        event_sink: Box<dyn EventSink>,
        display_sink: Option<Box<dyn DisplaySink>>,
        logger: &mut dyn PipelineLogger,
        config: ExecutionConfig,
    ) -> Result<WatchReport, Box<dyn std::error::Error>>;
}
