use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::capture::domain::display_sink::DisplaySink;
use crate::capture::domain::stream_source::StreamSource;
use crate::events::domain::event_sink::EventSink;
use crate::events::domain::event_throttler::EventThrottler;
use crate::recognition::domain::embedding_store::EmbeddingStore;
use crate::recognition::domain::identity_matcher::IdentityMatcher;
use crate::synchronization::domain::stream_synchronizer::StreamSynchronizer;

use super::pipeline_executor::{ExecutionConfig, PipelineExecutor, SessionClock, WatchReport};
use super::pipeline_logger::PipelineLogger;
use super::session_config::SessionConfig;
use super::triple_processor::TripleProcessor;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Orchestrates a watch session: raw streams in, identity events out.
///
/// Wires domain components together and delegates execution to a
/// `PipelineExecutor`. This is a single-use struct: `execute` consumes
/// the owned components, so calling it twice will fail.
pub struct WatchUseCase {
    sources: Option<Vec<Box<dyn StreamSource>>>,
    synchronizer: Option<StreamSynchronizer>,
    processor: Option<TripleProcessor>,
    event_sink: Option<Box<dyn EventSink>>,
    display_sink: Option<Box<dyn DisplaySink>>,
    executor: Box<dyn PipelineExecutor>,
    logger: Box<dyn PipelineLogger>,
    display_every: u32,
    poll_interval: Duration,
    max_stall: Option<Duration>,
    clock: SessionClock,
    replay_fps: f64,
    cancelled: Arc<AtomicBool>,
}

impl WatchUseCase {
    /// Validates `config` and loads the gallery from `store`.
    ///
    /// `display_sink` is ignored when the config disables the display.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &SessionConfig,
        store: Box<dyn EmbeddingStore>,
        sources: Vec<Box<dyn StreamSource>>,
        event_sink: Box<dyn EventSink>,
        display_sink: Option<Box<dyn DisplaySink>>,
        executor: Box<dyn PipelineExecutor>,
        logger: Box<dyn PipelineLogger>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;
        let matcher = IdentityMatcher::new(store, config.thresholds, config.identity_name.clone())?;
        let processor = TripleProcessor::new(
            matcher,
            EventThrottler::new(config.throttle_config()),
            config.crop_scale,
            config.recognize_every,
        );

        Ok(Self {
            sources: Some(sources),
            synchronizer: Some(StreamSynchronizer::new(config.sync_window)),
            processor: Some(processor),
            event_sink: Some(event_sink),
            display_sink: display_sink.filter(|_| config.show_display),
            executor,
            logger,
            display_every: config.display_every,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_stall: None,
            clock: SessionClock::Wall,
            replay_fps: config.replay_fps,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        })
    }

    /// Configures the session for sources that replay a recording:
    /// producers wait up to `max_stall` for the other streams, and event
    /// timing follows sequence ids at the configured replay frame rate.
    pub fn with_replay_pacing(mut self, max_stall: Duration) -> Self {
        self.max_stall = Some(max_stall);
        self.clock = SessionClock::FrameRate(self.replay_fps);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Runs until every source has closed or the session is cancelled.
    pub fn execute(&mut self) -> Result<WatchReport, Box<dyn std::error::Error>> {
        let config = ExecutionConfig {
            display_every: self.display_every,
            poll_interval: self.poll_interval,
            max_stall: self.max_stall,
            clock: self.clock,
            cancelled: self.cancelled.clone(),
        };

        let report = self.executor.execute(
            self.sources.take().ok_or("Session already executed")?,
            self.synchronizer.take().ok_or("Session already executed")?,
            self.processor.take().ok_or("Session already executed")?,
            self.event_sink.take().ok_or("Session already executed")?,
            self.display_sink.take(),
            self.logger.as_mut(),
            config,
        )?;

        self.logger.summary(&report);
        Ok(report)
    }
}
