use std::time::Instant;

use crate::pipeline::pipeline_executor::WatchReport;
use crate::shared::frame::SequenceId;

/// Cross-cutting logger for watch session events.
///
/// Use cases report through this trait instead of writing to a specific
/// output, so the CLI and tests can each observe a session differently.
pub trait PipelineLogger: Send {
    /// Called once per processed triple.
    fn triple(&mut self, sequence_id: SequenceId, faces: usize, events: usize, process_ms: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self, _report: &WatchReport) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn triple(&mut self, _sequence_id: SequenceId, _faces: usize, _events: usize, _ms: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI-oriented logger: a progress line every `progress_every` triples and
/// a breakdown of the session's counters at the end.
pub struct StdoutPipelineLogger {
    progress_every: u64,
    start_time: Instant,
    processed: u64,
    faces: u64,
    events: u64,
    last_sequence: Option<SequenceId>,
    process_ms_total: f64,
    process_ms_max: f64,
}

impl StdoutPipelineLogger {
    pub fn new(progress_every: u64) -> Self {
        Self {
            progress_every: progress_every.max(1),
            start_time: Instant::now(),
            processed: 0,
            faces: 0,
            events: 0,
            last_sequence: None,
            process_ms_total: 0.0,
            process_ms_max: 0.0,
        }
    }

    pub fn summary_string(&self, report: &WatchReport) -> String {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Session summary ({} triples, {elapsed:.1}s):",
            report.triples_processed
        )];

        let p = report.processor;
        lines.push(format!(
            "  faces:   {} seen, {} matched, {} failed",
            p.faces_seen, p.faces_matched, p.match_failures
        ));
        lines.push(format!(
            "  events:  {} fired, {} saved, {} failed",
            report.events_fired, report.events_saved, report.sink_failures
        ));
        let s = report.sync;
        lines.push(format!(
            "  streams: {} records, {} gaps, {} stale, {} malformed, {} source errors",
            report.records_received, s.gaps, s.stale, s.malformed, report.source_errors
        ));
        if report.frames_shown > 0 || report.display_failures > 0 {
            lines.push(format!(
                "  display: {} shown, {} failed",
                report.frames_shown, report.display_failures
            ));
        }
        if report.enrollment_write_failures > 0 {
            lines.push(format!(
                "  enrollment writes failed: {}",
                report.enrollment_write_failures
            ));
        }
        if self.processed > 0 {
            lines.push(format!(
                "  process: avg {:.2}ms, max {:.2}ms",
                self.process_ms_total / self.processed as f64,
                self.process_ms_max
            ));
        }
        lines.join("\n")
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn triple(&mut self, sequence_id: SequenceId, faces: usize, events: usize, process_ms: f64) {
        self.processed += 1;
        self.faces += faces as u64;
        self.events += events as u64;
        self.last_sequence = Some(sequence_id);
        self.process_ms_total += process_ms;
        self.process_ms_max = self.process_ms_max.max(process_ms);

        if self.processed % self.progress_every == 0 {
            log::info!(
                "Processed {} triples up to sequence {sequence_id} ({} faces, {} events)",
                self.processed,
                self.faces,
                self.events
            );
        }
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self, report: &WatchReport) {
        log::info!("\n\n{}", self.summary_string(report));
        if report.sink_failures > 0 || report.enrollment_write_failures > 0 {
            log::warn!(
                "{} event(s) and {} enrollment(s) could not be persisted",
                report.sink_failures,
                report.enrollment_write_failures
            );
        }
    }
}
