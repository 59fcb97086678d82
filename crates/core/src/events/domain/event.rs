use std::time::Duration;

use crate::shared::frame::SequenceId;
use crate::shared::region::Region;

/// A save-worthy sighting of an identity, handed to the storage sink.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub label: String,
    pub confidence: f64,
    /// Time of the observation, relative to the start of the session.
    pub timestamp: Duration,
    pub sequence_id: Option<SequenceId>,
    /// Pixel rectangle of the saved crop within its frame.
    pub crop: Option<Region>,
}

impl Event {
    pub fn new(label: &str, confidence: f64, timestamp: Duration) -> Self {
        Self {
            label: label.to_string(),
            confidence,
            timestamp,
            sequence_id: None,
            crop: None,
        }
    }

    /// Attaches the tick and crop rectangle the event was observed in.
    pub fn with_source(mut self, sequence_id: SequenceId, crop: Region) -> Self {
        self.sequence_id = Some(sequence_id);
        self.crop = Some(crop);
        self
    }

    /// File stem for persisted crops: `{label}_{unix_secs}_{sequence}`.
    pub fn file_stem(&self, unix_secs: u64) -> String {
        match self.sequence_id {
            Some(seq) => format!("{}_{unix_secs}_{seq}", self.label),
            None => format!("{}_{unix_secs}", self.label),
        }
    }
}
