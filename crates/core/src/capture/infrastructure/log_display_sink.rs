use crate::capture::domain::display_sink::{AnnotatedFrame, DisplaySink};

/// Headless display: logs each annotated frame's overlay text.
#[derive(Default)]
pub struct LogDisplaySink {
    shown: usize,
}

impl LogDisplaySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> usize {
        self.shown
    }
}

impl DisplaySink for LogDisplaySink {
    fn show(&mut self, annotated: &AnnotatedFrame) -> Result<(), Box<dyn std::error::Error>> {
        let texts: Vec<&str> = annotated
            .overlays
            .iter()
            .filter_map(|o| o.text.as_deref())
            .collect();
        log::debug!(
            "Frame {}: {} face(s) [{}]",
            annotated.frame.sequence_id(),
            annotated.overlays.len(),
            texts.join(", ")
        );
        self.shown += 1;
        Ok(())
    }
}
