use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::events::domain::event::Event;
use crate::events::domain::event_sink::EventSink;
use crate::shared::frame::Frame;

/// Writes each event crop as a JPEG into a local directory.
pub struct ImageFileEventSink {
    dir: PathBuf,
    saved_count: u64,
    last_saved: Option<PathBuf>,
}

impl ImageFileEventSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            saved_count: 0,
            last_saved: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn saved_count(&self) -> u64 {
        self.saved_count
    }

    pub fn last_saved(&self) -> Option<&Path> {
        self.last_saved.as_deref()
    }
}

impl EventSink for ImageFileEventSink {
    fn save(&mut self, event: &Event, crop: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if crop.channels() != 3 {
            return Err(format!("expected an RGB crop, got {} channels", crop.channels()).into());
        }
        std::fs::create_dir_all(&self.dir)?;

        let unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = self
            .dir
            .join(format!("{}.jpg", event.file_stem(unix_secs)));

        let img = image::RgbImage::from_raw(crop.width(), crop.height(), crop.data().to_vec())
            .ok_or("Failed to create image from crop data")?;
        img.save(&path)?;

        log::info!("Saved event for {} to {}", event.label, path.display());
        self.saved_count += 1;
        self.last_saved = Some(path);
        Ok(())
    }
}
