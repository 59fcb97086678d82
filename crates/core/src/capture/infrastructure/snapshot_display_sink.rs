use std::path::{Path, PathBuf};

use crate::capture::domain::display_sink::{AnnotatedFrame, DisplaySink};

/// Keeps a single image file updated with the latest annotated frame,
/// resized to a square of `size` pixels.
pub struct SnapshotDisplaySink {
    path: PathBuf,
    size: u32,
}

impl SnapshotDisplaySink {
    pub fn new(path: impl Into<PathBuf>, size: u32) -> Self {
        Self {
            path: path.into(),
            size: size.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DisplaySink for SnapshotDisplaySink {
    fn show(&mut self, annotated: &AnnotatedFrame) -> Result<(), Box<dyn std::error::Error>> {
        let rendered = annotated.render_boxes();
        if rendered.channels() != 3 {
            return Err(format!("expected an RGB frame, got {} channels", rendered.channels()).into());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let img = image::RgbImage::from_raw(
            rendered.width(),
            rendered.height(),
            rendered.data().to_vec(),
        )
        .ok_or("Failed to create image from frame data")?;
        let img = image::imageops::resize(
            &img,
            self.size,
            self.size,
            image::imageops::FilterType::Triangle,
        );

        // Replace atomically so viewers never read a half-written file.
        let temp_path = self.path.with_extension("part.png");
        img.save_with_format(&temp_path, image::ImageFormat::Png)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
