use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::domain::stream_source::{SourceError, SourceEvent, StreamSource};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::{Frame, SequenceId};
use crate::synchronization::domain::stream_record::{StreamKind, StreamRecord};

/// Replays a recorded frame stream from a directory of images.
///
/// Each file is named by its sequence id (`000123.png`); files whose stem is
/// not a number are ignored. Frames are delivered in sequence order.
pub struct ImageDirectorySource {
    pending: std::vec::IntoIter<(SequenceId, PathBuf)>,
}

impl ImageDirectorySource {
    pub fn open(dir: &Path) -> Result<Self, SourceError> {
        let io_err = |e| SourceError::Io {
            path: dir.to_path_buf(),
            source: e,
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !is_image(&path) {
                continue;
            }
            let Some(seq) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<SequenceId>().ok())
            else {
                log::debug!("Ignoring {}: name is not a sequence id", path.display());
                continue;
            };
            files.push((seq, path));
        }
        files.sort();
        log::info!("Found {} frames in {}", files.len(), dir.display());
        Ok(Self {
            pending: files.into_iter(),
        })
    }

    /// Sequence ids still to be delivered.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl StreamSource for ImageDirectorySource {
    fn kind(&self) -> StreamKind {
        StreamKind::Frame
    }

    fn next_record(&mut self, _timeout: Duration) -> Result<SourceEvent, SourceError> {
        let Some((seq, path)) = self.pending.next() else {
            return Ok(SourceEvent::Closed);
        };
        let img = image::open(&path)
            .map_err(|e| SourceError::Image {
                path: path.clone(),
                source: e,
            })?
            .to_rgb8();
        let (width, height) = img.dimensions();
        let frame = Frame::new(img.into_raw(), width, height, 3, seq);
        Ok(SourceEvent::Record(StreamRecord::Frame(frame)))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
