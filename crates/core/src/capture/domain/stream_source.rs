use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::synchronization::domain::stream_record::{StreamKind, StreamRecord};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{0} records are not supported by this source")]
    UnsupportedKind(StreamKind),
}

/// Outcome of waiting on a source.
#[derive(Debug)]
pub enum SourceEvent {
    Record(StreamRecord),
    /// Nothing arrived within the timeout; the stream is still open.
    Idle,
    /// The stream has ended and will produce nothing more.
    Closed,
}

/// One raw producer stream (frames, detections or embeddings).
///
/// Records must be delivered in non-decreasing sequence order. A source
/// error affects only the record it was produced for; the caller keeps
/// reading until `Closed`.
pub trait StreamSource: Send {
    fn kind(&self) -> StreamKind;

    /// Waits at most `timeout` for the next record.
    fn next_record(&mut self, timeout: Duration) -> Result<SourceEvent, SourceError>;

    /// Releases any resources held by the source.
    fn close(&mut self) {}
}
