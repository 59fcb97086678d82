use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::capture::domain::stream_source::{SourceError, SourceEvent, StreamSource};
use crate::synchronization::domain::stream_record::{StreamKind, StreamRecord};

/// Adapts a push channel to [`StreamSource`].
///
/// Producers hold the [`Sender`]; dropping every sender closes the stream.
pub struct ChannelStreamSource {
    kind: StreamKind,
    rx: Receiver<StreamRecord>,
}

impl ChannelStreamSource {
    pub fn new(kind: StreamKind, rx: Receiver<StreamRecord>) -> Self {
        Self { kind, rx }
    }

    /// Creates a source together with its sender half.
    pub fn with_capacity(kind: StreamKind, capacity: usize) -> (Sender<StreamRecord>, Self) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (tx, Self::new(kind, rx))
    }
}

impl StreamSource for ChannelStreamSource {
    fn kind(&self) -> StreamKind {
        self.kind
    }

    fn next_record(&mut self, timeout: Duration) -> Result<SourceEvent, SourceError> {
        match self.rx.recv_timeout(timeout) {
            Ok(record) => Ok(SourceEvent::Record(record)),
            Err(RecvTimeoutError::Timeout) => Ok(SourceEvent::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(SourceEvent::Closed),
        }
    }
}
