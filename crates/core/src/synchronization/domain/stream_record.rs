use crate::recognition::domain::embedding::Embedding;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::{Frame, SequenceId};

/// Discriminant of the three independently produced streams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Frame,
    Detections,
    Embeddings,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Frame => write!(f, "frame"),
            StreamKind::Detections => write!(f, "detections"),
            StreamKind::Embeddings => write!(f, "embeddings"),
        }
    }
}

/// Detected face boxes for one producer tick, in detector output order.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionSet {
    pub sequence_id: SequenceId,
    pub boxes: Vec<BoundingBox>,
}

/// One embedding per detection, in the same order as the [`DetectionSet`].
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingSet {
    pub sequence_id: SequenceId,
    pub vectors: Vec<Embedding>,
}

/// A record from any of the three raw streams.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamRecord {
    Frame(Frame),
    Detections(DetectionSet),
    Embeddings(EmbeddingSet),
}

impl StreamRecord {
    pub fn kind(&self) -> StreamKind {
        match self {
            StreamRecord::Frame(_) => StreamKind::Frame,
            StreamRecord::Detections(_) => StreamKind::Detections,
            StreamRecord::Embeddings(_) => StreamKind::Embeddings,
        }
    }

    pub fn sequence_id(&self) -> SequenceId {
        match self {
            StreamRecord::Frame(frame) => frame.sequence_id(),
            StreamRecord::Detections(set) => set.sequence_id,
            StreamRecord::Embeddings(set) => set.sequence_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_sequence_id() {
        let frame = StreamRecord::Frame(Frame::new(vec![0; 3], 1, 1, 3, 4));
        let dets = StreamRecord::Detections(DetectionSet {
            sequence_id: 5,
            boxes: vec![],
        });
        let embs = StreamRecord::Embeddings(EmbeddingSet {
            sequence_id: 6,
            vectors: vec![],
        });

        assert_eq!(frame.kind(), StreamKind::Frame);
        assert_eq!(frame.sequence_id(), 4);
        assert_eq!(dets.kind(), StreamKind::Detections);
        assert_eq!(dets.sequence_id(), 5);
        assert_eq!(embs.kind(), StreamKind::Embeddings);
        assert_eq!(embs.sequence_id(), 6);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(StreamKind::Frame.to_string(), "frame");
        assert_eq!(StreamKind::Embeddings.to_string(), "embeddings");
    }
}
