use thiserror::Error;

use crate::recognition::domain::embedding::Embedding;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::{Frame, SequenceId};
use crate::synchronization::domain::stream_record::{DetectionSet, EmbeddingSet};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TripleError {
    #[error("sequence {sequence_id}: {detections} detections but {embeddings} embeddings")]
    CardinalityMismatch {
        sequence_id: SequenceId,
        detections: usize,
        embeddings: usize,
    },
    #[error("sequence mismatch: frame {frame}, detections {detections}, embeddings {embeddings}")]
    SequenceMismatch {
        frame: SequenceId,
        detections: SequenceId,
        embeddings: SequenceId,
    },
    #[error("sequence {sequence_id}: frame holds {actual} bytes, {width}x{height}x{channels} needs {expected}")]
    FrameSize {
        sequence_id: SequenceId,
        width: u32,
        height: u32,
        channels: u8,
        expected: usize,
        actual: usize,
    },
}

/// A fully assembled (frame, detections, embeddings) unit for one tick.
///
/// Detection `i` and embedding `i` describe the same face.
#[derive(Clone, Debug)]
pub struct Triple {
    sequence_id: SequenceId,
    frame: Frame,
    detections: Vec<BoundingBox>,
    embeddings: Vec<Embedding>,
}

impl Triple {
    pub fn new(
        frame: Frame,
        detections: DetectionSet,
        embeddings: EmbeddingSet,
    ) -> Result<Self, TripleError> {
        let sequence_id = frame.sequence_id();
        if detections.sequence_id != sequence_id || embeddings.sequence_id != sequence_id {
            return Err(TripleError::SequenceMismatch {
                frame: sequence_id,
                detections: detections.sequence_id,
                embeddings: embeddings.sequence_id,
            });
        }
        if !frame.is_well_formed() {
            return Err(TripleError::FrameSize {
                sequence_id,
                width: frame.width(),
                height: frame.height(),
                channels: frame.channels(),
                expected: frame.expected_len(),
                actual: frame.data().len(),
            });
        }
        if detections.boxes.len() != embeddings.vectors.len() {
            return Err(TripleError::CardinalityMismatch {
                sequence_id,
                detections: detections.boxes.len(),
                embeddings: embeddings.vectors.len(),
            });
        }
        Ok(Self {
            sequence_id,
            frame,
            detections: detections.boxes,
            embeddings: embeddings.vectors,
        })
    }

    pub fn sequence_id(&self) -> SequenceId {
        self.sequence_id
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn detections(&self) -> &[BoundingBox] {
        &self.detections
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Detection boxes paired with their embeddings, in stream order.
    pub fn faces(&self) -> impl Iterator<Item = (&BoundingBox, &Embedding)> {
        self.detections.iter().zip(self.embeddings.iter())
    }

    pub fn into_frame(self) -> Frame {
        self.frame
    }
}
