//! Replays a recorded detection or embedding stream from a JSON Lines file.
//!
//! Detection lines: `{"sequence_id": 7, "boxes": [{"xmin": 0.1, "ymin": 0.2, "xmax": 0.4, "ymax": 0.6}]}`
//! Embedding lines: `{"sequence_id": 7, "vectors": [[0.12, -0.5, ...]]}`

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::capture::domain::stream_source::{SourceError, SourceEvent, StreamSource};
use crate::recognition::domain::embedding::Embedding;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::SequenceId;
use crate::synchronization::domain::stream_record::{
    DetectionSet, EmbeddingSet, StreamKind, StreamRecord,
};

#[derive(Deserialize)]
struct DetectionLine {
    sequence_id: SequenceId,
    #[serde(default)]
    boxes: Vec<BoundingBox>,
}

#[derive(Deserialize)]
struct EmbeddingLine {
    sequence_id: SequenceId,
    #[serde(default)]
    vectors: Vec<Embedding>,
}

pub struct JsonLinesSource {
    kind: StreamKind,
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: usize,
    finished: bool,
}

impl JsonLinesSource {
    pub fn open(path: &Path, kind: StreamKind) -> Result<Self, SourceError> {
        if kind == StreamKind::Frame {
            return Err(SourceError::UnsupportedKind(kind));
        }
        let file = File::open(path).map_err(|e| SourceError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            kind,
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_number: 0,
            finished: false,
        })
    }

    fn parse(&self, line: &str) -> Result<StreamRecord, SourceError> {
        let parse_err = |e| SourceError::Parse {
            path: self.path.clone(),
            line: self.line_number,
            source: e,
        };
        match self.kind {
            StreamKind::Detections => {
                let parsed: DetectionLine = serde_json::from_str(line).map_err(parse_err)?;
                Ok(StreamRecord::Detections(DetectionSet {
                    sequence_id: parsed.sequence_id,
                    boxes: parsed.boxes,
                }))
            }
            StreamKind::Embeddings => {
                let parsed: EmbeddingLine = serde_json::from_str(line).map_err(parse_err)?;
                Ok(StreamRecord::Embeddings(EmbeddingSet {
                    sequence_id: parsed.sequence_id,
                    vectors: parsed.vectors,
                }))
            }
            StreamKind::Frame => Err(SourceError::UnsupportedKind(self.kind)),
        }
    }
}

impl StreamSource for JsonLinesSource {
    fn kind(&self) -> StreamKind {
        self.kind
    }

    fn next_record(&mut self, _timeout: Duration) -> Result<SourceEvent, SourceError> {
        if self.finished {
            return Ok(SourceEvent::Closed);
        }
        loop {
            let Some(line) = self.lines.next() else {
                self.finished = true;
                return Ok(SourceEvent::Closed);
            };
            self.line_number += 1;
            let line = line.map_err(|e| {
                self.finished = true;
                SourceError::Io {
                    path: self.path.clone(),
                    source: e,
                }
            })?;
            if line.trim().is_empty() {
                continue;
            }
            return self.parse(&line).map(SourceEvent::Record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TIMEOUT: Duration = Duration::from_millis(1);

    fn write_lines(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    fn expect_record(source: &mut JsonLinesSource) -> StreamRecord {
        match source.next_record(TIMEOUT).unwrap() {
            SourceEvent::Record(record) => record,
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn test_reads_detections() {
        let file = write_lines(&[
            r#"{"sequence_id": 7, "boxes": [{"xmin": 0.1, "ymin": 0.2, "xmax": 0.4, "ymax": 0.6}]}"#,
            "",
            r#"{"sequence_id": 8}"#,
        ]);
        let mut source = JsonLinesSource::open(file.path(), StreamKind::Detections).unwrap();

        match expect_record(&mut source) {
            StreamRecord::Detections(set) => {
                assert_eq!(set.sequence_id, 7);
                assert_eq!(set.boxes, vec![BoundingBox::new(0.1, 0.2, 0.4, 0.6)]);
            }
            other => panic!("unexpected record {other:?}"),
        }
        match expect_record(&mut source) {
            StreamRecord::Detections(set) => {
                assert_eq!(set.sequence_id, 8);
                assert!(set.boxes.is_empty());
            }
            other => panic!("unexpected record {other:?}"),
        }
        assert!(matches!(
            source.next_record(TIMEOUT).unwrap(),
            SourceEvent::Closed
        ));
    }

    #[test]
    fn test_reads_embeddings() {
        let file = write_lines(&[r#"{"sequence_id": 3, "vectors": [[0.5, -0.25]]}"#]);
        let mut source = JsonLinesSource::open(file.path(), StreamKind::Embeddings).unwrap();

        match expect_record(&mut source) {
            StreamRecord::Embeddings(set) => assert_eq!(set.vectors, vec![vec![0.5, -0.25]]),
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn test_bad_line_is_reported_and_skipped() {
        let file = write_lines(&["{oops", r#"{"sequence_id": 2, "vectors": []}"#]);
        let mut source = JsonLinesSource::open(file.path(), StreamKind::Embeddings).unwrap();

        let err = source.next_record(TIMEOUT).unwrap_err();
        assert!(matches!(err, SourceError::Parse { line: 1, .. }));
        assert_eq!(expect_record(&mut source).sequence_id(), 2);
    }

    #[test]
    fn test_frame_kind_unsupported() {
        let file = write_lines(&[]);
        assert!(matches!(
            JsonLinesSource::open(file.path(), StreamKind::Frame),
            Err(SourceError::UnsupportedKind(StreamKind::Frame))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            JsonLinesSource::open(Path::new("/nonexistent/dets.jsonl"), StreamKind::Detections),
            Err(SourceError::Io { .. })
        ));
    }
}
