//! Per-triple data flow: denormalize each detection, resolve its identity,
//! throttle the sighting and cut the crop for any event that fires.

use std::time::Duration;

use crate::capture::domain::display_sink::{AnnotatedFrame, Overlay};
use crate::events::domain::crop::{crop_region, extract_crop};
use crate::events::domain::event::Event;
use crate::events::domain::event_throttler::EventThrottler;
use crate::recognition::domain::identity_matcher::IdentityMatcher;
use crate::recognition::domain::match_result::MatchResult;
use crate::shared::frame::{Frame, SequenceId};
use crate::shared::region::Region;
use crate::synchronization::domain::triple::Triple;

/// One detection of a processed triple, in detector order.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceSighting {
    pub region: Region,
    /// `None` when matching was skipped or failed for this face.
    pub result: Option<MatchResult>,
}

impl FaceSighting {
    pub fn overlay(&self) -> Overlay {
        let text = self
            .result
            .as_ref()
            .map(|r| format!("{} {:.0}%", r.label, r.confidence * 100.0));
        Overlay::new(self.region, text)
    }
}

/// An event together with the pixels to persist for it.
#[derive(Clone, Debug)]
pub struct SavedEvent {
    pub event: Event,
    pub crop: Frame,
}

#[derive(Clone, Debug)]
pub struct ProcessedTriple {
    pub sequence_id: SequenceId,
    pub sightings: Vec<FaceSighting>,
    pub events: Vec<SavedEvent>,
}

impl ProcessedTriple {
    pub fn annotate(&self, frame: Frame) -> AnnotatedFrame {
        AnnotatedFrame {
            frame,
            overlays: self.sightings.iter().map(FaceSighting::overlay).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub faces_seen: u64,
    pub faces_matched: u64,
    pub match_failures: u64,
    pub events_fired: u64,
}

pub struct TripleProcessor {
    matcher: IdentityMatcher,
    throttler: EventThrottler,
    crop_scale: f64,
    recognize_every: u64,
    stats: ProcessorStats,
}

impl TripleProcessor {
    pub fn new(
        matcher: IdentityMatcher,
        throttler: EventThrottler,
        crop_scale: f64,
        recognize_every: u32,
    ) -> Self {
        Self {
            matcher,
            throttler,
            crop_scale,
            recognize_every: u64::from(recognize_every.max(1)),
            stats: ProcessorStats::default(),
        }
    }

    /// Runs every face of `triple` through matching and throttling.
    ///
    /// A face whose embedding cannot be matched is skipped with a warning;
    /// the rest of the triple is still processed.
    pub fn process(&mut self, triple: &Triple, timestamp: Duration) -> ProcessedTriple {
        let frame = triple.frame();
        let (frame_w, frame_h) = (frame.width(), frame.height());
        let mut sightings = Vec::with_capacity(triple.detections().len());
        let mut events = Vec::new();

        for (bbox, embedding) in triple.faces() {
            let region = bbox.to_region(frame_w, frame_h);
            let due = self.stats.faces_seen % self.recognize_every == 0;
            self.stats.faces_seen += 1;
            if !due {
                sightings.push(FaceSighting {
                    region,
                    result: None,
                });
                continue;
            }

            let result = match self.matcher.match_embedding(embedding) {
                Ok(result) => result,
                Err(e) => {
                    log::warn!("Skipping face in sequence {}: {e}", triple.sequence_id());
                    self.stats.match_failures += 1;
                    sightings.push(FaceSighting {
                        region,
                        result: None,
                    });
                    continue;
                }
            };
            self.stats.faces_matched += 1;
            log::debug!(
                "Sequence {}: {} ({}, similarity {:.3})",
                triple.sequence_id(),
                result.label,
                result.decision,
                result.similarity
            );

            if let Some(event) = self
                .throttler
                .observe(&result.label, timestamp, result.confidence)
            {
                let crop_rect = crop_region(&region, self.crop_scale, frame_w, frame_h)
                    .unwrap_or(Region {
                        x: 0,
                        y: 0,
                        width: frame_w as i32,
                        height: frame_h as i32,
                    });
                events.push(SavedEvent {
                    event: event.with_source(triple.sequence_id(), crop_rect),
                    crop: extract_crop(frame, &crop_rect),
                });
                self.stats.events_fired += 1;
            }
            sightings.push(FaceSighting {
                region,
                result: Some(result),
            });
        }

        ProcessedTriple {
            sequence_id: triple.sequence_id(),
            sightings,
            events,
        }
    }

    pub fn matcher(&self) -> &IdentityMatcher {
        &self.matcher
    }

    pub fn throttler(&self) -> &EventThrottler {
        &self.throttler
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::domain::event_throttler::ThrottleConfig;
    use crate::recognition::domain::embedding_store::Gallery;
    use crate::recognition::domain::match_result::{MatchDecision, MatchThresholds};
    use crate::recognition::infrastructure::in_memory_embedding_store::InMemoryEmbeddingStore;
    use crate::shared::bounding_box::BoundingBox;
    use crate::synchronization::domain::stream_record::{DetectionSet, EmbeddingSet};
    use approx::assert_relative_eq;

    fn processor(gallery: Gallery, warm_up: u32, recognize_every: u32) -> TripleProcessor {
        let store = Box::new(InMemoryEmbeddingStore::with_gallery(gallery));
        let matcher = IdentityMatcher::new(store, MatchThresholds::default(), None).unwrap();
        let throttler = EventThrottler::new(ThrottleConfig {
            warm_up_count: warm_up,
            cooldown: Duration::from_secs(5),
        });
        TripleProcessor::new(matcher, throttler, 1.5, recognize_every)
    }

    fn alice_gallery() -> Gallery {
        Gallery::from([("alice".to_string(), vec![vec![1.0, 0.0]])])
    }

    fn triple(seq: SequenceId, faces: Vec<(BoundingBox, Vec<f32>)>) -> Triple {
        let frame = Frame::new(vec![0u8; 100 * 100 * 3], 100, 100, 3, seq);
        let (boxes, vectors): (Vec<_>, Vec<_>) = faces.into_iter().unzip();
        Triple::new(
            frame,
            DetectionSet {
                sequence_id: seq,
                boxes,
            },
            EmbeddingSet {
                sequence_id: seq,
                vectors,
            },
        )
        .unwrap()
    }

    fn centered_box() -> BoundingBox {
        BoundingBox::new(0.4, 0.4, 0.6, 0.6)
    }

    #[test]
    fn test_confirmed_match_is_reported() {
        let mut p = processor(alice_gallery(), 10, 1);
        // cos = 0.85 against [1, 0]
        let query = vec![0.85, (1.0f32 - 0.85 * 0.85).sqrt()];

        let out = p.process(&triple(7, vec![(centered_box(), query)]), Duration::ZERO);

        assert_eq!(out.sequence_id, 7);
        let result = out.sightings[0].result.as_ref().unwrap();
        assert_eq!(result.label, "alice");
        assert_eq!(result.decision, MatchDecision::Confirmed);
        assert_relative_eq!(result.confidence, 0.85, epsilon = 1e-5);
        assert_eq!(p.matcher().reference_count("alice"), 1);
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_empty_triple_produces_nothing() {
        let mut p = processor(alice_gallery(), 1, 1);
        let out = p.process(&triple(12, vec![]), Duration::ZERO);
        assert!(out.sightings.is_empty());
        assert!(out.events.is_empty());
        assert_eq!(p.stats(), ProcessorStats::default());
    }

    #[test]
    fn test_event_carries_scaled_crop() {
        let mut p = processor(alice_gallery(), 1, 1);
        let out = p.process(
            &triple(3, vec![(centered_box(), vec![1.0, 0.0])]),
            Duration::from_secs(1),
        );

        assert_eq!(out.events.len(), 1);
        let saved = &out.events[0];
        assert_eq!(saved.event.label, "alice");
        assert_eq!(saved.event.sequence_id, Some(3));
        // 20x20 box at (40, 40) grown by 1.5 around its center.
        let crop = saved.event.crop.unwrap();
        assert_eq!((crop.width, crop.height), (30, 30));
        assert_eq!((saved.crop.width(), saved.crop.height()), (30, 30));
        assert_eq!(p.stats().events_fired, 1);
    }

    #[test]
    fn test_recognize_every_skips_faces() {
        let mut p = processor(alice_gallery(), 10, 2);
        let faces = vec![
            (centered_box(), vec![1.0, 0.0]),
            (centered_box(), vec![1.0, 0.0]),
            (centered_box(), vec![1.0, 0.0]),
        ];
        let out = p.process(&triple(1, faces), Duration::ZERO);

        let matched: Vec<bool> = out.sightings.iter().map(|s| s.result.is_some()).collect();
        assert_eq!(matched, vec![true, false, true]);
        assert_eq!(p.stats().faces_seen, 3);
        assert_eq!(p.stats().faces_matched, 2);
    }

    #[test]
    fn test_dimension_mismatch_skips_only_that_face() {
        let mut p = processor(alice_gallery(), 10, 1);
        let faces = vec![
            (centered_box(), vec![1.0, 0.0, 0.0]),
            (centered_box(), vec![1.0, 0.0]),
        ];
        let out = p.process(&triple(1, faces), Duration::ZERO);

        assert!(out.sightings[0].result.is_none());
        assert_eq!(out.sightings[1].result.as_ref().unwrap().label, "alice");
        assert_eq!(p.stats().match_failures, 1);
    }

    #[test]
    fn test_unknown_face_is_enrolled() {
        let mut p = processor(alice_gallery(), 10, 1);
        let out = p.process(&triple(1, vec![(centered_box(), vec![0.0, 1.0])]), Duration::ZERO);

        let result = out.sightings[0].result.as_ref().unwrap();
        assert_eq!(result.decision, MatchDecision::Unknown);
        assert_ne!(result.label, "alice");
        assert_eq!(p.matcher().identity_count(), 2);
    }

    #[test]
    fn test_annotate_labels_matched_faces() {
        let mut p = processor(alice_gallery(), 10, 2);
        let faces = vec![
            (centered_box(), vec![1.0, 0.0]),
            (centered_box(), vec![1.0, 0.0]),
        ];
        let t = triple(1, faces);
        let out = p.process(&t, Duration::ZERO);
        let annotated = out.annotate(t.into_frame());

        assert_eq!(annotated.overlays.len(), 2);
        assert_eq!(annotated.overlays[0].text.as_deref(), Some("alice 100%"));
        assert_eq!(annotated.overlays[0].text_origin, (50, 75));
        assert!(annotated.overlays[1].text.is_none());
    }
}
