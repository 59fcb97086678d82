//! Reassembles the frame, detection and embedding streams into triples.
//!
//! Each stream delivers records in non-decreasing sequence order, but the
//! streams are not synchronized with each other. Partial state is buffered
//! per stream kind until all parts of a tick have arrived; anything older
//! than an emitted tick is discarded, so emission is strictly increasing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::shared::frame::{Frame, SequenceId};
use crate::synchronization::domain::stream_record::{
    DetectionSet, EmbeddingSet, StreamKind, StreamRecord,
};
use crate::synchronization::domain::triple::Triple;

/// Counters describing what the synchronizer has emitted and dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Triples returned by `poll`.
    pub emitted: u64,
    /// Sequence ids discarded before all of their parts arrived.
    pub gaps: u64,
    /// Records that arrived for a sequence id at or below an emitted or
    /// evicted one.
    pub stale: u64,
    /// Completed ticks whose detection and embedding counts disagreed.
    pub malformed: u64,
}

#[derive(Default)]
struct PendingState {
    frames: BTreeMap<SequenceId, Frame>,
    detections: BTreeMap<SequenceId, DetectionSet>,
    embeddings: BTreeMap<SequenceId, EmbeddingSet>,
    last_emitted: Option<SequenceId>,
    /// Newest sequence id dropped by window eviction.
    last_evicted: Option<SequenceId>,
    stats: SyncStats,
}

impl PendingState {
    /// Records at or below this sequence id can never be emitted.
    fn horizon(&self) -> Option<SequenceId> {
        self.last_emitted.max(self.last_evicted)
    }

    fn is_complete(&self, seq: SequenceId) -> bool {
        let Some(dets) = self.detections.get(&seq) else {
            return false;
        };
        // A tick without detections produces no embedding record upstream.
        self.frames.contains_key(&seq)
            && (dets.boxes.is_empty() || self.embeddings.contains_key(&seq))
    }

    fn oldest_complete(&self) -> Option<SequenceId> {
        self.frames
            .keys()
            .copied()
            .find(|&seq| self.is_complete(seq))
    }

    fn len_of(&self, kind: StreamKind) -> usize {
        match kind {
            StreamKind::Frame => self.frames.len(),
            StreamKind::Detections => self.detections.len(),
            StreamKind::Embeddings => self.embeddings.len(),
        }
    }

    fn oldest_of(&self, kind: StreamKind) -> Option<SequenceId> {
        match kind {
            StreamKind::Frame => self.frames.keys().next().copied(),
            StreamKind::Detections => self.detections.keys().next().copied(),
            StreamKind::Embeddings => self.embeddings.keys().next().copied(),
        }
    }

    fn remove_all(&mut self, seq: SequenceId) {
        self.frames.remove(&seq);
        self.detections.remove(&seq);
        self.embeddings.remove(&seq);
    }

    /// Drops every pending part older than `seq` and returns how many
    /// distinct sequence ids were discarded.
    fn purge_older_than(&mut self, seq: SequenceId) -> usize {
        let mut dropped: BTreeSet<SequenceId> = BTreeSet::new();
        dropped.extend(split_older(&mut self.frames, seq));
        dropped.extend(split_older(&mut self.detections, seq));
        dropped.extend(split_older(&mut self.embeddings, seq));
        dropped.len()
    }
}

fn split_older<V>(map: &mut BTreeMap<SequenceId, V>, seq: SequenceId) -> Vec<SequenceId> {
    let newer = map.split_off(&seq);
    let older = std::mem::replace(map, newer);
    older.into_keys().collect()
}

/// Thread-safe buffer that merges three sequence-tagged streams.
///
/// `add_record` may be called concurrently from one producer per stream;
/// the critical section is a map insert plus bounded eviction. `poll` is
/// intended for a single consumer.
pub struct StreamSynchronizer {
    window: usize,
    state: Mutex<PendingState>,
}

impl StreamSynchronizer {
    /// `window` is the number of pending sequence ids retained per stream
    /// kind before the oldest is evicted.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            state: Mutex::new(PendingState::default()),
        }
    }

    pub fn add_record(&self, record: StreamRecord) {
        let kind = record.kind();
        let seq = record.sequence_id();
        let mut state = self.lock();

        if state.horizon().is_some_and(|horizon| seq <= horizon) {
            state.stats.stale += 1;
            log::trace!("Dropping stale {kind} record for sequence {seq}");
            return;
        }

        let replaced = match record {
            StreamRecord::Frame(frame) => state.frames.insert(seq, frame).is_some(),
            StreamRecord::Detections(set) => state.detections.insert(seq, set).is_some(),
            StreamRecord::Embeddings(set) => state.embeddings.insert(seq, set).is_some(),
        };
        if replaced {
            log::debug!("Duplicate {kind} record for sequence {seq}, keeping the newest");
        }

        while state.len_of(kind) > self.window {
            let Some(oldest) = state.oldest_of(kind) else {
                break;
            };
            // Each stream is ordered, so nothing older than the evicted id
            // can complete either.
            let older = state.purge_older_than(oldest);
            state.remove_all(oldest);
            state.last_evicted = state.last_evicted.max(Some(oldest));
            state.stats.gaps += 1 + older as u64;
            log::debug!("Evicted incomplete sequence {oldest} ({kind} window full)");
        }
    }

    /// Returns the oldest complete triple, discarding all older partial state.
    ///
    /// A tick whose detection set is empty is complete without an embedding
    /// record. Such a tick can therefore complete while an older tick with
    /// faces still waits for its embeddings; emitting it drops that older
    /// tick as a gap, and its embeddings are counted stale when they arrive.
    pub fn poll(&self) -> Option<Triple> {
        let mut state = self.lock();
        loop {
            let seq = state.oldest_complete()?;
            let dropped = state.purge_older_than(seq);
            if dropped > 0 {
                state.stats.gaps += dropped as u64;
                log::debug!("Dropped {dropped} incomplete sequence(s) older than {seq}");
            }

            let frame = state.frames.remove(&seq)?;
            let detections = state.detections.remove(&seq)?;
            let embeddings = state
                .embeddings
                .remove(&seq)
                .unwrap_or(EmbeddingSet {
                    sequence_id: seq,
                    vectors: Vec::new(),
                });
            state.last_emitted = Some(seq);

            match Triple::new(frame, detections, embeddings) {
                Ok(triple) => {
                    state.stats.emitted += 1;
                    return Some(triple);
                }
                Err(e) => {
                    state.stats.malformed += 1;
                    log::warn!("Discarding malformed triple: {e}");
                }
            }
        }
    }

    pub fn stats(&self) -> SyncStats {
        self.lock().stats
    }

    /// Number of distinct sequence ids with at least one buffered part.
    pub fn pending(&self) -> usize {
        let state = self.lock();
        let mut ids: BTreeSet<SequenceId> = state.frames.keys().copied().collect();
        ids.extend(state.detections.keys().copied());
        ids.extend(state.embeddings.keys().copied());
        ids.len()
    }

    /// Whether a record of `kind` can be buffered without evicting an
    /// incomplete sequence.
    pub fn has_room(&self, kind: StreamKind) -> bool {
        self.lock().len_of(kind) < self.window
    }

    fn lock(&self) -> MutexGuard<'_, PendingState> {
        // Every critical section leaves the maps consistent, so a panic in
        // another holder does not invalidate the state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::BoundingBox;
    use std::sync::Arc;

    fn frame(seq: SequenceId) -> StreamRecord {
        StreamRecord::Frame(Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, 3, seq))
    }

    fn dets(seq: SequenceId, n: usize) -> StreamRecord {
        StreamRecord::Detections(DetectionSet {
            sequence_id: seq,
            boxes: vec![BoundingBox::new(0.2, 0.2, 0.6, 0.6); n],
        })
    }

    fn embs(seq: SequenceId, n: usize) -> StreamRecord {
        StreamRecord::Embeddings(EmbeddingSet {
            sequence_id: seq,
            vectors: vec![vec![0.6, 0.8]; n],
        })
    }

    fn add_complete(sync: &StreamSynchronizer, seq: SequenceId, n: usize) {
        sync.add_record(frame(seq));
        sync.add_record(dets(seq, n));
        sync.add_record(embs(seq, n));
    }

    #[test]
    fn test_poll_empty_returns_none() {
        let sync = StreamSynchronizer::new(4);
        assert!(sync.poll().is_none());
    }

    #[test]
    fn test_partial_tick_is_not_emitted() {
        let sync = StreamSynchronizer::new(4);
        sync.add_record(frame(1));
        sync.add_record(dets(1, 1));
        assert!(sync.poll().is_none());

        sync.add_record(embs(1, 1));
        let triple = sync.poll().unwrap();
        assert_eq!(triple.sequence_id(), 1);
        assert_eq!(triple.faces().count(), 1);
    }

    #[test]
    fn test_arrival_order_across_streams_does_not_matter() {
        let sync = StreamSynchronizer::new(4);
        sync.add_record(embs(7, 1));
        sync.add_record(dets(7, 1));
        assert!(sync.poll().is_none());
        sync.add_record(frame(7));
        assert_eq!(sync.poll().unwrap().sequence_id(), 7);
    }

    #[test]
    fn test_emits_in_increasing_order() {
        let sync = StreamSynchronizer::new(8);
        sync.add_record(frame(1));
        sync.add_record(frame(2));
        sync.add_record(dets(1, 0));
        sync.add_record(dets(2, 0));

        assert_eq!(sync.poll().unwrap().sequence_id(), 1);
        assert_eq!(sync.poll().unwrap().sequence_id(), 2);
        assert!(sync.poll().is_none());
    }

    #[test]
    fn test_never_emits_same_sequence_twice() {
        let sync = StreamSynchronizer::new(4);
        add_complete(&sync, 3, 1);
        assert_eq!(sync.poll().unwrap().sequence_id(), 3);

        // Late duplicates of an emitted tick are stale.
        add_complete(&sync, 3, 1);
        assert!(sync.poll().is_none());
        assert_eq!(sync.stats().stale, 3);
    }

    #[test]
    fn test_newer_completion_discards_older_partials() {
        let sync = StreamSynchronizer::new(8);
        sync.add_record(frame(1));
        sync.add_record(dets(1, 1));
        add_complete(&sync, 2, 1);

        assert_eq!(sync.poll().unwrap().sequence_id(), 2);
        assert_eq!(sync.pending(), 0);
        assert_eq!(sync.stats().gaps, 1);

        // The embedding for the abandoned tick arrives late and is dropped.
        sync.add_record(embs(1, 1));
        assert!(sync.poll().is_none());
        assert_eq!(sync.stats().stale, 1);
    }

    #[test]
    fn test_empty_tick_is_emitted_without_embedding_record() {
        let sync = StreamSynchronizer::new(4);
        sync.add_record(frame(12));
        sync.add_record(dets(12, 0));

        let triple = sync.poll().unwrap();
        assert_eq!(triple.sequence_id(), 12);
        assert!(triple.detections().is_empty());
        assert!(triple.embeddings().is_empty());
    }

    #[test]
    fn test_empty_tick_with_all_three_records() {
        let sync = StreamSynchronizer::new(4);
        add_complete(&sync, 12, 0);
        let triple = sync.poll().unwrap();
        assert!(triple.is_empty());
        assert!(sync.poll().is_none());
    }

    #[test]
    fn test_window_evicts_oldest_pending() {
        let sync = StreamSynchronizer::new(2);
        sync.add_record(frame(1));
        sync.add_record(dets(1, 1));
        sync.add_record(frame(2));
        sync.add_record(frame(3));

        assert_eq!(sync.stats().gaps, 1);
        // Sequence 1 was evicted from every stream and can no longer complete.
        sync.add_record(embs(1, 1));
        assert!(sync.poll().is_none());
        assert_eq!(sync.pending(), 2);
        assert_eq!(sync.stats().stale, 1);
    }

    #[test]
    fn test_eviction_discards_older_parts_of_other_streams() {
        let sync = StreamSynchronizer::new(2);
        sync.add_record(dets(1, 1));
        sync.add_record(embs(1, 1));
        sync.add_record(frame(2));
        sync.add_record(frame(3));
        // Frame 4 evicts frame 2; sequence 1 lost its frame for good.
        sync.add_record(frame(4));

        assert_eq!(sync.stats().gaps, 2);
        assert_eq!(sync.pending(), 2);
        sync.add_record(dets(2, 0));
        assert_eq!(sync.stats().stale, 1);

        sync.add_record(dets(3, 0));
        assert_eq!(sync.poll().unwrap().sequence_id(), 3);
    }

    #[test]
    fn test_empty_tick_overtakes_tick_awaiting_embeddings() {
        let sync = StreamSynchronizer::new(8);
        sync.add_record(frame(1));
        sync.add_record(dets(1, 1));
        sync.add_record(frame(2));
        sync.add_record(dets(2, 0));

        assert_eq!(sync.poll().unwrap().sequence_id(), 2);
        sync.add_record(embs(1, 1));
        assert_eq!(
            sync.stats(),
            SyncStats {
                emitted: 1,
                gaps: 1,
                stale: 1,
                malformed: 0,
            }
        );
    }

    #[test]
    fn test_has_room_tracks_window_per_kind() {
        let sync = StreamSynchronizer::new(2);
        sync.add_record(dets(1, 0));
        assert!(sync.has_room(StreamKind::Detections));
        sync.add_record(dets(2, 0));
        assert!(!sync.has_room(StreamKind::Detections));
        assert!(sync.has_room(StreamKind::Frame));

        sync.add_record(frame(1));
        assert_eq!(sync.poll().unwrap().sequence_id(), 1);
        assert!(sync.has_room(StreamKind::Detections));
    }

    #[test]
    fn test_malformed_tick_is_skipped() {
        let sync = StreamSynchronizer::new(4);
        sync.add_record(frame(1));
        sync.add_record(dets(1, 2));
        sync.add_record(embs(1, 1));
        add_complete(&sync, 2, 1);

        assert_eq!(sync.poll().unwrap().sequence_id(), 2);
        assert_eq!(sync.stats().malformed, 1);
        assert_eq!(sync.stats().emitted, 1);
    }

    #[test]
    fn test_short_frame_buffer_is_skipped_as_malformed() {
        let sync = StreamSynchronizer::new(4);
        sync.add_record(StreamRecord::Frame(Frame::new(vec![0u8; 10], 100, 100, 3, 1)));
        sync.add_record(dets(1, 1));
        sync.add_record(embs(1, 1));
        add_complete(&sync, 2, 1);

        assert_eq!(sync.poll().unwrap().sequence_id(), 2);
        assert_eq!(sync.stats().malformed, 1);
        assert!(sync.poll().is_none());
    }

    #[test]
    fn test_concurrent_producers() {
        let sync = Arc::new(StreamSynchronizer::new(64));
        let count: SequenceId = 50;

        let handles: Vec<_> = [StreamKind::Frame, StreamKind::Detections, StreamKind::Embeddings]
            .into_iter()
            .map(|kind| {
                let sync = sync.clone();
                std::thread::spawn(move || {
                    for seq in 0..count {
                        let record = match kind {
                            StreamKind::Frame => frame(seq),
                            StreamKind::Detections => dets(seq, 1),
                            StreamKind::Embeddings => embs(seq, 1),
                        };
                        sync.add_record(record);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut emitted = Vec::new();
        while let Some(triple) = sync.poll() {
            emitted.push(triple.sequence_id());
        }
        assert_eq!(emitted, (0..count).collect::<Vec<_>>());
    }
}
