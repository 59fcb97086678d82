//! Thins per-identity sightings into save-worthy events.
//!
//! A new identity must be observed `warm_up_count` times before its first
//! event, which absorbs transient false detections. After an event the
//! identity cools down; the first observation more than `cooldown` after
//! the last event fires again to re-confirm a lingering presence.

use std::collections::HashMap;
use std::time::Duration;

use crate::events::domain::event::Event;
use crate::shared::constants::{DEFAULT_COOLDOWN_SECS, DEFAULT_WARM_UP_COUNT};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThrottleConfig {
    pub warm_up_count: u32,
    pub cooldown: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            warm_up_count: DEFAULT_WARM_UP_COUNT,
            cooldown: Duration::from_secs_f64(DEFAULT_COOLDOWN_SECS),
        }
    }
}

/// Per-identity bookkeeping, created on first observation.
#[derive(Clone, Debug, PartialEq)]
pub struct PresenceState {
    pub first_seen: Duration,
    pub last_seen: Duration,
    pub last_event_time: Option<Duration>,
    /// Observations since the last fired event (or since creation).
    pub observation_count: u32,
    pub events_fired: u64,
}

impl PresenceState {
    fn new(now: Duration) -> Self {
        Self {
            first_seen: now,
            last_seen: now,
            last_event_time: None,
            observation_count: 0,
            events_fired: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresencePhase {
    /// Never observed.
    Absent,
    /// Observed, but fewer than `warm_up_count` times and never saved.
    WarmingUp,
    /// Saved recently; further observations are suppressed.
    Cooling,
    /// The cooldown has elapsed; the next observation fires.
    Ready,
}

pub struct EventThrottler {
    config: ThrottleConfig,
    presence: HashMap<String, PresenceState>,
}

impl EventThrottler {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            presence: HashMap::new(),
        }
    }

    /// Records one observation of `label` and returns an event if it is
    /// save-worthy.
    pub fn observe(&mut self, label: &str, timestamp: Duration, confidence: f64) -> Option<Event> {
        let config = self.config;
        let state = self
            .presence
            .entry(label.to_string())
            .or_insert_with(|| PresenceState::new(timestamp));

        state.observation_count = state.observation_count.saturating_add(1);
        state.last_seen = timestamp;

        let fire = match state.last_event_time {
            None => state.observation_count >= config.warm_up_count,
            Some(last) => timestamp.saturating_sub(last) > config.cooldown,
        };
        if !fire {
            return None;
        }

        state.last_event_time = Some(timestamp);
        state.observation_count = 0;
        state.events_fired += 1;
        log::debug!(
            "Event for {label} at {:.2}s (#{})",
            timestamp.as_secs_f64(),
            state.events_fired
        );
        Some(Event::new(label, confidence, timestamp))
    }

    pub fn phase(&self, label: &str, now: Duration) -> PresencePhase {
        match self.presence.get(label) {
            None => PresencePhase::Absent,
            Some(state) => match state.last_event_time {
                None => PresencePhase::WarmingUp,
                Some(last) if now.saturating_sub(last) > self.config.cooldown => {
                    PresencePhase::Ready
                }
                Some(_) => PresencePhase::Cooling,
            },
        }
    }

    pub fn presence(&self, label: &str) -> Option<&PresenceState> {
        self.presence.get(label)
    }

    /// Number of identities with presence state.
    pub fn tracked(&self) -> usize {
        self.presence.len()
    }

    pub fn config(&self) -> ThrottleConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn throttler(warm_up: u32, cooldown_secs: u64) -> EventThrottler {
        EventThrottler::new(ThrottleConfig {
            warm_up_count: warm_up,
            cooldown: Duration::from_secs(cooldown_secs),
        })
    }

    fn at_ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_first_event_after_warm_up_then_cooldown() {
        let mut t = throttler(10, 5);
        let mut fired_at = Vec::new();

        // Observed every 0.1s for 7 seconds.
        for i in 1..=70u64 {
            if t.observe("alice", at_ms(i * 100), 0.9).is_some() {
                fired_at.push(i);
            }
        }

        // 10th observation at 1.0s, then the first observation more than
        // 5s later (6.1s).
        assert_eq!(fired_at, vec![10, 61]);
    }

    #[test]
    fn test_warm_up_suppresses_until_threshold() {
        let mut t = throttler(3, 5);
        assert!(t.observe("bob", at_ms(0), 0.8).is_none());
        assert!(t.observe("bob", at_ms(100), 0.8).is_none());
        assert_eq!(t.phase("bob", at_ms(100)), PresencePhase::WarmingUp);

        let event = t.observe("bob", at_ms(200), 0.8).unwrap();
        assert_eq!(event.label, "bob");
        assert_eq!(event.timestamp, at_ms(200));
        assert_eq!(event.sequence_id, None);
    }

    #[rstest]
    #[case::zero(0)]
    #[case::one(1)]
    fn test_trivial_warm_up_fires_immediately(#[case] warm_up: u32) {
        let mut t = throttler(warm_up, 5);
        assert!(t.observe("carol", at_ms(0), 0.7).is_some());
    }

    #[test]
    fn test_event_resets_count_and_sets_last_event_time() {
        let mut t = throttler(2, 5);
        t.observe("dave", at_ms(0), 0.9);
        t.observe("dave", at_ms(100), 0.9);

        let state = t.presence("dave").unwrap();
        assert_eq!(state.observation_count, 0);
        assert_eq!(state.last_event_time, Some(at_ms(100)));
        assert_eq!(state.events_fired, 1);
        assert_eq!(t.phase("dave", at_ms(200)), PresencePhase::Cooling);
    }

    #[test]
    fn test_reappearance_after_cooldown_fires_immediately() {
        let mut t = throttler(2, 5);
        t.observe("erin", at_ms(0), 0.9);
        assert!(t.observe("erin", at_ms(100), 0.9).is_some());

        // Gone for a minute.
        assert_eq!(t.phase("erin", at_ms(60_000)), PresencePhase::Ready);
        assert!(t.observe("erin", at_ms(60_000), 0.9).is_some());
    }

    #[test]
    fn test_cooldown_is_strictly_greater() {
        let mut t = throttler(1, 5);
        assert!(t.observe("frank", at_ms(0), 0.9).is_some());
        assert!(t.observe("frank", at_ms(5_000), 0.9).is_none());
        assert!(t.observe("frank", at_ms(5_001), 0.9).is_some());
    }

    #[test]
    fn test_identities_are_throttled_independently() {
        let mut t = throttler(1, 5);
        assert!(t.observe("alice", at_ms(0), 0.9).is_some());
        assert!(t.observe("bob", at_ms(100), 0.9).is_some());
        // bob's sighting does not refresh alice's window, and vice versa.
        assert!(t.observe("alice", at_ms(5_050), 0.9).is_some());
        assert!(t.observe("bob", at_ms(5_050), 0.9).is_none());
        assert!(t.observe("bob", at_ms(5_150), 0.9).is_some());
        assert_eq!(t.tracked(), 2);
    }

    #[test]
    fn test_phase_of_unknown_identity_is_absent() {
        let t = throttler(10, 5);
        assert_eq!(t.phase("nobody", at_ms(0)), PresencePhase::Absent);
        assert!(t.presence("nobody").is_none());
    }

    #[test]
    fn test_out_of_order_timestamp_does_not_fire() {
        let mut t = throttler(1, 5);
        assert!(t.observe("gina", at_ms(10_000), 0.9).is_some());
        assert!(t.observe("gina", at_ms(1_000), 0.9).is_none());
    }

    #[test]
    fn test_event_carries_confidence() {
        let mut t = throttler(1, 5);
        let event = t.observe("hank", at_ms(0), 0.42).unwrap();
        assert!((event.confidence - 0.42).abs() < f64::EPSILON);
    }
}
