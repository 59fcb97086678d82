use serde::{Deserialize, Serialize};

use crate::shared::constants::{DEFAULT_CONFIRMED_THRESHOLD, DEFAULT_UNKNOWN_THRESHOLD};

/// Similarity cut-offs for the graduated match policy.
///
/// `similarity <= unknown` is an unknown face, `similarity <= confirmed` a
/// weak match, anything above a confirmed match.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchThresholds {
    pub unknown: f64,
    pub confirmed: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            unknown: DEFAULT_UNKNOWN_THRESHOLD,
            confirmed: DEFAULT_CONFIRMED_THRESHOLD,
        }
    }
}

impl MatchThresholds {
    pub fn decide(&self, similarity: f64) -> MatchDecision {
        if similarity > self.confirmed {
            MatchDecision::Confirmed
        } else if similarity > self.unknown {
            MatchDecision::WeakMatch
        } else {
            MatchDecision::Unknown
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatchDecision {
    /// Close enough that the query adds nothing to the reference set.
    Confirmed,
    /// Same identity, different enough to be enrolled as a new reference.
    WeakMatch,
    /// No identity is close; the query was enrolled under a new label.
    Unknown,
}

impl std::fmt::Display for MatchDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchDecision::Confirmed => write!(f, "confirmed"),
            MatchDecision::WeakMatch => write!(f, "weak match"),
            MatchDecision::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchResult {
    pub label: String,
    /// Similarity for matches; `1 - similarity` for unknown faces.
    pub confidence: f64,
    pub decision: MatchDecision,
    /// Best raw similarity found, clamped at 0.
    pub similarity: f64,
}
