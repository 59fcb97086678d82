//! Resolves face embeddings to persistent identities.
//!
//! The reference set grows over time: unknown faces are enrolled under a new
//! label and weak matches add a reference to the matched identity, so the
//! gallery adapts to pose and lighting. Confirmed matches are not enrolled,
//! which keeps near-duplicate frames from bloating it.

use crate::recognition::domain::embedding::{self, Embedding, EmbeddingError};
use crate::recognition::domain::embedding_store::{
    validate_label, EmbeddingStore, Gallery, StoreError,
};
use crate::recognition::domain::match_result::{MatchDecision, MatchResult, MatchThresholds};
use crate::shared::constants::GENERATED_LABEL_LEN;

pub struct IdentityMatcher {
    store: Box<dyn EmbeddingStore>,
    gallery: Gallery,
    thresholds: MatchThresholds,
    session_name: Option<String>,
    write_failures: u64,
}

impl IdentityMatcher {
    /// Loads the gallery from `store`.
    ///
    /// When `session_name` is set, unknown faces are enrolled under that
    /// name instead of a generated label.
    pub fn new(
        store: Box<dyn EmbeddingStore>,
        thresholds: MatchThresholds,
        session_name: Option<String>,
    ) -> Result<Self, StoreError> {
        if let Some(name) = &session_name {
            validate_label(name)?;
        }
        let gallery = store.load()?;
        log::info!("Loaded identities: [{}]", gallery_summary(&gallery));
        Ok(Self {
            store,
            gallery,
            thresholds,
            session_name,
            write_failures: 0,
        })
    }

    /// Finds the most similar reference across all identities and applies
    /// the graduated policy.
    ///
    /// Enrollment failures in the durable store are logged and counted; the
    /// in-memory gallery keeps the new reference either way.
    pub fn match_embedding(&mut self, query: &[f32]) -> Result<MatchResult, EmbeddingError> {
        embedding::validate(query)?;

        let best = self.best_match(query)?;
        let similarity = best.as_ref().map_or(0.0, |(_, s)| s.max(0.0));
        let decision = match &best {
            Some(_) => self.thresholds.decide(similarity),
            None => MatchDecision::Unknown,
        };

        let result = match (decision, best) {
            (MatchDecision::Confirmed, Some((label, _))) => MatchResult {
                label,
                confidence: similarity,
                decision,
                similarity,
            },
            (MatchDecision::WeakMatch, Some((label, _))) => {
                self.enroll_logged(&label, query.to_vec());
                MatchResult {
                    label,
                    confidence: similarity,
                    decision,
                    similarity,
                }
            }
            _ => {
                let label = match &self.session_name {
                    Some(name) => name.clone(),
                    None => self.generate_label(),
                };
                self.enroll_logged(&label, query.to_vec());
                MatchResult {
                    label,
                    confidence: 1.0 - similarity,
                    decision: MatchDecision::Unknown,
                    similarity,
                }
            }
        };
        Ok(result)
    }

    /// Appends `embedding` to `label`, creating the identity if absent.
    ///
    /// The in-memory gallery is updated before the durable write, so a
    /// write failure only loses the reference across restarts.
    pub fn enroll(&mut self, label: &str, embedding: Embedding) -> Result<(), StoreError> {
        validate_label(label)?;
        embedding::validate(&embedding)?;
        if let Some(expected) = self.dimension() {
            if embedding.len() != expected {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                }
                .into());
            }
        }

        log::info!("Saving new embedding for {label}");
        let result = self.store.append(label, &embedding);
        self.gallery
            .entry(label.to_string())
            .or_default()
            .push(embedding);
        if result.is_err() {
            self.write_failures += 1;
        }
        result
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.gallery.keys().map(String::as_str)
    }

    pub fn identity_count(&self) -> usize {
        self.gallery.len()
    }

    pub fn reference_count(&self, label: &str) -> usize {
        self.gallery.get(label).map_or(0, Vec::len)
    }

    /// Durable writes that failed since construction.
    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    pub fn thresholds(&self) -> MatchThresholds {
        self.thresholds
    }

    fn best_match(&self, query: &[f32]) -> Result<Option<(String, f64)>, EmbeddingError> {
        let mut best: Option<(&str, f64)> = None;
        for (label, references) in &self.gallery {
            for reference in references {
                let similarity = embedding::cosine_similarity(query, reference)?;
                if best.map_or(true, |(_, s)| similarity > s) {
                    best = Some((label.as_str(), similarity));
                }
            }
        }
        Ok(best.map(|(label, s)| (label.to_string(), s)))
    }

    fn dimension(&self) -> Option<usize> {
        self.gallery.values().flatten().map(Vec::len).next()
    }

    fn enroll_logged(&mut self, label: &str, embedding: Embedding) {
        if let Err(e) = self.enroll(label, embedding) {
            log::warn!("Enrollment for {label} not persisted: {e}");
        }
    }

    fn generate_label(&self) -> String {
        loop {
            let label = generate_label();
            if !self.gallery.contains_key(&label) {
                return label;
            }
        }
    }
}

/// Short random identifier for a newly seen face.
pub fn generate_label() -> String {
    let mut label = uuid::Uuid::new_v4().simple().to_string();
    label.truncate(GENERATED_LABEL_LEN);
    label
}

fn gallery_summary(gallery: &Gallery) -> String {
    gallery
        .iter()
        .map(|(label, refs)| format!("{label}:{}", refs.len()))
        .collect::<Vec<_>>()
        .join(", ")
}
