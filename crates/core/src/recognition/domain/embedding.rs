use thiserror::Error;

/// Fixed-length feature vector describing one detected face.
pub type Embedding = Vec<f32>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding is empty")]
    Empty,
    #[error("embedding has a non-finite value at index {index}")]
    NonFinite { index: usize },
}

/// Rejects vectors that cannot take part in a similarity comparison.
pub fn validate(v: &[f32]) -> Result<(), EmbeddingError> {
    if v.is_empty() {
        return Err(EmbeddingError::Empty);
    }
    match v.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(EmbeddingError::NonFinite { index }),
        None => Ok(()),
    }
}

/// `dot(a, b) / (|a| * |b|)`, accumulated in f64.
///
/// A zero-norm operand has no direction and scores 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: b.len(),
            actual: a.len(),
        });
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / denom).clamp(-1.0, 1.0))
}
