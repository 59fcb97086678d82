use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use thiserror::Error;

use crate::recognition::domain::embedding::{Embedding, EmbeddingError};

/// Identity label -> reference embeddings, in enrollment order.
pub type Gallery = BTreeMap<String, Vec<Embedding>>;

const MAX_LABEL_LEN: usize = 64;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt record {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("failed to encode record for '{label}': {source}")]
    Encode {
        label: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid identity label '{0}'")]
    InvalidLabel(String),
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(#[from] EmbeddingError),
}

/// Durable mapping from identity label to reference embeddings.
///
/// `append` must be safe to call concurrently; two appends for the same
/// label must both survive.
pub trait EmbeddingStore: Send + Sync {
    /// Reads every persisted identity. Unreadable records are skipped.
    fn load(&self) -> Result<Gallery, StoreError>;

    /// Appends one embedding to `label`, creating the identity if absent.
    fn append(&self, label: &str, embedding: &[f32]) -> Result<(), StoreError>;

    fn list_labels(&self) -> Result<BTreeSet<String>, StoreError>;
}

/// Labels double as record names, so they are restricted to a
/// filesystem-safe alphabet.
pub fn validate_label(label: &str) -> Result<(), StoreError> {
    let valid_chars = label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '));
    if label.is_empty()
        || label.len() > MAX_LABEL_LEN
        || label.starts_with('.')
        || label.trim() != label
        || !valid_chars
    {
        return Err(StoreError::InvalidLabel(label.to_string()));
    }
    Ok(())
}
