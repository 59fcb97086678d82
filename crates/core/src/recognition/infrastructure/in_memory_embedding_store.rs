use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use crate::recognition::domain::embedding;
use crate::recognition::domain::embedding_store::{
    validate_label, EmbeddingStore, Gallery, StoreError,
};

/// Non-durable store for tests and sessions that should not persist.
#[derive(Default)]
pub struct InMemoryEmbeddingStore {
    gallery: Mutex<Gallery>,
}

impl InMemoryEmbeddingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gallery(gallery: Gallery) -> Self {
        Self {
            gallery: Mutex::new(gallery),
        }
    }
}

impl EmbeddingStore for InMemoryEmbeddingStore {
    fn load(&self) -> Result<Gallery, StoreError> {
        Ok(self
            .gallery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn append(&self, label: &str, embedding: &[f32]) -> Result<(), StoreError> {
        validate_label(label)?;
        embedding::validate(embedding)?;
        self.gallery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(label.to_string())
            .or_default()
            .push(embedding.to_vec());
        Ok(())
    }

    fn list_labels(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .gallery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_then_load() {
        let store = InMemoryEmbeddingStore::new();
        store.append("alice", &[1.0, 2.0]).unwrap();
        store.append("alice", &[3.0, 4.0]).unwrap();

        let gallery = store.load().unwrap();
        assert_eq!(gallery["alice"], vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(
            store.list_labels().unwrap(),
            BTreeSet::from(["alice".to_string()])
        );
    }

    #[test]
    fn test_rejects_invalid_label() {
        let store = InMemoryEmbeddingStore::new();
        assert!(store.append("a/b", &[1.0]).is_err());
        assert!(store.load().unwrap().is_empty());
    }
}
