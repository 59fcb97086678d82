//! Directory-backed embedding store: one JSON record per identity.
//!
//! A record is read, extended and rewritten under a per-label lock, and
//! written to a temporary file first so a crash never leaves a truncated
//! record behind. A record that fails to parse only hides that identity.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::recognition::domain::embedding::{self, Embedding};
use crate::recognition::domain::embedding_store::{
    validate_label, EmbeddingStore, Gallery, StoreError,
};

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.part";
const CORRUPT_EXTENSION: &str = "json.corrupt";

#[derive(Debug, Serialize, Deserialize)]
struct IdentityRecord {
    label: String,
    embeddings: Vec<Embedding>,
}

pub struct JsonEmbeddingStore {
    dir: PathBuf,
    label_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl JsonEmbeddingStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        Ok(Self {
            dir,
            label_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, label: &str) -> PathBuf {
        self.dir.join(format!("{label}.{RECORD_EXTENSION}"))
    }

    fn label_lock(&self, label: &str) -> Arc<Mutex<()>> {
        self.label_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(label.to_string())
            .or_default()
            .clone()
    }

    /// Labels of every record file, parsed or not.
    fn record_labels(&self) -> Result<Vec<(String, PathBuf)>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(io_error(&self.dir))?;

        let mut labels = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_error(&self.dir))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(label) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            labels.push((label.to_string(), path));
        }
        labels.sort();
        Ok(labels)
    }
}

impl EmbeddingStore for JsonEmbeddingStore {
    fn load(&self) -> Result<Gallery, StoreError> {
        let mut gallery = Gallery::new();
        for (label, path) in self.record_labels()? {
            match read_record(&path, &label) {
                Ok(record) => {
                    gallery.insert(label, record.embeddings);
                }
                Err(e) => log::warn!("Skipping identity '{label}': {e}"),
            }
        }
        Ok(gallery)
    }

    fn append(&self, label: &str, embedding: &[f32]) -> Result<(), StoreError> {
        validate_label(label)?;
        embedding::validate(embedding)?;

        let lock = self.label_lock(label);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.record_path(label);
        let mut record = if path.exists() {
            match read_record(&path, label) {
                Ok(record) => record,
                Err(StoreError::Corrupt { reason, .. }) => {
                    let backup = path.with_extension(CORRUPT_EXTENSION);
                    log::warn!(
                        "Record for '{label}' is corrupt ({reason}); moving it to {}",
                        backup.display()
                    );
                    fs::rename(&path, &backup).map_err(io_error(&backup))?;
                    IdentityRecord::empty(label)
                }
                Err(e) => return Err(e),
            }
        } else {
            IdentityRecord::empty(label)
        };

        record.embeddings.push(embedding.to_vec());
        write_record(&path, &record)
    }

    fn list_labels(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .record_labels()?
            .into_iter()
            .map(|(label, _)| label)
            .collect())
    }
}

impl IdentityRecord {
    fn empty(label: &str) -> Self {
        Self {
            label: label.to_string(),
            embeddings: Vec::new(),
        }
    }
}

fn read_record(path: &Path, label: &str) -> Result<IdentityRecord, StoreError> {
    let json = fs::read_to_string(path).map_err(io_error(path))?;
    let corrupt = |reason: String| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let record: IdentityRecord =
        serde_json::from_str(&json).map_err(|e| corrupt(e.to_string()))?;
    if record.label != label {
        return Err(corrupt(format!(
            "record names '{}' but file is for '{label}'",
            record.label
        )));
    }
    let dimension = record.embeddings.first().map(Vec::len);
    for (i, v) in record.embeddings.iter().enumerate() {
        embedding::validate(v).map_err(|e| corrupt(format!("embedding {i}: {e}")))?;
        if Some(v.len()) != dimension {
            return Err(corrupt(format!("embedding {i} has inconsistent dimension")));
        }
    }
    Ok(record)
}

fn write_record(path: &Path, record: &IdentityRecord) -> Result<(), StoreError> {
    let json = serde_json::to_vec(record).map_err(|e| StoreError::Encode {
        label: record.label.clone(),
        source: e,
    })?;

    // Write to a temp file first, then rename for atomicity
    let temp_path = path.with_extension(TEMP_EXTENSION);
    let mut file = fs::File::create(&temp_path).map_err(io_error(&temp_path))?;
    file.write_all(&json).map_err(io_error(&temp_path))?;
    file.sync_all().map_err(io_error(&temp_path))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(io_error(path))
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Io { path, source }
}
