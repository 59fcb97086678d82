use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::events::domain::event_throttler::ThrottleConfig;
use crate::recognition::domain::embedding_store::validate_label;
use crate::recognition::domain::match_result::MatchThresholds;
use crate::shared::constants::{
    APP_DIR_NAME, DATABASE_DIR_NAME, DEFAULT_COOLDOWN_SECS, DEFAULT_CROP_SCALE,
    DEFAULT_DISPLAY_SIZE, DEFAULT_REPLAY_FPS, DEFAULT_SYNC_WINDOW, DEFAULT_WARM_UP_COUNT,
    EVENTS_DIR_NAME,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Everything a watch session needs, fixed for the session's lifetime.
///
/// Missing fields in a config file take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Label for faces enrolled as unknown; generated per face when unset.
    pub identity_name: Option<String>,
    /// Observations required before a new identity's first event.
    pub warm_up_count: u32,
    /// Minimum seconds between events for the same identity.
    pub cooldown_secs: f64,
    pub thresholds: MatchThresholds,
    /// Match only every Nth face processed.
    pub recognize_every: u32,
    /// Show only every Nth processed triple.
    pub display_every: u32,
    /// Side of the square display image, in pixels.
    pub display_size: u32,
    pub show_display: bool,
    /// Factor the detection box is grown by for saved crops.
    pub crop_scale: f64,
    /// Sequence ids the synchronizer holds before declaring gaps.
    pub sync_window: usize,
    /// Capture rate of replayed recordings; their timeline is derived from
    /// sequence ids at this rate.
    pub replay_fps: f64,
    pub database_dir: Option<PathBuf>,
    pub events_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            identity_name: None,
            warm_up_count: DEFAULT_WARM_UP_COUNT,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            thresholds: MatchThresholds::default(),
            recognize_every: 1,
            display_every: 1,
            display_size: DEFAULT_DISPLAY_SIZE,
            show_display: true,
            crop_scale: DEFAULT_CROP_SCALE,
            sync_window: DEFAULT_SYNC_WINDOW,
            replay_fps: DEFAULT_REPLAY_FPS,
            database_dir: None,
            events_dir: None,
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        let t = self.thresholds;
        if !(0.0..=1.0).contains(&t.unknown) || !(0.0..=1.0).contains(&t.confirmed) {
            return Err(invalid("thresholds", "must lie within [0, 1]"));
        }
        if t.unknown > t.confirmed {
            return Err(invalid(
                "thresholds",
                format!("unknown ({}) exceeds confirmed ({})", t.unknown, t.confirmed),
            ));
        }
        if Duration::try_from_secs_f64(self.cooldown_secs).is_err() {
            return Err(invalid(
                "cooldown_secs",
                format!("{} is not a representable non-negative duration", self.cooldown_secs),
            ));
        }
        if self.recognize_every == 0 {
            return Err(invalid("recognize_every", "must be at least 1"));
        }
        if self.display_every == 0 {
            return Err(invalid("display_every", "must be at least 1"));
        }
        if self.display_size == 0 {
            return Err(invalid("display_size", "must be at least 1"));
        }
        if !self.crop_scale.is_finite() || self.crop_scale <= 0.0 {
            return Err(invalid("crop_scale", "must be positive"));
        }
        if self.sync_window == 0 {
            return Err(invalid("sync_window", "must be at least 1"));
        }
        if !self.replay_fps.is_finite() || self.replay_fps <= 0.0 {
            return Err(invalid("replay_fps", "must be positive"));
        }
        if let Some(name) = &self.identity_name {
            validate_label(name).map_err(|e| invalid("identity_name", e.to_string()))?;
        }
        Ok(())
    }

    pub fn throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig {
            warm_up_count: self.warm_up_count,
            cooldown: Duration::try_from_secs_f64(self.cooldown_secs).unwrap_or(Duration::MAX),
        }
    }

    pub fn database_dir(&self) -> PathBuf {
        self.database_dir.clone().unwrap_or_else(default_database_dir)
    }

    /// Event crops live beside the database unless configured otherwise.
    pub fn events_dir(&self) -> PathBuf {
        self.events_dir.clone().unwrap_or_else(|| {
            self.database_dir()
                .parent()
                .map(|p| p.join(EVENTS_DIR_NAME))
                .unwrap_or_else(|| PathBuf::from(EVENTS_DIR_NAME))
        })
    }
}

/// `<data dir>/facewatch/databases`, or `./databases` when the platform has
/// no data directory.
pub fn default_database_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME).join(DATABASE_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DATABASE_DIR_NAME))
}
