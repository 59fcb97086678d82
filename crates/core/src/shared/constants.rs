/// Similarity at or below which a query is treated as an unknown face.
pub const DEFAULT_UNKNOWN_THRESHOLD: f64 = 0.5;

/// Similarity at or below which a match is weak and the query is enrolled.
pub const DEFAULT_CONFIRMED_THRESHOLD: f64 = 0.7;

/// Observations of a new identity absorbed before its first event.
pub const DEFAULT_WARM_UP_COUNT: u32 = 10;

/// Seconds after an event before the same identity may fire again.
pub const DEFAULT_COOLDOWN_SECS: f64 = 5.0;

/// Pending sequence ids retained per stream kind (~ the camera frame pool).
pub const DEFAULT_SYNC_WINDOW: usize = 20;

/// Frame rate assumed when deriving time from a replayed recording's
/// sequence ids.
pub const DEFAULT_REPLAY_FPS: f64 = 30.0;

/// Event crops extend this factor beyond the detection box.
pub const DEFAULT_CROP_SCALE: f64 = 1.5;

pub const DEFAULT_DISPLAY_SIZE: u32 = 400;

/// Length of generated identity labels.
pub const GENERATED_LABEL_LEN: usize = 6;

pub const DATABASE_DIR_NAME: &str = "databases";
pub const EVENTS_DIR_NAME: &str = "events";
pub const APP_DIR_NAME: &str = "facewatch";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
