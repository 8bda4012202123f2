//! Core error types for pulselane-core.
//!
//! The taxonomy the engine enforces at its boundaries:
//! - validation failures gate a single persist attempt and carry the wire
//!   code reported to the persistence boundary
//! - invariant violations are fatal to the call that caused them
//! - store errors are transient at the autosave boundary and retried on
//!   the next cycle

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pulselane-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persist-gate validation failures
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Programming errors, fatal to the offending call
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantError),

    /// Series encoding/decoding errors
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persistence boundary errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the persist-time validation gate.
///
/// Each failure aborts only the save attempt that raised it; the session
/// keeps running and the next autosave cycle retries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Record has no usable session block
    #[error("record has no session id")]
    MissingSession,

    /// Session start time is not a plausible instant
    #[error("session start time is not a valid instant")]
    InvalidStartTime,

    /// Per-entity series exist but the roster is empty
    #[error("per-entity series present but no entities in the roster")]
    RosterRequired,

    /// Too short to be worth persisting, and nothing was recorded
    #[error("session shorter than {min_ms} ms with no recorded data")]
    SessionTooShortAndEmpty { min_ms: u64 },

    /// A series length disagrees with the timeline tick count
    #[error("series '{key}' has {len} samples, expected {expected}")]
    SeriesTickMismatch {
        key: String,
        len: usize,
        expected: u64,
    },

    /// Total stored points exceed the configured cap
    #[error("timeline holds {points} points, cap is {cap}")]
    SeriesSizeCap { points: usize, cap: usize },

    /// Malformed input rejected before it reaches the timeline
    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    /// Stable code reported to the persistence boundary.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingSession => "missing-session",
            ValidationError::InvalidStartTime => "invalid-startTime",
            ValidationError::RosterRequired => "roster-required",
            ValidationError::SessionTooShortAndEmpty { .. } => "session-too-short-and-empty",
            ValidationError::SeriesTickMismatch { .. } => "series-tick-mismatch",
            ValidationError::SeriesSizeCap { .. } => "series-size-cap",
            ValidationError::InvalidValue { .. } => "invalid-value",
        }
    }
}

/// Programming errors. These are fatal to the call that caused them and
/// never silently ignored.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    /// Ticks are append-only; writes land at the in-progress index or not at all
    #[error("tick {tick} written out of order for '{key}' (expected {expected})")]
    OutOfOrderTick {
        key: String,
        tick: u64,
        expected: u64,
    },

    /// Entity ids are never reused within a session
    #[error("entity id '{0}' already exists in this session")]
    EntityIdReused(String),

    /// Once ended, a session is immutable
    #[error("session already ended")]
    SessionEnded,

    /// Operation requires an active session
    #[error("operation requires an active session (state: {state})")]
    NotActive { state: &'static str },
}

/// Series encoding/decoding errors.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Encoded payload was not a JSON array
    #[error("encoded series is not a JSON array")]
    NotAnArray,

    /// A `[value, runLength]` pair was malformed
    #[error("invalid run-length pair at item {index}")]
    InvalidRun { index: usize },

    /// Only null, numbers and strings are valid series values
    #[error("unsupported value at item {index}")]
    UnsupportedValue { index: usize },

    /// Series key did not parse as `kind:owner:metric`
    #[error("invalid series key '{0}'")]
    InvalidSeriesKey(String),

    /// Snapshot declared an encoding this build does not speak
    #[error("unsupported timeline encoding '{0}'")]
    UnsupportedEncoding(String),

    /// JSON parse failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence boundary errors. Transient at the autosave cadence: the
/// in-memory timeline is never rolled back on a failed persist.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing store
    #[error("Failed to open store at {path}: {message}")]
    OpenFailed { path: PathBuf, message: String },

    /// Save failed
    #[error("Save failed: {0}")]
    SaveFailed(String),

    /// Query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Record (de)serialization failed
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::QueryFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
