//! Core error types for kudos-core.
//!
//! This module defines the error hierarchy for the gamification engine using
//! thiserror. Throttle rejections are deliberately NOT errors -- they are
//! ordinary outcomes reported through `TrackResult`.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the gamification engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The activity type has no valuation table entry and no override delta
    /// was supplied. No side effects were performed.
    #[error("no point value configured for activity type '{0}'")]
    UnknownActivityType(String),

    /// A redemption was attempted beyond the subject's balance. No debit
    /// was applied.
    #[error("insufficient points: need {required}, have {available}")]
    InsufficientPoints { required: i64, available: i64 },

    /// A redemption was attempted with a non-positive cost. No debit was
    /// applied.
    #[error("redemption cost must be positive, got {0}")]
    InvalidCost(i64),

    /// The backing store failed. For crediting-stage failures this aborts
    /// the call; best-effort stages log and swallow it instead.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration load/save errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Persistence-layer errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("store migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The achievement catalog could not be loaded; evaluation is skipped
    /// for the current call and retried on the next activity.
    #[error("achievement catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// The data directory could not be resolved or created
    #[error("data directory unavailable: {0}")]
    DataDir(String),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::QueryFailed(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for EngineError
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
