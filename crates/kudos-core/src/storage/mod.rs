//! Persistence seam for the gamification engine.
//!
//! The engine never talks to a concrete store directly; everything goes
//! through [`GamificationStore`], injected at construction. Two
//! implementations ship: an in-memory store for tests and embedding, and a
//! SQLite-backed store for real deployments.

pub mod database;
mod memory;

pub use database::SqliteStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::achievements::AchievementDefinition;
use crate::activity::ActivityType;
use crate::error::StoreError;
use crate::prediction::EngagementPrediction;
use crate::profile::{GamificationProfile, PointsHistoryEntry, SubjectId};

/// External keyed store the engine persists through.
///
/// Implementations are assumed to offer read-after-write consistency per
/// subject; the engine serializes writes per subject itself and does not
/// implement replication.
pub trait GamificationStore: Send + Sync {
    /// Load a subject's profile, if one exists yet.
    fn load_profile(&self, subject: &SubjectId) -> Result<Option<GamificationProfile>, StoreError>;

    /// Create or replace a subject's profile.
    fn save_profile(&self, profile: &GamificationProfile) -> Result<(), StoreError>;

    /// Append one immutable history entry.
    fn append_history(&self, entry: &PointsHistoryEntry) -> Result<(), StoreError>;

    /// History entries for a subject, oldest first, optionally filtered by
    /// activity type and/or a lower timestamp bound.
    fn query_history(
        &self,
        subject: &SubjectId,
        activity: Option<&ActivityType>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PointsHistoryEntry>, StoreError>;

    /// The read-only achievement catalog.
    fn load_achievement_catalog(&self) -> Result<Vec<AchievementDefinition>, StoreError>;

    /// Append one prediction to the log.
    fn append_prediction(&self, prediction: &EngagementPrediction) -> Result<(), StoreError>;
}

/// Returns `~/.config/kudos[-dev]/` based on KUDOS_ENV.
///
/// Set KUDOS_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("KUDOS_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("kudos-dev")
    } else {
        base_dir.join("kudos")
    };

    std::fs::create_dir_all(&dir).map_err(|e| StoreError::DataDir(e.to_string()))?;
    Ok(dir)
}
