//! Achievement definitions and unlock evaluation.
//!
//! Conditions form a closed set of variants combined by conjunction, so the
//! evaluator is exhaustive and a new condition kind is a compiler-checked
//! addition. Unlocks are monotonic: once an id is in the profile's set it is
//! never removed, even if points later decrease through redemption.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityType;
use crate::config::EngineConfig;
use crate::error::StoreError;
use crate::profile::GamificationProfile;
use crate::storage::GamificationStore;

/// One unlock condition. A definition unlocks only when every listed
/// condition holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AchievementCondition {
    /// Cumulative points at or above a floor
    MinPoints { points: i64 },

    /// Current level at or above a floor
    MinLevel { level: u32 },

    /// Streak length at or above a floor
    MinStreakDays { days: u32 },

    /// Number of already-unlocked achievements at or above a floor
    MinAchievementsUnlocked { count: usize },

    /// At least `count` history entries of `activity` inside the trailing
    /// evaluation window
    ActivityCount { activity: ActivityType, count: u64 },
}

/// Read-only achievement reference data supplied by the external catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    /// Stable catalog id
    pub id: String,

    /// Display name
    pub name: String,

    /// Display description
    #[serde(default)]
    pub description: String,

    /// Conjunction of unlock conditions
    pub conditions: Vec<AchievementCondition>,

    /// Points credited once, on unlock, in place of the generic table value
    pub points_reward: i64,
}

/// Evaluates the catalog against a profile and recent history.
pub struct AchievementEngine {
    config: Arc<EngineConfig>,
}

impl AchievementEngine {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    /// Definitions newly eligible for a profile, in catalog order.
    ///
    /// Eligibility is decided against a snapshot of the profile at call
    /// time; rewards credited for these unlocks do not cascade into further
    /// unlocks within the same pass, which keeps one pass reproducible for
    /// identical inputs. The caller records the unlocks and credits the
    /// rewards.
    pub fn newly_eligible(
        &self,
        store: &dyn GamificationStore,
        profile: &GamificationProfile,
        now: DateTime<Utc>,
    ) -> Result<Vec<AchievementDefinition>, StoreError> {
        let catalog = store.load_achievement_catalog().map_err(|e| match e {
            StoreError::CatalogUnavailable(_) => e,
            other => StoreError::CatalogUnavailable(other.to_string()),
        })?;
        if catalog.is_empty() {
            return Ok(Vec::new());
        }

        let window_counts = self.window_counts(store, profile, now)?;

        let mut eligible = Vec::new();
        for definition in catalog {
            if profile.unlocked_achievements.contains(&definition.id) {
                continue;
            }
            let satisfied = definition
                .conditions
                .iter()
                .all(|condition| self.is_satisfied(condition, profile, &window_counts));
            if satisfied {
                eligible.push(definition);
            }
        }
        Ok(eligible)
    }

    /// Per-type entry counts inside the trailing evaluation window.
    fn window_counts(
        &self,
        store: &dyn GamificationStore,
        profile: &GamificationProfile,
        now: DateTime<Utc>,
    ) -> Result<HashMap<ActivityType, u64>, StoreError> {
        let since = now - Duration::days(self.config.achievement_window_days);
        let entries = store.query_history(&profile.subject, None, Some(since))?;
        let mut counts: HashMap<ActivityType, u64> = HashMap::new();
        for entry in entries {
            *counts.entry(entry.activity).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn is_satisfied(
        &self,
        condition: &AchievementCondition,
        profile: &GamificationProfile,
        window_counts: &HashMap<ActivityType, u64>,
    ) -> bool {
        match condition {
            AchievementCondition::MinPoints { points } => profile.total_points >= *points,
            AchievementCondition::MinLevel { level } => profile.current_level >= *level,
            AchievementCondition::MinStreakDays { days } => profile.streak_days >= *days,
            AchievementCondition::MinAchievementsUnlocked { count } => {
                profile.unlocked_achievements.len() >= *count
            }
            AchievementCondition::ActivityCount { activity, count } => {
                window_counts.get(activity).copied().unwrap_or(0) >= *count
            }
        }
    }
}
