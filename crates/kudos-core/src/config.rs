//! TOML-based engine configuration.
//!
//! Everything the spec treats as tunable lives here: the point valuation
//! table, throttle policies, level thresholds, trailing-window lengths, and
//! the engagement-predictor weights. The defaults reproduce the original
//! system's behavior exactly; deployments override them via
//! `~/.config/kudos/config.toml`.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityType;
use crate::error::ConfigError;
use crate::storage::data_dir;
use crate::throttle::{ThrottlePolicy, WindowKind};

/// Weights and caps for the engagement score formula, plus the thresholds
/// driving the recommendation rules.
///
/// The formula's shape is fixed; these constants are configuration, not
/// hardcoded values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Weight of the previous engagement score
    #[serde(default = "default_inertia")]
    pub inertia_weight: f64,

    /// Weight of recent point intensity
    #[serde(default = "default_intensity")]
    pub intensity_weight: f64,

    /// Weight of streak consistency
    #[serde(default = "default_consistency")]
    pub consistency_weight: f64,

    /// Score points contributed per unlocked achievement
    #[serde(default = "default_breadth_step")]
    pub breadth_step: f64,

    /// Average daily points at which the intensity term saturates
    #[serde(default = "default_intensity_cap")]
    pub intensity_cap: f64,

    /// Streak length (days) at which the consistency term saturates
    #[serde(default = "default_consistency_cap")]
    pub consistency_cap: f64,

    /// Achievement count at which the breadth term saturates
    #[serde(default = "default_breadth_cap")]
    pub breadth_cap: u32,

    /// Recommend more communication below this score
    #[serde(default = "default_low_score_threshold")]
    pub low_score_threshold: f64,

    /// Recommend building a streak below this many days
    #[serde(default = "default_short_streak_days")]
    pub short_streak_days: u32,

    /// Recommend exploring features below this many achievements
    #[serde(default = "default_few_achievements")]
    pub few_achievements: u32,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            inertia_weight: default_inertia(),
            intensity_weight: default_intensity(),
            consistency_weight: default_consistency(),
            breadth_step: default_breadth_step(),
            intensity_cap: default_intensity_cap(),
            consistency_cap: default_consistency_cap(),
            breadth_cap: default_breadth_cap(),
            low_score_threshold: default_low_score_threshold(),
            short_streak_days: default_short_streak_days(),
            few_achievements: default_few_achievements(),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Offset in hours from UTC used to compute subjects' local calendar day
    /// (streaks, daily throttle windows)
    #[serde(default)]
    pub timezone_offset_hours: i32,

    /// Points credited per activity type, keyed by canonical name
    #[serde(default = "default_point_values")]
    pub point_values: HashMap<String, i64>,

    /// Throttle policy per activity type, keyed by canonical name.
    /// Types without an entry are never throttled.
    #[serde(default = "default_throttle_policies")]
    pub throttle_policies: HashMap<String, ThrottlePolicy>,

    /// Ascending cumulative-points thresholds; level = number of thresholds
    /// at or below the total (minimum level 1)
    #[serde(default = "default_level_thresholds")]
    pub level_thresholds: Vec<i64>,

    /// A streak bonus is credited whenever the streak reaches a multiple of
    /// this many days. Zero disables the bonus.
    #[serde(default = "default_streak_bonus_interval")]
    pub streak_bonus_interval_days: u32,

    /// Trailing window for achievement activity-count conditions
    #[serde(default = "default_achievement_window")]
    pub achievement_window_days: i64,

    /// Trailing window for engagement prediction inputs
    #[serde(default = "default_prediction_window")]
    pub prediction_window_days: i64,

    /// Engagement predictor tuning
    #[serde(default)]
    pub predictor: PredictorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone_offset_hours: 0,
            point_values: default_point_values(),
            throttle_policies: default_throttle_policies(),
            level_thresholds: default_level_thresholds(),
            streak_bonus_interval_days: default_streak_bonus_interval(),
            achievement_window_days: default_achievement_window(),
            prediction_window_days: default_prediction_window(),
            predictor: PredictorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Point value for an activity type, if the table has one.
    pub fn points_for(&self, activity: &ActivityType) -> Option<i64> {
        self.point_values.get(activity.as_str()).copied()
    }

    /// Throttle policy for an activity type, if one is configured.
    pub fn policy_for(&self, activity: &ActivityType) -> Option<&ThrottlePolicy> {
        self.throttle_policies.get(activity.as_str())
    }

    /// Smallest applicable level for a cumulative point total.
    pub fn level_for(&self, total_points: i64) -> u32 {
        let reached = self
            .level_thresholds
            .iter()
            .take_while(|threshold| **threshold <= total_points)
            .count() as u32;
        reached.max(1)
    }

    /// Fixed offset for subject-local day computation.
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.timezone_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }

    /// Subject-local calendar date of an instant.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.timezone()).date_naive()
    }

    /// Path of the configuration file inside the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/kudos"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load the configuration file, falling back to defaults when absent.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Save the configuration file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let raw = toml::to_string_pretty(self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        std::fs::write(&path, raw).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }
}

fn default_point_values() -> HashMap<String, i64> {
    HashMap::from([
        ("message_sent".to_string(), 5),
        ("message_read".to_string(), 2),
        ("file_uploaded".to_string(), 10),
        ("file_downloaded".to_string(), 3),
        ("template_used".to_string(), 8),
        ("achievement_unlocked".to_string(), 50),
        ("daily_login".to_string(), 5),
        ("streak_bonus".to_string(), 20),
        ("perfect_week".to_string(), 100),
    ])
}

fn default_throttle_policies() -> HashMap<String, ThrottlePolicy> {
    HashMap::from([
        (
            "message_sent".to_string(),
            ThrottlePolicy::new(20, WindowKind::Hourly, 3),
        ),
        (
            "message_read".to_string(),
            ThrottlePolicy::new(50, WindowKind::Hourly, 1),
        ),
        (
            "file_uploaded".to_string(),
            ThrottlePolicy::new(10, WindowKind::Hourly, 5),
        ),
        (
            "file_downloaded".to_string(),
            ThrottlePolicy::new(30, WindowKind::Hourly, 2),
        ),
        (
            "template_used".to_string(),
            ThrottlePolicy::new(15, WindowKind::Hourly, 4),
        ),
        (
            "daily_login".to_string(),
            ThrottlePolicy::new(1, WindowKind::Daily, 1440),
        ),
    ])
}

fn default_level_thresholds() -> Vec<i64> {
    vec![0, 100, 250, 500, 1000, 2000, 3500, 5500, 8000, 11000]
}

fn default_streak_bonus_interval() -> u32 {
    7
}

fn default_achievement_window() -> i64 {
    7
}

fn default_prediction_window() -> i64 {
    30
}

fn default_inertia() -> f64 {
    0.4
}

fn default_intensity() -> f64 {
    0.3
}

fn default_consistency() -> f64 {
    0.2
}

fn default_breadth_step() -> f64 {
    2.0
}

fn default_intensity_cap() -> f64 {
    10.0
}

fn default_consistency_cap() -> f64 {
    30.0
}

fn default_breadth_cap() -> u32 {
    10
}

fn default_low_score_threshold() -> f64 {
    50.0
}

fn default_short_streak_days() -> u32 {
    7
}

fn default_few_achievements() -> u32 {
    5
}
