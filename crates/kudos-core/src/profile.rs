//! Subject identity, gamification profile, and the points history ledger rows.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityType;

/// The (user, employee) pair whose gamification state is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId {
    /// Platform user id
    pub user_id: String,

    /// Employee id within the company
    pub employee_id: String,
}

impl SubjectId {
    pub fn new(user_id: impl Into<String>, employee_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            employee_id: employee_id.into(),
        }
    }

    /// Composite key used by stores and per-subject locks.
    pub fn key(&self) -> String {
        format!("{}:{}", self.user_id, self.employee_id)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_id, self.employee_id)
    }
}

impl FromStr for SubjectId {
    type Err = String;

    /// Parse a `user_id:employee_id` composite key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((user, employee)) if !user.is_empty() && !employee.is_empty() => {
                Ok(SubjectId::new(user, employee))
            }
            _ => Err(format!("invalid subject id '{s}', expected user_id:employee_id")),
        }
    }
}

/// One subject's gamification state.
///
/// Created lazily on first activity and never hard-deleted. `total_points`
/// is a cache over the history ledger and must equal the sum of all history
/// deltas after every successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamificationProfile {
    /// Subject this profile belongs to
    pub subject: SubjectId,

    /// Cached sum of all history deltas (never negative)
    pub total_points: i64,

    /// Level derived from `total_points` via the configured threshold table
    pub current_level: u32,

    /// Count of consecutive local calendar days with at least one activity
    pub streak_days: u32,

    /// Local calendar date of the most recent counted activity
    pub last_activity_date: Option<NaiveDate>,

    /// Unlocked achievement ids. Append-only; ids are never removed.
    pub unlocked_achievements: BTreeSet<String>,

    /// Last computed engagement score (0-100), used as inertia for the
    /// next prediction
    pub engagement_score: f64,

    /// When the profile was created
    pub created_at: DateTime<Utc>,

    /// When the profile was last written
    pub updated_at: DateTime<Utc>,
}

impl GamificationProfile {
    /// Fresh profile for a subject with no history.
    pub fn new(subject: SubjectId, now: DateTime<Utc>) -> Self {
        Self {
            subject,
            total_points: 0,
            current_level: 1,
            streak_days: 0,
            last_activity_date: None,
            unlocked_achievements: BTreeSet::new(),
            engagement_score: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One immutable row in the append-only points history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsHistoryEntry {
    /// Unique entry id
    pub id: String,

    /// Subject credited or debited
    pub subject: SubjectId,

    /// Activity that produced this entry
    pub activity: ActivityType,

    /// Signed delta; positive for awards, negative for redemptions
    pub points_delta: i64,

    /// Optional correlation id (message id, reward id, achievement id, ...)
    pub activity_ref_id: Option<String>,

    /// Human-readable description
    pub description: String,

    /// Open key-value bag supplied by the caller
    pub metadata: HashMap<String, serde_json::Value>,

    /// When the activity occurred
    pub occurred_at: DateTime<Utc>,
}
