//! Gamification events emitted to the notification collaborator.
//!
//! Every user-visible side effect of a tracking call produces an event.
//! Delivery transports are external; the engine only hands events to the
//! injected [`Notifier`](crate::notify::Notifier).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityType;
use crate::profile::SubjectId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GamificationEvent {
    PointsAwarded {
        subject: SubjectId,
        activity: ActivityType,
        points: i64,
        total_points: i64,
        at: DateTime<Utc>,
    },
    LevelUp {
        subject: SubjectId,
        level: u32,
        at: DateTime<Utc>,
    },
    StreakExtended {
        subject: SubjectId,
        streak_days: u32,
        at: DateTime<Utc>,
    },
    /// The streak reached a bonus milestone and the bonus was credited.
    StreakBonus {
        subject: SubjectId,
        streak_days: u32,
        bonus_points: i64,
        at: DateTime<Utc>,
    },
    AchievementUnlocked {
        subject: SubjectId,
        achievement_id: String,
        name: String,
        points_reward: i64,
        at: DateTime<Utc>,
    },
    RewardRedeemed {
        subject: SubjectId,
        reward_id: String,
        cost: i64,
        remaining_points: i64,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_tag_by_type() {
        let event = GamificationEvent::LevelUp {
            subject: SubjectId::new("u1", "e1"),
            level: 3,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "LevelUp");
        assert_eq!(json["level"], 3);
    }
}
