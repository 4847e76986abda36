//! Activity types eligible for points and throttling.
//!
//! Activity types are stored and configured by their snake_case name, so the
//! enum round-trips through strings. Types the engine does not know about are
//! carried as `Custom` -- the throttler admits them unconditionally, while the
//! ledger refuses to value them without an explicit override delta.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A categorical action that can earn points.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActivityType {
    /// A chat message was sent
    MessageSent,
    /// A chat message was read
    MessageRead,
    /// A file was uploaded
    FileUploaded,
    /// A file was downloaded
    FileDownloaded,
    /// A message template was used
    TemplateUsed,
    /// First login of the local day
    DailyLogin,
    /// Bonus entry written when an achievement unlocks
    AchievementUnlocked,
    /// Bonus entry written when a streak milestone is reached
    StreakBonus,
    /// Seven consecutive fully-active days
    PerfectWeek,
    /// Debit entry written when a reward is redeemed
    RewardRedeemed,
    /// Any activity kind the engine has no built-in knowledge of
    Custom(String),
}

impl ActivityType {
    /// Canonical snake_case name used in configuration and storage.
    pub fn as_str(&self) -> &str {
        match self {
            ActivityType::MessageSent => "message_sent",
            ActivityType::MessageRead => "message_read",
            ActivityType::FileUploaded => "file_uploaded",
            ActivityType::FileDownloaded => "file_downloaded",
            ActivityType::TemplateUsed => "template_used",
            ActivityType::DailyLogin => "daily_login",
            ActivityType::AchievementUnlocked => "achievement_unlocked",
            ActivityType::StreakBonus => "streak_bonus",
            ActivityType::PerfectWeek => "perfect_week",
            ActivityType::RewardRedeemed => "reward_redeemed",
            ActivityType::Custom(name) => name,
        }
    }

    /// Parse from a canonical name. Unknown names become `Custom`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "message_sent" => ActivityType::MessageSent,
            "message_read" => ActivityType::MessageRead,
            "file_uploaded" => ActivityType::FileUploaded,
            "file_downloaded" => ActivityType::FileDownloaded,
            "template_used" => ActivityType::TemplateUsed,
            "daily_login" => ActivityType::DailyLogin,
            "achievement_unlocked" => ActivityType::AchievementUnlocked,
            "streak_bonus" => ActivityType::StreakBonus,
            "perfect_week" => ActivityType::PerfectWeek,
            "reward_redeemed" => ActivityType::RewardRedeemed,
            other => ActivityType::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ActivityType::from_name(s))
    }
}

impl Serialize for ActivityType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(ActivityType::from_name(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_known_names() {
        for name in [
            "message_sent",
            "message_read",
            "file_uploaded",
            "file_downloaded",
            "template_used",
            "daily_login",
            "achievement_unlocked",
            "streak_bonus",
            "perfect_week",
            "reward_redeemed",
        ] {
            let activity = ActivityType::from_name(name);
            assert!(!matches!(activity, ActivityType::Custom(_)), "{name}");
            assert_eq!(activity.as_str(), name);
        }
    }

    #[test]
    fn test_unknown_name_becomes_custom() {
        let activity = ActivityType::from_name("video_call");
        assert_eq!(activity, ActivityType::Custom("video_call".to_string()));
        assert_eq!(activity.as_str(), "video_call");
    }

    #[test]
    fn test_serde_as_plain_string() {
        let json = serde_json::to_string(&ActivityType::MessageSent).unwrap();
        assert_eq!(json, r#""message_sent""#);
        let parsed: ActivityType = serde_json::from_str(r#""file_uploaded""#).unwrap();
        assert_eq!(parsed, ActivityType::FileUploaded);
    }
}
