//! Consecutive-day activity streaks.
//!
//! A streak counts consecutive subject-local calendar days with at least one
//! admitted activity. Updates are idempotent within a day: repeated calls on
//! the same date converge to the same state instead of accumulating.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::EngineConfig;
use crate::profile::GamificationProfile;

/// Result of a streak update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    /// Streak length after the update
    pub streak_days: u32,

    /// True when this call extended the streak (including day one)
    pub extended: bool,

    /// True when a gap of two or more days reset the streak to 1
    pub reset: bool,

    /// Set when the extension landed on a bonus milestone
    /// (a multiple of the configured interval)
    pub milestone: Option<u32>,
}

/// Computes streak transitions against the subject's local calendar.
pub struct StreakTracker {
    config: Arc<EngineConfig>,
}

impl StreakTracker {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    /// Fold today's activity into the profile's streak.
    ///
    /// The caller saves the profile; this only mutates it.
    pub fn update(&self, profile: &mut GamificationProfile, now: DateTime<Utc>) -> StreakUpdate {
        let today = self.config.local_date(now);

        let (streak_days, extended, reset) = match profile.last_activity_date {
            None => (1, true, false),
            Some(last) if last == today => (profile.streak_days, false, false),
            Some(last) if last == today - Duration::days(1) => {
                (profile.streak_days + 1, true, false)
            }
            Some(_) => (1, true, true),
        };

        profile.streak_days = streak_days;
        profile.last_activity_date = Some(today);

        let interval = self.config.streak_bonus_interval_days;
        let milestone = (extended && interval > 0 && streak_days % interval == 0)
            .then_some(streak_days);

        StreakUpdate {
            streak_days,
            extended,
            reset,
            milestone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::SubjectId;
    use chrono::TimeZone;

    fn tracker() -> StreakTracker {
        StreakTracker::new(Arc::new(EngineConfig::default()))
    }

    fn day(d: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, hour, 0, 0).unwrap()
    }

    fn profile() -> GamificationProfile {
        GamificationProfile::new(SubjectId::new("u1", "e1"), day(1, 9))
    }

    #[test]
    fn test_first_activity_starts_streak_at_one() {
        let t = tracker();
        let mut p = profile();
        let update = t.update(&mut p, day(1, 9));
        assert_eq!(update.streak_days, 1);
        assert!(update.extended);
        assert!(!update.reset);
        assert_eq!(p.last_activity_date, Some(day(1, 9).date_naive()));
    }

    #[test]
    fn test_same_day_is_idempotent() {
        let t = tracker();
        let mut p = profile();
        t.update(&mut p, day(1, 9));
        for hour in [10, 12, 15, 20, 23] {
            let update = t.update(&mut p, day(1, hour));
            assert_eq!(update.streak_days, 1);
            assert!(!update.extended);
        }
        assert_eq!(p.streak_days, 1);
    }

    #[test]
    fn test_consecutive_day_extends() {
        let t = tracker();
        let mut p = profile();
        t.update(&mut p, day(1, 9));
        let update = t.update(&mut p, day(2, 7));
        assert_eq!(update.streak_days, 2);
        assert!(update.extended);
        assert!(!update.reset);
    }

    #[test]
    fn test_gap_resets_to_one() {
        let t = tracker();
        let mut p = profile();
        t.update(&mut p, day(1, 9));
        t.update(&mut p, day(2, 9));
        t.update(&mut p, day(3, 9));
        assert_eq!(p.streak_days, 3);

        // Last active on the 3rd, back on the 6th: reset, not extension.
        let update = t.update(&mut p, day(6, 9));
        assert_eq!(update.streak_days, 1);
        assert!(update.reset);
        assert_eq!(p.streak_days, 1);
    }

    #[test]
    fn test_milestone_on_interval_multiples() {
        let t = tracker();
        let mut p = profile();
        for d in 1..=14 {
            let update = t.update(&mut p, day(d, 9));
            match d {
                7 => assert_eq!(update.milestone, Some(7)),
                14 => assert_eq!(update.milestone, Some(14)),
                _ => assert_eq!(update.milestone, None),
            }
        }
    }

    #[test]
    fn test_no_milestone_without_extension() {
        let t = tracker();
        let mut p = profile();
        for d in 1..=7 {
            t.update(&mut p, day(d, 9));
        }
        // Second call on day 7: streak is at a multiple but nothing extended.
        let update = t.update(&mut p, day(7, 18));
        assert_eq!(update.milestone, None);
    }

    #[test]
    fn test_local_midnight_boundary() {
        let config = EngineConfig {
            timezone_offset_hours: 2,
            ..Default::default()
        };
        let t = StreakTracker::new(Arc::new(config));
        let mut p = profile();

        // 23:00 UTC on the 1st is already the 2nd at UTC+2.
        t.update(&mut p, day(1, 23));
        assert_eq!(p.last_activity_date, Some(day(2, 0).date_naive()));

        // 21:00 UTC on the 2nd is still the 2nd locally: no extension.
        let update = t.update(&mut p, day(2, 21));
        assert!(!update.extended);

        // 22:30 UTC on the 2nd is the 3rd locally: extension.
        let update = t.update(&mut p, Utc.with_ymd_and_hms(2024, 6, 2, 22, 30, 0).unwrap());
        assert_eq!(update.streak_days, 2);
    }
}
