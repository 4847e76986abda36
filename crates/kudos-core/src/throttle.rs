//! Per-subject, per-activity-kind rate limiting.
//!
//! Each throttled activity type carries a policy of at most `max_per_window`
//! occurrences per hourly or daily window, plus a minimum cooldown between
//! consecutive occurrences. Activity types without a policy entry are
//! admitted unconditionally -- the permissive default, not an error.
//!
//! Throttle state is a derived cache of recent history and lives behind
//! [`ThrottleStore`]. The in-memory implementation is correct for a single
//! engine instance; multi-instance deployments need a shared implementation
//! backed by an atomically-incrementable store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::activity::ActivityType;
use crate::config::EngineConfig;
use crate::profile::SubjectId;

/// Window kind a throttle counts occurrences over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// Rolling one-hour window from the first occurrence
    Hourly,
    /// Window ending at the next local midnight
    Daily,
}

/// Rate-limit policy for one activity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottlePolicy {
    /// Maximum occurrences per window
    pub max_per_window: u32,

    /// Window kind
    pub window: WindowKind,

    /// Minimum minutes between consecutive occurrences
    pub cooldown_minutes: i64,
}

impl ThrottlePolicy {
    pub fn new(max_per_window: u32, window: WindowKind, cooldown_minutes: i64) -> Self {
        Self {
            max_per_window,
            window,
            cooldown_minutes,
        }
    }
}

/// Ephemeral counter state for one (subject, activity type) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThrottleState {
    /// Occurrences counted in the current window
    pub occurrences_in_window: u32,

    /// When the current window expires; unset until the window's first
    /// occurrence
    pub window_reset_at: Option<DateTime<Utc>>,

    /// Most recent occurrence, for cooldown enforcement
    pub last_occurrence_at: Option<DateTime<Utc>>,
}

/// Key for throttle state lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThrottleKey {
    pub subject: String,
    pub activity: String,
}

impl ThrottleKey {
    pub fn new(subject: &SubjectId, activity: &ActivityType) -> Self {
        Self {
            subject: subject.key(),
            activity: activity.as_str().to_string(),
        }
    }
}

/// Backing store for throttle counters.
///
/// Callers are expected to serialize load/save per subject (the engine holds
/// a per-subject lock across check and commit), so implementations only
/// need to be internally thread-safe, not transactional.
pub trait ThrottleStore: Send + Sync {
    fn load(&self, key: &ThrottleKey) -> Option<ThrottleState>;
    fn save(&self, key: &ThrottleKey, state: ThrottleState);
}

/// In-process throttle store for single-instance deployments.
///
/// Entries are never evicted; the map grows with the distinct
/// (subject, activity type) population seen by this process.
#[derive(Default)]
pub struct MemoryThrottleStore {
    states: Mutex<HashMap<ThrottleKey, ThrottleState>>,
}

impl MemoryThrottleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ThrottleStore for MemoryThrottleStore {
    fn load(&self, key: &ThrottleKey) -> Option<ThrottleState> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.get(key).cloned()
    }

    fn save(&self, key: &ThrottleKey, state: ThrottleState) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.insert(key.clone(), state);
    }
}

/// Why an activity was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ThrottleRejection {
    /// The per-occurrence cooldown has not elapsed
    Cooldown {
        /// Whole minutes until the next occurrence is allowed (rounded up)
        remaining_minutes: i64,
    },

    /// The window's occurrence budget is exhausted
    LimitExceeded {
        /// Human-readable hint for when to retry ("1 hour" / "tomorrow")
        next_allowed: String,
    },
}

/// Outcome of a throttle check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allowed,
    Rejected(ThrottleRejection),
}

/// A currently-active restriction, reported by the realtime-stats surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveCooldown {
    /// Restricted activity type
    pub activity: ActivityType,

    /// Minutes until the cooldown elapses (zero when only the window
    /// budget blocks the activity)
    pub remaining_minutes: i64,

    /// Occurrences counted in the current window
    pub occurrences_in_window: u32,

    /// When the window's counter resets
    pub window_resets_at: Option<DateTime<Utc>>,
}

/// Per-subject, per-activity-kind rate limiter.
pub struct ActivityThrottler {
    config: Arc<EngineConfig>,
    store: Box<dyn ThrottleStore>,
}

impl ActivityThrottler {
    /// Throttler with an in-memory state store.
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self::with_store(config, Box::new(MemoryThrottleStore::new()))
    }

    /// Throttler with a custom state store.
    pub fn with_store(config: Arc<EngineConfig>, store: Box<dyn ThrottleStore>) -> Self {
        Self { config, store }
    }

    /// Check the policy for one occurrence without consuming it.
    ///
    /// A caller acting on an `Allowed` decision must call
    /// [`commit`](Self::commit) once the occurrence has been durably
    /// recorded; rejected or aborted calls leave the counters untouched, so
    /// a retry after a failed write is admitted again.
    pub fn check(
        &self,
        subject: &SubjectId,
        activity: &ActivityType,
        now: DateTime<Utc>,
    ) -> ThrottleDecision {
        let Some(policy) = self.config.policy_for(activity) else {
            return ThrottleDecision::Allowed;
        };

        let key = ThrottleKey::new(subject, activity);
        let mut state = self.store.load(&key).unwrap_or_default();
        expire_window(&mut state, now);

        if let Some(last) = state.last_occurrence_at {
            let remaining = remaining_cooldown_minutes(policy, last, now);
            if remaining > 0 {
                debug!(
                    subject = %subject,
                    activity = %activity,
                    remaining_minutes = remaining,
                    "activity rejected: cooldown"
                );
                return ThrottleDecision::Rejected(ThrottleRejection::Cooldown {
                    remaining_minutes: remaining,
                });
            }
        }

        if state.occurrences_in_window >= policy.max_per_window {
            let next_allowed = match policy.window {
                WindowKind::Hourly => "1 hour".to_string(),
                WindowKind::Daily => "tomorrow".to_string(),
            };
            debug!(
                subject = %subject,
                activity = %activity,
                occurrences = state.occurrences_in_window,
                "activity rejected: window limit"
            );
            return ThrottleDecision::Rejected(ThrottleRejection::LimitExceeded { next_allowed });
        }

        ThrottleDecision::Allowed
    }

    /// Record one admitted occurrence.
    ///
    /// Must run under the same per-subject serialization as the preceding
    /// [`check`](Self::check).
    pub fn commit(&self, subject: &SubjectId, activity: &ActivityType, now: DateTime<Utc>) {
        let Some(policy) = self.config.policy_for(activity) else {
            return;
        };

        let key = ThrottleKey::new(subject, activity);
        let mut state = self.store.load(&key).unwrap_or_default();
        expire_window(&mut state, now);

        state.occurrences_in_window += 1;
        state.last_occurrence_at = Some(now);
        if state.window_reset_at.is_none() {
            state.window_reset_at = Some(self.window_end(policy.window, now));
        }
        self.store.save(&key, state);
    }

    /// Restrictions currently in force for a subject.
    pub fn active_cooldowns(&self, subject: &SubjectId, now: DateTime<Utc>) -> Vec<ActiveCooldown> {
        let mut cooldowns: Vec<ActiveCooldown> = Vec::new();
        for (name, policy) in &self.config.throttle_policies {
            let activity = ActivityType::from_name(name);
            let key = ThrottleKey::new(subject, &activity);
            let Some(state) = self.store.load(&key) else {
                continue;
            };

            let window_live = state.window_reset_at.is_some_and(|reset| now <= reset);
            let occurrences = if window_live { state.occurrences_in_window } else { 0 };

            let remaining = state
                .last_occurrence_at
                .map(|last| remaining_cooldown_minutes(policy, last, now))
                .unwrap_or(0);

            let saturated = window_live && occurrences >= policy.max_per_window;
            if remaining > 0 || saturated {
                cooldowns.push(ActiveCooldown {
                    activity,
                    remaining_minutes: remaining,
                    occurrences_in_window: occurrences,
                    window_resets_at: state.window_reset_at.filter(|_| window_live),
                });
            }
        }
        cooldowns.sort_by(|a, b| a.activity.as_str().cmp(b.activity.as_str()));
        cooldowns
    }

    /// End of a fresh window starting at `now`: one hour for rolling
    /// windows, the next local midnight for daily ones.
    fn window_end(&self, window: WindowKind, now: DateTime<Utc>) -> DateTime<Utc> {
        match window {
            WindowKind::Hourly => now + Duration::hours(1),
            WindowKind::Daily => {
                let tz = self.config.timezone();
                let local = now.with_timezone(&tz);
                local
                    .date_naive()
                    .succ_opt()
                    .and_then(|next| next.and_hms_opt(0, 0, 0))
                    .and_then(|midnight| midnight.and_local_timezone(tz).single())
                    .map(|local_midnight| local_midnight.with_timezone(&Utc))
                    .unwrap_or(now + Duration::days(1))
            }
        }
    }
}

/// Drop an expired window's counter.
fn expire_window(state: &mut ThrottleState, now: DateTime<Utc>) {
    if let Some(reset_at) = state.window_reset_at {
        if now > reset_at {
            state.occurrences_in_window = 0;
            state.window_reset_at = None;
        }
    }
}

/// Whole minutes (rounded up) until the cooldown elapses; zero when clear.
fn remaining_cooldown_minutes(
    policy: &ThrottlePolicy,
    last: DateTime<Utc>,
    now: DateTime<Utc>,
) -> i64 {
    let elapsed = (now - last).num_seconds().max(0);
    let cooldown = policy.cooldown_minutes * 60;
    if elapsed >= cooldown {
        0
    } else {
        (cooldown - elapsed + 59) / 60
    }
}
