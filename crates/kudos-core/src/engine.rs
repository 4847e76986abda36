//! Gamification engine facade.
//!
//! Sequences one `track_activity` call through the pipeline:
//! throttle gate, ledger credit, streak update, achievement evaluation,
//! then best-effort prediction refresh and notification fan-out. A throttle
//! rejection is terminal with zero side effects; a ledger failure aborts the
//! call; best-effort stage failures are logged and never surfaced.
//!
//! Calls for the same subject are serialized by a keyed async mutex so
//! concurrent activity cannot race on point totals or throttle counters;
//! calls for different subjects proceed fully in parallel. Once points are
//! credited the operation is committed -- there is no cancellation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::achievements::AchievementEngine;
use crate::activity::ActivityType;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::events::GamificationEvent;
use crate::ledger::{Award, PointsLedger};
use crate::notify::{NotificationFanout, Notifier, NullNotifier};
use crate::prediction::EngagementPredictor;
use crate::profile::{GamificationProfile, PointsHistoryEntry, SubjectId};
use crate::storage::GamificationStore;
use crate::streak::{StreakTracker, StreakUpdate};
use crate::throttle::{ActiveCooldown, ActivityThrottler, ThrottleDecision, ThrottleRejection};

/// Window of history returned by the realtime-stats surface.
const RECENT_EVENTS_HOURS: i64 = 24;

/// One activity to track.
#[derive(Debug, Clone)]
pub struct TrackRequest {
    pub subject: SubjectId,
    pub activity: ActivityType,
    pub ref_id: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TrackRequest {
    pub fn new(subject: SubjectId, activity: ActivityType) -> Self {
        Self {
            subject,
            activity,
            ref_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = Some(ref_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Side effects of an admitted tracking call.
#[derive(Debug, Clone)]
pub struct TrackOutcome {
    /// Points credited for the triggering activity itself
    pub points_awarded: i64,

    /// Additional points credited in the same call (streak bonuses,
    /// achievement rewards)
    pub bonus_points: i64,

    /// Achievement ids unlocked by this call, in catalog order
    pub unlocked_achievements: Vec<String>,

    /// Streak transition applied by this call
    pub streak: StreakUpdate,

    /// Profile snapshot after all credits
    pub profile: GamificationProfile,
}

impl TrackOutcome {
    /// Everything credited by the call, activity points plus bonuses.
    pub fn total_points_awarded(&self) -> i64 {
        self.points_awarded + self.bonus_points
    }
}

/// Outcome of a tracking call. Throttling is an ordinary outcome the caller
/// shows as "try later", not an error.
#[derive(Debug, Clone)]
pub enum TrackResult {
    Credited(TrackOutcome),
    Throttled(ThrottleRejection),
}

/// Outcome of a successful redemption.
#[derive(Debug, Clone)]
pub struct RedeemOutcome {
    /// Points debited (positive)
    pub points_debited: i64,

    /// Profile snapshot after the debit
    pub profile: GamificationProfile,
}

/// Snapshot for the realtime dashboard surface.
#[derive(Debug, Clone)]
pub struct RealtimeStats {
    pub profile: GamificationProfile,

    /// History entries from the trailing 24 hours, oldest first
    pub recent_events: Vec<PointsHistoryEntry>,

    /// Throttle restrictions currently in force
    pub active_cooldowns: Vec<ActiveCooldown>,
}

/// The engine facade. Construct once at process start and share by
/// reference; all collaborators are injected, none are ambient singletons.
pub struct GamificationEngine {
    config: Arc<EngineConfig>,
    store: Arc<dyn GamificationStore>,
    throttler: ActivityThrottler,
    ledger: PointsLedger,
    streaks: StreakTracker,
    achievements: AchievementEngine,
    predictor: EngagementPredictor,
    fanout: NotificationFanout,
    /// Per-subject serialization locks. Entries are never evicted; the map
    /// grows with the distinct subject population seen by this process.
    subject_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl GamificationEngine {
    /// Engine with default configuration and no notifier.
    pub fn new(store: Arc<dyn GamificationStore>) -> Self {
        Self::with_config(Arc::new(EngineConfig::default()), store)
    }

    /// Engine with explicit configuration.
    pub fn with_config(config: Arc<EngineConfig>, store: Arc<dyn GamificationStore>) -> Self {
        Self {
            throttler: ActivityThrottler::new(Arc::clone(&config)),
            ledger: PointsLedger::new(Arc::clone(&config)),
            streaks: StreakTracker::new(Arc::clone(&config)),
            achievements: AchievementEngine::new(Arc::clone(&config)),
            predictor: EngagementPredictor::new(Arc::clone(&config)),
            fanout: NotificationFanout::new(Arc::new(NullNotifier)),
            subject_locks: Mutex::new(HashMap::new()),
            config,
            store,
        }
    }

    /// Inject the notification collaborator.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.fanout = NotificationFanout::new(notifier);
        self
    }

    /// Inject the notification collaborator with a custom emit timeout.
    pub fn with_notifier_timeout(mut self, notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        self.fanout = NotificationFanout::with_timeout(notifier, timeout);
        self
    }

    /// Track one activity at the current wall-clock time.
    pub async fn track_activity(&self, request: TrackRequest) -> Result<TrackResult> {
        self.track_activity_at(request, Utc::now()).await
    }

    /// Track one activity at an explicit instant.
    pub async fn track_activity_at(
        &self,
        request: TrackRequest,
        now: DateTime<Utc>,
    ) -> Result<TrackResult> {
        let lock = self.subject_lock(&request.subject);
        let (result, events) = {
            let _guard = lock.lock().await;
            self.run_pipeline(request, now)?
        };
        // The subject lock is released before fan-out; notification latency
        // never extends the serialized section.
        self.fanout.emit(events).await;
        Ok(result)
    }

    /// Redeem a reward at the current wall-clock time.
    pub async fn redeem_reward(
        &self,
        subject: &SubjectId,
        reward_id: &str,
        cost: i64,
    ) -> Result<RedeemOutcome> {
        self.redeem_reward_at(subject, reward_id, cost, Utc::now()).await
    }

    /// Redeem a reward at an explicit instant.
    ///
    /// Debits `cost` points when the balance covers it; fails with
    /// `InvalidCost` for a non-positive cost and `InsufficientPoints` for a
    /// balance that cannot cover it, leaving the balance untouched either
    /// way.
    pub async fn redeem_reward_at(
        &self,
        subject: &SubjectId,
        reward_id: &str,
        cost: i64,
        now: DateTime<Utc>,
    ) -> Result<RedeemOutcome> {
        if cost <= 0 {
            return Err(EngineError::InvalidCost(cost));
        }
        let lock = self.subject_lock(subject);
        let (outcome, event) = {
            let _guard = lock.lock().await;

            let mut profile = self
                .store
                .load_profile(subject)?
                .unwrap_or_else(|| GamificationProfile::new(subject.clone(), now));
            if profile.total_points < cost {
                return Err(EngineError::InsufficientPoints {
                    required: cost,
                    available: profile.total_points,
                });
            }

            let award = Award::of(
                ActivityType::RewardRedeemed,
                format!("Redeemed reward '{reward_id}'"),
            )
            .with_ref_id(reward_id)
            .with_delta(-cost);
            self.ledger.credit(self.store.as_ref(), &mut profile, award, now)?;

            let event = GamificationEvent::RewardRedeemed {
                subject: subject.clone(),
                reward_id: reward_id.to_string(),
                cost,
                remaining_points: profile.total_points,
                at: now,
            };
            (
                RedeemOutcome {
                    points_debited: cost,
                    profile,
                },
                event,
            )
        };
        self.fanout.emit(vec![event]).await;
        Ok(outcome)
    }

    /// A subject's profile; a fresh zeroed profile when none exists yet.
    pub fn get_profile(&self, subject: &SubjectId) -> Result<GamificationProfile> {
        Ok(self
            .store
            .load_profile(subject)?
            .unwrap_or_else(|| GamificationProfile::new(subject.clone(), Utc::now())))
    }

    /// Profile, recent history, and active throttle restrictions.
    pub fn get_realtime_stats(&self, subject: &SubjectId) -> Result<RealtimeStats> {
        self.get_realtime_stats_at(subject, Utc::now())
    }

    /// Realtime stats at an explicit instant.
    pub fn get_realtime_stats_at(
        &self,
        subject: &SubjectId,
        now: DateTime<Utc>,
    ) -> Result<RealtimeStats> {
        let profile = self
            .store
            .load_profile(subject)?
            .unwrap_or_else(|| GamificationProfile::new(subject.clone(), now));
        let since = now - chrono::Duration::hours(RECENT_EVENTS_HOURS);
        let recent_events = self.store.query_history(subject, None, Some(since))?;
        let active_cooldowns = self.throttler.active_cooldowns(subject, now);
        Ok(RealtimeStats {
            profile,
            recent_events,
            active_cooldowns,
        })
    }

    /// The serialized portion of a tracking call. Runs under the subject
    /// lock; returns the result plus the events to fan out afterwards.
    fn run_pipeline(
        &self,
        request: TrackRequest,
        now: DateTime<Utc>,
    ) -> Result<(TrackResult, Vec<GamificationEvent>)> {
        let subject = request.subject.clone();

        match self.throttler.check(&subject, &request.activity, now) {
            ThrottleDecision::Allowed => {}
            ThrottleDecision::Rejected(rejection) => {
                return Ok((TrackResult::Throttled(rejection), Vec::new()));
            }
        }

        let store = self.store.as_ref();
        let mut profile = store
            .load_profile(&subject)?
            .unwrap_or_else(|| GamificationProfile::new(subject.clone(), now));
        let level_before = profile.current_level;
        let mut events = Vec::new();

        // Credited: fatal on failure, nothing else runs.
        let mut award = Award::of(
            request.activity.clone(),
            format!("Activity: {}", request.activity),
        );
        award.ref_id = request.ref_id;
        award.metadata = request.metadata;
        let credit = self.ledger.credit(store, &mut profile, award, now)?;
        // The reservation is consumed only once the credit is durable, so
        // an aborted call can be retried without waiting out the cooldown.
        self.throttler.commit(&subject, &request.activity, now);
        events.push(GamificationEvent::PointsAwarded {
            subject: subject.clone(),
            activity: request.activity.clone(),
            points: credit.points_delta,
            total_points: profile.total_points,
            at: now,
        });

        // StreakUpdated.
        let streak = self.streaks.update(&mut profile, now);
        if streak.extended || streak.reset {
            store.save_profile(&profile)?;
        }
        if streak.extended {
            events.push(GamificationEvent::StreakExtended {
                subject: subject.clone(),
                streak_days: streak.streak_days,
                at: now,
            });
        }

        let mut bonus_points = 0;
        if let Some(milestone) = streak.milestone {
            let bonus = self.ledger.credit(
                store,
                &mut profile,
                Award::of(
                    ActivityType::StreakBonus,
                    format!("{milestone}-day streak bonus"),
                )
                .with_metadata("streak_days", serde_json::json!(milestone)),
                now,
            )?;
            bonus_points += bonus.points_delta;
            events.push(GamificationEvent::StreakBonus {
                subject: subject.clone(),
                streak_days: milestone,
                bonus_points: bonus.points_delta,
                at: now,
            });
        }

        // AchievementsEvaluated. A missing catalog skips evaluation for
        // this call; the next activity retries.
        let newly = match self.achievements.newly_eligible(store, &profile, now) {
            Ok(definitions) => definitions,
            Err(e) => {
                warn!(subject = %subject, error = %e, "achievement evaluation skipped");
                Vec::new()
            }
        };
        let mut unlocked_ids = Vec::with_capacity(newly.len());
        for definition in newly {
            profile.unlocked_achievements.insert(definition.id.clone());
            let reward = self.ledger.credit(
                store,
                &mut profile,
                Award::of(
                    ActivityType::AchievementUnlocked,
                    format!("Unlocked achievement '{}'", definition.name),
                )
                .with_ref_id(definition.id.clone())
                .with_delta(definition.points_reward)
                .with_metadata("achievement_name", serde_json::json!(definition.name)),
                now,
            )?;
            bonus_points += reward.points_delta;
            events.push(GamificationEvent::AchievementUnlocked {
                subject: subject.clone(),
                achievement_id: definition.id.clone(),
                name: definition.name,
                points_reward: definition.points_reward,
                at: now,
            });
            unlocked_ids.push(definition.id);
        }

        if profile.current_level > level_before {
            events.push(GamificationEvent::LevelUp {
                subject: subject.clone(),
                level: profile.current_level,
                at: now,
            });
        }

        // PredictionRefreshed: best-effort, logged on failure.
        if let Err(e) = self.refresh_prediction(&mut profile, now) {
            warn!(subject = %subject, error = %e, "prediction refresh failed");
        }

        let outcome = TrackOutcome {
            points_awarded: credit.points_delta,
            bonus_points,
            unlocked_achievements: unlocked_ids,
            streak,
            profile,
        };
        Ok((TrackResult::Credited(outcome), events))
    }

    fn refresh_prediction(
        &self,
        profile: &mut GamificationProfile,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let prediction = self.predictor.predict(self.store.as_ref(), profile, now)?;
        self.store.append_prediction(&prediction)?;
        profile.engagement_score = prediction.predicted_score;
        self.store.save_profile(profile)?;
        Ok(())
    }

    fn subject_lock(&self, subject: &SubjectId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.subject_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(subject.key()).or_default())
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
