//! Engagement scoring and risk prediction.
//!
//! The score is a deterministic weighted heuristic, not a trained model:
//! inertia from the previous score, recent point intensity, streak
//! consistency, and achievement breadth, each capped. Weights live in
//! [`PredictorConfig`](crate::config::PredictorConfig) so deployments can
//! tune them without touching the formula's shape. A subject with no history
//! still gets a best-effort low-confidence prediction.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::StoreError;
use crate::profile::{GamificationProfile, SubjectId};
use crate::storage::GamificationStore;

/// Engagement risk bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Bucket a 0-100 score.
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            RiskLevel::Critical
        } else if score < 50.0 {
            RiskLevel::High
        } else if score < 70.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Snapshot of the inputs a prediction was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionFactors {
    /// Sum of history deltas in the trailing window
    pub recent_points: i64,

    /// Distinct local calendar days with at least one entry in the window
    pub active_days: u32,

    /// `recent_points / active_days`, zero when inactive
    pub avg_daily_points: f64,

    /// Streak length at prediction time
    pub streak_days: u32,

    /// Unlocked achievement count at prediction time
    pub achievements_unlocked: usize,

    /// Previous engagement score used as inertia
    pub prior_score: f64,
}

/// One appended row in the prediction log. Newest is "current".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementPrediction {
    pub subject: SubjectId,
    pub prediction_date: DateTime<Utc>,
    /// 0-100
    pub predicted_score: f64,
    /// 0-100
    pub confidence_level: f64,
    pub risk_level: RiskLevel,
    pub factors: PredictionFactors,
    /// Deterministic, ordered recommendation strings
    pub recommendations: Vec<String>,
}

/// Computes engagement predictions from profile state and recent history.
pub struct EngagementPredictor {
    config: Arc<EngineConfig>,
}

impl EngagementPredictor {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    /// Compute a prediction for a profile.
    ///
    /// Pure with respect to the profile: the caller appends the prediction
    /// to the log and copies the score back as the next call's inertia.
    pub fn predict(
        &self,
        store: &dyn GamificationStore,
        profile: &GamificationProfile,
        now: DateTime<Utc>,
    ) -> Result<EngagementPrediction, StoreError> {
        let window_days = self.config.prediction_window_days;
        let since = now - Duration::days(window_days);
        let entries = store.query_history(&profile.subject, None, Some(since))?;

        let recent_points: i64 = entries.iter().map(|e| e.points_delta).sum();
        let active_days = entries
            .iter()
            .map(|e| self.config.local_date(e.occurred_at))
            .collect::<HashSet<_>>()
            .len() as u32;

        let avg_daily_points = if active_days > 0 {
            recent_points as f64 / f64::from(active_days)
        } else {
            0.0
        };

        let weights = &self.config.predictor;
        let intensity = (avg_daily_points / weights.intensity_cap).min(1.0) * 100.0;
        let consistency =
            (f64::from(profile.streak_days) / weights.consistency_cap).min(1.0) * 100.0;
        let breadth = profile
            .unlocked_achievements
            .len()
            .min(weights.breadth_cap as usize) as f64;

        let score = (weights.inertia_weight * profile.engagement_score
            + weights.intensity_weight * intensity
            + weights.consistency_weight * consistency
            + weights.breadth_step * breadth)
            .clamp(0.0, 100.0);

        let confidence = (75.0 + f64::from(active_days) / window_days as f64 * 20.0)
            .clamp(0.0, 100.0);

        Ok(EngagementPrediction {
            subject: profile.subject.clone(),
            prediction_date: now,
            predicted_score: score,
            confidence_level: confidence,
            risk_level: RiskLevel::from_score(score),
            factors: PredictionFactors {
                recent_points,
                active_days,
                avg_daily_points,
                streak_days: profile.streak_days,
                achievements_unlocked: profile.unlocked_achievements.len(),
                prior_score: profile.engagement_score,
            },
            recommendations: self.recommendations(score, profile),
        })
    }

    /// Deterministic rule list, in fixed order.
    fn recommendations(&self, score: f64, profile: &GamificationProfile) -> Vec<String> {
        let weights = &self.config.predictor;
        let mut out = Vec::new();
        if score < weights.low_score_threshold {
            out.push("Increase daily communication activity".to_string());
        }
        if profile.streak_days < weights.short_streak_days {
            out.push("Maintain a weekly activity streak".to_string());
        }
        if profile.unlocked_achievements.len() < weights.few_achievements as usize {
            out.push("Explore new features to unlock achievements".to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityType;
    use crate::profile::PointsHistoryEntry;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap()
    }

    fn entry(subject: &SubjectId, delta: i64, occurred_at: DateTime<Utc>) -> PointsHistoryEntry {
        PointsHistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            subject: subject.clone(),
            activity: ActivityType::MessageSent,
            points_delta: delta,
            activity_ref_id: None,
            description: String::new(),
            metadata: HashMap::new(),
            occurred_at,
        }
    }

    fn predictor() -> EngagementPredictor {
        EngagementPredictor::new(Arc::new(EngineConfig::default()))
    }

    #[test]
    fn test_no_history_still_predicts_low_confidence() {
        let store = MemoryStore::new();
        let profile = GamificationProfile::new(SubjectId::new("u1", "e1"), at(10, 9));
        let prediction = predictor().predict(&store, &profile, at(10, 9)).unwrap();

        assert_eq!(prediction.predicted_score, 0.0);
        assert_eq!(prediction.confidence_level, 75.0);
        assert_eq!(prediction.risk_level, RiskLevel::Critical);
        assert_eq!(prediction.factors.active_days, 0);
        assert_eq!(prediction.factors.avg_daily_points, 0.0);
    }

    #[test]
    fn test_score_formula_matches_weights() {
        let store = MemoryStore::new();
        let subject = SubjectId::new("u1", "e1");
        // Two active days, 40 points total: 20 points/day, capped at 10 => full intensity.
        store.append_history(&entry(&subject, 20, at(9, 9))).unwrap();
        store.append_history(&entry(&subject, 20, at(10, 9))).unwrap();

        let mut profile = GamificationProfile::new(subject, at(10, 12));
        profile.engagement_score = 50.0;
        profile.streak_days = 15;
        profile.unlocked_achievements.insert("a".into());
        profile.unlocked_achievements.insert("b".into());

        let prediction = predictor().predict(&store, &profile, at(10, 12)).unwrap();

        // 0.4*50 + 0.3*100 + 0.2*(15/30)*100 + 2*2 = 20 + 30 + 10 + 4
        assert!((prediction.predicted_score - 64.0).abs() < 1e-9);
        assert_eq!(prediction.risk_level, RiskLevel::Medium);
        assert_eq!(prediction.factors.active_days, 2);
        assert_eq!(prediction.factors.recent_points, 40);
    }

    #[test]
    fn test_breadth_contribution_is_capped() {
        let store = MemoryStore::new();
        let mut profile = GamificationProfile::new(SubjectId::new("u1", "e1"), at(10, 9));
        for i in 0..25 {
            profile.unlocked_achievements.insert(format!("ach-{i}"));
        }
        let prediction = predictor().predict(&store, &profile, at(10, 9)).unwrap();
        // 25 achievements capped at 10, times the 2.0 step.
        assert!((prediction.predicted_score - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_entries_outside_window_are_ignored() {
        let store = MemoryStore::new();
        let subject = SubjectId::new("u1", "e1");
        store
            .append_history(&entry(&subject, 500, Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()))
            .unwrap();
        let profile = GamificationProfile::new(subject, at(10, 9));
        let prediction = predictor().predict(&store, &profile, at(10, 9)).unwrap();
        assert_eq!(prediction.factors.recent_points, 0);
    }

    #[test]
    fn test_risk_buckets() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(29.9), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(30.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(49.9), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(50.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(69.9), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(70.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::Low);
    }

    #[test]
    fn test_recommendations_are_ordered_and_rule_driven() {
        let store = MemoryStore::new();
        let profile = GamificationProfile::new(SubjectId::new("u1", "e1"), at(10, 9));
        let prediction = predictor().predict(&store, &profile, at(10, 9)).unwrap();
        assert_eq!(
            prediction.recommendations,
            vec![
                "Increase daily communication activity",
                "Maintain a weekly activity streak",
                "Explore new features to unlock achievements",
            ]
        );

        let mut engaged = GamificationProfile::new(SubjectId::new("u2", "e2"), at(10, 9));
        engaged.engagement_score = 100.0;
        engaged.streak_days = 30;
        for i in 0..10 {
            engaged.unlocked_achievements.insert(format!("ach-{i}"));
        }
        let prediction = predictor().predict(&store, &engaged, at(10, 9)).unwrap();
        assert!(prediction.recommendations.is_empty());
    }
}
