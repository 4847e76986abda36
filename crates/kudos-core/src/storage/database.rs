//! SQLite-backed gamification store.
//!
//! Persists profiles, the points history ledger, and the prediction log.
//! Timestamps are stored as RFC 3339 text; the achievement catalog is
//! injected at construction since it is read-only reference data owned by
//! an external catalog service.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};

use crate::achievements::AchievementDefinition;
use crate::activity::ActivityType;
use crate::error::StoreError;
use crate::prediction::{EngagementPrediction, PredictionFactors, RiskLevel};
use crate::profile::{GamificationProfile, PointsHistoryEntry, SubjectId};

use super::{data_dir, GamificationStore};

/// SQLite database holding per-subject gamification state.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    catalog: Vec<AchievementDefinition>,
}

impl SqliteStore {
    /// Open (and migrate) the database at an explicit path.
    pub fn open(
        path: impl AsRef<Path>,
        catalog: Vec<AchievementDefinition>,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: PathBuf::from(path),
            source,
        })?;
        let store = Self {
            conn: Mutex::new(conn),
            catalog,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open the database at `~/.config/kudos/kudos.db`.
    pub fn open_default(catalog: Vec<AchievementDefinition>) -> Result<Self, StoreError> {
        let path = data_dir()?.join("kudos.db");
        Self::open(path, catalog)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory(catalog: Vec<AchievementDefinition>) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let store = Self {
            conn: Mutex::new(conn),
            catalog,
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS profiles (
                subject_key           TEXT PRIMARY KEY,
                user_id               TEXT NOT NULL,
                employee_id           TEXT NOT NULL,
                total_points          INTEGER NOT NULL,
                current_level         INTEGER NOT NULL,
                streak_days           INTEGER NOT NULL,
                last_activity_date    TEXT,
                unlocked_achievements TEXT NOT NULL DEFAULT '[]',
                engagement_score      REAL NOT NULL DEFAULT 0,
                created_at            TEXT NOT NULL,
                updated_at            TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS points_history (
                id              TEXT PRIMARY KEY,
                subject_key     TEXT NOT NULL,
                user_id         TEXT NOT NULL,
                employee_id     TEXT NOT NULL,
                activity        TEXT NOT NULL,
                points_delta    INTEGER NOT NULL,
                activity_ref_id TEXT,
                description     TEXT NOT NULL DEFAULT '',
                metadata        TEXT NOT NULL DEFAULT '{}',
                occurred_at     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS predictions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                subject_key     TEXT NOT NULL,
                prediction_date TEXT NOT NULL,
                predicted_score REAL NOT NULL,
                confidence      REAL NOT NULL,
                risk_level      TEXT NOT NULL,
                factors         TEXT NOT NULL,
                recommendations TEXT NOT NULL
            );

            -- Query patterns: ledger replay per subject, trailing windows,
            -- per-type counts.
            CREATE INDEX IF NOT EXISTS idx_history_subject_occurred
                ON points_history(subject_key, occurred_at);
            CREATE INDEX IF NOT EXISTS idx_history_subject_activity
                ON points_history(subject_key, activity);
            CREATE INDEX IF NOT EXISTS idx_predictions_subject
                ON predictions(subject_key, prediction_date);",
        )
        .map_err(|e| StoreError::MigrationFailed(e.to_string()))
    }
}

impl GamificationStore for SqliteStore {
    fn load_profile(&self, subject: &SubjectId) -> Result<Option<GamificationProfile>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT user_id, employee_id, total_points, current_level, streak_days,
                    last_activity_date, unlocked_achievements, engagement_score,
                    created_at, updated_at
             FROM profiles WHERE subject_key = ?1",
        )?;
        let mut rows = stmt.query_map(params![subject.key()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, f64>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
            ))
        })?;

        let Some(row) = rows.next() else {
            return Ok(None);
        };
        let (
            user_id,
            employee_id,
            total_points,
            current_level,
            streak_days,
            last_activity_date,
            unlocked_json,
            engagement_score,
            created_at,
            updated_at,
        ) = row?;

        let unlocked: BTreeSet<String> = serde_json::from_str(&unlocked_json)?;
        Ok(Some(GamificationProfile {
            subject: SubjectId::new(user_id, employee_id),
            total_points,
            current_level,
            streak_days,
            last_activity_date: last_activity_date.map(|d| parse_date(&d)).transpose()?,
            unlocked_achievements: unlocked,
            engagement_score,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }

    fn save_profile(&self, profile: &GamificationProfile) -> Result<(), StoreError> {
        let unlocked_json = serde_json::to_string(&profile.unlocked_achievements)?;
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT OR REPLACE INTO profiles
                (subject_key, user_id, employee_id, total_points, current_level,
                 streak_days, last_activity_date, unlocked_achievements,
                 engagement_score, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                profile.subject.key(),
                profile.subject.user_id,
                profile.subject.employee_id,
                profile.total_points,
                profile.current_level,
                profile.streak_days,
                profile.last_activity_date.map(|d| d.format("%Y-%m-%d").to_string()),
                unlocked_json,
                profile.engagement_score,
                profile.created_at.to_rfc3339(),
                profile.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn append_history(&self, entry: &PointsHistoryEntry) -> Result<(), StoreError> {
        let metadata_json = serde_json::to_string(&entry.metadata)?;
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO points_history
                (id, subject_key, user_id, employee_id, activity, points_delta,
                 activity_ref_id, description, metadata, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.id,
                entry.subject.key(),
                entry.subject.user_id,
                entry.subject.employee_id,
                entry.activity.as_str(),
                entry.points_delta,
                entry.activity_ref_id,
                entry.description,
                metadata_json,
                entry.occurred_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn query_history(
        &self,
        subject: &SubjectId,
        activity: Option<&ActivityType>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PointsHistoryEntry>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT id, user_id, employee_id, activity, points_delta,
                    activity_ref_id, description, metadata, occurred_at
             FROM points_history
             WHERE subject_key = ?1
               AND (?2 IS NULL OR activity = ?2)
               AND (?3 IS NULL OR occurred_at >= ?3)
             ORDER BY occurred_at ASC",
        )?;

        let raw_rows = stmt.query_map(
            params![
                subject.key(),
                activity.map(|a| a.as_str().to_string()),
                since.map(|s| s.to_rfc3339()),
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                ))
            },
        )?;

        let mut entries = Vec::new();
        for row in raw_rows {
            let (id, user_id, employee_id, activity, points_delta, ref_id, description, metadata_json, occurred_at) = row?;
            entries.push(PointsHistoryEntry {
                id,
                subject: SubjectId::new(user_id, employee_id),
                activity: ActivityType::from_name(&activity),
                points_delta,
                activity_ref_id: ref_id,
                description,
                metadata: serde_json::from_str(&metadata_json)?,
                occurred_at: parse_timestamp(&occurred_at)?,
            });
        }
        Ok(entries)
    }

    fn load_achievement_catalog(&self) -> Result<Vec<AchievementDefinition>, StoreError> {
        Ok(self.catalog.clone())
    }

    fn append_prediction(&self, prediction: &EngagementPrediction) -> Result<(), StoreError> {
        let factors_json = serde_json::to_string(&prediction.factors)?;
        let recommendations_json = serde_json::to_string(&prediction.recommendations)?;
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO predictions
                (subject_key, prediction_date, predicted_score, confidence,
                 risk_level, factors, recommendations)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                prediction.subject.key(),
                prediction.prediction_date.to_rfc3339(),
                prediction.predicted_score,
                prediction.confidence_level,
                prediction.risk_level.as_str(),
                factors_json,
                recommendations_json,
            ],
        )?;
        Ok(())
    }
}

impl SqliteStore {
    /// Most recent prediction for a subject, if any.
    pub fn latest_prediction(
        &self,
        subject: &SubjectId,
    ) -> Result<Option<(DateTime<Utc>, f64, RiskLevel, PredictionFactors)>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT prediction_date, predicted_score, risk_level, factors
             FROM predictions WHERE subject_key = ?1
             ORDER BY prediction_date DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![subject.key()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let Some(row) = rows.next() else {
            return Ok(None);
        };
        let (date, score, risk, factors_json) = row?;
        let risk = match risk.as_str() {
            "low" => RiskLevel::Low,
            "medium" => RiskLevel::Medium,
            "high" => RiskLevel::High,
            "critical" => RiskLevel::Critical,
            other => {
                return Err(StoreError::Serialization(format!(
                    "unknown risk level '{other}'"
                )))
            }
        };
        Ok(Some((
            parse_timestamp(&date)?,
            score,
            risk,
            serde_json::from_str(&factors_json)?,
        )))
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("bad timestamp '{raw}': {e}")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| StoreError::Serialization(format!("bad date '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::AchievementCondition;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap()
    }

    fn sample_profile(now: DateTime<Utc>) -> GamificationProfile {
        let mut profile = GamificationProfile::new(SubjectId::new("u1", "e1"), now);
        profile.total_points = 120;
        profile.current_level = 2;
        profile.streak_days = 4;
        profile.last_activity_date = Some(now.date_naive());
        profile.unlocked_achievements.insert("starter".to_string());
        profile.engagement_score = 61.5;
        profile
    }

    fn sample_entry(now: DateTime<Utc>) -> PointsHistoryEntry {
        PointsHistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            subject: SubjectId::new("u1", "e1"),
            activity: ActivityType::MessageSent,
            points_delta: 5,
            activity_ref_id: Some("msg-9".to_string()),
            description: "sent a message".to_string(),
            metadata: HashMap::from([("channel".to_string(), serde_json::json!("support"))]),
            occurred_at: now,
        }
    }

    #[test]
    fn test_profile_round_trip() {
        let store = SqliteStore::open_memory(Vec::new()).unwrap();
        let profile = sample_profile(at(10, 9));
        store.save_profile(&profile).unwrap();

        let loaded = store.load_profile(&profile.subject).unwrap().unwrap();
        assert_eq!(loaded, profile);

        assert!(store
            .load_profile(&SubjectId::new("ghost", "x"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_save_profile_replaces() {
        let store = SqliteStore::open_memory(Vec::new()).unwrap();
        let mut profile = sample_profile(at(10, 9));
        store.save_profile(&profile).unwrap();
        profile.total_points = 200;
        profile.unlocked_achievements.insert("veteran".to_string());
        store.save_profile(&profile).unwrap();

        let loaded = store.load_profile(&profile.subject).unwrap().unwrap();
        assert_eq!(loaded.total_points, 200);
        assert_eq!(loaded.unlocked_achievements.len(), 2);
    }

    #[test]
    fn test_history_round_trip_and_filters() {
        let store = SqliteStore::open_memory(Vec::new()).unwrap();
        let profile = sample_profile(at(10, 9));
        store.save_profile(&profile).unwrap();

        let first = sample_entry(at(9, 9));
        let mut second = sample_entry(at(10, 9));
        second.activity = ActivityType::FileUploaded;
        second.points_delta = 10;
        store.append_history(&first).unwrap();
        store.append_history(&second).unwrap();

        let all = store.query_history(&profile.subject, None, None).unwrap();
        assert_eq!(all, vec![first.clone(), second.clone()]);

        let uploads = store
            .query_history(&profile.subject, Some(&ActivityType::FileUploaded), None)
            .unwrap();
        assert_eq!(uploads, vec![second.clone()]);

        let recent = store
            .query_history(&profile.subject, None, Some(at(10, 0)))
            .unwrap();
        assert_eq!(recent, vec![second]);
    }

    #[test]
    fn test_catalog_is_served_as_injected() {
        let catalog = vec![AchievementDefinition {
            id: "starter".to_string(),
            name: "Starter".to_string(),
            description: String::new(),
            conditions: vec![AchievementCondition::MinPoints { points: 10 }],
            points_reward: 25,
        }];
        let store = SqliteStore::open_memory(catalog.clone()).unwrap();
        assert_eq!(store.load_achievement_catalog().unwrap(), catalog);
    }

    #[test]
    fn test_prediction_log_appends() {
        let store = SqliteStore::open_memory(Vec::new()).unwrap();
        let profile = sample_profile(at(10, 9));
        store.save_profile(&profile).unwrap();

        let prediction = EngagementPrediction {
            subject: profile.subject.clone(),
            prediction_date: at(10, 9),
            predicted_score: 42.0,
            confidence_level: 80.0,
            risk_level: RiskLevel::High,
            factors: PredictionFactors {
                recent_points: 40,
                active_days: 4,
                avg_daily_points: 10.0,
                streak_days: 4,
                achievements_unlocked: 1,
                prior_score: 30.0,
            },
            recommendations: vec!["Increase daily communication activity".to_string()],
        };
        store.append_prediction(&prediction).unwrap();

        let mut newer = prediction.clone();
        newer.prediction_date = at(11, 9);
        newer.predicted_score = 55.0;
        newer.risk_level = RiskLevel::Medium;
        store.append_prediction(&newer).unwrap();

        let (date, score, risk, factors) =
            store.latest_prediction(&profile.subject).unwrap().unwrap();
        assert_eq!(date, at(11, 9));
        assert_eq!(score, 55.0);
        assert_eq!(risk, RiskLevel::Medium);
        assert_eq!(factors.recent_points, 40);
    }

    #[test]
    fn test_reopen_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kudos.db");

        let profile = sample_profile(at(10, 9));
        {
            let store = SqliteStore::open(&path, Vec::new()).unwrap();
            store.save_profile(&profile).unwrap();
            store.append_history(&sample_entry(at(10, 9))).unwrap();
        }

        let store = SqliteStore::open(&path, Vec::new()).unwrap();
        assert_eq!(
            store.load_profile(&profile.subject).unwrap(),
            Some(profile.clone())
        );
        assert_eq!(
            store.query_history(&profile.subject, None, None).unwrap().len(),
            1
        );
    }
}
