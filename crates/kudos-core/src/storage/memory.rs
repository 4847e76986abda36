//! In-memory store for tests and single-process embedding.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::achievements::AchievementDefinition;
use crate::activity::ActivityType;
use crate::error::StoreError;
use crate::prediction::EngagementPrediction;
use crate::profile::{GamificationProfile, PointsHistoryEntry, SubjectId};

use super::GamificationStore;

#[derive(Default)]
struct Inner {
    profiles: HashMap<String, GamificationProfile>,
    history: Vec<PointsHistoryEntry>,
    predictions: Vec<EngagementPrediction>,
}

/// Mutex-guarded map-backed store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    catalog: Vec<AchievementDefinition>,
}

impl MemoryStore {
    /// Store with an empty achievement catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store serving the given achievement catalog.
    pub fn with_catalog(catalog: Vec<AchievementDefinition>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            catalog,
        }
    }

    /// Number of predictions appended so far (test observability).
    pub fn prediction_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .predictions
            .len()
    }

    /// The most recently appended prediction, if any.
    pub fn latest_prediction(&self) -> Option<EngagementPrediction> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .predictions
            .last()
            .cloned()
    }
}

impl GamificationStore for MemoryStore {
    fn load_profile(&self, subject: &SubjectId) -> Result<Option<GamificationProfile>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.profiles.get(&subject.key()).cloned())
    }

    fn save_profile(&self, profile: &GamificationProfile) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.profiles.insert(profile.subject.key(), profile.clone());
        Ok(())
    }

    fn append_history(&self, entry: &PointsHistoryEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.history.push(entry.clone());
        Ok(())
    }

    fn query_history(
        &self,
        subject: &SubjectId,
        activity: Option<&ActivityType>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PointsHistoryEntry>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<_> = inner
            .history
            .iter()
            .filter(|e| e.subject == *subject)
            .filter(|e| activity.is_none_or(|a| e.activity == *a))
            .filter(|e| since.is_none_or(|s| e.occurred_at >= s))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.occurred_at);
        Ok(entries)
    }

    fn load_achievement_catalog(&self) -> Result<Vec<AchievementDefinition>, StoreError> {
        Ok(self.catalog.clone())
    }

    fn append_prediction(&self, prediction: &EngagementPrediction) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.predictions.push(prediction.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap as Map;

    fn entry(activity: ActivityType, d: u32) -> PointsHistoryEntry {
        PointsHistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            subject: SubjectId::new("u1", "e1"),
            activity,
            points_delta: 5,
            activity_ref_id: None,
            description: String::new(),
            metadata: Map::new(),
            occurred_at: Utc.with_ymd_and_hms(2024, 6, d, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_history_filters() {
        let store = MemoryStore::new();
        let subject = SubjectId::new("u1", "e1");
        store.append_history(&entry(ActivityType::MessageSent, 1)).unwrap();
        store.append_history(&entry(ActivityType::FileUploaded, 2)).unwrap();
        store.append_history(&entry(ActivityType::MessageSent, 3)).unwrap();

        let all = store.query_history(&subject, None, None).unwrap();
        assert_eq!(all.len(), 3);

        let sent = store
            .query_history(&subject, Some(&ActivityType::MessageSent), None)
            .unwrap();
        assert_eq!(sent.len(), 2);

        let since = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
        let recent = store.query_history(&subject, None, Some(since)).unwrap();
        assert_eq!(recent.len(), 2);

        let other = SubjectId::new("u2", "e2");
        assert!(store.query_history(&other, None, None).unwrap().is_empty());
    }

    #[test]
    fn test_profile_round_trip() {
        let store = MemoryStore::new();
        let subject = SubjectId::new("u1", "e1");
        assert!(store.load_profile(&subject).unwrap().is_none());

        let profile = GamificationProfile::new(subject.clone(), Utc::now());
        store.save_profile(&profile).unwrap();
        assert_eq!(store.load_profile(&subject).unwrap(), Some(profile));
    }
}
