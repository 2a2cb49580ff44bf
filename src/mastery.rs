//! Per-topic mastery and the user statistics that travel with it.

use crate::error::{QuizError, StorageError};
use crate::storage::{lock, KeyValueStore, STATS_KEY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub const MASTERY_MAX: u8 = 100;
pub const CORRECT_GAIN: u8 = 5;
pub const INCORRECT_GAIN: u8 = 1;

/// `Topic.id → mastery` in `0..=100`. A missing topic reads as 0.
///
/// Answers only ever raise a score; [`MasteryTable::reset_topic`] is the
/// one way down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MasteryTable(BTreeMap<String, u8>);

impl MasteryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, topic_id: &str) -> u8 {
        self.0.get(topic_id).copied().unwrap_or(0)
    }

    pub fn record_answer(&self, topic_id: &str, is_correct: bool) -> MasteryTable {
        let gain = if is_correct { CORRECT_GAIN } else { INCORRECT_GAIN };
        let next = self.get(topic_id).saturating_add(gain).min(MASTERY_MAX);
        let mut table = self.clone();
        table.0.insert(topic_id.to_string(), next);
        table
    }

    pub fn reset_topic(&self, topic_id: &str) -> MasteryTable {
        let mut table = self.clone();
        table.0.insert(topic_id.to_string(), 0);
        table
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Dashboard statistics, stored as one JSON blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStats {
    pub total_answered: u64,
    pub correct: u64,
    /// Consecutive correct answers; any miss resets it
    pub streak: u64,
    pub mastery_by_topic: MasteryTable,
}

impl UserStats {
    pub fn record_answer(&self, topic_id: &str, is_correct: bool) -> UserStats {
        UserStats {
            total_answered: self.total_answered + 1,
            correct: self.correct + u64::from(is_correct),
            streak: if is_correct { self.streak + 1 } else { 0 },
            mastery_by_topic: self.mastery_by_topic.record_answer(topic_id, is_correct),
        }
    }

    /// Share of correct answers, rounded; 0 before the first answer.
    pub fn accuracy_percent(&self) -> u8 {
        if self.total_answered == 0 {
            return 0;
        }
        ((self.correct as f64 * 100.0 / self.total_answered as f64).round()) as u8
    }
}

/// Owns the user's statistics and writes every change through to the store.
///
/// The store is written first; memory only changes once the write succeeded.
#[derive(Debug)]
pub struct StatsTracker {
    store: Arc<dyn KeyValueStore>,
    stats: Mutex<UserStats>,
}

impl StatsTracker {
    /// Load saved statistics. Missing or unreadable data starts from zero.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let stats = match store.get(STATS_KEY) {
            Ok(Some(blob)) => serde_json::from_str(&blob).unwrap_or_else(|e| {
                warn!(error = %e, "Stored statistics are corrupt; starting fresh");
                UserStats::default()
            }),
            Ok(None) => UserStats::default(),
            Err(e) => {
                warn!(error = %e, "Could not read stored statistics; starting fresh");
                UserStats::default()
            }
        };
        info!(total_answered = stats.total_answered, topics = stats.mastery_by_topic.iter().count(), "Loaded user statistics");
        Self { store, stats: Mutex::new(stats) }
    }

    pub fn stats(&self) -> UserStats {
        lock(&self.stats).clone()
    }

    pub fn mastery(&self, topic_id: &str) -> u8 {
        lock(&self.stats).mastery_by_topic.get(topic_id)
    }

    pub fn mastery_table(&self) -> MasteryTable {
        lock(&self.stats).mastery_by_topic.clone()
    }

    pub fn accuracy_percent(&self) -> u8 {
        lock(&self.stats).accuracy_percent()
    }

    pub fn record_answer(&self, topic_id: &str, is_correct: bool) -> Result<UserStats, QuizError> {
        let mut stats = lock(&self.stats);
        let next = stats.record_answer(topic_id, is_correct);
        self.persist(&next)?;
        debug!(topic_id, is_correct, mastery = next.mastery_by_topic.get(topic_id), "Recorded answer");
        *stats = next.clone();
        Ok(next)
    }

    pub fn reset_topic(&self, topic_id: &str) -> Result<MasteryTable, QuizError> {
        let mut stats = lock(&self.stats);
        let next = UserStats {
            mastery_by_topic: stats.mastery_by_topic.reset_topic(topic_id),
            ..stats.clone()
        };
        self.persist(&next)?;
        info!(topic_id, "Reset topic mastery");
        *stats = next;
        Ok(stats.mastery_by_topic.clone())
    }

    fn persist(&self, stats: &UserStats) -> Result<(), StorageError> {
        let blob = serde_json::to_string(stats)?;
        self.store.set(STATS_KEY, &blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::io;

    #[derive(Debug)]
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only").into())
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[test]
    fn mastery_grows_by_five_and_one() {
        let table = MasteryTable::new()
            .record_answer("GEN1", true)
            .record_answer("GEN1", false);
        assert_eq!(table.get("GEN1"), 6);
        assert_eq!(table.get("GEN2"), 0);
    }

    #[test]
    fn mastery_saturates_at_100() {
        let mut table = MasteryTable::new();
        for _ in 0..25 {
            table = table.record_answer("GEN1", true);
        }
        assert_eq!(table.get("GEN1"), 100);
        assert_eq!(table.record_answer("GEN1", false).get("GEN1"), 100);
    }

    #[test]
    fn reset_only_touches_one_topic() {
        let table = MasteryTable::new()
            .record_answer("GEN1", true)
            .record_answer("GEN2", true)
            .reset_topic("GEN1");
        assert_eq!(table.get("GEN1"), 0);
        assert_eq!(table.get("GEN2"), 5);
    }

    #[test]
    fn streak_resets_on_miss() {
        let stats = UserStats::default()
            .record_answer("GEN1", true)
            .record_answer("GEN1", true);
        assert_eq!(stats.streak, 2);
        let stats = stats.record_answer("GEN1", false);
        assert_eq!(stats.streak, 0);
        assert_eq!(stats.total_answered, 3);
        assert_eq!(stats.correct, 2);
        assert_eq!(stats.accuracy_percent(), 67);
    }

    #[test]
    fn stats_blob_uses_camel_case() {
        let stats = UserStats::default().record_answer("GEN1", true);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalAnswered"], 1);
        assert_eq!(json["masteryByTopic"]["GEN1"], 5);
    }

    #[test]
    fn tracker_persists_and_reloads() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let tracker = StatsTracker::load(store.clone());
        assert_eq!(tracker.accuracy_percent(), 0);
        tracker.record_answer("GEN3", true).unwrap();
        tracker.record_answer("GEN3", false).unwrap();

        let reloaded = StatsTracker::load(store);
        assert_eq!(reloaded.mastery("GEN3"), 6);
        assert_eq!(reloaded.stats().total_answered, 2);
        assert_eq!(reloaded.accuracy_percent(), 50);
    }

    #[test]
    fn corrupt_blob_starts_fresh() {
        let store = Arc::new(MemoryStore::new().with_entry(STATS_KEY, "{not json"));
        let tracker = StatsTracker::load(store);
        assert_eq!(tracker.stats(), UserStats::default());
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let tracker = StatsTracker::load(Arc::new(ReadOnlyStore));
        let err = tracker.record_answer("GEN1", true).unwrap_err();
        assert!(matches!(err, QuizError::Storage(StorageError::Io(_))));
        assert_eq!(tracker.mastery("GEN1"), 0);
        assert!(tracker.reset_topic("GEN1").is_err());
    }
}
