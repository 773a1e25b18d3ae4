//! Per-user progress tracking on top of the backend.
//!
//! Every answer appends an attempt-history row and then rewrites the
//! (user, flashcard) progress record with the mastery rule from
//! [`crate::models::mastery`]. Nothing here may interrupt a study session:
//! backend failures are logged and swallowed.
//!
//! The progress update is a plain read-then-write. Two submissions for the
//! same card racing each other can lose one of the updates.

use crate::database::{
    Backend, BackendError, Collection, Filter, Query, from_record, from_records, to_record,
};
use crate::models::mastery::{calculate_next_progress, initial_progress};
use crate::models::{AttemptHistoryEntry, Flashcard, ProgressRecord, StudyMode};
use chrono::{NaiveDate, Utc};
use log::{debug, error, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

const RECENT_ACTIVITY_LIMIT: usize = 10;

/// A progress record joined with the card it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct CardProgress {
    pub progress: ProgressRecord,
    /// `None` when the card has been deleted since.
    pub flashcard: Option<Flashcard>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetProgress {
    pub still_learning: Vec<CardProgress>,
    pub mastered: Vec<CardProgress>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub correct: u32,
    pub total: u32,
}

impl Tally {
    fn add(&mut self, is_correct: bool) {
        self.total += 1;
        self.correct += u32::from(is_correct);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailedStats {
    pub total_attempts: u32,
    pub correct_attempts: u32,
    /// Fraction in 0.0..=1.0.
    pub accuracy: f64,
    pub by_mode: BTreeMap<StudyMode, Tally>,
    pub by_date: BTreeMap<NaiveDate, Tally>,
    /// The last ten attempts, oldest first.
    pub recent_activity: Vec<AttemptHistoryEntry>,
}

#[derive(Clone)]
pub struct ProgressTracker {
    backend: Arc<dyn Backend>,
}

impl ProgressTracker {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Logs one answer and updates the card's progress record. A missing
    /// identity makes this a no-op.
    pub fn record_attempt(
        &self,
        flashcard_id: &str,
        set_id: &str,
        mode: StudyMode,
        is_correct: bool,
        response_time_ms: Option<i64>,
        answer_text: Option<&str>,
    ) {
        let Some(identity) = self.backend.current_identity() else {
            warn!("User not authenticated, skipping progress recording");
            return;
        };
        if flashcard_id.is_empty() || set_id.is_empty() {
            error!("Invalid flashcard id {flashcard_id:?} or set id {set_id:?}");
            return;
        }

        debug!("Recording attempt on {flashcard_id} in {set_id} ({mode:?}, correct: {is_correct})");

        let entry = AttemptHistoryEntry {
            id: String::new(),
            user_id: identity.id.clone(),
            flashcard_id: flashcard_id.to_string(),
            set_id: set_id.to_string(),
            mode,
            is_correct,
            response_time_ms,
            answer_text: answer_text.map(str::to_string),
            created_at: None,
        };
        let inserted = to_record(&entry)
            .and_then(|record| self.backend.insert(Collection::AttemptHistory, record));
        if let Err(e) = inserted {
            warn!("Could not record attempt history: {e}");
        }

        if let Err(e) = self.write_progress(&identity.id, flashcard_id, set_id, mode, is_correct) {
            warn!("Could not update progress for {flashcard_id}: {e}");
        }
    }

    /// Applies one answer to the current user's progress record for a card
    /// and returns the record as written.
    pub fn update_progress(
        &self,
        flashcard_id: &str,
        set_id: &str,
        mode: StudyMode,
        is_correct: bool,
    ) -> Option<ProgressRecord> {
        let Some(identity) = self.backend.current_identity() else {
            warn!("User not authenticated, skipping progress update");
            return None;
        };
        if flashcard_id.is_empty() || set_id.is_empty() {
            warn!("Invalid flashcard id {flashcard_id:?} or set id {set_id:?}");
            return None;
        }

        self.write_progress(&identity.id, flashcard_id, set_id, mode, is_correct)
            .map_err(|e| warn!("Could not update progress for {flashcard_id}: {e}"))
            .ok()
    }

    fn write_progress(
        &self,
        user_id: &str,
        flashcard_id: &str,
        set_id: &str,
        mode: StudyMode,
        is_correct: bool,
    ) -> Result<ProgressRecord, BackendError> {
        let now = Utc::now();
        let filter = Filter::new()
            .eq("user_id", user_id)
            .eq("flashcard_id", flashcard_id);

        match self.backend.fetch_one(Collection::UserProgress, &filter) {
            Ok(row) => {
                let current: ProgressRecord = from_record(row)?;
                let next = ProgressRecord {
                    updated_at: Some(now),
                    ..calculate_next_progress(&current, is_correct, now)
                };

                let mut patch = to_record(&next)?;
                patch.remove("id");
                self.backend
                    .update(Collection::UserProgress, &Filter::by_id(&current.id), patch)?;
                Ok(next)
            }
            Err(BackendError::NotFound) => {
                let record = initial_progress(user_id, flashcard_id, set_id, mode, is_correct, now);
                let stored = self
                    .backend
                    .insert(Collection::UserProgress, to_record(&record)?)?;
                from_record(stored)
            }
            Err(e) => Err(e),
        }
    }

    /// Splits the current user's progress records for a set by status.
    /// Empty on any failure or without an identity.
    pub fn get_set_progress(&self, set_id: &str) -> SetProgress {
        let Some(identity) = self.backend.current_identity() else {
            return SetProgress::default();
        };

        match self.load_set_progress(&identity.id, set_id) {
            Ok(progress) => progress,
            Err(e) => {
                warn!("Could not fetch set progress for {set_id}: {e}");
                SetProgress::default()
            }
        }
    }

    fn load_set_progress(&self, user_id: &str, set_id: &str) -> Result<SetProgress, BackendError> {
        let query = Query::new(Filter::new().eq("user_id", user_id).eq("set_id", set_id));
        let records: Vec<ProgressRecord> =
            from_records(self.backend.fetch(Collection::UserProgress, &query)?)?;

        let mut result = SetProgress::default();
        for progress in records {
            let flashcard = match self
                .backend
                .fetch_one(Collection::Flashcards, &Filter::by_id(&progress.flashcard_id))
            {
                Ok(row) => Some(from_record(row)?),
                Err(BackendError::NotFound) => None,
                Err(e) => return Err(e),
            };

            let entry = CardProgress {
                progress,
                flashcard,
            };
            if entry.progress.is_mastered() {
                result.mastered.push(entry);
            } else {
                result.still_learning.push(entry);
            }
        }
        Ok(result)
    }

    /// Aggregates the current user's attempt history for a set. `None`
    /// without an identity or when the history cannot be read.
    pub fn get_detailed_stats(&self, set_id: &str) -> Option<DetailedStats> {
        let identity = self.backend.current_identity()?;
        let query = Query::new(
            Filter::new()
                .eq("user_id", identity.id.as_str())
                .eq("set_id", set_id),
        );

        let attempts: Vec<AttemptHistoryEntry> = match self
            .backend
            .fetch(Collection::AttemptHistory, &query)
            .and_then(from_records)
        {
            Ok(attempts) => attempts,
            Err(e) => {
                warn!("Could not fetch detailed stats for {set_id}: {e}");
                return None;
            }
        };

        let mut overall = Tally::default();
        let mut by_mode: BTreeMap<StudyMode, Tally> = BTreeMap::new();
        let mut by_date: BTreeMap<NaiveDate, Tally> = BTreeMap::new();
        for attempt in &attempts {
            overall.add(attempt.is_correct);
            by_mode.entry(attempt.mode).or_default().add(attempt.is_correct);
            if let Some(created_at) = attempt.created_at {
                by_date
                    .entry(created_at.date_naive())
                    .or_default()
                    .add(attempt.is_correct);
            }
        }

        let accuracy = if overall.total > 0 {
            f64::from(overall.correct) / f64::from(overall.total)
        } else {
            0.0
        };
        let skip = attempts.len().saturating_sub(RECENT_ACTIVITY_LIMIT);

        Some(DetailedStats {
            total_attempts: overall.total,
            correct_attempts: overall.correct,
            accuracy,
            by_mode,
            by_date,
            recent_activity: attempts.into_iter().skip(skip).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Identity, Record, SqliteBackend};
    use crate::models::ProgressStatus;
    use std::sync::Mutex;

    fn signed_in() -> Arc<SqliteBackend> {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        backend.sign_in(Identity::new("u1"));
        backend
    }

    fn progress_rows(backend: &SqliteBackend) -> Vec<ProgressRecord> {
        from_records(backend.fetch(Collection::UserProgress, &Query::all()).unwrap()).unwrap()
    }

    /// Backend where every call except identity lookup fails.
    struct BrokenBackend;

    impl Backend for BrokenBackend {
        fn current_identity(&self) -> Option<Identity> {
            Some(Identity::new("u1"))
        }

        fn fetch(&self, collection: Collection, _: &Query) -> Result<Vec<Record>, BackendError> {
            Err(BackendError::Corrupt {
                collection: collection.name(),
                reason: "offline".to_string(),
            })
        }

        fn fetch_one(&self, collection: Collection, _: &Filter) -> Result<Record, BackendError> {
            self.fetch(collection, &Query::all()).map(|_| Record::new())
        }

        fn insert(&self, collection: Collection, _: Record) -> Result<Record, BackendError> {
            self.fetch_one(collection, &Filter::new())
        }

        fn update(&self, collection: Collection, _: &Filter, _: Record) -> Result<(), BackendError> {
            self.fetch(collection, &Query::all()).map(|_| ())
        }

        fn delete(&self, collection: Collection, _: &Filter) -> Result<(), BackendError> {
            self.fetch(collection, &Query::all()).map(|_| ())
        }
    }

    #[test]
    fn test_first_attempt_creates_record() {
        let backend = signed_in();
        let tracker = ProgressTracker::new(backend.clone());

        tracker.record_attempt("c1", "s1", StudyMode::Learn, false, Some(900), Some("nope"));

        let rows = progress_rows(&backend);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].confidence_level, 1);
        assert_eq!(rows[0].correct_attempts, 0);
        assert_eq!(rows[0].total_attempts, 1);
        assert_eq!(rows[0].status, ProgressStatus::Learning);

        let history = backend.fetch(Collection::AttemptHistory, &Query::all()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["response_time_ms"], 900);
        assert_eq!(history[0]["user_id"], "u1");
    }

    #[test]
    fn test_first_correct_test_attempt_sets_mastered_at_only() {
        let backend = signed_in();
        let tracker = ProgressTracker::new(backend.clone());

        let record = tracker
            .update_progress("c1", "s1", StudyMode::Test, true)
            .unwrap();
        assert_eq!(record.status, ProgressStatus::Learning);
        assert!(record.mastered_at.is_some());
        assert_eq!(record.confidence_level, 2);

        let learn = tracker
            .update_progress("c2", "s1", StudyMode::Learn, true)
            .unwrap();
        assert!(learn.mastered_at.is_none());
    }

    #[test]
    fn test_repeated_correct_answers_reach_mastery() {
        let backend = signed_in();
        let tracker = ProgressTracker::new(backend.clone());

        for _ in 0..3 {
            tracker.record_attempt("c1", "s1", StudyMode::Learn, true, None, None);
        }
        let rows = progress_rows(&backend);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].confidence_level, 4);
        assert_eq!(rows[0].status, ProgressStatus::Mastered);
        assert!(rows[0].updated_at.is_some());

        tracker.record_attempt("c1", "s1", StudyMode::Learn, false, None, None);
        let rows = progress_rows(&backend);
        assert_eq!(rows[0].status, ProgressStatus::Learning);
        assert_eq!(rows[0].mastered_at, None);
        assert_eq!(rows[0].total_attempts, 4);
    }

    #[test]
    fn test_signed_out_is_a_no_op() {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        let tracker = ProgressTracker::new(backend.clone());

        tracker.record_attempt("c1", "s1", StudyMode::Test, true, None, None);

        assert!(progress_rows(&backend).is_empty());
        assert_eq!(tracker.get_set_progress("s1"), SetProgress::default());
        assert!(tracker.get_detailed_stats("s1").is_none());
    }

    #[test]
    fn test_backend_failures_are_swallowed() {
        let tracker = ProgressTracker::new(Arc::new(BrokenBackend));

        tracker.record_attempt("c1", "s1", StudyMode::Test, true, None, None);
        assert!(tracker.update_progress("c1", "s1", StudyMode::Test, true).is_none());
        assert_eq!(tracker.get_set_progress("s1"), SetProgress::default());
        assert!(tracker.get_detailed_stats("s1").is_none());
    }

    #[test]
    fn test_set_progress_partitions_and_joins_cards() {
        let backend = signed_in();
        let card = Flashcard::new("c1", "hello", "cześć").in_set("s1", 0);
        backend
            .insert(Collection::Flashcards, to_record(&card).unwrap())
            .unwrap();
        let tracker = ProgressTracker::new(backend.clone());

        for _ in 0..3 {
            tracker.record_attempt("c1", "s1", StudyMode::Learn, true, None, None);
        }
        tracker.record_attempt("c2", "s1", StudyMode::Learn, true, None, None);
        tracker.record_attempt("c3", "other", StudyMode::Learn, true, None, None);

        let progress = tracker.get_set_progress("s1");
        assert_eq!(progress.mastered.len(), 1);
        assert_eq!(progress.mastered[0].flashcard.as_ref().unwrap().term, "hello");
        assert_eq!(progress.still_learning.len(), 1);
        assert!(progress.still_learning[0].flashcard.is_none());
    }

    #[test]
    fn test_detailed_stats() {
        let backend = signed_in();
        let tracker = ProgressTracker::new(backend.clone());

        for i in 0..12 {
            let mode = if i % 2 == 0 { StudyMode::Learn } else { StudyMode::Test };
            tracker.record_attempt(&format!("c{i}"), "s1", mode, i % 3 != 0, None, None);
        }

        let stats = tracker.get_detailed_stats("s1").unwrap();
        assert_eq!(stats.total_attempts, 12);
        assert_eq!(stats.correct_attempts, 8);
        assert!((stats.accuracy - 8.0 / 12.0).abs() < 1e-9);
        assert_eq!(stats.by_mode[&StudyMode::Learn].total, 6);
        assert_eq!(stats.by_mode[&StudyMode::Test].total, 6);
        assert_eq!(stats.by_date.values().map(|t| t.total).sum::<u32>(), 12);
        assert_eq!(stats.recent_activity.len(), 10);
        assert_eq!(stats.recent_activity[0].flashcard_id, "c2");
        assert_eq!(stats.recent_activity[9].flashcard_id, "c11");
    }

    /// Runs a competing update for the same card between our read and our
    /// write.
    struct InterleavingBackend {
        inner: Arc<SqliteBackend>,
        armed: Mutex<bool>,
    }

    impl Backend for InterleavingBackend {
        fn current_identity(&self) -> Option<Identity> {
            self.inner.current_identity()
        }

        fn fetch(&self, collection: Collection, query: &Query) -> Result<Vec<Record>, BackendError> {
            self.inner.fetch(collection, query)
        }

        fn fetch_one(&self, collection: Collection, filter: &Filter) -> Result<Record, BackendError> {
            let row = self.inner.fetch_one(collection, filter);
            let fire = std::mem::take(&mut *self.armed.lock().unwrap());
            if fire && collection == Collection::UserProgress {
                ProgressTracker::new(self.inner.clone()).update_progress(
                    "c1",
                    "s1",
                    StudyMode::Learn,
                    true,
                );
            }
            row
        }

        fn insert(&self, collection: Collection, record: Record) -> Result<Record, BackendError> {
            self.inner.insert(collection, record)
        }

        fn update(&self, collection: Collection, filter: &Filter, patch: Record) -> Result<(), BackendError> {
            self.inner.update(collection, filter, patch)
        }

        fn delete(&self, collection: Collection, filter: &Filter) -> Result<(), BackendError> {
            self.inner.delete(collection, filter)
        }
    }

    #[test]
    fn test_concurrent_updates_can_lose_one_write() {
        let inner = signed_in();
        ProgressTracker::new(inner.clone()).update_progress("c1", "s1", StudyMode::Learn, true);

        let racing = InterleavingBackend {
            inner: inner.clone(),
            armed: Mutex::new(true),
        };
        ProgressTracker::new(Arc::new(racing)).update_progress("c1", "s1", StudyMode::Learn, true);

        // Three answers were submitted but the competing write was overwritten.
        let rows = progress_rows(&inner);
        assert_eq!(rows[0].total_attempts, 2);
    }
}
