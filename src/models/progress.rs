//! Per-user learning progress and the raw attempt log it is derived from.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a card was being studied when an answer was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
    Flashcard,
    Learn,
    Test,
    Match,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Learning,
    Mastered,
}

/// One row per (user, flashcard); created on the first attempt and
/// rewritten on every later one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    pub flashcard_id: String,
    pub set_id: String,
    pub mode: StudyMode,
    pub status: ProgressStatus,
    /// Always within 1..=5.
    pub confidence_level: u8,
    pub correct_attempts: u32,
    pub total_attempts: u32,
    pub first_attempt_at: DateTime<Utc>,
    pub last_attempt_at: DateTime<Utc>,
    #[serde(default)]
    pub mastered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    pub fn accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            f64::from(self.correct_attempts) / f64::from(self.total_attempts)
        }
    }

    pub fn is_mastered(&self) -> bool {
        self.status == ProgressStatus::Mastered
    }
}

/// Append-only log entry, one per answer event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptHistoryEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    pub flashcard_id: String,
    pub set_id: String,
    pub mode: StudyMode,
    pub is_correct: bool,
    #[serde(default)]
    pub response_time_ms: Option<i64>,
    #[serde(default)]
    pub answer_text: Option<String>,
    /// Assigned by the backend on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
