//! Mastery rule for per-card progress.
//!
//! - Each record carries a confidence level between 1 and 5
//! - A correct answer raises confidence by one, an incorrect one lowers it by one
//! - A card becomes mastered once confidence reaches 4 with at least 80% accuracy
//! - Any incorrect answer drops the card back to learning and clears the mastery time
//! - A brand new record starts at confidence 2 (correct) or 1 (incorrect)

use super::{ProgressRecord, ProgressStatus, StudyMode};
use chrono::{DateTime, Utc};

pub const MIN_CONFIDENCE: u8 = 1;
pub const MAX_CONFIDENCE: u8 = 5;
pub const MASTERY_CONFIDENCE: u8 = 4;
pub const MASTERY_ACCURACY: f64 = 0.8;

/// Builds the record written on a user's first attempt at a card.
///
/// A correct first answer in test mode stamps `mastered_at` right away
/// while the status stays `Learning`. This does not follow the general
/// confidence rule and is kept as observed behavior.
pub fn initial_progress(
    user_id: &str,
    flashcard_id: &str,
    set_id: &str,
    mode: StudyMode,
    is_correct: bool,
    now: DateTime<Utc>,
) -> ProgressRecord {
    ProgressRecord {
        id: String::new(),
        user_id: user_id.to_string(),
        flashcard_id: flashcard_id.to_string(),
        set_id: set_id.to_string(),
        mode,
        status: ProgressStatus::Learning,
        confidence_level: if is_correct { 2 } else { MIN_CONFIDENCE },
        correct_attempts: u32::from(is_correct),
        total_attempts: 1,
        first_attempt_at: now,
        last_attempt_at: now,
        mastered_at: (is_correct && mode == StudyMode::Test).then_some(now),
        updated_at: None,
    }
}

/// Calculates the record after one more attempt.
pub fn calculate_next_progress(
    current: &ProgressRecord,
    is_correct: bool,
    now: DateTime<Utc>,
) -> ProgressRecord {
    let correct_attempts = current.correct_attempts + u32::from(is_correct);
    let total_attempts = current.total_attempts + 1;
    let accuracy = f64::from(correct_attempts) / f64::from(total_attempts);

    let mut status = current.status;
    let mut mastered_at = current.mastered_at;
    let confidence_level;

    if is_correct {
        confidence_level = (current.confidence_level + 1).min(MAX_CONFIDENCE);
        if confidence_level >= MASTERY_CONFIDENCE && accuracy >= MASTERY_ACCURACY {
            status = ProgressStatus::Mastered;
            mastered_at = Some(now);
        }
    } else {
        confidence_level = current
            .confidence_level
            .saturating_sub(1)
            .max(MIN_CONFIDENCE);
        status = ProgressStatus::Learning;
        mastered_at = None;
    }

    ProgressRecord {
        correct_attempts,
        total_attempts,
        confidence_level,
        status,
        mastered_at,
        last_attempt_at: now,
        updated_at: Some(now),
        ..current.clone()
    }
}
