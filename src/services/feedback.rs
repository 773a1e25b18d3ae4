//! Answer evaluation and end-of-session aggregation.

use super::progress::ProgressTracker;
use crate::models::{Question, StudyMode};
use chrono::Utc;
use log::{debug, error};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackOptions {
    pub auto_progress: bool,
    pub progress_delay_ms: u64,
    pub record_progress: bool,
    pub show_correct_answer: bool,
}

impl Default for FeedbackOptions {
    fn default() -> Self {
        Self {
            auto_progress: false,
            progress_delay_ms: 1500,
            record_progress: true,
            show_correct_answer: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub is_correct: bool,
    pub feedback_message: String,
    pub feedback_type: FeedbackType,
    pub time_spent_ms: i64,
    pub should_auto_progress: bool,
    pub progress_delay_ms: u64,
    pub correct_answer: String,
    pub user_answer: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionResults {
    pub total_questions: usize,
    pub answered_questions: usize,
    pub correct_answers: usize,
    pub incorrect_answers: usize,
    /// Percent of answered questions that were correct, rounded.
    pub accuracy: u32,
    pub total_time_ms: i64,
    pub average_time_ms: i64,
    /// Percent of questions answered, rounded; 0 for an empty batch.
    pub completion_rate: u32,
}

/// Evaluates submitted answers and forwards the outcome to progress
/// tracking when one is attached.
#[derive(Clone, Default)]
pub struct FeedbackService {
    tracker: Option<ProgressTracker>,
}

impl FeedbackService {
    pub fn new(tracker: Option<ProgressTracker>) -> Self {
        Self { tracker }
    }

    /// Compares `user_answer` with the question's answer by exact string
    /// equality. Returns the updated question alongside the feedback;
    /// callers replace their copy with the returned one.
    pub fn process_answer(
        &self,
        question: &Question,
        user_answer: &str,
        set_id: Option<&str>,
        mode: StudyMode,
        options: &FeedbackOptions,
    ) -> (Question, FeedbackResult) {
        if !question.is_well_formed() {
            error!("Invalid question provided: {:?}", question.id);
            return (
                question.clone(),
                FeedbackResult {
                    is_correct: false,
                    feedback_message: "Invalid question".to_string(),
                    feedback_type: FeedbackType::Error,
                    time_spent_ms: 0,
                    should_auto_progress: false,
                    progress_delay_ms: options.progress_delay_ms,
                    correct_answer: String::new(),
                    user_answer: user_answer.to_string(),
                    attempts: 1,
                },
            );
        }

        let is_correct = user_answer == question.correct_answer;
        let now = Utc::now();
        let time_spent_ms = (now - question.start_time.unwrap_or(now)).num_milliseconds();

        let answered = Question {
            user_answer: Some(user_answer.to_string()),
            is_correct,
            is_answered: true,
            time_spent_ms,
            attempts: question.attempts + 1,
            ..question.clone()
        };

        if options.record_progress {
            match (&self.tracker, &answered.flashcard_id, set_id) {
                (Some(tracker), Some(flashcard_id), Some(set_id)) => tracker.record_attempt(
                    flashcard_id,
                    set_id,
                    mode,
                    is_correct,
                    Some(time_spent_ms),
                    Some(user_answer),
                ),
                _ => debug!("Skipping progress recording for {}", answered.id),
            }
        }

        let (feedback_message, feedback_type) = if is_correct {
            ("Correct!".to_string(), FeedbackType::Success)
        } else if options.show_correct_answer {
            (
                format!("Incorrect. The correct answer is: {}", answered.correct_answer),
                FeedbackType::Error,
            )
        } else {
            ("Incorrect.".to_string(), FeedbackType::Error)
        };

        let result = FeedbackResult {
            is_correct,
            feedback_message,
            feedback_type,
            time_spent_ms,
            should_auto_progress: options.auto_progress && is_correct,
            progress_delay_ms: options.progress_delay_ms,
            correct_answer: answered.correct_answer.clone(),
            user_answer: user_answer.to_string(),
            attempts: answered.attempts,
        };
        (answered, result)
    }

    pub fn calculate_session_results(questions: &[Question]) -> SessionResults {
        let total_questions = questions.len();
        let answered_questions = questions.iter().filter(|q| q.is_answered).count();
        let correct_answers = questions.iter().filter(|q| q.is_correct).count();
        let incorrect_answers = questions
            .iter()
            .filter(|q| q.is_answered && !q.is_correct)
            .count();

        let total_time_ms: i64 = questions.iter().map(|q| q.time_spent_ms).sum();
        let average_time_ms = if total_questions > 0 {
            (total_time_ms as f64 / total_questions as f64).round() as i64
        } else {
            0
        };

        let accuracy = if answered_questions > 0 {
            (correct_answers as f64 / answered_questions as f64 * 100.0).round() as u32
        } else {
            0
        };
        let completion_rate = if total_questions > 0 {
            (answered_questions as f64 / total_questions as f64 * 100.0).round() as u32
        } else {
            0
        };

        SessionResults {
            total_questions,
            answered_questions,
            correct_answers,
            incorrect_answers,
            accuracy,
            total_time_ms,
            average_time_ms,
            completion_rate,
        }
    }
}
