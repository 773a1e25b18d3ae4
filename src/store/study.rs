//! Persists quiz runs as study_sessions rows with one user_answers row
//! per submitted answer.

use super::{SetStore, StoreError};
use crate::database::db::timestamp;
use crate::database::{Backend, Collection, Filter, Record, from_record, to_record};
use crate::models::{FlashcardSet, StudyMode};
use chrono::Utc;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedAnswer {
    pub flashcard_id: String,
    pub user_answer: String,
    pub is_correct: bool,
}

/// Local mirror of the running study session.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedQuiz {
    pub is_active: bool,
    pub current_card_index: usize,
    pub score: u32,
    pub answers: Vec<PersistedAnswer>,
    pub mode: StudyMode,
    pub session_id: Option<String>,
}

impl Default for PersistedQuiz {
    fn default() -> Self {
        Self {
            is_active: false,
            current_card_index: 0,
            score: 0,
            answers: Vec::new(),
            mode: StudyMode::Flashcard,
            session_id: None,
        }
    }
}

impl PersistedQuiz {
    /// Percent of answers that were correct; 0 when nothing was answered.
    pub fn percent_score(&self) -> f64 {
        if self.answers.is_empty() {
            0.0
        } else {
            f64::from(self.score) / self.answers.len() as f64 * 100.0
        }
    }
}

#[derive(Serialize)]
struct SessionRow<'a> {
    user_id: &'a str,
    set_id: &'a str,
    mode: StudyMode,
    total_cards: usize,
}

#[derive(Serialize)]
struct AnswerRow<'a> {
    session_id: Option<&'a str>,
    flashcard_id: &'a str,
    user_answer: &'a str,
    is_correct: bool,
}

#[derive(Deserialize)]
struct InsertedRow {
    id: String,
}

pub struct StudySessionStore {
    backend: Arc<dyn Backend>,
    state: PersistedQuiz,
}

impl StudySessionStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            state: PersistedQuiz::default(),
        }
    }

    pub fn state(&self) -> &PersistedQuiz {
        &self.state
    }

    /// Loads the set, opens a session row for it and marks the set as
    /// studied.
    pub fn start_quiz(
        &mut self,
        sets: &mut SetStore,
        set_id: &str,
        owner: &str,
        mode: StudyMode,
    ) -> Result<FlashcardSet, StoreError> {
        let set = sets
            .load_set_with_cards(set_id)
            .ok_or_else(|| StoreError::SetNotFound(set_id.to_string()))?;

        let row = SessionRow {
            user_id: owner,
            set_id,
            mode,
            total_cards: set.flashcards.len(),
        };
        let stored = self
            .backend
            .insert(Collection::StudySessions, to_record(&row)?)?;
        let session: InsertedRow = from_record(stored)?;

        self.state = PersistedQuiz {
            is_active: true,
            mode,
            session_id: Some(session.id),
            ..PersistedQuiz::default()
        };
        info!("Started {mode:?} session on '{}'", set.title);

        if let Err(e) = sets.mark_studied(set_id) {
            warn!("Could not update last studied time for {set_id}: {e}");
        }
        sets.load_recent_activities();
        Ok(set)
    }

    /// Stores one answer. The local score only changes once the row is
    /// written.
    pub fn submit_answer(&mut self, flashcard_id: &str, user_answer: &str, is_correct: bool) {
        let row = AnswerRow {
            session_id: self.state.session_id.as_deref(),
            flashcard_id,
            user_answer,
            is_correct,
        };
        let written = to_record(&row).and_then(|record| self.backend.insert(Collection::UserAnswers, record));

        match written {
            Ok(_) => {
                self.state.answers.push(PersistedAnswer {
                    flashcard_id: flashcard_id.to_string(),
                    user_answer: user_answer.to_string(),
                    is_correct,
                });
                if is_correct {
                    self.state.score += 1;
                }
            }
            Err(e) => error!("Error submitting answer: {e}"),
        }
    }

    pub fn next_card(&mut self) {
        self.state.current_card_index += 1;
    }

    pub fn previous_card(&mut self) {
        self.state.current_card_index = self.state.current_card_index.saturating_sub(1);
    }

    pub fn reset_quiz(&mut self) {
        self.state.current_card_index = 0;
        self.state.score = 0;
        self.state.answers.clear();
    }

    /// Writes the score summary and resets local state. On failure the
    /// local state is kept so the summary can be retried.
    pub fn end_quiz(&mut self) {
        let Some(session_id) = self.state.session_id.clone() else {
            warn!("No active study session to end");
            self.state = PersistedQuiz::default();
            return;
        };

        let correct = self.state.score;
        let wrong = self.state.answers.len() as u32 - correct;
        let mut patch = Record::new();
        patch.insert("correct_answers".to_string(), Value::from(correct));
        patch.insert("wrong_answers".to_string(), Value::from(wrong));
        patch.insert("score".to_string(), Value::from(self.state.percent_score()));
        patch.insert("completed_at".to_string(), Value::String(timestamp(Utc::now())));

        match self
            .backend
            .update(Collection::StudySessions, &Filter::by_id(&session_id), patch)
        {
            Ok(()) => {
                info!("Ended session {session_id}: {correct} correct, {wrong} wrong");
                self.state = PersistedQuiz::default();
            }
            Err(e) => error!("Error ending quiz: {e}"),
        }
    }
}
