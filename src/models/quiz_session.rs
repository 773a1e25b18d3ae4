//! Quiz session state machine.
//! Drives flashcard review and test mode, including the second pass over
//! cards that were answered incorrectly or skipped.

use super::{QuestionKind, QuizCard};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizMode {
    #[default]
    Flashcard,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Again,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Answered,
    Skipped,
    Reviewed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizState {
    NotStarted,
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestSettings {
    pub instant_feedback: bool,
    pub shuffle_cards: bool,
    pub question_types: Vec<QuestionKind>,
    pub repeat_incorrect: bool,
    /// How many times missed cards are appended again; `None` repeats until
    /// every card is answered correctly.
    pub max_review_rounds: Option<u32>,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            instant_feedback: true,
            shuffle_cards: false,
            question_types: vec![
                QuestionKind::MultipleChoice,
                QuestionKind::TrueFalse,
                QuestionKind::Written,
            ],
            repeat_incorrect: true,
            max_review_rounds: Some(1),
        }
    }
}

/// Partial settings merged over the current ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub instant_feedback: Option<bool>,
    pub shuffle_cards: Option<bool>,
    pub question_types: Option<Vec<QuestionKind>>,
    pub repeat_incorrect: Option<bool>,
    pub max_review_rounds: Option<Option<u32>>,
}

impl TestSettings {
    pub fn merged(&self, update: &SettingsUpdate) -> Self {
        Self {
            instant_feedback: update.instant_feedback.unwrap_or(self.instant_feedback),
            shuffle_cards: update.shuffle_cards.unwrap_or(self.shuffle_cards),
            question_types: update
                .question_types
                .clone()
                .unwrap_or_else(|| self.question_types.clone()),
            repeat_incorrect: update.repeat_incorrect.unwrap_or(self.repeat_incorrect),
            max_review_rounds: update.max_review_rounds.unwrap_or(self.max_review_rounds),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub card_id: String,
    pub user_answer: Option<String>,
    pub correct_answer: Option<String>,
    pub is_correct: bool,
    pub time_spent_ms: i64,
    pub status: ResponseStatus,
    pub question_kind: Option<QuestionKind>,
    pub difficulty: Option<Difficulty>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizProgress {
    pub total: usize,
    pub answered: usize,
    pub skipped: usize,
    pub correct: usize,
    pub incorrect: usize,
    /// Rounded answered/total, in percent.
    pub percentage: u32,
    /// Rounded correct/answered, in percent.
    pub accuracy: u32,
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        0
    } else {
        (part as f64 / whole as f64 * 100.0).round() as u32
    }
}

/// In-progress quiz over a working copy of a set's cards.
///
/// The card list grows when missed cards are requeued, so indices past the
/// original length refer to the review pass.
#[derive(Debug, Clone, Default)]
pub struct QuizSession {
    pub set_id: Option<String>,
    pub cards: Vec<QuizCard>,
    pub mode: QuizMode,
    pub settings: TestSettings,
    pub current_index: usize,
    pub is_flipped: bool,
    pub show_answer: bool,
    pub responses: Vec<QuizResponse>,
    pub wrong_answers: Vec<QuizCard>,
    pub skipped_cards: Vec<QuizCard>,
    pub session_start_time: Option<DateTime<Utc>>,
    pub card_start_time: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub review_rounds: u32,
}

impl QuizSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fresh quiz, merging `settings` over the current ones.
    pub fn initialize(
        &mut self,
        set_id: Option<String>,
        cards: Vec<QuizCard>,
        mode: QuizMode,
        settings: &SettingsUpdate,
    ) {
        self.initialize_with_rng(set_id, cards, mode, settings, &mut rand::thread_rng());
    }

    pub fn initialize_with_rng<R: Rng + ?Sized>(
        &mut self,
        set_id: Option<String>,
        mut cards: Vec<QuizCard>,
        mode: QuizMode,
        settings: &SettingsUpdate,
        rng: &mut R,
    ) {
        let settings = self.settings.merged(settings);
        if settings.shuffle_cards {
            cards.shuffle(rng);
        }

        let now = Utc::now();
        info!(
            "Starting {:?} quiz with {} cards (set {:?})",
            mode,
            cards.len(),
            set_id
        );

        *self = Self {
            set_id,
            cards,
            mode,
            settings,
            session_start_time: Some(now),
            card_start_time: Some(now),
            ..Self::default()
        };
    }

    pub fn state(&self) -> QuizState {
        if self.is_completed {
            QuizState::Completed
        } else if self.session_start_time.is_some() {
            QuizState::Active
        } else {
            QuizState::NotStarted
        }
    }

    pub fn current_card(&self) -> Option<&QuizCard> {
        self.cards.get(self.current_index)
    }

    pub fn progress(&self) -> QuizProgress {
        let total = self.cards.len();
        let answered = self
            .responses
            .iter()
            .filter(|r| r.status == ResponseStatus::Answered)
            .count();
        let skipped = self
            .responses
            .iter()
            .filter(|r| r.status == ResponseStatus::Skipped)
            .count();
        let correct = self.responses.iter().filter(|r| r.is_correct).count();

        QuizProgress {
            total,
            answered,
            skipped,
            correct,
            incorrect: answered.saturating_sub(correct),
            percentage: percent(answered, total),
            accuracy: percent(correct, answered),
        }
    }

    fn elapsed_on_card(&self, now: DateTime<Utc>) -> i64 {
        self.card_start_time
            .map(|start| (now - start).num_milliseconds())
            .unwrap_or(0)
    }

    fn reset_card_state(&mut self) {
        self.card_start_time = Some(Utc::now());
        self.is_flipped = false;
        self.show_answer = false;
    }

    pub fn flip_card(&mut self) {
        if self.mode != QuizMode::Flashcard {
            debug!("Ignoring flip outside flashcard mode");
            return;
        }
        self.is_flipped = !self.is_flipped;
    }

    /// Records a self-assessed difficulty for the current card and advances.
    pub fn mark_card(&mut self, difficulty: Difficulty) {
        let Some(card) = self.current_card() else {
            warn!("mark_card called with no current card");
            return;
        };
        let now = Utc::now();
        let response = QuizResponse {
            card_id: card.id.clone(),
            user_answer: None,
            correct_answer: None,
            is_correct: false,
            time_spent_ms: self.elapsed_on_card(now),
            status: ResponseStatus::Reviewed,
            question_kind: None,
            difficulty: Some(difficulty),
            timestamp: now,
        };
        self.responses.push(response);
        self.next_card();
    }

    /// Checks `answer` against the current card and records the response.
    /// Returns whether it was correct, or `None` when there is no card.
    pub fn answer_question(&mut self, answer: &str, kind: QuestionKind) -> Option<bool> {
        let Some(card) = self.current_card().cloned() else {
            warn!("answer_question called with no current card");
            return None;
        };
        let now = Utc::now();

        let is_correct = match kind {
            QuestionKind::MultipleChoice => card
                .correct_option()
                .is_some_and(|opt| opt.text == answer),
            QuestionKind::TrueFalse => answer.to_lowercase() == card.back.to_lowercase(),
            QuestionKind::Written => {
                answer.trim().to_lowercase() == card.back.trim().to_lowercase()
            }
        };

        self.responses.push(QuizResponse {
            card_id: card.id.clone(),
            user_answer: Some(answer.to_string()),
            correct_answer: Some(card.back.clone()),
            is_correct,
            time_spent_ms: self.elapsed_on_card(now),
            status: ResponseStatus::Answered,
            question_kind: Some(kind),
            difficulty: None,
            timestamp: now,
        });

        if !is_correct {
            self.wrong_answers.push(card);
        }
        self.show_answer = self.settings.instant_feedback;

        Some(is_correct)
    }

    pub fn skip_question(&mut self) {
        let Some(card) = self.current_card().cloned() else {
            warn!("skip_question called with no current card");
            return;
        };
        let now = Utc::now();
        self.responses.push(QuizResponse {
            card_id: card.id.clone(),
            user_answer: None,
            correct_answer: None,
            is_correct: false,
            time_spent_ms: self.elapsed_on_card(now),
            status: ResponseStatus::Skipped,
            question_kind: None,
            difficulty: None,
            timestamp: now,
        });
        self.skipped_cards.push(card);
        self.next_card();
    }

    fn should_requeue(&self) -> bool {
        self.mode == QuizMode::Test
            && self.settings.repeat_incorrect
            && (!self.wrong_answers.is_empty() || !self.skipped_cards.is_empty())
            && self
                .settings
                .max_review_rounds
                .is_none_or(|max| self.review_rounds < max)
    }

    /// Advances to the next card. At the end of the sequence, missed cards
    /// are appended for another pass when allowed; otherwise the quiz
    /// completes. Once completed, further calls change nothing.
    pub fn next_card(&mut self) {
        if self.is_completed {
            debug!("next_card called on a completed quiz");
            return;
        }

        let next_index = self.current_index + 1;
        if next_index < self.cards.len() {
            self.current_index = next_index;
            self.reset_card_state();
            return;
        }

        if self.should_requeue() {
            let mut requeued = std::mem::take(&mut self.skipped_cards);
            requeued.append(&mut self.wrong_answers);
            info!("Requeueing {} missed cards", requeued.len());

            self.current_index = self.cards.len();
            self.cards.extend(requeued);
            self.review_rounds += 1;
            self.reset_card_state();
        } else {
            info!(
                "Quiz completed after {} responses",
                self.responses.len()
            );
            self.is_completed = true;
        }
    }

    pub fn previous_card(&mut self) {
        self.current_index = self.current_index.saturating_sub(1);
        self.reset_card_state();
    }

    /// Jumps to `index`; an index past the end leaves no current card.
    pub fn go_to_card(&mut self, index: usize) {
        self.current_index = index;
        self.reset_card_state();
    }

    pub fn update_settings(&mut self, update: &SettingsUpdate) {
        self.settings = self.settings.merged(update);
    }

    /// Flips the starred flag on every copy of the card in this session.
    /// Persisting the flag is up to the caller.
    pub fn toggle_star(&mut self, card_id: &str) {
        for card in self.cards.iter_mut().filter(|c| c.id == card_id) {
            card.is_starred = !card.is_starred;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Flashcard, QuizOption};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn cards(n: usize) -> Vec<QuizCard> {
        (1..=n)
            .map(|i| {
                let card = Flashcard::new(format!("c{i}"), format!("T{i}"), format!("D{i}"));
                QuizCard::from_flashcard(&card)
            })
            .collect()
    }

    fn test_session(n: usize, settings: SettingsUpdate) -> QuizSession {
        let mut session = QuizSession::new();
        session.initialize(Some("s1".to_string()), cards(n), QuizMode::Test, &settings);
        session
    }

    fn current_id(session: &QuizSession) -> Option<&str> {
        session.current_card().map(|c| c.id.as_str())
    }

    #[test]
    fn test_lifecycle_states() {
        let mut session = QuizSession::new();
        assert_eq!(session.state(), QuizState::NotStarted);

        session.initialize(None, cards(1), QuizMode::Flashcard, &SettingsUpdate::default());
        assert_eq!(session.state(), QuizState::Active);

        session.next_card();
        assert_eq!(session.state(), QuizState::Completed);
    }

    #[test]
    fn test_initialize_resets_previous_run() {
        let mut session = test_session(2, SettingsUpdate::default());
        session.answer_question("nope", QuestionKind::Written);
        session.next_card();

        session.initialize(None, cards(3), QuizMode::Test, &SettingsUpdate::default());

        assert_eq!(session.current_index, 0);
        assert!(session.responses.is_empty());
        assert!(session.wrong_answers.is_empty());
        assert!(!session.is_completed);
        assert_eq!(session.cards.len(), 3);
    }

    #[test]
    fn test_shuffle_keeps_every_card() {
        let mut session = QuizSession::new();
        let mut rng = StdRng::seed_from_u64(7);
        let settings = SettingsUpdate {
            shuffle_cards: Some(true),
            ..SettingsUpdate::default()
        };
        session.initialize_with_rng(None, cards(10), QuizMode::Test, &settings, &mut rng);

        let mut ids: Vec<_> = session.cards.iter().map(|c| c.id.clone()).collect();
        ids.sort();
        let mut expected: Vec<_> = cards(10).into_iter().map(|c| c.id).collect();
        expected.sort();
        assert_eq!(ids, expected);
        assert!(session.settings.shuffle_cards);
    }

    #[test]
    fn test_flip_only_in_flashcard_mode() {
        let mut session = QuizSession::new();
        session.initialize(None, cards(2), QuizMode::Flashcard, &SettingsUpdate::default());
        session.flip_card();
        assert!(session.is_flipped);
        session.flip_card();
        assert!(!session.is_flipped);

        let mut test = test_session(2, SettingsUpdate::default());
        test.flip_card();
        assert!(!test.is_flipped);
    }

    #[test]
    fn test_mark_card_records_and_advances() {
        let mut session = QuizSession::new();
        session.initialize(None, cards(2), QuizMode::Flashcard, &SettingsUpdate::default());
        session.flip_card();

        session.mark_card(Difficulty::Hard);

        assert_eq!(session.responses.len(), 1);
        assert_eq!(session.responses[0].status, ResponseStatus::Reviewed);
        assert_eq!(session.responses[0].difficulty, Some(Difficulty::Hard));
        assert_eq!(current_id(&session), Some("c2"));
        assert!(!session.is_flipped);
    }

    #[test]
    fn test_answer_checks_by_question_kind() {
        let mut session = test_session(1, SettingsUpdate::default());
        session.cards[0].back = "True".to_string();

        assert_eq!(session.answer_question("true", QuestionKind::TrueFalse), Some(true));
        // true/false does not trim
        assert_eq!(session.answer_question(" true", QuestionKind::TrueFalse), Some(false));
        assert_eq!(session.answer_question("  TRUE ", QuestionKind::Written), Some(true));
        // no options means multiple choice can never be right
        assert_eq!(session.answer_question("True", QuestionKind::MultipleChoice), Some(false));

        session.cards[0].options = vec![
            QuizOption { text: "False".to_string(), is_correct: false },
            QuizOption { text: "True".to_string(), is_correct: true },
        ];
        assert_eq!(session.answer_question("True", QuestionKind::MultipleChoice), Some(true));
        assert_eq!(session.answer_question("False", QuestionKind::MultipleChoice), Some(false));
    }

    #[test]
    fn test_wrong_answers_queue_allows_duplicates() {
        let mut session = test_session(1, SettingsUpdate::default());
        session.answer_question("x", QuestionKind::Written);
        session.answer_question("y", QuestionKind::Written);
        assert_eq!(session.wrong_answers.len(), 2);
    }

    #[test]
    fn test_instant_feedback_reveals_answer() {
        let mut session = test_session(2, SettingsUpdate::default());
        session.answer_question("D1", QuestionKind::Written);
        assert!(session.show_answer);
        session.next_card();
        assert!(!session.show_answer);

        let mut quiet = test_session(
            2,
            SettingsUpdate {
                instant_feedback: Some(false),
                ..SettingsUpdate::default()
            },
        );
        quiet.answer_question("D1", QuestionKind::Written);
        assert!(!quiet.show_answer);
    }

    #[test]
    fn test_completion_is_idempotent() {
        let mut session = test_session(
            2,
            SettingsUpdate {
                repeat_incorrect: Some(false),
                ..SettingsUpdate::default()
            },
        );
        session.answer_question("D1", QuestionKind::Written);
        session.next_card();
        session.answer_question("D2", QuestionKind::Written);
        session.next_card();
        assert!(session.is_completed);

        session.next_card();
        session.next_card();
        assert!(session.is_completed);
        assert_eq!(session.cards.len(), 2);
        assert_eq!(session.current_index, 1);
    }

    #[test]
    fn test_wrong_card_is_presented_again() {
        let mut session = test_session(3, SettingsUpdate::default());

        session.answer_question("D1", QuestionKind::Written);
        session.next_card();
        session.answer_question("wrong", QuestionKind::Written);
        session.next_card();
        session.answer_question("D3", QuestionKind::Written);
        session.next_card();

        assert!(!session.is_completed);
        assert_eq!(current_id(&session), Some("c2"));
        assert_eq!(session.current_index, 3);
        assert!(session.wrong_answers.is_empty());

        // Second attempt, wrong again: the session still finishes.
        session.answer_question("still wrong", QuestionKind::Written);
        session.next_card();
        assert!(session.is_completed);
    }

    #[test]
    fn test_wrong_card_answered_correctly_on_review() {
        let mut session = test_session(3, SettingsUpdate::default());
        for answer in ["D1", "wrong", "D3"] {
            session.answer_question(answer, QuestionKind::Written);
            session.next_card();
        }
        assert!(!session.is_completed);

        session.answer_question("D2", QuestionKind::Written);
        session.next_card();
        assert!(session.is_completed);
        assert_eq!(session.progress().correct, 3);
    }

    #[test]
    fn test_unbounded_review_repeats_until_correct() {
        let mut session = test_session(
            1,
            SettingsUpdate {
                max_review_rounds: Some(None),
                ..SettingsUpdate::default()
            },
        );
        for _ in 0..3 {
            session.answer_question("wrong", QuestionKind::Written);
            session.next_card();
            assert!(!session.is_completed);
        }
        session.answer_question("D1", QuestionKind::Written);
        session.next_card();
        assert!(session.is_completed);
        assert_eq!(session.cards.len(), 4);
    }

    #[test]
    fn test_skipped_cards_come_back_before_wrong_ones() {
        let mut session = test_session(3, SettingsUpdate::default());
        session.answer_question("wrong", QuestionKind::Written);
        session.next_card();
        session.skip_question();
        session.answer_question("D3", QuestionKind::Written);
        session.next_card();

        let tail: Vec<_> = session.cards[3..].iter().map(|c| c.id.as_str()).collect();
        assert_eq!(tail, vec!["c2", "c1"]);
        assert_eq!(current_id(&session), Some("c2"));
    }

    #[test]
    fn test_flashcard_mode_never_requeues() {
        let mut session = QuizSession::new();
        session.initialize(None, cards(1), QuizMode::Flashcard, &SettingsUpdate::default());
        session.skip_question();
        assert!(session.is_completed);
        assert_eq!(session.cards.len(), 1);
    }

    #[test]
    fn test_navigation() {
        let mut session = test_session(3, SettingsUpdate::default());
        session.previous_card();
        assert_eq!(session.current_index, 0);

        session.go_to_card(2);
        assert_eq!(current_id(&session), Some("c3"));
        session.previous_card();
        assert_eq!(current_id(&session), Some("c2"));

        session.go_to_card(10);
        assert!(session.current_card().is_none());
        assert_eq!(session.answer_question("x", QuestionKind::Written), None);
        assert!(session.responses.is_empty());
    }

    #[test]
    fn test_progress_summary() {
        let mut session = test_session(4, SettingsUpdate::default());
        session.answer_question("D1", QuestionKind::Written);
        session.next_card();
        session.answer_question("no", QuestionKind::Written);
        session.next_card();
        session.skip_question();

        let progress = session.progress();
        assert_eq!(progress.total, 4);
        assert_eq!(progress.answered, 2);
        assert_eq!(progress.skipped, 1);
        assert_eq!(progress.correct, 1);
        assert_eq!(progress.incorrect, 1);
        assert_eq!(progress.percentage, 50);
        assert_eq!(progress.accuracy, 50);
    }

    #[test]
    fn test_progress_on_empty_session() {
        let session = QuizSession::new();
        let progress = session.progress();
        assert_eq!(progress.total, 0);
        assert_eq!(progress.percentage, 0);
        assert_eq!(progress.accuracy, 0);
    }

    #[test]
    fn test_toggle_star_flips_every_copy() {
        let mut session = test_session(2, SettingsUpdate::default());
        session.answer_question("wrong", QuestionKind::Written);
        session.next_card();
        session.next_card();
        assert_eq!(session.cards.len(), 3);

        session.toggle_star("c1");
        assert!(session.cards[0].is_starred);
        assert!(session.cards[2].is_starred);
        assert!(!session.cards[1].is_starred);
    }

    #[test]
    fn test_update_settings_mid_session() {
        let mut session = test_session(1, SettingsUpdate::default());
        session.update_settings(&SettingsUpdate {
            repeat_incorrect: Some(false),
            ..SettingsUpdate::default()
        });
        assert!(!session.settings.repeat_incorrect);
        assert!(session.settings.instant_feedback);
    }
}
