//! Turns flashcards into multiple-choice questions and matching boards.

use crate::models::{Flashcard, MatchEntry, MatchingBoard, Question, QuestionKind};
use chrono::Utc;
use log::warn;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Which side of the card the learner has to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerField {
    /// Prompt with the term, answer with the definition.
    #[default]
    Definition,
    /// Prompt with the definition, answer with the term.
    Term,
}

impl AnswerField {
    fn answer<'a>(self, card: &'a Flashcard) -> &'a str {
        match self {
            AnswerField::Definition => &card.definition,
            AnswerField::Term => &card.term,
        }
    }

    fn prompt<'a>(self, card: &'a Flashcard) -> &'a str {
        match self {
            AnswerField::Definition => &card.term,
            AnswerField::Term => &card.definition,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultipleChoiceOptions {
    pub max_options: usize,
    pub answer_field: AnswerField,
    pub filter_starred: bool,
    pub shuffle_questions: bool,
    /// Caps the option count at the number of cards in the set.
    pub dynamic_options: bool,
}

impl Default for MultipleChoiceOptions {
    fn default() -> Self {
        Self {
            max_options: 4,
            answer_field: AnswerField::Definition,
            filter_starred: false,
            shuffle_questions: true,
            dynamic_options: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingOptions {
    pub filter_starred: bool,
    pub shuffle_pairs: bool,
    pub max_pairs: usize,
}

impl Default for MatchingOptions {
    fn default() -> Self {
        Self {
            filter_starred: false,
            shuffle_pairs: true,
            max_pairs: 6,
        }
    }
}

fn select_cards(cards: &[Flashcard], filter_starred: bool) -> Vec<&Flashcard> {
    cards
        .iter()
        .filter(|card| !filter_starred || card.is_starred)
        .collect()
}

pub fn generate_multiple_choice(
    cards: &[Flashcard],
    options: &MultipleChoiceOptions,
) -> Vec<Question> {
    generate_multiple_choice_with_rng(cards, options, &mut rand::thread_rng())
}

/// Builds one question per selected card. Wrong options come from the other
/// cards of the whole input, never repeating an answer text, and the final
/// option order is shuffled per question.
pub fn generate_multiple_choice_with_rng<R: Rng + ?Sized>(
    cards: &[Flashcard],
    options: &MultipleChoiceOptions,
    rng: &mut R,
) -> Vec<Question> {
    if cards.is_empty() {
        warn!("No flashcards provided for multiple choice");
        return Vec::new();
    }

    let mut selected = select_cards(cards, options.filter_starred);
    if selected.is_empty() {
        warn!("No flashcards left after filtering for multiple choice");
        return Vec::new();
    }
    if options.shuffle_questions {
        selected.shuffle(rng);
    }

    let target = if options.dynamic_options {
        options.max_options.min(cards.len())
    } else {
        options.max_options
    };
    let field = options.answer_field;

    selected
        .into_iter()
        .enumerate()
        .map(|(index, card)| {
            let correct_answer = field.answer(card).to_string();
            let mut choices = vec![correct_answer.clone()];

            let mut others: Vec<&Flashcard> = cards.iter().filter(|c| c.id != card.id).collect();
            others.shuffle(rng);
            for other in others {
                if choices.len() >= target {
                    break;
                }
                let wrong = field.answer(other);
                if !choices.iter().any(|c| c == wrong) {
                    choices.push(wrong.to_string());
                }
            }
            choices.shuffle(rng);

            Question {
                id: format!("question-{}-{}", card.id, index),
                kind: QuestionKind::MultipleChoice,
                prompt: field.prompt(card).to_string(),
                correct_answer,
                options: choices,
                flashcard_id: Some(card.id.clone()),
                term: card.term.clone(),
                definition: card.definition.clone(),
                user_answer: None,
                is_correct: false,
                is_answered: false,
                time_spent_ms: 0,
                attempts: 0,
                start_time: None,
            }
        })
        .collect()
}

pub fn generate_matching(cards: &[Flashcard], options: &MatchingOptions) -> MatchingBoard {
    generate_matching_with_rng(cards, options, &mut rand::thread_rng())
}

/// Lays out up to `max_pairs` cards as two independently ordered columns.
pub fn generate_matching_with_rng<R: Rng + ?Sized>(
    cards: &[Flashcard],
    options: &MatchingOptions,
    rng: &mut R,
) -> MatchingBoard {
    let now = Utc::now();
    let mut selected = select_cards(cards, options.filter_starred);
    selected.truncate(options.max_pairs);
    if selected.is_empty() {
        return MatchingBoard::empty(now);
    }

    let entry = |prefix: &str, text: &str, card: &Flashcard, position: usize| MatchEntry {
        id: format!("{prefix}-{}", card.id),
        text: text.to_string(),
        flashcard_id: card.id.clone(),
        matched: false,
        position,
    };

    let mut terms: Vec<MatchEntry> = selected
        .iter()
        .enumerate()
        .map(|(i, card)| entry("term", &card.term, *card, i))
        .collect();
    let mut definitions: Vec<MatchEntry> = selected
        .iter()
        .enumerate()
        .map(|(i, card)| entry("def", &card.definition, *card, i))
        .collect();

    if options.shuffle_pairs {
        terms.shuffle(rng);
        definitions.shuffle(rng);
    }

    MatchingBoard {
        terms,
        definitions,
        total_pairs: selected.len(),
        matches: Vec::new(),
        start_time: now,
    }
}
