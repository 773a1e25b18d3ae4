//! Card as seen by a running quiz.
use super::{Flashcard, Question};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizCard {
    pub id: String,
    pub front: String,
    /// Canonical answer used for true/false and written checks.
    pub back: String,
    #[serde(default)]
    pub options: Vec<QuizOption>,
    #[serde(default)]
    pub is_starred: bool,
}

impl QuizCard {
    pub fn from_flashcard(card: &Flashcard) -> Self {
        Self {
            id: card.id.clone(),
            front: card.term.clone(),
            back: card.definition.clone(),
            options: Vec::new(),
            is_starred: card.is_starred,
        }
    }

    /// Wraps a multiple-choice question, flagging the correct option.
    pub fn from_question(question: &Question) -> Self {
        Self {
            id: question
                .flashcard_id
                .clone()
                .unwrap_or_else(|| question.id.clone()),
            front: question.prompt.clone(),
            back: question.correct_answer.clone(),
            options: question
                .options
                .iter()
                .map(|text| QuizOption {
                    text: text.clone(),
                    is_correct: *text == question.correct_answer,
                })
                .collect(),
            is_starred: false,
        }
    }

    pub fn correct_option(&self) -> Option<&QuizOption> {
        self.options.iter().find(|opt| opt.is_correct)
    }
}

impl From<&Flashcard> for QuizCard {
    fn from(card: &Flashcard) -> Self {
        Self::from_flashcard(card)
    }
}
