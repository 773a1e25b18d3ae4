//! Quiz questions generated from flashcards, and the matching board.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    Written,
}

/// A generated question plus the bookkeeping filled in as it is answered.
///
/// Answering never mutates a question in place: the feedback service returns
/// an updated copy which the caller stores in place of the old one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub kind: QuestionKind,
    pub prompt: String,
    pub correct_answer: String,
    /// Multiple choice only; contains `correct_answer` exactly once.
    #[serde(default)]
    pub options: Vec<String>,
    pub flashcard_id: Option<String>,
    pub term: String,
    pub definition: String,
    pub user_answer: Option<String>,
    pub is_correct: bool,
    pub is_answered: bool,
    pub time_spent_ms: i64,
    pub attempts: u32,
    pub start_time: Option<DateTime<Utc>>,
}

impl Question {
    /// Returns a copy timed from `at`.
    pub fn started_at(&self, at: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(at),
            ..self.clone()
        }
    }

    /// A question is usable when it has an id and something to compare against.
    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty() && !self.correct_answer.is_empty()
    }
}

/// One tile on the matching board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntry {
    pub id: String,
    pub text: String,
    pub flashcard_id: String,
    pub matched: bool,
    /// Index of the source card in the selected subset.
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingBoard {
    pub terms: Vec<MatchEntry>,
    pub definitions: Vec<MatchEntry>,
    pub total_pairs: usize,
    /// (term entry id, definition entry id) for every successful match.
    pub matches: Vec<(String, String)>,
    pub start_time: DateTime<Utc>,
}

impl MatchingBoard {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            terms: Vec::new(),
            definitions: Vec::new(),
            total_pairs: 0,
            matches: Vec::new(),
            start_time: now,
        }
    }

    /// Pairs a term tile with a definition tile. The pair is accepted only
    /// when both tiles are still open and point at the same flashcard.
    pub fn try_match(&mut self, term_id: &str, definition_id: &str) -> bool {
        let Some(term_idx) = self
            .terms
            .iter()
            .position(|t| t.id == term_id && !t.matched)
        else {
            return false;
        };
        let Some(def_idx) = self
            .definitions
            .iter()
            .position(|d| d.id == definition_id && !d.matched)
        else {
            return false;
        };

        if self.terms[term_idx].flashcard_id != self.definitions[def_idx].flashcard_id {
            return false;
        }

        self.terms[term_idx].matched = true;
        self.definitions[def_idx].matched = true;
        self.matches
            .push((term_id.to_string(), definition_id.to_string()));
        true
    }

    pub fn is_complete(&self) -> bool {
        self.matches.len() == self.total_pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(prefix: &str, card: &str, position: usize) -> MatchEntry {
        MatchEntry {
            id: format!("{prefix}-{card}"),
            text: card.to_uppercase(),
            flashcard_id: card.to_string(),
            matched: false,
            position,
        }
    }

    fn board() -> MatchingBoard {
        MatchingBoard {
            terms: vec![entry("term", "a", 0), entry("term", "b", 1)],
            definitions: vec![entry("def", "b", 1), entry("def", "a", 0)],
            total_pairs: 2,
            matches: Vec::new(),
            start_time: Utc::now(),
        }
    }

    #[test]
    fn test_match_requires_same_flashcard() {
        let mut board = board();
        assert!(!board.try_match("term-a", "def-b"));
        assert!(board.try_match("term-a", "def-a"));
        assert!(board.terms[0].matched);
        assert!(board.definitions[1].matched);
    }

    #[test]
    fn test_matched_tiles_cannot_be_reused() {
        let mut board = board();
        assert!(board.try_match("term-b", "def-b"));
        assert!(!board.try_match("term-b", "def-b"));
        assert!(!board.is_complete());
        assert!(board.try_match("term-a", "def-a"));
        assert!(board.is_complete());
    }
}
