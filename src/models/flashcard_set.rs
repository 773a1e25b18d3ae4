//! Flashcard set is a named, ordered collection of flashcards
use super::{Flashcard, NewCard};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardSet {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub total_cards: i64,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_studied_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<FolderSummary>,
    /// Sorted by `position` once loaded through the store.
    #[serde(default)]
    pub flashcards: Vec<Flashcard>,
}

impl FlashcardSet {
    pub fn sort_cards(&mut self) {
        self.flashcards.sort_by_key(|card| card.position);
    }
}

/// The folder columns shown next to a set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Input for creating a set together with its cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSet {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default, alias = "flashcards")]
    pub cards: Vec<NewCard>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

/// A public set as listed on the home page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentActivity {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub total_cards: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_studied_at: Option<DateTime<Utc>>,
    pub author_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_cards_by_position() {
        let mut set: FlashcardSet = serde_json::from_str(r#"{"id": "s1", "title": "Verbs"}"#).unwrap();
        set.flashcards = vec![
            Flashcard::new("b", "B", "2").in_set("s1", 1),
            Flashcard::new("a", "A", "1").in_set("s1", 0),
        ];

        set.sort_cards();

        let ids: Vec<_> = set.flashcards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_new_set_accepts_exported_flashcards_key() {
        let draft: NewSet = serde_json::from_str(
            r#"{"title": "Imported", "flashcards": [{"id": "x", "term": "t", "definition": "d"}]}"#,
        )
        .unwrap();

        assert_eq!(draft.cards, vec![NewCard::new("t", "d")]);
    }
}
