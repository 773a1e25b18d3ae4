//! Flashcard is a pair <term, definition> belonging to one set
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    #[serde(default)]
    pub set_id: String,
    pub term: String,
    pub definition: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Display order within the set; unique per set.
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub is_starred: bool,
}

impl Flashcard {
    pub fn new(id: impl Into<String>, term: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            set_id: String::new(),
            term: term.into(),
            definition: definition.into(),
            image_url: None,
            position: 0,
            is_starred: false,
        }
    }

    pub fn in_set(mut self, set_id: impl Into<String>, position: i64) -> Self {
        self.set_id = set_id.into();
        self.position = position;
        self
    }

    pub fn starred(mut self) -> Self {
        self.is_starred = true;
        self
    }
}

/// A card as typed by the user, before the backend assigns it an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCard {
    pub term: String,
    pub definition: String,
}

impl NewCard {
    pub fn new(term: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            definition: definition.into(),
        }
    }
}
