//! Backend client abstraction.
//!
//! Everything the app persists goes through the [`Backend`] trait: filtered
//! reads, inserts, partial updates and deletes against named collections,
//! plus the currently authenticated identity. Rows are plain JSON objects;
//! typed models convert with [`to_record`] and [`from_record`].

pub mod db;
#[cfg(test)]
pub(crate) mod testing;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

pub use db::SqliteBackend;

/// A single row as stored by the backend.
pub type Record = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no matching row")]
    NotFound,

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt row in {collection}: {reason}")]
    Corrupt {
        collection: &'static str,
        reason: String,
    },
}

/// Named collections ("tables") the app reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    FlashcardSets,
    Flashcards,
    Folders,
    UserProgress,
    AttemptHistory,
    StudySessions,
    UserAnswers,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::FlashcardSets => "flashcard_sets",
            Collection::Flashcards => "flashcards",
            Collection::Folders => "folders",
            Collection::UserProgress => "user_progress",
            Collection::AttemptHistory => "attempt_history",
            Collection::StudySessions => "study_sessions",
            Collection::UserAnswers => "user_answers",
        }
    }
}

/// The signed-in user as reported by the backend's auth layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    /// Avatar picked up from an external identity provider, if any.
    pub avatar_url: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            full_name: None,
            avatar_url: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }
}

/// Auth state notifications published by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Identity),
    SignedOut,
}

/// Conjunction of equality predicates. A `Value::Null` operand matches
/// rows where the field is null or missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn by_id(id: &str) -> Self {
        Self::new().eq("id", id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub field: String,
    pub descending: bool,
}

/// A filtered, ordered, optionally limited read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order.push(Order {
            field: field.into(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Abstract operations the app consumes from its hosted backend.
///
/// Implementations own their own failure modes; callers decide whether a
/// failure is fatal (structural mutations) or merely logged (telemetry).
pub trait Backend: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;

    fn fetch(&self, collection: Collection, query: &Query) -> Result<Vec<Record>, BackendError>;

    /// Returns [`BackendError::NotFound`] when no row matches.
    fn fetch_one(&self, collection: Collection, filter: &Filter) -> Result<Record, BackendError>;

    /// Inserts a row and returns it as stored, with server-assigned `id`
    /// and `created_at` filled in when absent.
    fn insert(&self, collection: Collection, record: Record) -> Result<Record, BackendError>;

    /// Shallow-merges `patch` into every matching row.
    fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Record,
    ) -> Result<(), BackendError>;

    fn delete(&self, collection: Collection, filter: &Filter) -> Result<(), BackendError>;
}

pub fn to_record<T: Serialize>(value: &T) -> Result<Record, BackendError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::Corrupt {
            collection: "<input>",
            reason: format!("expected an object, got {other}"),
        }),
    }
}

pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T, BackendError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

pub fn from_records<T: DeserializeOwned>(records: Vec<Record>) -> Result<Vec<T>, BackendError> {
    records.into_iter().map(from_record).collect()
}
