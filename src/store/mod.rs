//! In-memory snapshots of backend state plus the operations that refresh
//! them. The backend stays the source of truth: mutations write through
//! and then reload the affected snapshot.

pub mod auth;
pub mod profile;
pub mod sets;
pub mod study;

use crate::database::BackendError;

pub use auth::{AuthWatcher, Debouncer};
pub use profile::{AvatarConfig, ProfileSession, ProfileStore};
pub use sets::SetStore;
pub use study::{PersistedAnswer, PersistedQuiz, StudySessionStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("failed to create user profile: {0}")]
    ProfileProvisioning(#[source] BackendError),

    #[error("no user profile loaded")]
    NoProfileLoaded,

    #[error("flashcard set not found: {0}")]
    SetNotFound(String),
}
