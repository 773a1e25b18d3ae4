pub mod config;
pub mod database;
pub mod export;
pub mod models;
pub mod services;
pub mod store;

pub use config::AppConfig;
pub use database::{Backend, SqliteBackend};
pub use models::{Flashcard, FlashcardSet, Folder, Question, QuizCard, QuizSession};
pub use services::{FeedbackService, ProgressTracker};
pub use store::{ProfileStore, SetStore, StudySessionStore};
