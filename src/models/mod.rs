pub mod flashcard;
pub mod flashcard_set;
pub mod folder;
pub mod mastery;
pub mod profile;
pub mod progress;
pub mod question;
pub mod quiz_card;
pub mod quiz_session;

pub use flashcard::{Flashcard, NewCard};
pub use flashcard_set::{FlashcardSet, FolderSummary, NewSet, RecentActivity, SetUpdate};
pub use folder::{Folder, FolderUpdate, NewFolder, SetSummary};
pub use profile::{ProfileUpdate, UserProfile};
pub use progress::{AttemptHistoryEntry, ProgressRecord, ProgressStatus, StudyMode};
pub use question::{MatchEntry, MatchingBoard, Question, QuestionKind};
pub use quiz_card::{QuizCard, QuizOption};
pub use quiz_session::{
    Difficulty, QuizMode, QuizProgress, QuizResponse, QuizSession, QuizState, ResponseStatus,
    SettingsUpdate, TestSettings,
};
