pub mod feedback;
pub mod progress;
pub mod question;

pub use feedback::{FeedbackOptions, FeedbackResult, FeedbackService, FeedbackType, SessionResults};
pub use progress::{CardProgress, DetailedStats, ProgressTracker, SetProgress, Tally};
pub use question::{
    AnswerField, MatchingOptions, MultipleChoiceOptions, generate_matching,
    generate_matching_with_rng, generate_multiple_choice, generate_multiple_choice_with_rng,
};
