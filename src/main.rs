use flashcards_app::database::{Backend, Identity};
use flashcards_app::export::import_set;
use flashcards_app::models::{
    FlashcardSet, NewCard, NewSet, Question, QuestionKind, QuizCard, QuizMode, QuizSession,
    QuizState, SettingsUpdate, StudyMode,
};
use flashcards_app::services::{FeedbackService, ProgressTracker, generate_multiple_choice};
use flashcards_app::store::{AuthWatcher, ProfileSession, ProfileStore, SetStore, StudySessionStore};
use flashcards_app::{AppConfig, SqliteBackend};
use chrono::Utc;
use log::{error, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

const LOCAL_USER_ID: &str = "local-user";

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn sample_set() -> NewSet {
    NewSet {
        title: "Polish Vocabulary".to_string(),
        description: Some("Everyday words".to_string()),
        folder_id: None,
        cards: vec![
            NewCard::new("cześć", "hello"),
            NewCard::new("dziękuję", "thank you"),
            NewCard::new("proszę", "please"),
        ],
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Falling back to default config: {e}");
        AppConfig::default()
    });

    if let Some(parent) = config.database_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let backend = Arc::new(SqliteBackend::open(&config.database_path)?);
    let shared: Arc<dyn Backend> = backend.clone();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let profiles = Arc::new(ProfileStore::new(
        shared.clone(),
        Arc::new(ProfileSession::new()),
        config.avatars.clone(),
    ));
    let watcher = {
        let _guard = runtime.enter();
        AuthWatcher::spawn(profiles.clone(), backend.subscribe_auth(), config.auth_debounce())
    };

    let name = std::env::var("USER").unwrap_or_else(|_| "Local user".to_string());
    let identity = Identity::new(LOCAL_USER_ID).with_full_name(name);
    backend.sign_in(identity.clone());
    // Let the debounced profile load land before reading it.
    runtime.block_on(tokio::time::sleep(config.auth_debounce() * 2));
    if let Some(profile) = profiles.load_profile(false) {
        println!("Signed in as {}", profile.display_name);
    }

    let mut sets = SetStore::new(shared.clone(), profiles.clone());
    if let Some(path) = std::env::args().nth(1) {
        let draft = import_set(&path)?;
        sets.add_set(&draft, &identity.id)?;
    } else if sets.load_sets(Some(&identity.id)).is_empty() {
        sets.add_set(&sample_set(), &identity.id)?;
        println!("Sample data created!");
    }

    let all = sets.load_sets(Some(&identity.id));
    println!("Loaded {} sets from database", all.len());
    for set in &all {
        println!("  - {} ({} cards)", set.title, set.flashcards.len());
    }

    let Some(chosen) = all.first() else {
        return Ok(());
    };
    let mut study = StudySessionStore::new(shared.clone());
    let set = study.start_quiz(&mut sets, &chosen.id, &identity.id, StudyMode::Test)?;

    let tracker = ProgressTracker::new(shared.clone());
    run_quiz(&config, &set, &tracker, &mut study)?;
    study.end_quiz();

    let progress = tracker.get_set_progress(&set.id);
    println!(
        "Progress on '{}': {} still learning, {} mastered",
        set.title,
        progress.still_learning.len(),
        progress.mastered.len()
    );
    if let Some(stats) = tracker.get_detailed_stats(&set.id) {
        println!(
            "All-time: {}/{} correct ({:.0}%)",
            stats.correct_attempts,
            stats.total_attempts,
            stats.accuracy * 100.0
        );
    }

    watcher.abort();
    Ok(())
}

/// Asks every card on stdin. A number picks an option, anything else is
/// checked as a written answer, and an empty line skips the card.
fn run_quiz(
    config: &AppConfig,
    set: &FlashcardSet,
    tracker: &ProgressTracker,
    study: &mut StudySessionStore,
) -> io::Result<()> {
    let questions = generate_multiple_choice(&set.flashcards, &config.multiple_choice);
    let by_card: HashMap<String, Question> = questions
        .iter()
        .map(|q| (QuizCard::from_question(q).id, q.clone()))
        .collect();

    let mut quiz = QuizSession::new();
    quiz.settings = config.test_settings.clone();
    quiz.initialize(
        Some(set.id.clone()),
        questions.iter().map(QuizCard::from_question).collect(),
        QuizMode::Test,
        &SettingsUpdate::default(),
    );

    let feedback = FeedbackService::new(Some(tracker.clone()));
    let mut answered: HashMap<String, Question> = HashMap::new();
    let mut lines = io::stdin().lock().lines();

    while quiz.state() == QuizState::Active {
        let Some(card) = quiz.current_card().cloned() else {
            break;
        };
        println!("\n{}", card.front);
        for (i, option) in card.options.iter().enumerate() {
            println!("  {}. {}", i + 1, option.text);
        }
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            println!("Skipped.");
            quiz.skip_question();
            continue;
        }

        let picked = input
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| card.options.get(i));
        let (answer, kind) = match picked {
            Some(option) => (option.text.clone(), QuestionKind::MultipleChoice),
            None => (input.to_string(), QuestionKind::Written),
        };
        let is_correct = quiz.answer_question(&answer, kind).unwrap_or(false);

        if let Some(question) = answered.get(&card.id).or_else(|| by_card.get(&card.id)) {
            let timed = question.started_at(quiz.card_start_time.unwrap_or_else(Utc::now));
            // Written answers are matched loosely; hand the canonical text on.
            let submitted = if is_correct {
                timed.correct_answer.clone()
            } else {
                answer.clone()
            };
            let (updated, result) = feedback.process_answer(
                &timed,
                &submitted,
                Some(&set.id),
                StudyMode::Test,
                &config.feedback,
            );
            println!("{}", result.feedback_message);
            answered.insert(card.id.clone(), updated);
        }
        study.submit_answer(&card.id, &answer, is_correct);
        quiz.next_card();
    }

    let finished: Vec<Question> = questions
        .iter()
        .map(|q| {
            let card_id = QuizCard::from_question(q).id;
            answered.get(&card_id).cloned().unwrap_or_else(|| q.clone())
        })
        .collect();
    let results = FeedbackService::calculate_session_results(&finished);
    let progress = quiz.progress();
    println!(
        "\nAnswered {}/{} questions, {}% correct, {} skipped, {} ms on average",
        results.answered_questions,
        results.total_questions,
        results.accuracy,
        progress.skipped,
        results.average_time_ms
    );
    Ok(())
}
