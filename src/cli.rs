//! CLI interface for lingua-coach

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::{ChatClient, ImageOptions, ProviderKind};
use crate::config::{self, Config};
use crate::memory::queries::{DEFAULT_COMMON_MISTAKES_LIMIT, DEFAULT_VOCABULARY_LIMIT, DEFAULT_WEAKEST_LIMIT};
use crate::memory::{ConversationFeedback, MemoryManager};
use crate::modes::{mode_config, mode_config_by_key, LEARNING_MODES};
use crate::profile::{immersion_description, UserProfile};
use crate::session::{LearnerRecords, LearningSession, RoleplaySession};
use crate::store::{SnapshotStore, SqliteKvStore};
use crate::tutor::{prompts, Exercise, Tutor, DEFAULT_CARD_COUNT};
use crate::types::{ConversationRole, LearningMode, MediaKind, TargetLanguage};

type Records = LearnerRecords<SqliteKvStore>;
type Session = LearningSession<ChatClient, SqliteKvStore>;

#[derive(Parser)]
#[command(name = "lingua-coach")]
#[command(about = "Adaptive language tutor that remembers your mistakes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show progress scores and metrics
    Progress,
    /// Show what is due for review
    Review,
    /// Record a grammar mistake
    Mistake {
        concept: String,
        /// The sentence that contained the mistake
        example: String,
    },
    /// Record an unknown word
    VocabGap {
        word: String,
        translation: String,
        /// Sentence the word appeared in
        #[arg(short, long, default_value = "")]
        context: String,
    },
    /// Mark a concept as mastered
    Master { concept: String },
    /// Set the skill level for a category, a whole number clamped to 0-10
    WeakArea {
        category: String,
        #[arg(allow_negative_numbers = true)]
        level: i32,
    },
    /// Print the system prompt for a mode
    Prompt {
        #[arg(short, long)]
        mode: Option<String>,
    },
    /// Generate a lesson and work through its exercises
    Lesson {
        #[arg(short, long)]
        mode: Option<String>,
        #[arg(short, long)]
        topic: Option<String>,
        /// Only print the lesson
        #[arg(long)]
        no_practice: bool,
    },
    /// Roleplay conversation with feedback at the end
    Converse {
        /// barista, friend, coworker, traveler, stranger or custom
        #[arg(default_value = "friend")]
        role: String,
        /// Extra scene description
        #[arg(short, long)]
        scenario: Option<String>,
    },
    /// Check a single answer
    Check {
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        answer: String,
        #[arg(long)]
        expected: String,
        #[arg(long = "type", default_value = "translation")]
        kind: String,
        #[arg(short, long)]
        mode: Option<String>,
    },
    /// Simplify a song, video transcript or dialogue
    Media {
        /// youtube, lyrics or dialogue
        kind: String,
        /// Read content from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(short, long)]
        text: Option<String>,
    },
    /// Practice vocabulary cards
    Vocab {
        #[arg(short, long, default_value_t = DEFAULT_CARD_COUNT)]
        count: usize,
    },
    /// Today's challenge
    Challenge {
        /// Submit an answer without prompting
        #[arg(short, long)]
        answer: Option<String>,
    },
    /// List models offered by the provider
    Models,
    /// Build an illustration URL for a prompt
    Image {
        prompt: String,
        #[arg(long, default_value_t = 1024)]
        width: u32,
        #[arg(long, default_value_t = 1024)]
        height: u32,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "flux")]
        model: String,
    },
    /// List learning modes
    Modes,
    /// Show version, file locations and storage statistics
    Status,
    /// Configure the tutor
    Config {
        #[arg(long)]
        show: bool,
        #[arg(long)]
        set_api_key: Option<String>,
        /// Remove the stored API key
        #[arg(long)]
        clear_api_key: bool,
        #[arg(long)]
        set_model: Option<String>,
        /// pollinations or openrouter
        #[arg(long)]
        set_provider: Option<String>,
        #[arg(long)]
        set_language: Option<String>,
        #[arg(long)]
        set_immersion: Option<u8>,
        /// Restore default configuration
        #[arg(long)]
        reset: bool,
    },
    /// Erase all learner state
    Reset {
        #[arg(short, long)]
        yes: bool,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Progress) {
        local @ (Commands::Progress
        | Commands::Review
        | Commands::Mistake { .. }
        | Commands::VocabGap { .. }
        | Commands::Master { .. }
        | Commands::WeakArea { .. }
        | Commands::Prompt { .. }
        | Commands::Reset { .. }) => {
            let config = Config::load()?;
            let records = open_records(&config).await?;
            run_local(&records, &config, local).await?;
        }
        Commands::Lesson { mode, topic, no_practice } => {
            let config = Config::load()?;
            let session = open_session(&config).await?;
            let mode = resolve_mode(mode.as_deref(), &config)?;
            run_lesson(&session, mode, topic.as_deref(), !no_practice).await?;
        }
        Commands::Converse { role, scenario } => {
            let role: ConversationRole = role.parse()?;
            let session = open_session(&Config::load()?).await?;
            run_roleplay(&session, role, scenario).await?;
        }
        Commands::Check { prompt, answer, expected, kind, mode } => {
            let config = Config::load()?;
            let session = open_session(&config).await?;
            let mode = resolve_mode(mode.as_deref(), &config)?;
            let exercise = Exercise {
                kind,
                prompt,
                correct_answer: expected,
                options: None,
            };
            let check = session.check_answer(&exercise, &answer, mode).await?;
            print_check(&check);
        }
        Commands::Media { kind, file, text } => {
            let kind: MediaKind = kind.parse()?;
            let content = match (file, text) {
                (Some(path), _) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, Some(text)) => text,
                (None, None) => anyhow::bail!("Provide content with --file or --text"),
            };
            let session = open_session(&Config::load()?).await?;
            let analysis = session.simplify_media(&content, kind).await?;

            println!("\n{}\n", analysis.simplified_content);
            if !analysis.highlights.is_empty() {
                println!("Useful phrases:");
                for h in &analysis.highlights {
                    println!("  {} - {} [{}/10]", h.phrase, h.translation, h.usefulness);
                    if !h.explanation.is_empty() {
                        println!("      {}", h.explanation);
                    }
                }
            }
            if !analysis.cultural_notes.is_empty() {
                println!("\nCultural notes:");
                for note in &analysis.cultural_notes {
                    println!("  {}: {}", note.term, note.explanation);
                }
            }
            if !analysis.follow_up_exercises.is_empty() {
                println!("\nTry these:");
                for (i, ex) in analysis.follow_up_exercises.iter().enumerate() {
                    println!("  {}. {}", i + 1, ex.prompt);
                }
            }
        }
        Commands::Vocab { count } => {
            let session = open_session(&Config::load()?).await?;
            run_vocabulary(&session, count).await?;
        }
        Commands::Challenge { answer } => {
            let session = open_session(&Config::load()?).await?;
            run_challenge(&session, answer).await?;
        }
        Commands::Models => {
            let config = Config::load()?;
            let tutor = Tutor::new(
                Arc::new(ChatClient::from_config(&config)?),
                config.learner.target_language,
            );
            let models = tutor.list_models().await?;
            println!("Available models ({}):", models.len());
            for model in models {
                let marker = if model.id == config.provider.model { "*" } else { " " };
                match model.description {
                    Some(desc) => println!(" {} {:<30} {}", marker, model.id, desc),
                    None => println!(" {} {}", marker, model.id),
                }
            }
        }
        Commands::Image { prompt, width, height, seed, model } => {
            let config = Config::load()?;
            let tutor = Tutor::new(
                Arc::new(ChatClient::from_config(&config)?),
                config.learner.target_language,
            );
            let options = ImageOptions {
                width,
                height,
                model,
                seed,
                nologo: true,
            };
            println!("{}", tutor.illustrate(&prompt, &options).await?);
        }
        Commands::Modes => {
            for mode in LEARNING_MODES.iter() {
                let c = &mode.characteristics;
                println!("{}", mode);
                println!("    {}", mode.description);
                println!(
                    "    corrections: {:?}, feedback: {:?}, pacing: {:?}, immersion: {}/10",
                    c.correction_timing, c.feedback_style, c.pacing, c.immersion_level
                );
            }
        }
        Commands::Status => {
            let config = Config::load()?;
            let db_path = config.database_path()?;
            let store = SqliteKvStore::new(&db_path).await?;
            let stats = store.stats().await?;

            println!("{}", crate::info());
            println!("  config:   {}", config::config_path()?.display());
            println!("  database: {}", db_path.display());
            println!("  entries:  {}", stats.entries);
            if let Some(updated) = stats.last_updated {
                println!("  updated:  {}", updated);
            }
        }
        Commands::Config {
            show: _,
            set_api_key,
            clear_api_key,
            set_model,
            set_provider,
            set_language,
            set_immersion,
            reset,
        } => {
            if let Some(key) = set_api_key {
                config::set_api_key(&key)?;
            } else if clear_api_key {
                config::clear_api_key()?;
            } else if let Some(model) = set_model {
                config::set_model(&model)?;
            } else if let Some(provider) = set_provider {
                config::set_provider(parse_provider(&provider)?)?;
            } else if let Some(language) = set_language {
                let language: TargetLanguage = language.parse()?;
                config::set_language(language)?;
                let records = open_records(&Config::load()?).await?;
                let profile = records.profile().await?;
                records
                    .save_profile(&UserProfile {
                        target_language: language,
                        ..profile
                    })
                    .await?;
            } else if let Some(level) = set_immersion {
                config::set_immersion(level)?;
                let records = open_records(&Config::load()?).await?;
                let profile = records.profile().await?;
                records.save_profile(&profile.with_immersion(level)).await?;
            } else if reset {
                config::reset_config()?;
            } else {
                // --show is also the default
                config::show_config()?;
            }
        }
    }

    Ok(())
}

/// Stored learner state, seeded from the learner defaults on first run.
/// Never needs the model provider.
async fn open_records(config: &Config) -> Result<Records> {
    let store = Arc::new(SqliteKvStore::new(config.database_path()?).await?);
    let records = LearnerRecords::new(Arc::new(SnapshotStore::new(store)), MemoryManager::default());

    let learner = &config.learner;
    records
        .ensure_profile(|fresh| {
            UserProfile {
                target_language: learner.target_language,
                current_mode: learner.default_mode,
                ..fresh
            }
            .with_immersion(learner.immersion_level)
        })
        .await?;
    Ok(records)
}

/// Stored learner state plus the configured provider client
async fn open_session(config: &Config) -> Result<Session> {
    let records = open_records(config).await?;
    let client = ChatClient::from_config(config)?;
    let profile = records.profile().await?;
    let tutor = Tutor::new(Arc::new(client), profile.target_language);
    Ok(LearningSession::from_records(tutor, records))
}

/// Commands answered from stored learner state alone
async fn run_local(records: &Records, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Progress => show_progress(records).await?,
        Commands::Review => show_review(records).await?,
        Commands::Mistake { concept, example } => {
            let memory = records
                .update_memory(|mm, m| mm.record_grammar_mistake(m, &concept, &example))
                .await?;
            if let Some(entry) = memory.grammar_mistake(&concept) {
                println!("Recorded '{}' ({} times so far)", concept, entry.mistake_count);
            }
        }
        Commands::VocabGap { word, translation, context } => {
            let memory = records
                .update_memory(|mm, m| mm.record_vocabulary_gap(m, &word, &translation, &context))
                .await?;
            if let Some(gap) = memory.vocabulary_gap(&word) {
                println!("Recorded '{}' ({} encounters)", word, gap.encounter_count);
            }
        }
        Commands::Master { concept } => {
            records
                .update_memory(|mm, m| mm.mark_concept_mastered(m, &concept))
                .await?;
            println!("'{}' mastered", concept);
        }
        Commands::WeakArea { category, level } => {
            let memory = records
                .update_memory(|mm, m| mm.update_weak_area(m, &category, f64::from(level)))
                .await?;
            if let Some(area) = memory.weak_area(&category) {
                println!(
                    "{}: {}/10{}",
                    category,
                    area.skill_level,
                    if area.needs_review { " (needs review)" } else { "" }
                );
            }
        }
        Commands::Prompt { mode } => {
            let memory = records.memory().await?;
            let profile = records.profile().await?;
            let mode = mode.unwrap_or_else(|| config.learner.default_mode.key().to_string());
            let prompt = prompts::build_system_prompt(
                &mode,
                &memory,
                profile.immersion_level,
                profile.target_language.key(),
            )?;
            println!("{}", prompt);
        }
        Commands::Reset { yes } => {
            if !yes {
                println!("This erases all mistakes, vocabulary, history and progress.");
                println!("Run again with --yes to confirm.");
                return Ok(());
            }
            records.reset().await?;
            println!("Learner state erased.");
        }
        _ => anyhow::bail!("This command needs the tutor"),
    }
    Ok(())
}

fn resolve_mode(mode: Option<&str>, config: &Config) -> Result<LearningMode> {
    match mode {
        Some(key) => Ok(mode_config_by_key(key)?.id),
        None => Ok(config.learner.default_mode),
    }
}

fn parse_provider(s: &str) -> Result<ProviderKind> {
    match s.trim().to_lowercase().as_str() {
        "pollinations" => Ok(ProviderKind::Pollinations),
        "openrouter" => Ok(ProviderKind::OpenRouter),
        other => anyhow::bail!("Unknown provider '{}'. Use pollinations or openrouter.", other),
    }
}

/// Read one line; `None` on Ctrl-C / Ctrl-D
fn read_line(rl: &mut DefaultEditor, prompt: &str) -> Result<Option<String>> {
    match rl.readline(prompt) {
        Ok(line) => {
            let _ = rl.add_history_entry(line.as_str());
            Ok(Some(line.trim().to_string()))
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn show_progress(records: &Records) -> Result<()> {
    let memory = records.memory().await?;
    let profile = records.profile().await?;
    let metrics = records.metrics().await?;
    let progress = memory.calculate_overall_progress();

    println!("{} learning {}", profile.name, profile.target_language);
    println!(
        "  Immersion {}/10 - {}",
        profile.immersion_level,
        immersion_description(profile.immersion_level, profile.target_language)
    );
    println!();
    println!("  Grammar mastery:         {}%", progress.grammar_mastery);
    println!("  Vocabulary size:         {}", progress.vocabulary_size);
    println!("  Conversation experience: {}%", progress.conversation_experience);
    println!("  Lessons completed:       {}", metrics.lessons_completed);
    println!("  Time spent:              {}", metrics.time_spent());
    println!("  Challenge streak:        {} days", metrics.streak_days);

    let common = memory.most_common_mistakes(DEFAULT_COMMON_MISTAKES_LIMIT);
    if !common.is_empty() {
        println!("\nMost common mistakes:");
        for m in common {
            println!("  {:<24} x{}", m.concept, m.mistake_count);
        }
    }
    if !memory.mastered_concepts.is_empty() {
        println!("\nMastered: {}", memory.mastered_concepts.join(", "));
    }
    Ok(())
}

async fn show_review(records: &Records) -> Result<()> {
    let memory = records.memory().await?;
    let mm = records.manager();

    let due = mm.concepts_due_for_review(&memory);
    let weakest = memory.weakest_areas(DEFAULT_WEAKEST_LIMIT);
    let words = mm.vocabulary_to_review(&memory, DEFAULT_VOCABULARY_LIMIT);

    if due.is_empty() && weakest.is_empty() && words.is_empty() {
        println!("Nothing due for review.");
        return Ok(());
    }
    if !due.is_empty() {
        println!("Grammar due: {}", due.join(", "));
    }
    if !weakest.is_empty() {
        println!("Weakest areas:");
        for area in weakest {
            println!("  {:<24} {}/10", area.category, area.skill_level);
        }
    }
    if !words.is_empty() {
        println!("Vocabulary to revisit:");
        for gap in words {
            println!("  {:<20} {} (seen {}x)", gap.word, gap.translation, gap.encounter_count);
        }
    }
    Ok(())
}

fn print_check(check: &crate::tutor::AnswerCheck) {
    println!("{}", if check.is_correct { "Correct!" } else { "Not quite." });
    println!("{}", check.feedback);
    if !check.explanation.is_empty() {
        println!("{}", check.explanation);
    }
    if !check.encouragement.is_empty() {
        println!("{}", check.encouragement);
    }
}

async fn run_lesson(session: &Session, mode: LearningMode, topic: Option<&str>, practice: bool) -> Result<()> {
    println!("Preparing a {} lesson...", mode_config(mode).name);
    let lesson = session.lesson(mode, topic).await?;

    println!("\n{}", lesson.title);
    if !lesson.description.is_empty() {
        println!("{}", lesson.description);
    }
    if !lesson.grammar_concepts.is_empty() {
        println!("Grammar: {}", lesson.grammar_concepts.join(", "));
    }
    if !practice {
        for (i, ex) in lesson.exercises.iter().enumerate() {
            println!("  {}. [{}] {}", i + 1, ex.kind, ex.prompt);
        }
        return Ok(());
    }

    let mut rl = DefaultEditor::new()?;
    let mut answered = 0u32;
    for (i, exercise) in lesson.exercises.iter().enumerate() {
        println!("\n{}. {}", i + 1, exercise.prompt);
        if let Some(options) = &exercise.options {
            for option in options {
                println!("   - {}", option);
            }
        }
        let Some(answer) = read_line(&mut rl, "> ")? else {
            break;
        };
        if answer.is_empty() {
            println!("Skipped. Answer: {}", exercise.correct_answer);
            continue;
        }
        match session.check_answer(exercise, &answer, mode).await {
            Ok(check) => {
                print_check(&check);
                answered += 1;
            }
            Err(e) => eprintln!("Could not check that answer: {}", e),
        }
    }

    if answered > 0 {
        let metrics = session.complete_lesson(mode, answered).await?;
        println!("\nLesson complete. {} lessons so far.", metrics.lessons_completed);
    }
    Ok(())
}

async fn run_roleplay(session: &Session, role: ConversationRole, scenario: Option<String>) -> Result<()> {
    println!("Roleplay with a {}. Type /end for feedback or /quit to leave.\n", role);
    let mut roleplay = session.start_roleplay(role, scenario).await?;
    if let Some(greeting) = roleplay.last_reply() {
        println!("{}: {}", role, greeting);
    }

    let mut rl = DefaultEditor::new()?;
    loop {
        let Some(line) = read_line(&mut rl, "you> ")? else {
            return finish_roleplay(session, &roleplay).await;
        };
        match line.as_str() {
            "" => continue,
            "/quit" => {
                println!("Conversation discarded.");
                return Ok(());
            }
            "/end" => return finish_roleplay(session, &roleplay).await,
            text => match session.send(&mut roleplay, text).await {
                Ok(reply) => println!("{}: {}", role, reply),
                Err(e) => eprintln!("No reply ({}). Try again.", e),
            },
        }
    }
}

async fn finish_roleplay(session: &Session, roleplay: &RoleplaySession) -> Result<()> {
    println!("\nReviewing your conversation...");
    let recorded = session.end_roleplay(roleplay).await?;
    if let Some(feedback) = &recorded.feedback {
        print_feedback(feedback);
    }
    Ok(())
}

fn print_feedback(feedback: &ConversationFeedback) {
    println!("Score: {}/100", feedback.overall_score);
    if !feedback.strengths.is_empty() {
        println!("\nStrengths:");
        for s in &feedback.strengths {
            println!("  + {}", s);
        }
    }
    if !feedback.improvements.is_empty() {
        println!("\nTo work on:");
        for s in &feedback.improvements {
            println!("  - {}", s);
        }
    }
    if !feedback.native_phrasings.is_empty() {
        println!("\nHow a native speaker would say it:");
        for p in &feedback.native_phrasings {
            println!("  \"{}\" -> \"{}\"", p.user_said, p.native_says);
            if !p.explanation.is_empty() {
                println!("      {}", p.explanation);
            }
        }
    }
}

async fn run_vocabulary(session: &Session, count: usize) -> Result<()> {
    println!("Generating {} cards...", count);
    let deck = session.vocabulary_cards(count).await?;
    let mut rl = DefaultEditor::new()?;
    let mut score = 0;
    let mut seen = 0;

    for card in &deck.cards {
        println!("\n{}", card.word);
        if !card.example.is_empty() {
            println!("  \"{}\"", card.example);
        }
        let Some(answer) = read_line(&mut rl, "meaning> ")? else {
            break;
        };
        seen += 1;
        if session.answer_card(card, &answer).await? {
            score += 1;
            println!("Correct!");
        } else {
            println!("It means: {}", card.translation);
        }
    }
    println!("\nScore: {}/{}", score, seen);
    Ok(())
}

async fn run_challenge(session: &Session, answer: Option<String>) -> Result<()> {
    let state = session.daily_challenge().await?;
    let Some(challenge) = &state.challenge else {
        println!("No challenge available today.");
        return Ok(());
    };

    println!("Daily challenge (streak: {} days)", state.streak);
    println!("{}", challenge.question);
    if challenge.completed {
        println!("Already completed today. Come back tomorrow!");
        return Ok(());
    }
    if let Some(options) = &challenge.options {
        for option in options {
            println!("  - {}", option);
        }
    }

    let answer = match answer {
        Some(a) => a,
        None => {
            let mut rl = DefaultEditor::new()?;
            match read_line(&mut rl, "> ")? {
                Some(a) => a,
                None => return Ok(()),
            }
        }
    };

    let attempt = session.submit_challenge(&answer).await?;
    if attempt.correct {
        println!("Challenge completed! Streak: {} days", attempt.state.streak);
    } else {
        println!("Not quite! The answer is: {}", attempt.expected);
    }
    Ok(())
}
