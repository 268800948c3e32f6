//! Integration tests for tutoring sessions:
//! - Model output parsing through the tutor
//! - Roleplay lifecycle and feedback recording
//! - Answer checks and vocabulary cards feeding the memory
//! - Daily challenge streaks
//!
//! The chat provider is mocked; storage is the in-process store.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use lingua_coach::agent::{ChatMessage, ChatProvider, CompletionOptions, ImageOptions, ModelInfo};
use lingua_coach::memory::{Clock, FixedClock, MemoryManager};
use lingua_coach::session::LearningSession;
use lingua_coach::store::{InMemoryStore, KeyValueStore, SnapshotStore, MEMORY_KEY, PROFILE_KEY};
use lingua_coach::tutor::{Exercise, Tutor, VocabularyCard};
use lingua_coach::types::{ConversationRole, LearningMode, MediaKind, Role, TargetLanguage};
use lingua_coach::TutorError;
use mockall::{mock, Sequence};
use std::sync::Arc;

mock! {
    pub Provider {}

    #[async_trait]
    impl ChatProvider for Provider {
        async fn complete(&self, messages: Vec<ChatMessage>, options: &CompletionOptions) -> anyhow::Result<String>;
        async fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>>;
        async fn generate_image(&self, prompt: &str, options: &ImageOptions) -> anyhow::Result<String>;
    }
}

const LESSON: &str = r#"Here is your lesson:
```json
{
  "title": "At the market",
  "description": "Buying fruit",
  "exercises": [
    {"type": "translation", "prompt": "Translate: apple", "correctAnswer": "manzana"},
    {"type": "fill-blank", "prompt": "Quiero ___ naranjas", "correctAnswer": "dos"}
  ],
  "grammarConcepts": ["numbers"],
  "vocabulary": ["manzana", "naranja"]
}
```"#;

const FEEDBACK: &str = r#"{"strengths": ["Friendly greeting"], "improvements": ["Use usted with strangers"],
"nativePhrasings": [{"userSaid": "Yo quiero café", "nativeSays": "Me pones un café", "explanation": "More natural in Spain"}],
"overallScore": 78}"#;

type TestSession = LearningSession<MockProvider, InMemoryStore>;

fn build(provider: MockProvider) -> (TestSession, Arc<InMemoryStore>, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 5, 20, 8, 0, 0).unwrap(),
    ));
    let store = Arc::new(InMemoryStore::new());
    let session = LearningSession::new(
        Tutor::new(Arc::new(provider), TargetLanguage::Spanish),
        Arc::new(SnapshotStore::new(store.clone())),
        MemoryManager::new(clock.clone()),
    );
    (session, store, clock)
}

fn reply(
    text: &'static str,
) -> impl Fn(Vec<ChatMessage>, &CompletionOptions) -> anyhow::Result<String> + Send + 'static {
    move |_, _| Ok(text.to_string())
}

// =====================================================================
// LESSONS AND ANSWERS
// =====================================================================

#[tokio::test]
async fn test_lesson_uses_mode_prompt_and_parses_fenced_json() {
    let mut provider = MockProvider::new();
    provider
        .expect_complete()
        .withf(|messages, options| {
            messages.len() == 2
                && messages[0].role == Role::System
                && messages[0].content.contains("MODE: Game-First")
                && messages[1].content.contains("market")
                && (options.temperature - 0.8).abs() < f32::EPSILON
        })
        .times(1)
        .returning(reply(LESSON));

    let (session, _, _) = build(provider);
    let lesson = session.lesson(LearningMode::GameFirst, Some("market")).await.unwrap();

    assert_eq!(lesson.title, "At the market");
    assert_eq!(lesson.exercises.len(), 2);
    assert_eq!(lesson.exercises[1].kind, "fill-blank");
}

#[tokio::test]
async fn test_malformed_lesson_is_reported() {
    let mut provider = MockProvider::new();
    provider
        .expect_complete()
        .returning(reply("Sorry, I can't help with that."));

    let (session, _, _) = build(provider);
    let err = session.lesson(LearningMode::SmartTutor, None).await.unwrap_err();
    assert!(matches!(err, TutorError::MalformedResponse { expected: "lesson", .. }));
    assert!(err.is_external());
}

#[tokio::test]
async fn test_provider_failure_surfaces_as_provider_error() {
    let mut provider = MockProvider::new();
    provider
        .expect_complete()
        .returning(|_, _| Err(anyhow::anyhow!("API error (503): unavailable")));

    let (session, store, _) = build(provider);
    let err = session.lesson(LearningMode::SmartTutor, None).await.unwrap_err();
    assert!(matches!(err, TutorError::Provider(_)));
    assert!(store.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_answer_records_each_concept_once() {
    let mut provider = MockProvider::new();
    provider.expect_complete().times(1).returning(reply(
        r#"{"isCorrect": false, "feedback": "Close!", "explanation": "Estar for states",
            "encouragement": "Keep going", "grammarConcepts": ["ser-vs-estar", " ser-vs-estar", "adjectives"]}"#,
    ));

    let (session, _, _) = build(provider);
    let exercise = Exercise {
        kind: "translation".to_string(),
        prompt: "Translate: I am tired".to_string(),
        correct_answer: "Estoy cansado".to_string(),
        options: None,
    };
    let check = session
        .check_answer(&exercise, "Soy cansado", LearningMode::SlowHuman)
        .await
        .unwrap();
    assert!(!check.is_correct);

    let memory = session.memory().await.unwrap();
    assert_eq!(memory.grammar_mistakes.len(), 2);
    let mistake = memory.grammar_mistake("ser-vs-estar").unwrap();
    assert_eq!(mistake.mistake_count, 1);
    assert_eq!(mistake.examples, vec!["Soy cansado"]);

    let metrics = session.metrics().await.unwrap();
    assert_eq!(metrics.grammar_mastery, 0);
}

#[tokio::test]
async fn test_correct_answer_leaves_memory_alone() {
    let mut provider = MockProvider::new();
    provider.expect_complete().returning(reply(
        r#"{"isCorrect": true, "feedback": "¡Perfecto!", "grammarConcepts": ["ser-vs-estar"]}"#,
    ));

    let (session, store, _) = build(provider);
    let exercise = Exercise {
        kind: "translation".to_string(),
        prompt: "Translate: I am tired".to_string(),
        correct_answer: "Estoy cansado".to_string(),
        options: None,
    };
    session
        .check_answer(&exercise, "Estoy cansado", LearningMode::SmartTutor)
        .await
        .unwrap();
    assert!(!store.keys().await.unwrap().contains(&MEMORY_KEY.to_string()));
}

#[tokio::test]
async fn test_complete_lesson_adds_minutes_by_mode() {
    let (session, _, _) = build(MockProvider::new());
    session.complete_lesson(LearningMode::SlowHuman, 4).await.unwrap();
    let metrics = session.complete_lesson(LearningMode::GameFirst, 5).await.unwrap();
    assert_eq!(metrics.lessons_completed, 2);
    assert_eq!(metrics.total_minutes, 17);
}

// =====================================================================
// ROLEPLAY
// =====================================================================

#[tokio::test]
async fn test_roleplay_round_trip_records_feedback() {
    let mut provider = MockProvider::new();
    let mut seq = Sequence::new();
    provider
        .expect_complete()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|messages, _| messages[0].content.contains("barista"))
        .returning(reply("¡Hola! ¿Qué te pongo?"));
    provider
        .expect_complete()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|messages, _| {
            messages.last().map(|m| m.role) == Some(Role::User)
                && messages.iter().any(|m| m.content == "Yo quiero café")
        })
        .returning(reply("¡Claro! ¿Con leche?"));
    provider
        .expect_complete()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|messages, _| messages[1].content.contains("\"assistant\""))
        .returning(reply(FEEDBACK));

    let (session, _, _) = build(provider);
    let mut roleplay = session
        .start_roleplay(ConversationRole::Barista, None)
        .await
        .unwrap();
    assert_eq!(roleplay.last_reply(), Some("¡Hola! ¿Qué te pongo?"));

    let answer = session.send(&mut roleplay, "Yo quiero café").await.unwrap();
    assert_eq!(answer, "¡Claro! ¿Con leche?");
    assert_eq!(roleplay.messages.len(), 3);

    let recorded = session.end_roleplay(&roleplay).await.unwrap();
    assert_eq!(recorded.feedback.as_ref().unwrap().overall_score, 78);

    let memory = session.memory().await.unwrap();
    assert_eq!(memory.conversation_history.len(), 1);
    assert_eq!(memory.conversation_history[0].messages.len(), 3);

    let metrics = session.metrics().await.unwrap();
    assert_eq!(metrics.lessons_completed, 1);
    assert_eq!(metrics.total_minutes, 5);
    assert_eq!(metrics.conversation_fluency, 10);
}

#[tokio::test]
async fn test_roleplay_needs_two_messages_before_feedback() {
    let mut provider = MockProvider::new();
    provider
        .expect_complete()
        .times(1)
        .returning(reply("Hey! How's it going?"));

    let (session, _, _) = build(provider);
    let roleplay = session
        .start_roleplay(ConversationRole::Friend, Some("Meeting at a park".to_string()))
        .await
        .unwrap();

    let err = session.end_roleplay(&roleplay).await.unwrap_err();
    assert!(matches!(err, TutorError::Session(_)));
}

#[tokio::test]
async fn test_failed_feedback_leaves_memory_untouched() {
    let mut provider = MockProvider::new();
    let mut seq = Sequence::new();
    provider
        .expect_complete()
        .times(2)
        .in_sequence(&mut seq)
        .returning(reply("¡Buenas!"));
    provider
        .expect_complete()
        .times(1)
        .in_sequence(&mut seq)
        .returning(reply(r#"{"strengths": [], "improvements": [], "overallScore": 250}"#));

    let (session, store, _) = build(provider);
    let mut roleplay = session
        .start_roleplay(ConversationRole::Stranger, None)
        .await
        .unwrap();
    session.send(&mut roleplay, "Hola, ¿dónde está la estación?").await.unwrap();

    let err = session.end_roleplay(&roleplay).await.unwrap_err();
    assert!(matches!(err, TutorError::MalformedResponse { expected: "feedback", .. }));
    assert!(store.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_reply_keeps_transcript() {
    let mut provider = MockProvider::new();
    let mut seq = Sequence::new();
    provider
        .expect_complete()
        .times(1)
        .in_sequence(&mut seq)
        .returning(reply("Welcome aboard!"));
    provider
        .expect_complete()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(anyhow::anyhow!("timeout")));

    let (session, _, _) = build(provider);
    let mut roleplay = session
        .start_roleplay(ConversationRole::Traveler, None)
        .await
        .unwrap();
    assert!(session.send(&mut roleplay, "Hola").await.is_err());
    assert_eq!(roleplay.messages.len(), 1);
    assert!(session.send(&mut roleplay, "   ").await.is_err());
}

// =====================================================================
// MEDIA AND VOCABULARY
// =====================================================================

#[tokio::test]
async fn test_media_requires_content() {
    let (session, _, _) = build(MockProvider::new());
    let err = session.simplify_media("  ", MediaKind::Lyrics).await.unwrap_err();
    assert!(matches!(err, TutorError::Session(_)));
}

#[tokio::test]
async fn test_media_analysis_parsed() {
    let mut provider = MockProvider::new();
    provider
        .expect_complete()
        .withf(|messages, _| messages[0].content.contains("lyrics"))
        .returning(reply(
            r#"{"simplifiedContent": "Te quiero mucho", "highlights": [{"phrase": "te quiero", "translation": "I love you", "explanation": "", "usefulness": 9}],
                "culturalNotes": [{"term": "cariño", "explanation": "term of endearment"}], "followUpExercises": []}"#,
        ));

    let (session, _, _) = build(provider);
    let analysis = session
        .simplify_media("Te quiero, cariño, te quiero mucho", MediaKind::Lyrics)
        .await
        .unwrap();
    assert_eq!(analysis.highlights[0].usefulness, 9);
    assert_eq!(analysis.cultural_notes[0].term, "cariño");
}

#[tokio::test]
async fn test_missed_card_records_vocabulary_gap() {
    let (session, _, _) = build(MockProvider::new());
    let card = VocabularyCard {
        word: "madrugar".to_string(),
        translation: "to get up early".to_string(),
        example: "Odio madrugar.".to_string(),
        difficulty: 6,
    };

    assert!(session.answer_card(&card, " To Get Up Early ").await.unwrap());
    assert!(session.memory().await.unwrap().vocabulary_gaps.is_empty());

    assert!(!session.answer_card(&card, "to sleep in").await.unwrap());
    assert!(!session.answer_card(&card, "to wake").await.unwrap());
    let memory = session.memory().await.unwrap();
    let gap = memory.vocabulary_gap("madrugar").unwrap();
    assert_eq!(gap.encounter_count, 2);
    assert_eq!(gap.context, vec!["Odio madrugar.", "Odio madrugar."]);
    assert_eq!(session.metrics().await.unwrap().vocabulary_size, 1);
}

// =====================================================================
// DAILY CHALLENGE
// =====================================================================

#[tokio::test]
async fn test_daily_challenge_streak() {
    let mut provider = MockProvider::new();
    provider
        .expect_complete()
        .withf(|messages, _| messages[1].content.contains("daily challenge"))
        .times(3)
        .returning(reply(LESSON));

    let (session, _, clock) = build(provider);

    let state = session.daily_challenge().await.unwrap();
    let challenge = state.challenge.clone().unwrap();
    assert_eq!(challenge.answer, "manzana");

    // Asking again the same day reuses the stored challenge
    let again = session.daily_challenge().await.unwrap();
    assert_eq!(again.challenge.unwrap().id, challenge.id);

    let wrong = session.submit_challenge("pera").await.unwrap();
    assert!(!wrong.correct);
    let right = session.submit_challenge("Manzana").await.unwrap();
    assert!(right.correct);
    assert_eq!(right.state.streak, 1);
    assert_eq!(session.metrics().await.unwrap().streak_days, 1);
    assert!(session.submit_challenge("manzana").await.is_err());

    clock.advance(Duration::days(1));
    session.daily_challenge().await.unwrap();
    let next = session.submit_challenge("manzana").await.unwrap();
    assert_eq!(next.state.streak, 2);
    assert_eq!(session.metrics().await.unwrap().streak_days, 2);

    // A missed day resets both the challenge streak and the dashboard
    clock.advance(Duration::days(3));
    let lapsed = session.daily_challenge().await.unwrap();
    assert_eq!(lapsed.streak, 0);
    assert_eq!(session.metrics().await.unwrap().streak_days, 0);

    let missed = session.submit_challenge("pera").await.unwrap();
    assert!(!missed.correct);
    assert_eq!(missed.state.streak, 0);
    assert_eq!(session.metrics().await.unwrap().streak_days, 0);
}

// =====================================================================
// PROFILE
// =====================================================================

#[tokio::test]
async fn test_unsaved_profile_is_stable() {
    let (session, store, clock) = build(MockProvider::new());

    let first = session.profile().await.unwrap();
    clock.advance(Duration::minutes(5));
    let second = session.profile().await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.created_at, Utc.with_ymd_and_hms(2024, 5, 20, 8, 0, 0).unwrap());
    // Reading does not persist
    assert_eq!(store.get(PROFILE_KEY, serde_json::Value::Null).await.unwrap(), serde_json::Value::Null);
}

#[tokio::test]
async fn test_ensure_profile_keeps_first_seed() {
    let (session, _, clock) = build(MockProvider::new());
    let seeded = session
        .records()
        .ensure_profile(|p| p.with_immersion(8))
        .await
        .unwrap();
    assert_eq!(seeded.id, format!("user_{}", clock.now().timestamp_millis()));

    clock.advance(Duration::days(1));
    let kept = session
        .records()
        .ensure_profile(|p| p.with_immersion(1))
        .await
        .unwrap();
    assert_eq!(kept.id, seeded.id);
    assert_eq!(session.profile().await.unwrap().immersion_level, 8);
}

// =====================================================================
// RESET
// =====================================================================

#[tokio::test]
async fn test_reset_clears_stored_state() {
    let (session, store, _) = build(MockProvider::new());
    session
        .update_memory(|mm, m| mm.record_grammar_mistake(m, "gender", "el mano"))
        .await
        .unwrap();
    assert!(!store.keys().await.unwrap().is_empty());

    session.reset().await.unwrap();
    assert!(store.keys().await.unwrap().is_empty());
    assert!(session.memory().await.unwrap().grammar_mistakes.is_empty());
}
