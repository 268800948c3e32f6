//! Prompt builder
//!
//! Turns a memory snapshot into model instructions. Everything here is a pure
//! function of its arguments: same inputs, same string.

use crate::error::TutorResult;
use crate::memory::{LearningMemory, SessionMessage, Speaker};
use crate::types::{ConversationRole, LearningMode, MediaKind, TargetLanguage};

pub const LESSON_TEMPERATURE: f32 = 0.8;
pub const ROLEPLAY_TEMPERATURE: f32 = 0.9;
pub const FEEDBACK_TEMPERATURE: f32 = 0.6;
pub const MEDIA_TEMPERATURE: f32 = 0.7;
pub const CHECK_TEMPERATURE: f32 = 0.6;

/// Recent mistakes listed in the summary block
const RECENT_MISTAKES_SHOWN: usize = 3;
pub const MAX_IMMERSION: u8 = 10;

const LESSON_SCHEMA: &str = "{ title, description, exercises: [{type, prompt, correctAnswer, options?}], grammarConcepts: [], vocabulary: [] }";

/// System prompt for `mode_key`, e.g. "smart-tutor".
///
/// Unknown mode or language keys are configuration errors.
pub fn build_system_prompt(
    mode_key: &str,
    memory: &LearningMemory,
    immersion_level: u8,
    language_key: &str,
) -> TutorResult<String> {
    let mode: LearningMode = mode_key.parse()?;
    let language: TargetLanguage = language_key.parse()?;
    Ok(system_prompt(mode, memory, immersion_level, language))
}

pub fn system_prompt(
    mode: LearningMode,
    memory: &LearningMemory,
    immersion_level: u8,
    language: TargetLanguage,
) -> String {
    let mut prompt = learner_summary(memory, immersion_level, language);
    prompt.push_str("\n\n");
    prompt.push_str(&mode_instructions(mode, language));
    prompt
}

fn join_or(items: &[&str], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

fn learner_summary(memory: &LearningMemory, immersion_level: u8, language: TargetLanguage) -> String {
    let lang = language.name();
    let weak: Vec<&str> = memory.weak_areas.iter().map(|w| w.category.as_str()).collect();
    let mastered: Vec<&str> = memory.mastered_concepts.iter().map(String::as_str).collect();
    let recent = memory.recent_mistake_concepts(RECENT_MISTAKES_SHOWN);

    format!(
        "You are an expert {lang} language tutor with deep empathy and pedagogical expertise. \
Your goal is to help users learn {lang} in a way that feels safe, intelligent, and personalized.\n\
\n\
User's immersion level: {level}/10 (0=all English explanations, 10=almost all {lang})\n\
Known weak areas: {weak}\n\
Mastered concepts: {mastered}\n\
Recent grammar mistakes: {recent}",
        lang = lang,
        level = immersion_level.min(MAX_IMMERSION),
        weak = join_or(&weak, "None yet"),
        mastered = join_or(&mastered, "Just starting"),
        recent = join_or(&recent, "None yet"),
    )
}

fn mode_instructions(mode: LearningMode, language: TargetLanguage) -> String {
    let lang = language.name();
    match mode {
        LearningMode::SmartTutor => format!(
            "MODE: Smart Tutor (Structured & Adaptive)\n\
- Act like a patient, knowledgeable teacher\n\
- Provide explicit grammar explanations\n\
- Build lessons progressively\n\
- Correct mistakes immediately with clear explanations\n\
- Use a balance of {lang} and English based on immersion level\n\
- Focus on understanding \"why\" not just \"what\""
        ),
        LearningMode::GameFirst => "MODE: Game-First (Playful & Challenging)\n\
- Make learning feel like a fun challenge\n\
- Use encouraging, energetic language\n\
- Keep exercises bite-sized and varied\n\
- Celebrate wins enthusiastically\n\
- Provide quick, light corrections\n\
- Focus on momentum and progress"
            .to_string(),
        LearningMode::Conversation => format!(
            "MODE: Conversation-First (Natural Dialogue)\n\
- Act naturally in your assigned role\n\
- Respond to user's {lang} realistically, not like a teacher\n\
- DO NOT correct mistakes during conversation\n\
- Match the user's language level but stay in character\n\
- Keep conversation flowing naturally\n\
- Save all corrections for post-conversation feedback"
        ),
        LearningMode::MediaBased => format!(
            "MODE: Media-Based (Content-Driven)\n\
- Analyze and simplify provided content to user's level\n\
- Explain slang, idioms, and cultural context\n\
- Highlight the most useful phrases\n\
- Make content accessible and engaging\n\
- Generate exercises based on the content\n\
- Help user connect with authentic {lang} media"
        ),
        LearningMode::SlowHuman => "MODE: Slow & Human (Patient & Supportive)\n\
- Use the warmest, most patient tone possible\n\
- Never rush or pressure the user\n\
- Celebrate every small win genuinely\n\
- Correct mistakes gently and constructively\n\
- Provide extra encouragement\n\
- Focus on building confidence above all else\n\
- Use more English explanations to reduce cognitive load"
            .to_string(),
    }
}

/// User turn asking for a lesson, optionally on `topic`
pub fn lesson_request(topic: Option<&str>, language: TargetLanguage) -> String {
    let lang = language.name();
    match topic.map(str::trim).filter(|t| !t.is_empty()) {
        Some(topic) => format!(
            "Generate a focused {lang} lesson on: {topic}. Include 3-5 exercises appropriate for the current mode. \
Format as JSON with structure: {LESSON_SCHEMA}"
        ),
        None => format!(
            "Generate a personalized {lang} lesson that addresses the user's weak areas while building on mastered concepts. \
Include 3-5 varied exercises. Format as JSON with structure: {LESSON_SCHEMA}"
        ),
    }
}

/// System prompt for an in-character roleplay reply
pub fn roleplay_system_prompt(
    role: ConversationRole,
    scenario: Option<&str>,
    memory: &LearningMemory,
    immersion_level: u8,
    language: TargetLanguage,
) -> String {
    let lang = language.name();
    let mut persona = role.description().to_string();
    if let Some(scenario) = scenario.map(str::trim).filter(|s| !s.is_empty()) {
        persona.push_str(" Scenario: ");
        persona.push_str(scenario);
    }

    format!(
        "{base}\n\n\
You are playing the role of: {persona}\n\n\
Critical instructions:\n\
- Respond ONLY in {lang} (adjust complexity to user's level)\n\
- Stay completely in character - you're not a teacher during the conversation\n\
- Keep responses natural and conversational (2-4 sentences max)\n\
- DO NOT correct grammar or mistakes - just respond naturally\n\
- If user makes mistakes, understand their intent and respond naturally\n\
- Match their language level but stay authentic to your role",
        base = system_prompt(LearningMode::Conversation, memory, immersion_level, language),
    )
}

/// Opening turn used to let the persona greet the learner
pub fn roleplay_opening(language: TargetLanguage) -> String {
    format!(
        "(The learner has just arrived. Greet them in {} and start the conversation.)",
        language.name()
    )
}

pub fn feedback_system_prompt(language: TargetLanguage) -> String {
    format!(
        r#"You are an expert {lang} teacher analyzing a conversation. Provide constructive, encouraging feedback.

Analyze the conversation and provide feedback in JSON format:
{{
  "strengths": ["specific things they did well"],
  "improvements": ["gentle suggestions for improvement"],
  "nativePhrasings": [
    {{
      "userSaid": "what the user said",
      "nativeSays": "how a native speaker would say it",
      "explanation": "brief explanation of the difference"
    }}
  ],
  "overallScore": 0-100
}}

Focus on being encouraging while providing actionable insights."#,
        lang = language.name()
    )
}

/// Transcript handed to the feedback prompt, as a JSON array of `{role, content}`
pub fn feedback_request(transcript: &[SessionMessage]) -> String {
    let turns: Vec<serde_json::Value> = transcript
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": match m.role {
                    Speaker::User => "user",
                    Speaker::Ai => "assistant",
                },
                "content": m.content,
            })
        })
        .collect();
    let rendered = serde_json::to_string_pretty(&turns).unwrap_or_else(|_| "[]".to_string());
    format!("Analyze this conversation:\n\n{}", rendered)
}

pub fn media_system_prompt(kind: MediaKind, level: u8, language: TargetLanguage) -> String {
    format!(
        r#"You are an expert at adapting {lang} content to learner levels.

User's level: {level}/10
Content type: {kind}

Analyze and simplify this content. Return JSON:
{{
  "simplifiedContent": "version appropriate for user's level",
  "highlights": [
    {{
      "phrase": "useful phrase or idiom",
      "translation": "English translation",
      "explanation": "why it's useful",
      "usefulness": 1-10
    }}
  ],
  "culturalNotes": [
    {{
      "term": "cultural term or reference",
      "explanation": "what it means",
      "context": "cultural background"
    }}
  ],
  "followUpExercises": [
    {{
      "type": "exercise type",
      "prompt": "exercise prompt",
      "correctAnswer": "answer"
    }}
  ]
}}"#,
        lang = language.name(),
        level = level.min(MAX_IMMERSION),
        kind = kind.key(),
    )
}

pub fn media_request(content: &str) -> String {
    format!("Content to analyze:\n\n{}", content)
}

/// How feedback on an answer should sound in each mode
pub fn answer_check_style(mode: LearningMode) -> &'static str {
    match mode {
        LearningMode::SmartTutor => "Provide detailed explanation of correctness and why",
        LearningMode::GameFirst => "Keep it brief and encouraging with energy",
        LearningMode::Conversation => "Natural conversational feedback",
        LearningMode::MediaBased => "Relate feedback back to the content context",
        LearningMode::SlowHuman => {
            "Be extremely gentle, warm, and patient. Focus on what they got right first."
        }
    }
}

pub fn answer_check_system_prompt(
    mode: LearningMode,
    immersion_level: u8,
    language: TargetLanguage,
) -> String {
    format!(
        r#"You are providing feedback on a {lang} exercise.
Mode: {mode} - {style}
Immersion level: {level}/10

Provide feedback in JSON:
{{
  "isCorrect": boolean,
  "feedback": "your feedback message",
  "explanation": "why the answer is right/wrong",
  "encouragement": "positive reinforcement",
  "grammarConcepts": ["concepts involved"]
}}"#,
        lang = language.name(),
        mode = mode.key(),
        style = answer_check_style(mode),
        level = immersion_level.min(MAX_IMMERSION),
    )
}

pub fn answer_check_request(
    prompt: &str,
    user_answer: &str,
    correct_answer: &str,
    exercise_type: &str,
) -> String {
    format!(
        "Exercise: {}\nUser answered: \"{}\"\nCorrect answer: \"{}\"\nExercise type: {}",
        prompt, user_answer, correct_answer, exercise_type
    )
}

/// Ask for `count` practice cards, steering towards known gaps
pub fn vocabulary_request(count: usize, memory: &LearningMemory, language: TargetLanguage) -> String {
    let gaps: Vec<&str> = memory.vocabulary_gaps.iter().map(|g| g.word.as_str()).collect();
    format!(
        r#"Generate {count} useful vocabulary words in {lang} based on the user's learning level and gaps. Focus on high-frequency words and common phrases.
Words the user recently struggled with: {gaps}

Return ONLY valid JSON with this exact structure:
{{
  "cards": [
    {{
      "word": "word in {lang}",
      "translation": "English translation",
      "example": "example sentence using the word",
      "difficulty": 5
    }}
  ]
}}"#,
        lang = language.name(),
        gaps = join_or(&gaps, "None yet"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TutorError;
    use crate::memory::{GrammarMistake, WeakArea};
    use chrono::{Duration, TimeZone, Utc};

    fn mistake(concept: &str, days_ago: i64) -> GrammarMistake {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        GrammarMistake {
            id: String::new(),
            concept: concept.to_string(),
            mistake_count: 1,
            last_occurrence: base - Duration::days(days_ago),
            examples: vec![],
        }
    }

    #[test]
    fn test_empty_memory_uses_fallbacks() {
        let prompt = build_system_prompt("smart-tutor", &LearningMemory::default(), 5, "es").unwrap();
        assert!(prompt.starts_with("You are an expert Spanish language tutor"));
        assert!(prompt.contains("User's immersion level: 5/10 (0=all English explanations, 10=almost all Spanish)"));
        assert!(prompt.contains("Known weak areas: None yet"));
        assert!(prompt.contains("Mastered concepts: Just starting"));
        assert!(prompt.contains("Recent grammar mistakes: None yet"));
        assert!(prompt.contains("MODE: Smart Tutor (Structured & Adaptive)"));
    }

    #[test]
    fn test_summary_lists_memory() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let memory = LearningMemory {
            grammar_mistakes: vec![
                mistake("gender", 9),
                mistake("subjunctive", 0),
                mistake("por-para", 3),
                mistake("ser-estar", 1),
            ],
            mastered_concepts: vec!["preterite".into(), "articles".into()],
            weak_areas: vec![
                WeakArea::new(String::new(), "nouns", 3, now),
                WeakArea::new(String::new(), "listening", 8, now),
            ],
            ..Default::default()
        };
        let prompt = system_prompt(LearningMode::GameFirst, &memory, 12, TargetLanguage::French);
        assert!(prompt.contains("User's immersion level: 10/10"));
        assert!(prompt.contains("Known weak areas: nouns, listening"));
        assert!(prompt.contains("Mastered concepts: preterite, articles"));
        assert!(prompt.contains("Recent grammar mistakes: subjunctive, ser-estar, por-para"));
        assert!(prompt.contains("MODE: Game-First"));
        assert!(prompt.contains("French language tutor"));
    }

    #[test]
    fn test_deterministic() {
        let memory = LearningMemory {
            mastered_concepts: vec!["a".into()],
            ..Default::default()
        };
        for mode in LearningMode::ALL {
            let a = system_prompt(mode, &memory, 4, TargetLanguage::Spanish);
            let b = system_prompt(mode, &memory, 4, TargetLanguage::Spanish);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_each_mode_has_its_own_template() {
        let memory = LearningMemory::default();
        let headers = [
            "MODE: Smart Tutor",
            "MODE: Game-First",
            "MODE: Conversation-First",
            "MODE: Media-Based",
            "MODE: Slow & Human",
        ];
        for (mode, header) in LearningMode::ALL.into_iter().zip(headers) {
            assert!(system_prompt(mode, &memory, 5, TargetLanguage::Spanish).contains(header));
        }
    }

    #[test]
    fn test_unknown_keys_are_configuration_errors() {
        let memory = LearningMemory::default();
        assert!(matches!(
            build_system_prompt("karaoke", &memory, 5, "es"),
            Err(TutorError::Configuration(_))
        ));
        assert!(matches!(
            build_system_prompt("smart-tutor", &memory, 5, "klingon"),
            Err(TutorError::Configuration(_))
        ));
    }

    #[test]
    fn test_roleplay_prompt_keeps_character() {
        let prompt = roleplay_system_prompt(
            ConversationRole::Custom,
            Some("a tailor fitting a suit"),
            &LearningMemory::default(),
            6,
            TargetLanguage::Italian,
        );
        assert!(prompt.contains("Stay in character as described. Scenario: a tailor fitting a suit"));
        assert!(prompt.contains("Respond ONLY in Italian"));
        assert!(prompt.contains("MODE: Conversation-First"));
    }

    #[test]
    fn test_lesson_request_topic() {
        let with_topic = lesson_request(Some("daily challenge"), TargetLanguage::Spanish);
        assert!(with_topic.starts_with("Generate a focused Spanish lesson on: daily challenge."));
        let blank = lesson_request(Some("  "), TargetLanguage::Spanish);
        assert!(blank.starts_with("Generate a personalized Spanish lesson"));
    }

    #[test]
    fn test_feedback_request_maps_speakers() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let transcript = vec![
            SessionMessage {
                id: "m1".into(),
                role: Speaker::Ai,
                content: "¡Hola!".into(),
                timestamp: at,
                language: "es".into(),
            },
            SessionMessage {
                id: "m2".into(),
                role: Speaker::User,
                content: "Un café, por favor".into(),
                timestamp: at,
                language: "es".into(),
            },
        ];
        let request = feedback_request(&transcript);
        assert!(request.starts_with("Analyze this conversation:"));
        assert!(request.contains("\"role\": \"assistant\""));
        assert!(request.contains("Un café, por favor"));
    }

    #[test]
    fn test_answer_check_prompt_uses_mode_style() {
        let prompt = answer_check_system_prompt(LearningMode::SlowHuman, 3, TargetLanguage::German);
        assert!(prompt.contains("Mode: slow-human - Be extremely gentle"));
        assert!(prompt.contains("German exercise"));
        let request = answer_check_request("Translate: cat", "gato", "gato", "translate");
        assert_eq!(
            request,
            "Exercise: Translate: cat\nUser answered: \"gato\"\nCorrect answer: \"gato\"\nExercise type: translate"
        );
    }
}
