//! Strict schemas for model output
//!
//! Models wrap JSON in Markdown fences or chatty preambles, so extraction is
//! lenient. Once extracted, the payload must match the schema exactly and stay
//! within its ranges, otherwise the caller gets `MalformedResponse`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{TutorError, TutorResult};
use crate::memory::ConversationFeedback;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*\n?(.*?)```").expect("static regex"));

/// A payload the model is asked to produce
pub trait ModelResponse: DeserializeOwned {
    /// Used in error messages
    const NAME: &'static str;

    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Pull the JSON document out of a model reply.
///
/// Fenced blocks are tried in order, then every bracketed span. The first
/// candidate that parses wins; if none does, the first one is returned so the
/// caller reports the decode error.
pub fn extract_json(text: &str) -> Option<&str> {
    let fenced = FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|body| body.as_str().trim())
        .filter(|body| !body.is_empty());
    let bracketed = text.match_indices(['{', '[']).filter_map(|(start, open)| {
        let close = if open == "{" { '}' } else { ']' };
        let end = text.rfind(close)?;
        (end > start).then(|| &text[start..=end])
    });

    let mut candidates = fenced.chain(bracketed).peekable();
    let first = *candidates.peek()?;
    Some(
        candidates
            .find(|c| serde_json::from_str::<serde_json::Value>(c).is_ok())
            .unwrap_or(first),
    )
}

pub fn parse_model_json<T: ModelResponse>(text: &str) -> TutorResult<T> {
    let json = extract_json(text).ok_or_else(|| TutorError::malformed(T::NAME, "no JSON found"))?;
    let value: T =
        serde_json::from_str(json).map_err(|e| TutorError::malformed(T::NAME, e.to_string()))?;
    value
        .validate()
        .map_err(|reason| TutorError::malformed(T::NAME, reason))?;
    Ok(value)
}

fn default_exercise_type() -> String {
    "translation".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    #[serde(rename = "type", default = "default_exercise_type")]
    pub kind: String,
    pub prompt: String,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl Exercise {
    fn check(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("exercise with empty prompt".to_string());
        }
        Ok(())
    }
}

/// Either a bare word or a word with its translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VocabularyItem {
    Word(String),
    Entry {
        word: String,
        #[serde(default)]
        translation: String,
    },
}

impl VocabularyItem {
    pub fn word(&self) -> &str {
        match self {
            VocabularyItem::Word(w) => w,
            VocabularyItem::Entry { word, .. } => word,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub grammar_concepts: Vec<String>,
    #[serde(default)]
    pub vocabulary: Vec<VocabularyItem>,
}

impl ModelResponse for LessonPlan {
    const NAME: &'static str = "lesson";

    fn validate(&self) -> Result<(), String> {
        if self.exercises.is_empty() {
            return Err("lesson has no exercises".to_string());
        }
        self.exercises.iter().try_for_each(Exercise::check)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCheck {
    pub is_correct: bool,
    pub feedback: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub encouragement: String,
    #[serde(default)]
    pub grammar_concepts: Vec<String>,
}

impl ModelResponse for AnswerCheck {
    const NAME: &'static str = "answer check";
}

impl ModelResponse for ConversationFeedback {
    const NAME: &'static str = "feedback";

    fn validate(&self) -> Result<(), String> {
        if self.overall_score > 100 {
            return Err(format!("overallScore {} is above 100", self.overall_score));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub phrase: String,
    pub translation: String,
    #[serde(default)]
    pub explanation: String,
    /// 1-10
    pub usefulness: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CulturalNote {
    pub term: String,
    pub explanation: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAnalysis {
    pub simplified_content: String,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
    #[serde(default)]
    pub cultural_notes: Vec<CulturalNote>,
    #[serde(default)]
    pub follow_up_exercises: Vec<Exercise>,
}

impl ModelResponse for MediaAnalysis {
    const NAME: &'static str = "media analysis";

    fn validate(&self) -> Result<(), String> {
        if let Some(h) = self.highlights.iter().find(|h| !(1..=10).contains(&h.usefulness)) {
            return Err(format!("highlight '{}' has usefulness {}", h.phrase, h.usefulness));
        }
        self.follow_up_exercises.iter().try_for_each(Exercise::check)
    }
}

fn default_difficulty() -> u8 {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyCard {
    pub word: String,
    pub translation: String,
    #[serde(default)]
    pub example: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyDeck {
    pub cards: Vec<VocabularyCard>,
}

impl ModelResponse for VocabularyDeck {
    const NAME: &'static str = "vocabulary";

    fn validate(&self) -> Result<(), String> {
        if self.cards.is_empty() {
            return Err("no cards".to_string());
        }
        if let Some(card) = self
            .cards
            .iter()
            .find(|c| c.word.trim().is_empty() || c.translation.trim().is_empty())
        {
            return Err(format!("incomplete card '{}'", card.word));
        }
        Ok(())
    }
}
