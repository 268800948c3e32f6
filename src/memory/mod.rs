//! Learner memory
//!
//! Provides:
//! - The persisted `LearningMemory` snapshot (mistakes, gaps, history, mastery, weak areas)
//! - Pure update operations via `MemoryManager`
//! - Derived review queues and overall progress scores
//!
//! Field names serialize in camelCase; that layout is what the key-value
//! store holds under `learning-memory`.

pub mod clock;
pub mod manager;
pub mod queries;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ConversationRole;

pub use clock::{Clock, FixedClock, SystemClock};
pub use manager::MemoryManager;
pub use queries::OverallProgress;

/// Examples kept per grammar mistake
pub const MAX_MISTAKE_EXAMPLES: usize = 5;
/// Context sentences kept per vocabulary gap
pub const MAX_GAP_CONTEXTS: usize = 3;
/// Conversations kept in history
pub const MAX_CONVERSATIONS: usize = 20;
pub const MAX_SKILL_LEVEL: u8 = 10;
/// Weak areas below this level need review
pub const REVIEW_THRESHOLD: u8 = 7;

/// Root aggregate, one per learner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningMemory {
    #[serde(default)]
    pub grammar_mistakes: Vec<GrammarMistake>,
    #[serde(default)]
    pub vocabulary_gaps: Vec<VocabularyGap>,
    /// Most recent first
    #[serde(default)]
    pub conversation_history: Vec<ConversationSession>,
    #[serde(default)]
    pub mastered_concepts: Vec<String>,
    #[serde(default)]
    pub weak_areas: Vec<WeakArea>,
}

/// A grammar concept the learner keeps getting wrong
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarMistake {
    #[serde(default)]
    pub id: String,
    pub concept: String,
    pub mistake_count: u32,
    pub last_occurrence: DateTime<Utc>,
    /// Oldest first, at most `MAX_MISTAKE_EXAMPLES`
    #[serde(default)]
    pub examples: Vec<String>,
}

/// A word the learner did not know
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyGap {
    #[serde(default)]
    pub id: String,
    pub word: String,
    pub translation: String,
    pub encounter_count: u32,
    pub last_encounter: DateTime<Utc>,
    /// Oldest first, at most `MAX_GAP_CONTEXTS`
    #[serde(default)]
    pub context: Vec<String>,
}

/// A tracked skill category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakArea {
    #[serde(default)]
    pub id: String,
    pub category: String,
    pub skill_level: u8,
    /// Always `skill_level < REVIEW_THRESHOLD`; only `set_skill_level` writes it
    pub needs_review: bool,
    pub last_practiced: DateTime<Utc>,
}

impl WeakArea {
    pub fn new(id: String, category: impl Into<String>, skill_level: u8, now: DateTime<Utc>) -> Self {
        let mut area = Self {
            id,
            category: category.into(),
            skill_level: 0,
            needs_review: true,
            last_practiced: now,
        };
        area.set_skill_level(skill_level);
        area
    }

    pub fn set_skill_level(&mut self, skill_level: u8) {
        self.skill_level = skill_level.min(MAX_SKILL_LEVEL);
        self.needs_review = self.skill_level < REVIEW_THRESHOLD;
    }
}

/// Clamp a raw skill estimate into `[0, MAX_SKILL_LEVEL]`.
///
/// NaN and negative infinity map to 0, positive infinity to the maximum,
/// finite values are rounded before clamping.
pub fn clamp_skill_level(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, MAX_SKILL_LEVEL as f64) as u8
}

/// Who wrote a message in a recorded roleplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Ai,
}

/// One turn of a recorded roleplay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMessage {
    #[serde(default)]
    pub id: String,
    pub role: Speaker,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Language key of the content ("es", "en", "mixed", ...)
    #[serde(default = "default_message_language")]
    pub language: String,
}

fn default_message_language() -> String {
    "mixed".to_string()
}

/// A finished roleplay conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSession {
    #[serde(default)]
    pub id: String,
    pub role: ConversationRole,
    #[serde(default)]
    pub messages: Vec<SessionMessage>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<ConversationFeedback>,
}

/// Post-conversation critique produced by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationFeedback {
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    #[serde(default)]
    pub native_phrasings: Vec<NativePhrasing>,
    /// 0-100
    pub overall_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativePhrasing {
    pub user_said: String,
    pub native_says: String,
    #[serde(default)]
    pub explanation: String,
}

impl LearningMemory {
    /// Re-establish invariants on a snapshot loaded from storage.
    ///
    /// Duplicate keys keep their first occurrence.
    pub fn normalize(mut self) -> Self {
        let mut seen = std::collections::HashSet::new();
        self.grammar_mistakes.retain(|m| seen.insert(m.concept.clone()));
        for mistake in &mut self.grammar_mistakes {
            mistake.mistake_count = mistake.mistake_count.max(1);
            keep_last(&mut mistake.examples, MAX_MISTAKE_EXAMPLES);
        }

        seen.clear();
        self.vocabulary_gaps.retain(|g| seen.insert(g.word.clone()));
        for gap in &mut self.vocabulary_gaps {
            gap.encounter_count = gap.encounter_count.max(1);
            keep_last(&mut gap.context, MAX_GAP_CONTEXTS);
        }

        seen.clear();
        self.weak_areas.retain(|w| seen.insert(w.category.clone()));
        for area in &mut self.weak_areas {
            let level = area.skill_level;
            area.set_skill_level(level);
        }

        seen.clear();
        self.mastered_concepts.retain(|c| seen.insert(c.clone()));

        self.conversation_history.truncate(MAX_CONVERSATIONS);
        self
    }

    pub fn is_mastered(&self, concept: &str) -> bool {
        self.mastered_concepts.iter().any(|c| c == concept)
    }

    pub fn grammar_mistake(&self, concept: &str) -> Option<&GrammarMistake> {
        self.grammar_mistakes.iter().find(|m| m.concept == concept)
    }

    pub fn vocabulary_gap(&self, word: &str) -> Option<&VocabularyGap> {
        self.vocabulary_gaps.iter().find(|g| g.word == word)
    }

    pub fn weak_area(&self, category: &str) -> Option<&WeakArea> {
        self.weak_areas.iter().find(|w| w.category == category)
    }
}

/// Push `item` and drop from the front until at most `cap` remain
pub(crate) fn push_bounded(items: &mut Vec<String>, item: String, cap: usize) {
    items.push(item);
    keep_last(items, cap);
}

fn keep_last(items: &mut Vec<String>, cap: usize) {
    if items.len() > cap {
        let excess = items.len() - cap;
        items.drain(..excess);
    }
}

/// `<prefix>_<unix millis>`, the id layout used by earlier snapshots
pub(crate) fn entry_id(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}", prefix, now.timestamp_millis())
}
