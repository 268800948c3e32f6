//! Derived, read-only views over a memory snapshot
//!
//! Queries that depend on "now" live on `MemoryManager` so they read the
//! injected clock; the rest are plain methods on `LearningMemory`.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::{GrammarMistake, LearningMemory, MemoryManager, VocabularyGap, WeakArea};

/// Days that must pass before a repeated mistake comes up for review
pub const REVIEW_AFTER_DAYS: i64 = 2;
/// Mistakes needed before a concept comes up for review
pub const REVIEW_MIN_MISTAKES: u32 = 2;
/// Vocabulary not seen for this long is due again
pub const VOCABULARY_STALE_DAYS: i64 = 30;

pub const DEFAULT_WEAKEST_LIMIT: usize = 3;
pub const DEFAULT_COMMON_MISTAKES_LIMIT: usize = 5;
pub const DEFAULT_VOCABULARY_LIMIT: usize = 10;

/// Crude linear progress scores shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallProgress {
    /// 0-100
    pub grammar_mastery: u32,
    pub vocabulary_size: u32,
    /// 0-100
    pub conversation_experience: u32,
}

impl LearningMemory {
    /// Weak areas flagged for review, weakest first
    pub fn weakest_areas(&self, limit: usize) -> Vec<&WeakArea> {
        let mut areas: Vec<&WeakArea> = self.weak_areas.iter().filter(|w| w.needs_review).collect();
        areas.sort_by_key(|w| w.skill_level);
        areas.truncate(limit);
        areas
    }

    /// Grammar mistakes by descending count, ties in stored order
    pub fn most_common_mistakes(&self, limit: usize) -> Vec<&GrammarMistake> {
        let mut mistakes: Vec<&GrammarMistake> = self.grammar_mistakes.iter().collect();
        mistakes.sort_by(|a, b| b.mistake_count.cmp(&a.mistake_count));
        mistakes.truncate(limit);
        mistakes
    }

    /// Concepts of the most recently made mistakes, newest first
    pub fn recent_mistake_concepts(&self, limit: usize) -> Vec<&str> {
        let mut mistakes: Vec<&GrammarMistake> = self.grammar_mistakes.iter().collect();
        mistakes.sort_by(|a, b| b.last_occurrence.cmp(&a.last_occurrence));
        mistakes.into_iter().take(limit).map(|m| m.concept.as_str()).collect()
    }

    pub fn calculate_overall_progress(&self) -> OverallProgress {
        let mastered = self.mastered_concepts.len() as i64;
        let total_mistakes: i64 = self
            .grammar_mistakes
            .iter()
            .map(|m| m.mistake_count as i64)
            .sum();

        let grammar_mastery = (mastered * 10 - total_mistakes).clamp(0, 100);
        let vocabulary_size = (self.vocabulary_gaps.len() as i64 + mastered * 5).max(0);
        let conversation_experience = (self.conversation_history.len() as i64 * 10).clamp(0, 100);

        OverallProgress {
            grammar_mastery: grammar_mastery as u32,
            vocabulary_size: vocabulary_size.min(u32::MAX as i64) as u32,
            conversation_experience: conversation_experience as u32,
        }
    }
}

impl MemoryManager {
    /// A concept is due once it has been missed at least twice and left alone
    /// for two whole days
    pub fn should_review_concept(&self, memory: &LearningMemory, concept: &str) -> bool {
        let Some(mistake) = memory.grammar_mistake(concept) else {
            return false;
        };

        let days_since = (self.clock().now() - mistake.last_occurrence).num_days();
        days_since >= REVIEW_AFTER_DAYS && mistake.mistake_count >= REVIEW_MIN_MISTAKES
    }

    /// Vocabulary last seen more than 30 days ago, least-seen first
    pub fn vocabulary_to_review<'a>(
        &self,
        memory: &'a LearningMemory,
        limit: usize,
    ) -> Vec<&'a VocabularyGap> {
        let cutoff = self.clock().now() - Duration::days(VOCABULARY_STALE_DAYS);
        let mut gaps: Vec<&VocabularyGap> = memory
            .vocabulary_gaps
            .iter()
            .filter(|g| g.last_encounter < cutoff)
            .collect();
        gaps.sort_by_key(|g| g.encounter_count);
        gaps.truncate(limit);
        gaps
    }

    /// Every grammar concept currently due for review
    pub fn concepts_due_for_review<'a>(&self, memory: &'a LearningMemory) -> Vec<&'a str> {
        memory
            .grammar_mistakes
            .iter()
            .filter(|m| self.should_review_concept(memory, &m.concept))
            .map(|m| m.concept.as_str())
            .collect()
    }
}
