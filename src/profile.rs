//! Learner profile and dashboard metrics
//!
//! Both are small snapshots stored next to the learning memory
//! (`user-profile`, `progress-metrics`) and updated the same way: take the
//! current value, return the next one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::LearningMemory;
use crate::tutor::prompts::MAX_IMMERSION;
use crate::types::{LearningMode, TargetLanguage};

pub const DEFAULT_IMMERSION: u8 = 5;
pub const DEFAULT_CONFIDENCE: u8 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub current_mode: LearningMode,
    /// 0 = all English explanations, 10 = almost all target language
    pub immersion_level: u8,
    /// 0-100
    pub confidence_level: u8,
    #[serde(default)]
    pub preferred_topics: Vec<String>,
    #[serde(default)]
    pub target_language: TargetLanguage,
}

impl UserProfile {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: format!("user_{}", now.timestamp_millis()),
            name: "Learner".to_string(),
            created_at: now,
            current_mode: LearningMode::SmartTutor,
            immersion_level: DEFAULT_IMMERSION,
            confidence_level: DEFAULT_CONFIDENCE,
            preferred_topics: Vec::new(),
            target_language: TargetLanguage::default(),
        }
    }

    pub fn with_immersion(&self, level: u8) -> Self {
        Self {
            immersion_level: level.min(MAX_IMMERSION),
            ..self.clone()
        }
    }

    pub fn with_mode(&self, mode: LearningMode) -> Self {
        Self {
            current_mode: mode,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMetrics {
    pub vocabulary_size: u32,
    pub grammar_mastery: u32,
    pub conversation_fluency: u32,
    pub overall_confidence: u32,
    pub streak_days: u32,
    pub total_minutes: u32,
    pub lessons_completed: u32,
}

impl Default for ProgressMetrics {
    fn default() -> Self {
        Self {
            vocabulary_size: 0,
            grammar_mastery: 0,
            conversation_fluency: 0,
            overall_confidence: DEFAULT_CONFIDENCE as u32,
            streak_days: 0,
            total_minutes: 0,
            lessons_completed: 0,
        }
    }
}

impl ProgressMetrics {
    /// Copy the derived scores from `memory`
    pub fn sync_from(&self, memory: &LearningMemory) -> Self {
        let progress = memory.calculate_overall_progress();
        Self {
            grammar_mastery: progress.grammar_mastery,
            vocabulary_size: progress.vocabulary_size,
            conversation_fluency: progress.conversation_experience,
            ..self.clone()
        }
    }

    /// A finished roleplay counts as a lesson, at 1.5 minutes per message
    pub fn record_conversation(&self, message_count: usize) -> Self {
        let minutes = (message_count as u64 * 3).div_ceil(2);
        Self {
            lessons_completed: self.lessons_completed.saturating_add(1),
            total_minutes: self.total_minutes.saturating_add(minutes.min(u32::MAX as u64) as u32),
            ..self.clone()
        }
    }

    pub fn record_lesson(&self, mode: LearningMode, exercises_completed: u32) -> Self {
        let minutes = exercises_completed.saturating_mul(minutes_per_exercise(mode));
        Self {
            lessons_completed: self.lessons_completed.saturating_add(1),
            total_minutes: self.total_minutes.saturating_add(minutes),
            ..self.clone()
        }
    }

    pub fn with_streak(&self, streak_days: u32) -> Self {
        Self {
            streak_days,
            ..self.clone()
        }
    }

    /// "2h 5m"
    pub fn time_spent(&self) -> String {
        format!("{}h {}m", self.total_minutes / 60, self.total_minutes % 60)
    }
}

/// Estimated minutes one exercise takes in `mode`
pub fn minutes_per_exercise(mode: LearningMode) -> u32 {
    match mode {
        LearningMode::GameFirst => 1,
        LearningMode::SlowHuman => 3,
        LearningMode::SmartTutor | LearningMode::Conversation | LearningMode::MediaBased => 2,
    }
}

pub fn immersion_description(level: u8, language: TargetLanguage) -> String {
    let lang = language.name();
    match level {
        0..=2 => "Mostly English explanations".to_string(),
        3..=4 => format!("Balanced English and {}", lang),
        5..=6 => format!("More {}, some English support", lang),
        7..=8 => format!("Mostly {}, minimal English", lang),
        _ => format!("Full {} immersion", lang),
    }
}
