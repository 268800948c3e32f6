//! Catalog of the five learning modes and how each one behaves

use serde::Serialize;

use crate::error::TutorResult;
use crate::types::LearningMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionTiming {
    Immediate,
    Delayed,
    Gentle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStyle {
    Detailed,
    Brief,
    Encouraging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    Structured,
    Flexible,
    Relaxed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeCharacteristics {
    pub correction_timing: CorrectionTiming,
    pub feedback_style: FeedbackStyle,
    pub pacing: Pacing,
    /// Suggested starting immersion, 0-10
    pub immersion_level: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeConfig {
    pub id: LearningMode,
    pub name: &'static str,
    pub description: &'static str,
    pub characteristics: ModeCharacteristics,
}

pub static LEARNING_MODES: [ModeConfig; 5] = [
    ModeConfig {
        id: LearningMode::SmartTutor,
        name: "Smart Tutor",
        description: "Structured lessons with clear explanations, like a patient teacher guiding your journey.",
        characteristics: ModeCharacteristics {
            correction_timing: CorrectionTiming::Immediate,
            feedback_style: FeedbackStyle::Detailed,
            pacing: Pacing::Structured,
            immersion_level: 5,
        },
    },
    ModeConfig {
        id: LearningMode::GameFirst,
        name: "Game-First",
        description: "Playful challenges and progress loops that make learning feel like an adventure.",
        characteristics: ModeCharacteristics {
            correction_timing: CorrectionTiming::Immediate,
            feedback_style: FeedbackStyle::Brief,
            pacing: Pacing::Flexible,
            immersion_level: 6,
        },
    },
    ModeConfig {
        id: LearningMode::Conversation,
        name: "Conversation",
        description: "Practice real dialogue with characters in everyday scenarios. Corrections come after.",
        characteristics: ModeCharacteristics {
            correction_timing: CorrectionTiming::Delayed,
            feedback_style: FeedbackStyle::Detailed,
            pacing: Pacing::Flexible,
            immersion_level: 7,
        },
    },
    ModeConfig {
        id: LearningMode::MediaBased,
        name: "Media Learning",
        description: "Learn through songs, shows, and content you love.",
        characteristics: ModeCharacteristics {
            correction_timing: CorrectionTiming::Gentle,
            feedback_style: FeedbackStyle::Detailed,
            pacing: Pacing::Flexible,
            immersion_level: 8,
        },
    },
    ModeConfig {
        id: LearningMode::SlowHuman,
        name: "Slow & Human",
        description: "Low-pressure learning at your own pace for building confidence gently.",
        characteristics: ModeCharacteristics {
            correction_timing: CorrectionTiming::Gentle,
            feedback_style: FeedbackStyle::Encouraging,
            pacing: Pacing::Relaxed,
            immersion_level: 3,
        },
    },
];

pub fn mode_config(mode: LearningMode) -> &'static ModeConfig {
    // The catalog lists every variant in declaration order
    &LEARNING_MODES[mode as usize]
}

/// Lookup by wire key, e.g. "smart-tutor"
pub fn mode_config_by_key(key: &str) -> TutorResult<&'static ModeConfig> {
    let mode: LearningMode = key.parse()?;
    Ok(mode_config(mode))
}

impl ModeConfig {
    pub fn key(&self) -> &'static str {
        self.id.key()
    }
}

impl std::fmt::Display for ModeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TutorError;

    #[test]
    fn test_catalog_matches_modes() {
        for mode in LearningMode::ALL {
            assert_eq!(mode_config(mode).id, mode);
        }
    }

    #[test]
    fn test_default_immersion_levels() {
        let levels: Vec<u8> = LEARNING_MODES
            .iter()
            .map(|m| m.characteristics.immersion_level)
            .collect();
        assert_eq!(levels, vec![5, 6, 7, 8, 3]);
    }

    #[test]
    fn test_lookup_by_key() {
        let conv = mode_config_by_key("conversation").unwrap();
        assert_eq!(conv.characteristics.correction_timing, CorrectionTiming::Delayed);
        assert_eq!(mode_config_by_key("slow-human").unwrap().characteristics.pacing, Pacing::Relaxed);

        let err = mode_config_by_key("speed-run").unwrap_err();
        assert!(matches!(err, TutorError::Configuration(_)));
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(mode_config(LearningMode::GameFirst)).unwrap();
        assert_eq!(value["id"], "game-first");
        assert_eq!(value["characteristics"]["feedbackStyle"], "brief");
        assert_eq!(value["characteristics"]["correctionTiming"], "immediate");
    }
}
