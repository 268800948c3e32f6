//! Shared types used across modules
//!
//! This module contains the small enums that the memory model, the prompt
//! builder and the CLI all agree on.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TutorError;

/// Role of a chat message sent to the completion endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// The five learning modes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum LearningMode {
    SmartTutor,
    GameFirst,
    Conversation,
    MediaBased,
    SlowHuman,
}

impl LearningMode {
    pub const ALL: [LearningMode; 5] = [
        LearningMode::SmartTutor,
        LearningMode::GameFirst,
        LearningMode::Conversation,
        LearningMode::MediaBased,
        LearningMode::SlowHuman,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            LearningMode::SmartTutor => "smart-tutor",
            LearningMode::GameFirst => "game-first",
            LearningMode::Conversation => "conversation",
            LearningMode::MediaBased => "media-based",
            LearningMode::SlowHuman => "slow-human",
        }
    }
}

impl FromStr for LearningMode {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LearningMode::ALL
            .into_iter()
            .find(|m| m.key() == s.trim())
            .ok_or_else(|| TutorError::Configuration(format!("unknown learning mode '{}'", s)))
    }
}

impl std::fmt::Display for LearningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Roleplay personas for conversation mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    Barista,
    Friend,
    Coworker,
    Traveler,
    Stranger,
    Custom,
}

impl ConversationRole {
    pub const ALL: [ConversationRole; 6] = [
        ConversationRole::Barista,
        ConversationRole::Friend,
        ConversationRole::Coworker,
        ConversationRole::Traveler,
        ConversationRole::Stranger,
        ConversationRole::Custom,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ConversationRole::Barista => "barista",
            ConversationRole::Friend => "friend",
            ConversationRole::Coworker => "coworker",
            ConversationRole::Traveler => "traveler",
            ConversationRole::Stranger => "stranger",
            ConversationRole::Custom => "custom",
        }
    }

    /// Persona description handed to the model
    pub fn description(&self) -> &'static str {
        match self {
            ConversationRole::Barista => {
                "You're a friendly barista at a busy neighbourhood café. Keep responses natural and in character."
            }
            ConversationRole::Friend => {
                "You're a close friend catching up. Be warm, casual, and conversational."
            }
            ConversationRole::Coworker => "You're a colleague at work. Be professional but friendly.",
            ConversationRole::Traveler => "You're a helpful local giving directions or travel advice.",
            ConversationRole::Stranger => {
                "You're a friendly stranger in a social situation (party, event, etc)."
            }
            ConversationRole::Custom => "Stay in character as described.",
        }
    }
}

impl FromStr for ConversationRole {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConversationRole::ALL
            .into_iter()
            .find(|r| r.key() == s.trim().to_lowercase())
            .ok_or_else(|| TutorError::Configuration(format!("unknown conversation role '{}'", s)))
    }
}

impl std::fmt::Display for ConversationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Language the learner is studying
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TargetLanguage {
    #[default]
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "it")]
    Italian,
    #[serde(rename = "pt")]
    Portuguese,
    #[serde(rename = "ja")]
    Japanese,
}

impl TargetLanguage {
    pub const ALL: [TargetLanguage; 6] = [
        TargetLanguage::Spanish,
        TargetLanguage::French,
        TargetLanguage::German,
        TargetLanguage::Italian,
        TargetLanguage::Portuguese,
        TargetLanguage::Japanese,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            TargetLanguage::Spanish => "es",
            TargetLanguage::French => "fr",
            TargetLanguage::German => "de",
            TargetLanguage::Italian => "it",
            TargetLanguage::Portuguese => "pt",
            TargetLanguage::Japanese => "ja",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TargetLanguage::Spanish => "Spanish",
            TargetLanguage::French => "French",
            TargetLanguage::German => "German",
            TargetLanguage::Italian => "Italian",
            TargetLanguage::Portuguese => "Portuguese",
            TargetLanguage::Japanese => "Japanese",
        }
    }
}

impl FromStr for TargetLanguage {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        TargetLanguage::ALL
            .into_iter()
            .find(|l| l.key() == key || l.name().to_lowercase() == key)
            .ok_or_else(|| TutorError::Configuration(format!("unknown target language '{}'", s)))
    }
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of authentic material handed to media mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[serde(rename = "youtube")]
    YouTube,
    Lyrics,
    Dialogue,
}

impl MediaKind {
    pub fn key(&self) -> &'static str {
        match self {
            MediaKind::YouTube => "youtube",
            MediaKind::Lyrics => "lyrics",
            MediaKind::Dialogue => "dialogue",
        }
    }
}

impl FromStr for MediaKind {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "youtube" => Ok(MediaKind::YouTube),
            "lyrics" => Ok(MediaKind::Lyrics),
            "dialogue" => Ok(MediaKind::Dialogue),
            _ => Err(TutorError::Configuration(format!("unknown media type '{}'", s))),
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_keys_round_trip() {
        for mode in LearningMode::ALL {
            assert_eq!(mode.key().parse::<LearningMode>().unwrap(), mode);
        }
        let json = serde_json::to_string(&LearningMode::SlowHuman).unwrap();
        assert_eq!(json, "\"slow-human\"");
    }

    #[test]
    fn test_unknown_mode_is_configuration_error() {
        let err = "karaoke".parse::<LearningMode>().unwrap_err();
        assert!(matches!(err, TutorError::Configuration(_)));
    }

    #[test]
    fn test_target_language_lookup() {
        assert_eq!("es".parse::<TargetLanguage>().unwrap(), TargetLanguage::Spanish);
        assert_eq!("French".parse::<TargetLanguage>().unwrap(), TargetLanguage::French);
        assert!("xx".parse::<TargetLanguage>().is_err());
        assert_eq!(serde_json::to_string(&TargetLanguage::German).unwrap(), "\"de\"");
    }

    #[test]
    fn test_role_strings() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!("Barista".parse::<ConversationRole>().unwrap(), ConversationRole::Barista);
    }

    #[test]
    fn test_media_kind_keys() {
        assert_eq!("YouTube".parse::<MediaKind>().unwrap(), MediaKind::YouTube);
        assert_eq!(serde_json::to_string(&MediaKind::Lyrics).unwrap(), "\"lyrics\"");
        assert_eq!(serde_json::to_string(&MediaKind::YouTube).unwrap(), "\"youtube\"");
        assert!("podcast".parse::<MediaKind>().is_err());
    }
}
