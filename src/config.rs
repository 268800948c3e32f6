//! Configuration management
//!
//! Provider connection, learner defaults and storage location, kept in
//! `config.toml` under the platform config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::agent::llm::{ProviderKind, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use crate::types::{LearningMode, TargetLanguage};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub learner: LearnerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Chat-completion endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub kind: ProviderKind,
    /// Overrides the provider's default endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            base_url: None,
            model: default_model(),
            request_timeout_secs: default_timeout(),
        }
    }
}

/// Defaults for a new learner profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerSettings {
    #[serde(default)]
    pub target_language: TargetLanguage,
    #[serde(default = "default_immersion")]
    pub immersion_level: u8,
    #[serde(default = "default_mode")]
    pub default_mode: LearningMode,
}

fn default_immersion() -> u8 {
    crate::profile::DEFAULT_IMMERSION
}

fn default_mode() -> LearningMode {
    LearningMode::SmartTutor
}

impl Default for LearnerSettings {
    fn default() -> Self {
        Self {
            target_language: TargetLanguage::default(),
            immersion_level: default_immersion(),
            default_mode: default_mode(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Defaults to `<data dir>/lingua.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration, writing defaults on first use
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&contents).context("Failed to parse config file")
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().context("Config path has no parent")?;
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("lingua.db")),
        }
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "lingua-coach", "lingua-coach")
        .context("Failed to get project directories")
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

/// Show current configuration
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("Configuration ({})", config_path()?.display());
    println!("  provider:        {}", config.provider.kind);
    println!(
        "  endpoint:        {}",
        config
            .provider
            .base_url
            .as_deref()
            .unwrap_or(config.provider.kind.default_base_url())
    );
    println!("  model:           {}", config.provider.model);
    println!("  timeout:         {}s", config.provider.request_timeout_secs);
    println!("  language:        {}", config.learner.target_language);
    println!("  immersion:       {}/10", config.learner.immersion_level);
    println!("  default mode:    {}", config.learner.default_mode);
    println!("  database:        {}", config.database_path()?.display());
    println!(
        "  API key:         {}",
        if crate::security::has_api_key() { "stored" } else { "not set" }
    );

    Ok(())
}

/// Set API key
pub fn set_api_key(key: &str) -> Result<()> {
    crate::security::set_api_key(key)?;
    println!("API key stored securely.");
    Ok(())
}

pub fn clear_api_key() -> Result<()> {
    crate::security::delete_api_key()?;
    println!("API key removed.");
    Ok(())
}

pub fn set_model(model: &str) -> Result<()> {
    let model = model.trim();
    if model.is_empty() {
        anyhow::bail!("Model name must not be empty");
    }
    let mut config = Config::load()?;
    config.provider.model = model.to_string();
    config.save()?;
    println!("Model set to: {}", model);
    Ok(())
}

pub fn set_provider(kind: ProviderKind) -> Result<()> {
    let mut config = Config::load()?;
    config.provider.kind = kind;
    config.provider.base_url = None;
    config.save()?;
    println!("Provider set to: {}", kind);
    Ok(())
}

pub fn set_language(language: TargetLanguage) -> Result<()> {
    let mut config = Config::load()?;
    config.learner.target_language = language;
    config.save()?;
    println!("Target language set to: {}", language);
    Ok(())
}

pub fn set_immersion(level: u8) -> Result<()> {
    if level > crate::tutor::prompts::MAX_IMMERSION {
        anyhow::bail!("Immersion level must be between 0 and 10");
    }
    let mut config = Config::load()?;
    config.learner.immersion_level = level;
    config.save()?;
    println!("Immersion level set to: {}/10", level);
    Ok(())
}

/// Reset configuration to defaults
pub fn reset_config() -> Result<()> {
    Config::default().save()?;
    println!("Configuration reset to defaults.");
    Ok(())
}
