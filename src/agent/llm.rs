//! Chat-completion client for OpenAI-compatible providers (Pollinations, OpenRouter)

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::types::Role;

const POLLINATIONS_BASE_URL: &str = "https://gen.pollinations.ai/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const POLLINATIONS_IMAGE_URL: &str = "https://image.pollinations.ai/prompt/";

/// Model used when nothing else is configured
pub const DEFAULT_MODEL: &str = "openai";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ============ Provider Configuration ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Pollinations,
    OpenRouter,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Pollinations => POLLINATIONS_BASE_URL,
            ProviderKind::OpenRouter => OPENROUTER_BASE_URL,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Pollinations => write!(f, "pollinations"),
            ProviderKind::OpenRouter => write!(f, "openrouter"),
        }
    }
}

/// Connection settings for one provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// e.g. "https://gen.pollinations.ai/v1"
    pub base_url: String,
    /// Sent as a bearer token when present
    pub api_key: Option<String>,
    /// Extra headers to include in requests (e.g., X-Title, HTTP-Referer)
    pub extra_headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Pollinations accepts anonymous requests, so the key is optional
    pub fn pollinations(api_key: Option<String>) -> Self {
        Self {
            kind: ProviderKind::Pollinations,
            base_url: POLLINATIONS_BASE_URL.to_string(),
            api_key,
            extra_headers: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn openrouter(api_key: String) -> Self {
        Self {
            kind: ProviderKind::OpenRouter,
            base_url: OPENROUTER_BASE_URL.to_string(),
            api_key: Some(api_key),
            extra_headers: vec![
                ("HTTP-Referer".to_string(), "https://github.com/lingua-coach".to_string()),
                ("X-Title".to_string(), "Lingua Coach".to_string()),
            ],
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ============ Messages and options ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling options for one completion
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Overrides the client's configured model
    pub model: Option<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            model: None,
        }
    }
}

impl CompletionOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature,
            ..Self::default()
        }
    }
}

/// Parameters for a generated illustration
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    pub width: u32,
    pub height: u32,
    pub model: String,
    pub seed: Option<u64>,
    pub nologo: bool,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            model: "flux".to_string(),
            seed: None,
            nologo: true,
        }
    }
}

/// Entry from the provider's model listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub context_length: Option<u32>,
}

impl ModelInfo {
    /// Accepts both `{"data": [...]}` and a bare array
    pub fn parse_listing(raw: &Value) -> Result<Vec<ModelInfo>> {
        let entries = match raw {
            Value::Array(_) => raw,
            Value::Object(map) => map
                .get("data")
                .context("Model listing has no 'data' field")?,
            _ => bail!("Unexpected model listing format"),
        };
        let mut models: Vec<ModelInfo> =
            serde_json::from_value(entries.clone()).context("Failed to parse model listing")?;
        // some listings only carry a name
        for model in models.iter_mut().filter(|m| m.id.is_empty()) {
            model.id = model.name.clone().unwrap_or_default();
        }
        models.retain(|m| !m.id.is_empty());
        Ok(models)
    }
}

// ============ Provider trait ============

/// Remote text and image generation
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, messages: Vec<ChatMessage>, options: &CompletionOptions) -> Result<String>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// URL of an image for `prompt`. The image itself is rendered lazily by the host.
    async fn generate_image(&self, prompt: &str, options: &ImageOptions) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

/// HTTP implementation of `ChatProvider`
#[derive(Clone)]
pub struct ChatClient {
    client: Arc<Client>,
    provider: ProviderConfig,
    model: String,
}

impl ChatClient {
    pub fn new(provider: ProviderConfig, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(provider.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client: Arc::new(client),
            provider,
            model: model.into(),
        })
    }

    /// Client for the configured provider, API key taken from the keyring
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        let api_key = crate::security::keyring::get_api_key().ok();
        let provider = match config.provider.kind {
            ProviderKind::Pollinations => ProviderConfig::pollinations(api_key),
            ProviderKind::OpenRouter => {
                let key = api_key.context(
                    "OpenRouter needs an API key. Run 'lingua-coach config --set-api-key YOUR_KEY' first.",
                )?;
                ProviderConfig::openrouter(key)
            }
        };
        let provider = match &config.provider.base_url {
            Some(url) => provider.with_base_url(url.clone()),
            None => provider,
        }
        .with_timeout(Duration::from_secs(config.provider.request_timeout_secs));

        Self::new(provider, config.provider.model.clone())
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = match &self.provider.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {}", key)),
            None => builder,
        };
        for (key, value) in &self.provider.extra_headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder
    }
}

#[async_trait]
impl ChatProvider for ChatClient {
    async fn complete(&self, messages: Vec<ChatMessage>, options: &CompletionOptions) -> Result<String> {
        let model = options.model.as_deref().unwrap_or(&self.model);
        let request = ChatRequest {
            model,
            messages: &messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        info!(
            "Requesting completion from {} (model {}, {} messages)",
            self.provider.kind,
            model,
            messages.len()
        );

        let response = self
            .request(self.client.post(format!("{}/chat/completions", self.provider.base_url)))
            .json(&request)
            .send()
            .await
            .context("Failed to send request to chat provider")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Chat API error ({}): {}", status, truncate_safe(&body, 500));
        }

        let body = response.text().await.context("Failed to read response body")?;
        debug!("Chat response: {}", truncate_safe(&body, 2000));

        let raw: Value = serde_json::from_str(&body).map_err(|e| {
            anyhow::anyhow!(
                "Failed to parse JSON response: {} (body: {})",
                e,
                truncate_safe(&body, 500)
            )
        })?;

        extract_content(&raw).context("Chat response contained no message content")
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .request(self.client.get(format!("{}/models", self.provider.base_url)))
            .send()
            .await
            .context("Failed to fetch models")?;

        if !response.status().is_success() {
            bail!("Model listing failed ({})", response.status());
        }

        let raw: Value = response
            .json()
            .await
            .context("Failed to parse models response")?;
        ModelInfo::parse_listing(&raw)
    }

    async fn generate_image(&self, prompt: &str, options: &ImageOptions) -> Result<String> {
        image_url(prompt, options)
    }
}

/// Pollinations image URL for `prompt`
pub fn image_url(prompt: &str, options: &ImageOptions) -> Result<String> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        bail!("Image prompt is empty");
    }

    let mut url = Url::parse(POLLINATIONS_IMAGE_URL)?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Image endpoint cannot take a path"))?
        .pop_if_empty()
        .push(prompt);
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("width", &options.width.to_string())
            .append_pair("height", &options.height.to_string())
            .append_pair("model", &options.model);
        if let Some(seed) = options.seed {
            query.append_pair("seed", &seed.to_string());
        }
        if options.nologo {
            query.append_pair("nologo", "true");
        }
    }
    Ok(url.to_string())
}

/// `choices[0].message.content`, either a string or an array of text parts
pub fn extract_content(raw: &Value) -> Option<String> {
    let content = raw
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))?;

    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter(|part| part.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.concat())
            }
        }
        _ => None,
    }
}

/// Truncate to at most `max` bytes without splitting a character
pub fn truncate_safe(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
