//! Tutor - prompt assembly, model calls and response parsing
//!
//! Every method reads the memory snapshot it is given and never writes one;
//! recording results is left to the session layer.

pub mod prompts;
pub mod responses;

use std::sync::Arc;
use tracing::{debug, info};

use crate::agent::{ChatMessage, ChatProvider, CompletionOptions, ImageOptions, ModelInfo};
use crate::error::{TutorError, TutorResult};
use crate::memory::{ConversationFeedback, LearningMemory, SessionMessage, Speaker};
use crate::types::{ConversationRole, LearningMode, MediaKind, TargetLanguage};

pub use prompts::build_system_prompt;
pub use responses::{
    parse_model_json, AnswerCheck, CulturalNote, Exercise, Highlight, LessonPlan, MediaAnalysis,
    VocabularyCard, VocabularyDeck,
};

/// Cards requested per practice round
pub const DEFAULT_CARD_COUNT: usize = 10;

pub struct Tutor<P: ?Sized> {
    provider: Arc<P>,
    language: TargetLanguage,
}

impl<P: ?Sized> Clone for Tutor<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            language: self.language,
        }
    }
}

impl<P: ChatProvider + ?Sized> Tutor<P> {
    pub fn new(provider: Arc<P>, language: TargetLanguage) -> Self {
        Self { provider, language }
    }

    pub fn language(&self) -> TargetLanguage {
        self.language
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    async fn ask(&self, messages: Vec<ChatMessage>, temperature: f32) -> TutorResult<String> {
        let options = CompletionOptions::with_temperature(temperature);
        let reply = self
            .provider
            .complete(messages, &options)
            .await
            .map_err(TutorError::Provider)?;
        debug!("Model replied with {} chars", reply.len());
        Ok(reply)
    }

    pub async fn generate_lesson(
        &self,
        mode: LearningMode,
        memory: &LearningMemory,
        immersion_level: u8,
        topic: Option<&str>,
    ) -> TutorResult<LessonPlan> {
        info!("Generating {} lesson (topic: {})", mode, topic.unwrap_or("personalized"));
        let messages = vec![
            ChatMessage::system(prompts::system_prompt(mode, memory, immersion_level, self.language)),
            ChatMessage::user(prompts::lesson_request(topic, self.language)),
        ];
        let reply = self.ask(messages, prompts::LESSON_TEMPERATURE).await?;
        parse_model_json(&reply)
    }

    /// Next in-character line. An empty transcript asks the persona to open.
    pub async fn respond_in_role(
        &self,
        role: ConversationRole,
        scenario: Option<&str>,
        transcript: &[SessionMessage],
        memory: &LearningMemory,
        immersion_level: u8,
    ) -> TutorResult<String> {
        let mut messages = vec![ChatMessage::system(prompts::roleplay_system_prompt(
            role,
            scenario,
            memory,
            immersion_level,
            self.language,
        ))];
        if transcript.is_empty() {
            messages.push(ChatMessage::user(prompts::roleplay_opening(self.language)));
        }
        messages.extend(transcript.iter().map(|m| match m.role {
            Speaker::User => ChatMessage::user(m.content.clone()),
            Speaker::Ai => ChatMessage::assistant(m.content.clone()),
        }));

        let reply = self.ask(messages, prompts::ROLEPLAY_TEMPERATURE).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(TutorError::malformed("roleplay reply", "empty reply"));
        }
        Ok(reply.to_string())
    }

    pub async fn conversation_feedback(
        &self,
        transcript: &[SessionMessage],
    ) -> TutorResult<ConversationFeedback> {
        let messages = vec![
            ChatMessage::system(prompts::feedback_system_prompt(self.language)),
            ChatMessage::user(prompts::feedback_request(transcript)),
        ];
        let reply = self.ask(messages, prompts::FEEDBACK_TEMPERATURE).await?;
        parse_model_json(&reply)
    }

    pub async fn simplify_media(
        &self,
        content: &str,
        kind: MediaKind,
        level: u8,
    ) -> TutorResult<MediaAnalysis> {
        if content.trim().is_empty() {
            return Err(TutorError::Session("no content to analyze".to_string()));
        }
        let messages = vec![
            ChatMessage::system(prompts::media_system_prompt(kind, level, self.language)),
            ChatMessage::user(prompts::media_request(content)),
        ];
        let reply = self.ask(messages, prompts::MEDIA_TEMPERATURE).await?;
        parse_model_json(&reply)
    }

    pub async fn check_answer(
        &self,
        exercise: &Exercise,
        user_answer: &str,
        mode: LearningMode,
        immersion_level: u8,
    ) -> TutorResult<AnswerCheck> {
        let messages = vec![
            ChatMessage::system(prompts::answer_check_system_prompt(
                mode,
                immersion_level,
                self.language,
            )),
            ChatMessage::user(prompts::answer_check_request(
                &exercise.prompt,
                user_answer,
                &exercise.correct_answer,
                &exercise.kind,
            )),
        ];
        let reply = self.ask(messages, prompts::CHECK_TEMPERATURE).await?;
        parse_model_json(&reply)
    }

    pub async fn generate_vocabulary_cards(
        &self,
        memory: &LearningMemory,
        immersion_level: u8,
        count: usize,
    ) -> TutorResult<VocabularyDeck> {
        let messages = vec![
            ChatMessage::system(prompts::system_prompt(
                LearningMode::GameFirst,
                memory,
                immersion_level,
                self.language,
            )),
            ChatMessage::user(prompts::vocabulary_request(count, memory, self.language)),
        ];
        let reply = self.ask(messages, prompts::LESSON_TEMPERATURE).await?;
        parse_model_json(&reply)
    }

    pub async fn list_models(&self) -> TutorResult<Vec<ModelInfo>> {
        self.provider.list_models().await.map_err(TutorError::Provider)
    }

    pub async fn illustrate(&self, prompt: &str, options: &ImageOptions) -> TutorResult<String> {
        self.provider
            .generate_image(prompt, options)
            .await
            .map_err(TutorError::Provider)
    }
}
