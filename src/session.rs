//! Learning session orchestration
//!
//! Glues the tutor, the snapshot store and the memory manager together. Each
//! operation finishes all fallible model work first and only then folds its
//! result into the latest stored snapshot, so a failed call leaves storage
//! untouched.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::ChatProvider;
use crate::challenge::{answers_match, Challenge, ChallengeAttempt, ChallengeState, CHALLENGE_TOPIC};
use crate::error::{TutorError, TutorResult};
use crate::memory::{
    ConversationSession, LearningMemory, MemoryManager, SessionMessage, Speaker,
};
use crate::profile::{ProgressMetrics, UserProfile};
use crate::store::{
    KeyValueStore, SnapshotStore, CHALLENGE_KEY, MEMORY_KEY, METRICS_KEY, PROFILE_KEY,
};
use crate::tutor::{
    AnswerCheck, Exercise, LessonPlan, MediaAnalysis, Tutor, VocabularyCard, VocabularyDeck,
};
use crate::types::{ConversationRole, LearningMode, MediaKind};

/// Messages needed before a roleplay can be reviewed
pub const MIN_ROLEPLAY_MESSAGES: usize = 2;

/// An in-progress roleplay. Nothing is persisted until it ends.
#[derive(Debug, Clone)]
pub struct RoleplaySession {
    pub role: ConversationRole,
    pub scenario: Option<String>,
    pub messages: Vec<SessionMessage>,
}

impl RoleplaySession {
    pub fn last_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Speaker::Ai)
            .map(|m| m.content.as_str())
    }
}

/// Stored learner state: memory, profile, metrics and challenge.
///
/// Reading and recording here never needs a model provider.
pub struct LearnerRecords<S: ?Sized> {
    snapshots: Arc<SnapshotStore<S>>,
    manager: MemoryManager,
}

impl<S: ?Sized> Clone for LearnerRecords<S> {
    fn clone(&self) -> Self {
        Self {
            snapshots: self.snapshots.clone(),
            manager: self.manager.clone(),
        }
    }
}

impl<S: KeyValueStore + ?Sized> LearnerRecords<S> {
    pub fn new(snapshots: Arc<SnapshotStore<S>>, manager: MemoryManager) -> Self {
        Self { snapshots, manager }
    }

    pub fn manager(&self) -> &MemoryManager {
        &self.manager
    }

    fn snapshots(&self) -> &SnapshotStore<S> {
        &self.snapshots
    }

    pub async fn memory(&self) -> TutorResult<LearningMemory> {
        self.snapshots.load_memory().await.map_err(TutorError::Storage)
    }

    /// Stored profile, or a fresh one stamped by the manager's clock
    pub async fn profile(&self) -> TutorResult<UserProfile> {
        let stored = self
            .snapshots
            .load_optional(PROFILE_KEY)
            .await
            .map_err(TutorError::Storage)?;
        Ok(stored.unwrap_or_else(|| UserProfile::new(self.manager.clock().now())))
    }

    /// Persist a profile built by `seed` unless one is already stored
    pub async fn ensure_profile<F>(&self, seed: F) -> TutorResult<UserProfile>
    where
        F: FnOnce(UserProfile) -> UserProfile,
    {
        let now = self.manager.clock().now();
        self.snapshots
            .update_optional(PROFILE_KEY, |current: Option<&UserProfile>| match current {
                Some(profile) => profile.clone(),
                None => seed(UserProfile::new(now)),
            })
            .await
            .map_err(TutorError::Storage)
    }

    pub async fn save_profile(&self, profile: &UserProfile) -> TutorResult<()> {
        self.snapshots
            .save(PROFILE_KEY, profile)
            .await
            .map_err(TutorError::Storage)
    }

    pub async fn metrics(&self) -> TutorResult<ProgressMetrics> {
        self.snapshots
            .load(METRICS_KEY)
            .await
            .map_err(TutorError::Storage)
    }

    /// Apply `f` to the latest memory and refresh the derived metrics
    pub async fn update_memory<F>(&self, f: F) -> TutorResult<LearningMemory>
    where
        F: FnOnce(&MemoryManager, &LearningMemory) -> LearningMemory,
    {
        let manager = &self.manager;
        let memory = self
            .snapshots
            .update_memory(|current| f(manager, current))
            .await
            .map_err(TutorError::Storage)?;
        self.update_metrics(|m| m.sync_from(&memory)).await?;
        Ok(memory)
    }

    pub async fn update_metrics<F>(&self, f: F) -> TutorResult<ProgressMetrics>
    where
        F: FnOnce(&ProgressMetrics) -> ProgressMetrics,
    {
        self.snapshots
            .update(METRICS_KEY, f)
            .await
            .map_err(TutorError::Storage)
    }

    /// Clear every stored snapshot
    pub async fn reset(&self) -> TutorResult<()> {
        for key in [MEMORY_KEY, PROFILE_KEY, METRICS_KEY, CHALLENGE_KEY] {
            self.snapshots.delete(key).await.map_err(TutorError::Storage)?;
        }
        warn!("Learner state reset");
        Ok(())
    }
}

pub struct LearningSession<P: ?Sized, S: ?Sized> {
    tutor: Tutor<P>,
    records: LearnerRecords<S>,
}

impl<P, S> LearningSession<P, S>
where
    P: ChatProvider + ?Sized,
    S: KeyValueStore + ?Sized,
{
    pub fn new(tutor: Tutor<P>, snapshots: Arc<SnapshotStore<S>>, manager: MemoryManager) -> Self {
        Self::from_records(tutor, LearnerRecords::new(snapshots, manager))
    }

    pub fn from_records(tutor: Tutor<P>, records: LearnerRecords<S>) -> Self {
        Self { tutor, records }
    }

    pub fn tutor(&self) -> &Tutor<P> {
        &self.tutor
    }

    pub fn records(&self) -> &LearnerRecords<S> {
        &self.records
    }

    pub fn manager(&self) -> &MemoryManager {
        self.records.manager()
    }

    // ============ Snapshots ============

    pub async fn memory(&self) -> TutorResult<LearningMemory> {
        self.records.memory().await
    }

    pub async fn profile(&self) -> TutorResult<UserProfile> {
        self.records.profile().await
    }

    pub async fn save_profile(&self, profile: &UserProfile) -> TutorResult<()> {
        self.records.save_profile(profile).await
    }

    pub async fn metrics(&self) -> TutorResult<ProgressMetrics> {
        self.records.metrics().await
    }

    pub async fn update_memory<F>(&self, f: F) -> TutorResult<LearningMemory>
    where
        F: FnOnce(&MemoryManager, &LearningMemory) -> LearningMemory,
    {
        self.records.update_memory(f).await
    }

    async fn update_metrics<F>(&self, f: F) -> TutorResult<ProgressMetrics>
    where
        F: FnOnce(&ProgressMetrics) -> ProgressMetrics,
    {
        self.records.update_metrics(f).await
    }

    pub async fn reset(&self) -> TutorResult<()> {
        self.records.reset().await
    }

    // ============ Lessons ============

    pub async fn lesson(&self, mode: LearningMode, topic: Option<&str>) -> TutorResult<LessonPlan> {
        let memory = self.memory().await?;
        let profile = self.profile().await?;
        self.tutor
            .generate_lesson(mode, &memory, profile.immersion_level, topic)
            .await
    }

    /// Check an answer; a miss records one mistake per concept involved
    pub async fn check_answer(
        &self,
        exercise: &Exercise,
        user_answer: &str,
        mode: LearningMode,
    ) -> TutorResult<AnswerCheck> {
        let profile = self.profile().await?;
        let check = self
            .tutor
            .check_answer(exercise, user_answer, mode, profile.immersion_level)
            .await?;

        if !check.is_correct {
            let concepts = distinct_concepts(&check.grammar_concepts);
            if !concepts.is_empty() {
                info!("Recording {} missed concept(s)", concepts.len());
                self.update_memory(|mm, memory| {
                    concepts.iter().fold(memory.clone(), |acc, concept| {
                        mm.record_grammar_mistake(&acc, concept, user_answer)
                    })
                })
                .await?;
            }
        }
        Ok(check)
    }

    pub async fn complete_lesson(
        &self,
        mode: LearningMode,
        exercises_completed: u32,
    ) -> TutorResult<ProgressMetrics> {
        self.update_metrics(|m| m.record_lesson(mode, exercises_completed))
            .await
    }

    // ============ Roleplay ============

    /// Open a roleplay with the persona's greeting
    pub async fn start_roleplay(
        &self,
        role: ConversationRole,
        scenario: Option<String>,
    ) -> TutorResult<RoleplaySession> {
        let memory = self.memory().await?;
        let profile = self.profile().await?;
        let greeting = self
            .tutor
            .respond_in_role(role, scenario.as_deref(), &[], &memory, profile.immersion_level)
            .await?;

        info!("Started {} roleplay", role);
        Ok(RoleplaySession {
            role,
            scenario,
            messages: vec![self.message(Speaker::Ai, greeting)],
        })
    }

    /// Send a learner turn and append the reply. The transcript only grows when
    /// the model answered.
    pub async fn send(&self, roleplay: &mut RoleplaySession, text: &str) -> TutorResult<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TutorError::Session("message is empty".to_string()));
        }

        let memory = self.memory().await?;
        let profile = self.profile().await?;
        let mut transcript = roleplay.messages.clone();
        transcript.push(self.message(Speaker::User, text.to_string()));

        let reply = self
            .tutor
            .respond_in_role(
                roleplay.role,
                roleplay.scenario.as_deref(),
                &transcript,
                &memory,
                profile.immersion_level,
            )
            .await?;

        transcript.push(self.message(Speaker::Ai, reply.clone()));
        roleplay.messages = transcript;
        Ok(reply)
    }

    /// Review the roleplay and record it with its feedback
    pub async fn end_roleplay(&self, roleplay: &RoleplaySession) -> TutorResult<ConversationSession> {
        if roleplay.messages.len() < MIN_ROLEPLAY_MESSAGES {
            return Err(TutorError::Session(format!(
                "a conversation needs at least {} messages before feedback",
                MIN_ROLEPLAY_MESSAGES
            )));
        }

        let feedback = self.tutor.conversation_feedback(&roleplay.messages).await?;
        let now = self.manager().clock().now();
        let session = ConversationSession {
            id: format!("conv_{}", now.timestamp_millis()),
            role: roleplay.role,
            messages: roleplay.messages.clone(),
            timestamp: now,
            feedback: Some(feedback),
        };

        let recorded = session.clone();
        self.update_memory(|mm, memory| mm.record_conversation(memory, recorded))
            .await?;
        self.update_metrics(|m| m.record_conversation(roleplay.messages.len()))
            .await?;

        info!(
            "Recorded {} roleplay ({} messages)",
            roleplay.role,
            roleplay.messages.len()
        );
        Ok(session)
    }

    fn message(&self, role: Speaker, content: String) -> SessionMessage {
        let now = self.manager().clock().now();
        let language = match role {
            Speaker::Ai => self.tutor.language().key().to_string(),
            Speaker::User => "mixed".to_string(),
        };
        SessionMessage {
            id: format!("msg_{}", Uuid::new_v4().simple()),
            role,
            content,
            timestamp: now,
            language,
        }
    }

    // ============ Media ============

    pub async fn simplify_media(&self, content: &str, kind: MediaKind) -> TutorResult<MediaAnalysis> {
        let profile = self.profile().await?;
        self.tutor
            .simplify_media(content, kind, profile.immersion_level)
            .await
    }

    // ============ Vocabulary ============

    pub async fn vocabulary_cards(&self, count: usize) -> TutorResult<VocabularyDeck> {
        let memory = self.memory().await?;
        let profile = self.profile().await?;
        self.tutor
            .generate_vocabulary_cards(&memory, profile.immersion_level, count)
            .await
    }

    /// Whether `answer` translates `card`; a miss records a vocabulary gap
    pub async fn answer_card(&self, card: &VocabularyCard, answer: &str) -> TutorResult<bool> {
        let correct = answers_match(answer, &card.translation);
        if !correct {
            self.update_memory(|mm, memory| {
                mm.record_vocabulary_gap(memory, &card.word, &card.translation, &card.example)
            })
            .await?;
        }
        Ok(correct)
    }

    // ============ Daily challenge ============

    /// Today's challenge, generating one if needed
    pub async fn daily_challenge(&self) -> TutorResult<ChallengeState> {
        let now = self.manager().clock().now();
        let today = now.date_naive();
        let state: ChallengeState = self
            .records
            .snapshots()
            .load(CHALLENGE_KEY)
            .await
            .map_err(TutorError::Storage)?;

        let challenge = if state.needs_new_challenge(today) {
            let lesson = self.lesson(LearningMode::GameFirst, Some(CHALLENGE_TOPIC)).await?;
            Some(
                Challenge::from_lesson(&lesson, now)
                    .ok_or_else(|| TutorError::malformed("lesson", "no exercise for the challenge"))?,
            )
        } else {
            None
        };

        let state = self
            .records
            .snapshots()
            .update(CHALLENGE_KEY, |current: &ChallengeState| {
                let refreshed = current.refresh_streak(today);
                match challenge {
                    Some(c) if refreshed.needs_new_challenge(today) => refreshed.with_challenge(c),
                    _ => refreshed,
                }
            })
            .await
            .map_err(TutorError::Storage)?;

        // Dashboard streak follows the challenge state, including resets
        let streak = state.streak;
        self.update_metrics(|m| m.with_streak(streak)).await?;
        Ok(state)
    }

    pub async fn submit_challenge(&self, answer: &str) -> TutorResult<ChallengeAttempt> {
        let today = self.manager().clock().now().date_naive();
        let mut outcome: Option<TutorResult<ChallengeAttempt>> = None;

        let stored = self
            .records
            .snapshots()
            .update(CHALLENGE_KEY, |current: &ChallengeState| {
                let refreshed = current.refresh_streak(today);
                let result = refreshed.submit(answer, today);
                let next = match &result {
                    Ok(attempt) => attempt.state.clone(),
                    Err(_) => refreshed,
                };
                outcome = Some(result);
                next
            })
            .await
            .map_err(TutorError::Storage)?;

        let streak = stored.streak;
        self.update_metrics(|m| m.with_streak(streak)).await?;

        outcome.unwrap_or_else(|| Err(TutorError::Session("challenge was not evaluated".to_string())))
    }
}

/// Trimmed, non-empty, first occurrence wins
fn distinct_concepts(concepts: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    concepts
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty() && seen.insert(c.to_string()))
        .map(str::to_string)
        .collect()
}
