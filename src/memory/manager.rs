//! Memory Manager - pure update operations over `LearningMemory`
//!
//! Every operation takes a snapshot by reference and returns a new one; the
//! input is never mutated. The only ambient input is the injected clock.

use std::sync::Arc;
use tracing::debug;

use super::{
    clamp_skill_level, entry_id, push_bounded, Clock, ConversationSession, GrammarMistake,
    LearningMemory, SystemClock, VocabularyGap, WeakArea, MAX_CONVERSATIONS, MAX_GAP_CONTEXTS,
    MAX_MISTAKE_EXAMPLES, MAX_SKILL_LEVEL,
};

/// Applies learner events to memory snapshots
#[derive(Clone)]
pub struct MemoryManager {
    clock: Arc<dyn Clock>,
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Fresh, empty memory for a new learner
    pub fn create_empty_memory() -> LearningMemory {
        LearningMemory::default()
    }

    /// Count a mistake on `concept` and keep `example` among the last five
    pub fn record_grammar_mistake(
        &self,
        memory: &LearningMemory,
        concept: &str,
        example: &str,
    ) -> LearningMemory {
        let now = self.clock.now();
        let mut next = memory.clone();

        match next.grammar_mistakes.iter_mut().find(|m| m.concept == concept) {
            Some(existing) => {
                existing.mistake_count = existing.mistake_count.saturating_add(1);
                existing.last_occurrence = now;
                push_bounded(&mut existing.examples, example.to_string(), MAX_MISTAKE_EXAMPLES);
                debug!("Grammar mistake '{}' now at {} occurrences", concept, existing.mistake_count);
            }
            None => {
                next.grammar_mistakes.push(GrammarMistake {
                    id: entry_id("gm", now),
                    concept: concept.to_string(),
                    mistake_count: 1,
                    last_occurrence: now,
                    examples: vec![example.to_string()],
                });
                debug!("Tracking new grammar mistake '{}'", concept);
            }
        }

        next
    }

    /// Count an encounter with an unknown `word`, keeping the last three contexts
    pub fn record_vocabulary_gap(
        &self,
        memory: &LearningMemory,
        word: &str,
        translation: &str,
        context: &str,
    ) -> LearningMemory {
        let now = self.clock.now();
        let mut next = memory.clone();

        match next.vocabulary_gaps.iter_mut().find(|g| g.word == word) {
            Some(existing) => {
                existing.encounter_count = existing.encounter_count.saturating_add(1);
                existing.last_encounter = now;
                push_bounded(&mut existing.context, context.to_string(), MAX_GAP_CONTEXTS);
            }
            None => {
                next.vocabulary_gaps.push(VocabularyGap {
                    id: entry_id("vg", now),
                    word: word.to_string(),
                    translation: translation.to_string(),
                    encounter_count: 1,
                    last_encounter: now,
                    context: vec![context.to_string()],
                });
                debug!("Tracking new vocabulary gap '{}'", word);
            }
        }

        next
    }

    /// Put `session` at the head of the history, evicting beyond 20
    pub fn record_conversation(
        &self,
        memory: &LearningMemory,
        session: ConversationSession,
    ) -> LearningMemory {
        let mut next = memory.clone();
        next.conversation_history.insert(0, session);
        next.conversation_history.truncate(MAX_CONVERSATIONS);
        next
    }

    /// Mark `concept` as mastered. Returns an identical snapshot if it already is.
    pub fn mark_concept_mastered(&self, memory: &LearningMemory, concept: &str) -> LearningMemory {
        if memory.is_mastered(concept) {
            return memory.clone();
        }

        let mut next = memory.clone();
        next.mastered_concepts.push(concept.to_string());
        next.grammar_mistakes.retain(|m| m.concept != concept);
        for area in next.weak_areas.iter_mut().filter(|w| w.category == concept) {
            area.set_skill_level(MAX_SKILL_LEVEL);
        }
        debug!("Concept '{}' mastered", concept);
        next
    }

    /// Set the skill estimate for `category`, clamped to [0, 10]
    pub fn update_weak_area(
        &self,
        memory: &LearningMemory,
        category: &str,
        skill_level: f64,
    ) -> LearningMemory {
        let now = self.clock.now();
        let level = clamp_skill_level(skill_level);
        let mut next = memory.clone();

        match next.weak_areas.iter_mut().find(|w| w.category == category) {
            Some(existing) => {
                existing.set_skill_level(level);
                existing.last_practiced = now;
            }
            None => {
                next.weak_areas
                    .push(WeakArea::new(entry_id("wa", now), category, level, now));
            }
        }

        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FixedClock;
    use crate::types::ConversationRole;
    use chrono::{Duration, TimeZone, Utc};

    fn manager() -> (MemoryManager, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
        ));
        (MemoryManager::new(clock.clone()), clock)
    }

    fn session(n: usize) -> ConversationSession {
        ConversationSession {
            id: format!("conv_{}", n),
            role: ConversationRole::Friend,
            messages: vec![],
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
            feedback: None,
        }
    }

    #[test]
    fn test_first_mistake_creates_entry() {
        let (mm, _) = manager();
        let memory = mm.record_grammar_mistake(&LearningMemory::default(), "ser-vs-estar", "fui feliz");

        assert_eq!(memory.grammar_mistakes.len(), 1);
        let entry = &memory.grammar_mistakes[0];
        assert_eq!(entry.mistake_count, 1);
        assert_eq!(entry.examples, vec!["fui feliz"]);
        assert!(entry.id.starts_with("gm_"));
    }

    #[test]
    fn test_repeat_mistake_updates_in_place() {
        let (mm, clock) = manager();
        let first = mm.record_grammar_mistake(&LearningMemory::default(), "gender", "el mano");
        clock.advance(Duration::hours(3));
        let second = mm.record_grammar_mistake(&first, "gender", "la problema");

        assert_eq!(second.grammar_mistakes.len(), 1);
        let entry = &second.grammar_mistakes[0];
        assert_eq!(entry.mistake_count, 2);
        assert_eq!(entry.last_occurrence, clock.now());
        assert_eq!(entry.examples, vec!["el mano", "la problema"]);
        // input snapshot untouched
        assert_eq!(first.grammar_mistakes[0].mistake_count, 1);
    }

    #[test]
    fn test_vocabulary_context_capped_at_three() {
        let (mm, _) = manager();
        let mut memory = LearningMemory::default();
        for i in 0..5 {
            memory = mm.record_vocabulary_gap(&memory, "sobremesa", "after-meal chat", &format!("ctx {}", i));
        }
        let gap = memory.vocabulary_gap("sobremesa").unwrap();
        assert_eq!(gap.encounter_count, 5);
        assert_eq!(gap.context, vec!["ctx 2", "ctx 3", "ctx 4"]);
        assert_eq!(gap.translation, "after-meal chat");
    }

    #[test]
    fn test_conversation_history_capped() {
        let (mm, _) = manager();
        let mut memory = LearningMemory::default();
        for n in 1..=25 {
            memory = mm.record_conversation(&memory, session(n));
        }
        assert_eq!(memory.conversation_history.len(), MAX_CONVERSATIONS);
        assert_eq!(memory.conversation_history[0].id, "conv_25");
        assert_eq!(memory.conversation_history[19].id, "conv_6");
    }

    #[test]
    fn test_mastery_clears_mistake_and_lifts_weak_area() {
        let (mm, _) = manager();
        let mut memory = mm.record_grammar_mistake(&LearningMemory::default(), "subjunctive", "espero que vienes");
        memory = mm.update_weak_area(&memory, "subjunctive", 2.0);
        memory = mm.update_weak_area(&memory, "nouns", 4.0);

        let mastered = mm.mark_concept_mastered(&memory, "subjunctive");
        assert!(mastered.is_mastered("subjunctive"));
        assert!(mastered.grammar_mistake("subjunctive").is_none());
        let area = mastered.weak_area("subjunctive").unwrap();
        assert_eq!(area.skill_level, 10);
        assert!(!area.needs_review);
        assert!(mastered.weak_area("nouns").unwrap().needs_review);

        let again = mm.mark_concept_mastered(&mastered, "subjunctive");
        assert_eq!(again, mastered);
    }

    #[test]
    fn test_update_weak_area_clamps() {
        let (mm, clock) = manager();
        let memory = mm.update_weak_area(&LearningMemory::default(), "listening", 15.0);
        let area = memory.weak_area("listening").unwrap();
        assert_eq!(area.skill_level, 10);
        assert!(!area.needs_review);

        clock.advance(Duration::days(1));
        let memory = mm.update_weak_area(&memory, "listening", -4.0);
        let area = memory.weak_area("listening").unwrap();
        assert_eq!(area.skill_level, 0);
        assert!(area.needs_review);
        assert_eq!(area.last_practiced, clock.now());
        assert_eq!(memory.weak_areas.len(), 1);
    }
}
