//! Daily challenge and completion streak
//!
//! One exercise per calendar day (UTC). Completing it on consecutive days grows
//! the streak; skipping a day resets it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TutorError, TutorResult};
use crate::tutor::LessonPlan;

/// Lesson topic used to request a challenge
pub const CHALLENGE_TOPIC: &str = "daily challenge";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: String,
    pub date: NaiveDate,
    pub question: String,
    pub answer: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub attempts: u32,
}

impl Challenge {
    /// Built from the first exercise of `lesson`
    pub fn from_lesson(lesson: &LessonPlan, now: DateTime<Utc>) -> Option<Self> {
        let exercise = lesson.exercises.first()?;
        Some(Self {
            id: format!("challenge_{}", now.timestamp_millis()),
            date: now.date_naive(),
            question: exercise.prompt.clone(),
            answer: exercise.correct_answer.clone(),
            kind: exercise.kind.clone(),
            options: exercise.options.clone(),
            completed: false,
            attempts: 0,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeState {
    #[serde(default)]
    pub challenge: Option<Challenge>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub last_completed_date: Option<NaiveDate>,
}

/// Outcome of one submission
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeAttempt {
    pub state: ChallengeState,
    pub correct: bool,
    pub expected: String,
}

impl ChallengeState {
    pub fn needs_new_challenge(&self, today: NaiveDate) -> bool {
        self.challenge.as_ref().map_or(true, |c| c.date != today)
    }

    /// Drop the streak when more than one day passed since the last completion
    pub fn refresh_streak(&self, today: NaiveDate) -> Self {
        let lapsed = self
            .last_completed_date
            .is_some_and(|last| (today - last).num_days() > 1);
        if lapsed {
            Self {
                streak: 0,
                ..self.clone()
            }
        } else {
            self.clone()
        }
    }

    pub fn with_challenge(&self, challenge: Challenge) -> Self {
        Self {
            challenge: Some(challenge),
            ..self.clone()
        }
    }

    pub fn submit(&self, answer: &str, today: NaiveDate) -> TutorResult<ChallengeAttempt> {
        let challenge = match &self.challenge {
            Some(c) if c.date == today => c,
            _ => return Err(TutorError::Session("no challenge for today yet".to_string())),
        };
        if challenge.completed {
            return Err(TutorError::Session("today's challenge is already complete".to_string()));
        }
        if answer.trim().is_empty() {
            return Err(TutorError::Session("answer is empty".to_string()));
        }

        let correct = answers_match(answer, &challenge.answer);
        let mut next = self.clone();
        if let Some(c) = next.challenge.as_mut() {
            c.attempts = c.attempts.saturating_add(1);
            c.completed = correct;
        }
        if correct && self.last_completed_date != Some(today) {
            next.streak = next.streak.saturating_add(1);
            next.last_completed_date = Some(today);
        }

        Ok(ChallengeAttempt {
            state: next,
            correct,
            expected: challenge.answer.clone(),
        })
    }
}

/// Case-insensitive comparison ignoring surrounding whitespace
pub fn answers_match(given: &str, expected: &str) -> bool {
    given.trim().to_lowercase() == expected.trim().to_lowercase()
}
