//! Owned, in-memory state for one bridge-crossing session.
//!
//! One record, passed into and out of the turn handler. There are no ambient
//! globals: whoever drives the session owns the state for its whole lifetime,
//! and nothing outside a single turn mutates it.

use crate::{
    prompt::{OPENING_CHALLENGE, PromptConfig},
    stage::{Stage, Transition},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

/// An audit record of one stage change.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub from: Stage,
    pub to: Stage,
}

/// The complete mutable state of one session: stage counter, transcript and
/// the audit log of stage changes.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub stage: Stage,
    pub transcript: Vec<ChatTurn>,
    pub audit: Vec<AuditEntry>,
}

impl SessionState {
    /// A fresh session: stage 0, transcript seeded with the opening
    /// challenge and the first question.
    pub fn new() -> Self {
        let mut state = Self {
            stage: Stage::Name,
            transcript: Vec::new(),
            audit: Vec::new(),
        };
        state.seed_transcript();
        state
    }

    fn seed_transcript(&mut self) {
        self.push_assistant(OPENING_CHALLENGE);
        self.push_assistant(PromptConfig::for_stage(self.stage).question);
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.transcript.push(ChatTurn {
            role: ChatRole::User,
            text: text.into(),
        });
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.transcript.push(ChatTurn {
            role: ChatRole::Assistant,
            text: text.into(),
        });
    }

    /// Applies a resolved [`Transition`] to the session.
    ///
    /// On an advance into a gate stage, the new stage's question is appended
    /// as the next assistant turn so the user sees the next prompt without an
    /// extra round trip. On a reset the transcript is cleared and re-seeded
    /// with the opening challenge (the rewind-only variant is deliberately
    /// not supported). Every stage change is recorded in the audit log.
    pub fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Held => {}
            Transition::Advanced(next) => {
                self.record_change(next);
                self.stage = next;
                if next.is_gated() {
                    self.push_assistant(PromptConfig::for_stage(next).question);
                }
            }
            Transition::Reset => {
                self.record_change(Stage::Name);
                self.stage = Stage::Name;
                self.transcript.clear();
                self.seed_transcript();
            }
        }
    }

    fn record_change(&mut self, to: Stage) {
        self.audit.push(AuditEntry {
            at: Utc::now(),
            from: self.stage,
            to,
        });
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::ActionSignal;

    #[test]
    fn new_session_is_seeded_with_challenge_and_first_question() {
        let state = SessionState::new();
        assert_eq!(state.stage, Stage::Name);
        assert_eq!(state.transcript.len(), 2);
        assert_eq!(state.transcript[0].text, OPENING_CHALLENGE);
        assert_eq!(state.transcript[1].text, "What... is your name?");
        assert!(state.audit.is_empty());
    }

    #[test]
    fn advancing_appends_the_next_question() {
        let mut state = SessionState::new();
        state.push_user("Arthur, King of the Britons");
        state.apply(Transition::Advanced(Stage::Quest));

        assert_eq!(state.stage, Stage::Quest);
        let last = state.transcript.last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        assert_eq!(last.text, "What... is your quest?");
    }

    #[test]
    fn advancing_to_passed_appends_no_question() {
        let mut state = SessionState::new();
        state.stage = Stage::Color;
        let before = state.transcript.len();
        state.apply(Transition::Advanced(Stage::Passed));

        assert_eq!(state.stage, Stage::Passed);
        assert_eq!(state.transcript.len(), before);
    }

    #[test]
    fn reset_clears_and_reseeds_the_transcript() {
        let mut state = SessionState::new();
        state.stage = Stage::Color;
        state.push_user("Blue! No, yellow!");
        state.apply(Transition::Reset);

        assert_eq!(state.stage, Stage::Name);
        assert_eq!(state.transcript.len(), 2);
        assert_eq!(state.transcript[0].text, OPENING_CHALLENGE);
        assert_eq!(state.transcript[1].text, "What... is your name?");
    }

    #[test]
    fn hold_leaves_everything_untouched() {
        let mut state = SessionState::new();
        let transcript_before = state.transcript.len();
        state.apply(Transition::Held);

        assert_eq!(state.stage, Stage::Name);
        assert_eq!(state.transcript.len(), transcript_before);
        assert!(state.audit.is_empty());
    }

    #[test]
    fn stage_changes_are_audited() {
        let mut state = SessionState::new();
        state.apply(Transition::Advanced(Stage::Quest));
        state.stage = Stage::Color;
        state.apply(Transition::Reset);

        assert_eq!(state.audit.len(), 2);
        assert_eq!(state.audit[0].from, Stage::Name);
        assert_eq!(state.audit[0].to, Stage::Quest);
        assert_eq!(state.audit[1].from, Stage::Color);
        assert_eq!(state.audit[1].to, Stage::Name);
    }

    #[test]
    fn full_walkthrough_reaches_passed() {
        let mut state = SessionState::new();
        for _ in 0..3 {
            let transition = state.stage.resolve(&[ActionSignal::Accept(true)]);
            state.apply(transition);
        }
        assert_eq!(state.stage, Stage::Passed);
        // Once passed, nothing moves the stage.
        let transition = state.stage.resolve(&[ActionSignal::Reject]);
        state.apply(transition);
        assert_eq!(state.stage, Stage::Passed);
    }
}
