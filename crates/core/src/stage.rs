//! The bridge-crossing stage machine.
//!
//! A traveller must clear three gates (name, quest, favourite colour) before
//! the conversation opens up. Progression is driven exclusively by typed
//! [`ActionSignal`]s emitted through the gatekeeper's tools, never by
//! inspecting the model's free text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A checkpoint in the gating workflow.
///
/// `Name`, `Quest` and `Color` are gates; `Passed` is a terminal sink state
/// with no further gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Name,
    Quest,
    Color,
    Passed,
}

/// A typed intent emitted by a governance tool during a single turn.
///
/// Consumed once per turn by [`Stage::resolve`]; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSignal {
    /// `submit_answer` was invoked; the payload is its boolean argument.
    Accept(bool),
    /// `cast_into_gorge` was invoked.
    Reject,
}

/// The resolved outcome of one turn's signal trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The current answer was accepted; move to the contained stage.
    Advanced(Stage),
    /// The traveller is cast into the gorge; stage rewinds to [`Stage::Name`].
    Reset,
    /// No honoured signal this turn; the stage is unchanged.
    Held,
}

impl Stage {
    /// Numeric index of the stage, matching the 0..=3 counter shown to users.
    pub fn index(self) -> u8 {
        match self {
            Stage::Name => 0,
            Stage::Quest => 1,
            Stage::Color => 2,
            Stage::Passed => 3,
        }
    }

    /// Builds a stage from its numeric index, clamping anything out of range
    /// to the terminal stage.
    pub fn from_index(index: u8) -> Self {
        match index {
            0 => Stage::Name,
            1 => Stage::Quest,
            2 => Stage::Color,
            _ => Stage::Passed,
        }
    }

    /// The next stage, capped at [`Stage::Passed`].
    pub fn advance(self) -> Self {
        Stage::from_index(self.index().saturating_add(1))
    }

    /// Whether this stage still gates the conversation (tools are offered).
    pub fn is_gated(self) -> bool {
        !matches!(self, Stage::Passed)
    }

    /// Resolves the signal trace of one turn into a [`Transition`].
    ///
    /// Precedence is deterministic and order-independent: an `Accept(true)`
    /// anywhere in the trace wins over any `Reject`; `Accept(false)` never
    /// moves the stage. At [`Stage::Passed`] every signal is ignored: tools
    /// are not offered there, so any signal that arrives must not regress
    /// the stage.
    pub fn resolve(self, signals: &[ActionSignal]) -> Transition {
        if !self.is_gated() {
            return Transition::Held;
        }
        if signals.contains(&ActionSignal::Accept(true)) {
            return Transition::Advanced(self.advance());
        }
        if signals.contains(&ActionSignal::Reject) {
            return Transition::Reset;
        }
        Transition::Held
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Name => write!(f, "name"),
            Stage::Quest => write!(f, "quest"),
            Stage::Color => write!(f, "color"),
            Stage::Passed => write!(f, "passed"),
        }
    }
}
