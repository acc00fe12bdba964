//! Core logic for the Bridge of Death gatekeeper agent.
//!
//! The deterministic heart of the system lives here: the [`stage`] machine
//! that gates the conversation, the [`prompt`] selector that maps a stage to
//! its persona, the [`gatekeeper`] tool service the model calls to signal
//! verified transitions, the [`llm_client`] abstraction over the hosted
//! model, and the owned [`session`] state record.

pub mod gatekeeper;
pub mod llm_client;
pub mod prompt;
pub mod session;
pub mod stage;
