//! WebSocket Session Management
//!
//! This module contains the core logic for handling bridge-crossing sessions
//! over WebSockets. It is structured into submodules for clarity:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the WebSocket connection lifecycle, from connect to termination.
//! - `turn`: Implements the per-turn orchestration cycle that gates the conversation.

pub mod protocol;
pub mod session;
mod turn;

pub use session::ws_handler;
