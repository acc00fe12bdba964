//! Bridgekeeper API Library Crate
//!
//! This library contains all the logic for the bridgekeeper web service:
//! the application state, configuration, WebSocket session handling, and
//! routing. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod router;
pub mod state;
pub mod ws;
