//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources created once at startup.

use crate::config::Config;
use bridgekeeper_core::llm_client::LlmClient;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub llm_client: Arc<dyn LlmClient>,
    pub config: Arc<Config>,
}
