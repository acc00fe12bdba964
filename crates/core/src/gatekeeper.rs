//! The gatekeeper's governance tools.
//!
//! Exposes the two callable actions the model may invoke instead of replying
//! in free text: `submit_answer` and `cast_into_gorge`. The tools do no real
//! work. Each invocation returns a fixed sentinel string (the tool result the
//! model sees) and emits a typed [`ActionSignal`] on a channel owned by the
//! turn orchestrator, so transition logic never string-matches sentinels.

use crate::stage::ActionSignal;
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::info;

/// Tool result for an accepted answer.
pub const SENTINEL_ADVANCE: &str = "STATE_UPDATE: ADVANCE_STAGE";
/// Tool result for a reset.
pub const SENTINEL_RESET: &str = "STATE_UPDATE: RESET_BRIDGE";
/// Tool result for a rejected answer; carries no state update.
pub const ANSWER_REJECTED: &str = "Answer rejected.";

/// Arguments for the `submit_answer` tool.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct SubmitAnswerArgs {
    /// Whether the user's reply is a valid answer to the current question.
    #[schemars(description = "True if the user gave a valid answer to the current question")]
    pub answer_is_acceptable: bool,
}

/// MCP service hosting the governance tools for one session.
///
/// Served in-process over a duplex transport; the orchestrator holds the
/// receiving end of `signal_tx` and drains it once per turn.
pub struct GatekeeperService {
    signal_tx: mpsc::Sender<ActionSignal>,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for GatekeeperService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl GatekeeperService {
    /// Creates the service with a channel for the turn's signal trace.
    pub fn new(signal_tx: mpsc::Sender<ActionSignal>) -> Self {
        Self {
            signal_tx,
            tool_router: Self::tool_router(),
        }
    }

    async fn emit(&self, signal: ActionSignal) {
        if self.signal_tx.send(signal).await.is_err() {
            tracing::warn!(?signal, "Failed to record action signal: receiver dropped.");
        }
    }

    /// Accept or reject the current answer.
    #[tool(
        description = "Call this tool when the user provides a valid answer to the current \
                       question. If the answer is gibberish, do NOT call this. Returns a \
                       status message that will be used to update the stage."
    )]
    pub async fn submit_answer(
        &self,
        args: Parameters<SubmitAnswerArgs>,
    ) -> Result<String, String> {
        info!(acceptable = args.0.answer_is_acceptable, "Executing tool 'submit_answer'");
        self.emit(ActionSignal::Accept(args.0.answer_is_acceptable)).await;
        if args.0.answer_is_acceptable {
            Ok(SENTINEL_ADVANCE.to_string())
        } else {
            Ok(ANSWER_REJECTED.to_string())
        }
    }

    /// Throw the traveller off the bridge.
    #[tool(
        description = "Call this if the user answers the 'Color' question incorrectly or \
                       acts rude."
    )]
    pub async fn cast_into_gorge(&self) -> Result<String, String> {
        info!("Executing tool 'cast_into_gorge'");
        self.emit(ActionSignal::Reject).await;
        Ok(SENTINEL_RESET.to_string())
    }
}
