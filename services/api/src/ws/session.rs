//! Manages the WebSocket connection lifecycle for one bridge-crossing session.
//!
//! Each connection owns a fresh [`SessionState`] for its whole lifetime. The
//! gatekeeper's governance tools are served in-process over a duplex
//! transport, and the session loop handles exactly one turn at a time: a
//! user message is processed to completion before the next one is read.

use super::{
    protocol::{ClientMessage, ServerMessage},
    turn::{TurnError, run_turn},
};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use bridgekeeper_core::{
    gatekeeper::GatekeeperService,
    prompt::PromptConfig,
    session::SessionState,
    stage::ActionSignal,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use rmcp::{
    ServiceExt,
    service::{RoleClient, RunningService},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Entry point for a new connection: creates the session and runs its loop.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", tracing::field::display(session_id));
    info!("New WebSocket connection. The Keeper takes his post.");

    if let Err(e) = run_session(state, socket, session_id).await {
        error!(error = ?e, "Session terminated with error.");
    }
    info!("Session finished.");
}

/// The main event loop for an active session.
async fn run_session(state: Arc<AppState>, socket: WebSocket, session_id: Uuid) -> Result<()> {
    let (mut socket_tx, mut socket_rx) = socket.split();
    let mut session = SessionState::new();

    // Serve the gatekeeper's tools in-process; the orchestrator holds the
    // receiving end of the signal channel.
    let (signal_tx, mut signal_rx) = mpsc::channel::<ActionSignal>(8);
    let gatekeeper = GatekeeperService::new(signal_tx);
    let (server_transport, client_transport) = tokio::io::duplex(4096);
    let gatekeeper_handle = tokio::spawn(async move {
        if let Ok(service) = gatekeeper.serve(server_transport).await {
            let _ = service.waiting().await;
        }
    });
    let mcp_client: RunningService<RoleClient, ()> = ().serve(client_transport).await?;

    let prompt = PromptConfig::for_stage(session.stage);
    send_msg(
        &mut socket_tx,
        ServerMessage::Initialized {
            session_id,
            stage: session.stage.index(),
            system_prompt: prompt.instruction.to_string(),
            history: session.transcript.clone(),
        },
    )
    .await?;

    drive_session(
        &state,
        &mcp_client,
        &mut signal_rx,
        &mut session,
        &mut socket_tx,
        &mut socket_rx,
    )
    .await?;

    gatekeeper_handle.abort();
    info!("WebSocket connection closed and session terminated.");
    Ok(())
}

async fn drive_session(
    state: &Arc<AppState>,
    mcp_client: &RunningService<RoleClient, ()>,
    signal_rx: &mut mpsc::Receiver<ActionSignal>,
    session: &mut SessionState,
    socket_tx: &mut SplitSink<WebSocket, Message>,
    socket_rx: &mut SplitStream<WebSocket>,
) -> Result<()> {
    while let Some(msg_result) = socket_rx.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::UserMessage { text }) => {
                    handle_user_turn(state, mcp_client, signal_rx, session, &text, socket_tx)
                        .await?;
                }
                Err(_) => warn!("Ignoring unparseable client message."),
            },
            Ok(Message::Close(_)) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                error!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        }
    }
    Ok(())
}

/// Runs one turn and translates its outcome into server messages. Turn-level
/// failures are reported to the client and leave the session usable.
async fn handle_user_turn(
    state: &Arc<AppState>,
    mcp_client: &RunningService<RoleClient, ()>,
    signal_rx: &mut mpsc::Receiver<ActionSignal>,
    session: &mut SessionState,
    user_text: &str,
    socket_tx: &mut SplitSink<WebSocket, Message>,
) -> Result<()> {
    match run_turn(
        state.llm_client.as_ref(),
        mcp_client,
        signal_rx,
        session,
        user_text,
    )
    .await
    {
        Ok(outcome) => {
            if let Some(reply) = outcome.reply {
                send_msg(socket_tx, ServerMessage::ResponseStart).await?;
                send_msg(socket_tx, ServerMessage::ResponseChunk { chunk: reply }).await?;
                send_msg(socket_tx, ServerMessage::ResponseEnd).await?;
            }
            let prompt = PromptConfig::for_stage(session.stage);
            send_msg(
                socket_tx,
                ServerMessage::StateUpdate {
                    stage: session.stage.index(),
                    stage_name: session.stage.to_string(),
                    system_prompt: prompt.instruction.to_string(),
                    question: prompt.question.to_string(),
                    transcript: session.transcript.clone(),
                },
            )
            .await?;
        }
        Err(TurnError::RateLimited(message)) => {
            warn!(%message, "Turn dropped: provider rate limit.");
            send_msg(
                socket_tx,
                ServerMessage::RateLimited {
                    message: format!("{message} — the turn was dropped, please retry."),
                },
            )
            .await?;
        }
        Err(TurnError::Other(e)) => {
            error!(error = ?e, "Turn failed; session state unchanged.");
            send_msg(
                socket_tx,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await?;
        }
    }
    Ok(())
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
