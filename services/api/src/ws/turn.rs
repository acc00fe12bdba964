//! The per-turn orchestration cycle: select the stage's prompt, let the
//! model decide, dispatch any governance tool calls, resolve the typed
//! signal trace into a stage transition, and commit the session state.

use anyhow::{Context, Result};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionToolArgs,
    FunctionObjectArgs,
};
use bridgekeeper_core::{
    llm_client::{LlmAction, LlmClient, LlmError, LlmStreamEvent, ToolCall},
    prompt::PromptConfig,
    session::{ChatRole, SessionState},
    stage::{ActionSignal, Transition},
};
use futures_util::StreamExt;
use rmcp::{
    model::{CallToolRequestParam, RawContent},
    service::{RoleClient, RunningService},
};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Tool result fed back to the model when a call could not be dispatched.
/// Produces no action signal; the stage is held.
const IGNORED_TOOL_RESULT: &str = "Ignored: malformed tool call.";

/// What a completed turn did to the session.
#[derive(Debug)]
pub struct TurnOutcome {
    /// The assistant text committed to the transcript. `None` on a reset,
    /// where the re-seeded opening challenge replaces the reply.
    pub reply: Option<String>,
    /// The stage transition this turn resolved to.
    pub transition: Transition,
}

/// Turn-level failures. Every variant is recoverable: the session state is
/// left untouched and the next user input starts a fresh turn.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// The provider rate-limited the turn; the user should simply retry.
    #[error("{0}")]
    RateLimited(String),
    /// Any other provider or runtime failure, surfaced verbatim.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<LlmError> for TurnError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::RateLimited(message) => TurnError::RateLimited(message),
            other => TurnError::Other(other.into()),
        }
    }
}

/// Handles a single user turn against the session's current stage.
///
/// The session is only mutated once the model round trip has fully
/// succeeded; a failed turn leaves stage and transcript exactly as they
/// were, so the user can retry.
pub async fn run_turn(
    llm: &dyn LlmClient,
    mcp_client: &RunningService<RoleClient, ()>,
    signal_rx: &mut mpsc::Receiver<ActionSignal>,
    session: &mut SessionState,
    user_text: &str,
) -> Result<TurnOutcome, TurnError> {
    // A previous turn that failed mid-flight may have left signals queued.
    // They must not leak into this turn's trace.
    drain_signals(signal_rx);

    let prompt = PromptConfig::for_stage(session.stage);
    let messages =
        build_messages(&prompt, session, user_text).context("Failed to build message history")?;

    // Governance tools are only offered while the conversation is gated.
    let tools = if prompt.actions_enabled {
        offered_tools(mcp_client).await?
    } else {
        Vec::new()
    };

    let action = llm.decide_action(messages.clone(), tools).await?;

    let final_text = match action {
        LlmAction::TextResponse(text) => text,
        LlmAction::ToolCall(tool_calls) => {
            let history_with_tools = dispatch_tool_calls(mcp_client, &tool_calls, messages).await?;
            let mut stream = llm.stream_after_tools(history_with_tools).await?;
            let mut text = String::new();
            while let Some(event) = stream.next().await {
                if let Ok(LlmStreamEvent::TextChunk(chunk)) = event {
                    text.push_str(&chunk);
                }
            }
            text
        }
    };

    // All tool dispatch has completed, so the trace for this turn is final.
    let mut signals = Vec::new();
    while let Ok(signal) = signal_rx.try_recv() {
        signals.push(signal);
    }
    if !signals.is_empty() && !session.stage.is_gated() {
        warn!(?signals, "Ignoring action signals at the terminal stage.");
    }
    let transition = session.stage.resolve(&signals);
    info!(stage = %session.stage, ?signals, ?transition, "Turn resolved");

    // Commit. The reply is dropped on a reset: the transcript is cleared and
    // re-seeded with the opening challenge instead.
    session.push_user(user_text);
    let reply = match transition {
        Transition::Reset => None,
        _ => {
            if !final_text.is_empty() {
                session.push_assistant(final_text.clone());
            }
            Some(final_text)
        }
    };
    session.apply(transition);

    Ok(TurnOutcome { reply, transition })
}

fn drain_signals(signal_rx: &mut mpsc::Receiver<ActionSignal>) {
    while let Ok(stale) = signal_rx.try_recv() {
        warn!(?stale, "Discarding action signal left over from an abandoned turn.");
    }
}

/// Builds the chat-completion history: system instruction for the current
/// stage, the transcript so far, then the new user text. The user turn is
/// not committed to the session here.
fn build_messages(
    prompt: &PromptConfig,
    session: &SessionState,
    user_text: &str,
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(prompt.instruction)
            .build()?
            .into(),
    ];
    for turn in &session.transcript {
        match turn.role {
            ChatRole::User => messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.text.clone())
                    .build()?
                    .into(),
            ),
            ChatRole::Assistant => messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.text.clone())
                    .build()?
                    .into(),
            ),
        }
    }
    messages.push(
        ChatCompletionRequestUserMessageArgs::default()
            .content(user_text)
            .build()?
            .into(),
    );
    Ok(messages)
}

/// Lists the gatekeeper's tools and converts them to the chat-completion
/// tool format.
async fn offered_tools(
    mcp_client: &RunningService<RoleClient, ()>,
) -> Result<Vec<ChatCompletionTool>, TurnError> {
    mcp_client
        .list_all_tools()
        .await
        .context("Failed to list governance tools")?
        .into_iter()
        .map(|t| {
            Ok(ChatCompletionToolArgs::default()
                .function(
                    FunctionObjectArgs::default()
                        .name(t.name)
                        .description(t.description.unwrap_or_default())
                        .parameters(serde_json::to_value(&*t.input_schema).context("tool schema")?)
                        .build()
                        .context("tool definition")?,
                )
                .build()
                .context("tool definition")?)
        })
        .collect()
}

/// Dispatches each requested tool call in order and appends the assistant
/// tool-call turn plus one tool-result message per call to the history.
///
/// A call with malformed arguments (or one the service rejects) is answered
/// with a fixed "ignored" result and emits no signal, so it can never move
/// the stage.
async fn dispatch_tool_calls(
    mcp_client: &RunningService<RoleClient, ()>,
    tool_calls: &[ToolCall],
    messages: Vec<ChatCompletionRequestMessage>,
) -> Result<Vec<ChatCompletionRequestMessage>, TurnError> {
    let mut tool_results = Vec::with_capacity(tool_calls.len());
    for call in tool_calls {
        let arguments = parse_arguments(&call.function.arguments);
        let result_text = match arguments {
            None => {
                warn!(
                    tool = %call.function.name,
                    raw = %call.function.arguments,
                    "Model sent malformed tool arguments; treating as no action."
                );
                IGNORED_TOOL_RESULT.to_string()
            }
            Some(args) => {
                let request = CallToolRequestParam {
                    name: call.function.name.clone().into(),
                    arguments: Some(args),
                };
                match mcp_client.peer().call_tool(request).await {
                    Ok(result) => {
                        let annotated = result
                            .content
                            .context("Tool call returned no content")?
                            .pop()
                            .context("Content list was empty")?;
                        match annotated.raw {
                            RawContent::Text(text_content) => text_content.text,
                            _ => IGNORED_TOOL_RESULT.to_string(),
                        }
                    }
                    Err(e) => {
                        warn!(tool = %call.function.name, error = ?e, "Tool call rejected; treating as no action.");
                        IGNORED_TOOL_RESULT.to_string()
                    }
                }
            }
        };
        tool_results.push(result_text);
    }

    let mut history_with_tools = messages;
    history_with_tools.push(
        ChatCompletionRequestAssistantMessageArgs::default()
            .tool_calls(tool_calls.to_vec())
            .build()
            .context("assistant tool-call turn")?
            .into(),
    );
    for (call, result) in tool_calls.iter().zip(tool_results) {
        history_with_tools.push(
            ChatCompletionRequestToolMessageArgs::default()
                .tool_call_id(call.id.clone())
                .content(result)
                .build()
                .context("tool result turn")?
                .into(),
        );
    }
    Ok(history_with_tools)
}

/// Parses a tool call's raw JSON arguments. An empty argument string (common
/// for zero-argument tools) is treated as an empty object; anything that is
/// not a JSON object is malformed.
fn parse_arguments(raw: &str) -> Option<rmcp::model::JsonObject> {
    if raw.trim().is_empty() {
        return Some(rmcp::model::JsonObject::new());
    }
    serde_json::from_str(raw).ok()
}
