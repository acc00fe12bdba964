//! Defines the WebSocket message protocol between the chat client and the server.

use bridgekeeper_core::session::ChatTurn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// A text message from the user to the gatekeeper.
    #[serde(rename = "user_message")]
    UserMessage { text: String },
}

/// Messages sent from the server to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent immediately on connect: a fresh session and its seeded transcript.
    Initialized {
        session_id: Uuid,
        stage: u8,
        system_prompt: String,
        history: Vec<ChatTurn>,
    },
    /// The diagnostic panel payload, re-derived from the stage every turn:
    /// current stage, the active system prompt and question, and the full
    /// transcript after the turn was applied.
    StateUpdate {
        stage: u8,
        stage_name: String,
        system_prompt: String,
        question: String,
        transcript: Vec<ChatTurn>,
    },
    /// Signals the beginning of a streamed text response from the gatekeeper.
    ResponseStart,
    /// A chunk of a streamed text response.
    ResponseChunk { chunk: String },
    /// Signals the end of a streamed text response.
    ResponseEnd,
    /// The provider rate-limited the turn. The turn was dropped, the session
    /// is unchanged, and the user should retry. Deliberately distinct from
    /// `Error`.
    RateLimited { message: String },
    /// A recoverable error; the session remains usable for the next turn.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_deserializes_from_tagged_json() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"user_message","text":"Arthur"}"#).unwrap();
        match msg {
            ClientMessage::UserMessage { text } => assert_eq!(text, "Arthur"),
        }
    }

    #[test]
    fn rate_limited_and_error_serialize_to_distinct_tags() {
        let rate_limited = serde_json::to_string(&ServerMessage::RateLimited {
            message: "retry".to_string(),
        })
        .unwrap();
        let error = serde_json::to_string(&ServerMessage::Error {
            message: "boom".to_string(),
        })
        .unwrap();

        assert!(rate_limited.contains(r#""type":"rate_limited""#));
        assert!(error.contains(r#""type":"error""#));
    }
}
