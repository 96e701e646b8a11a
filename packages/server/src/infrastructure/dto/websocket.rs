//! WebSocket event DTOs for the session core.
//!
//! The real-time surface is a closed set of tagged variants, one per event
//! name; required fields are validated at this boundary instead of being
//! inspected ad hoc downstream. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::domain::MessageKind;

/// Result of a truth-or-dare spin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinResult {
    /// "truth" or "dare"
    pub r#type: String,
    /// The prompt text drawn by the spinner
    pub content: String,
    /// Optional difficulty label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

/// Events sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Join (or rejoin) a session room
    #[serde(rename = "join-session", rename_all = "camelCase")]
    JoinSession {
        session_id: String,
        player_name: String,
    },

    /// Ordinary chat message; may carry text and/or an image payload
    #[serde(rename = "chat message", rename_all = "camelCase")]
    ChatMessage {
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Image payload as a data URI
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_data: Option<String>,
        /// Image payload as a URL
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_type: Option<String>,
        /// Client-side send time; informational only, the server assigns
        /// the authoritative timestamp on fan-out
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Numbered conversation prompt
    #[serde(rename = "ask-question", rename_all = "camelCase")]
    AskQuestion {
        session_id: String,
        question: String,
        player_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        question_number: Option<u32>,
    },

    /// Answer to a previously asked prompt; correlated by question text
    #[serde(rename = "question-answer", rename_all = "camelCase")]
    QuestionAnswer {
        session_id: String,
        question: String,
        answer: String,
        player_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        question_number: Option<u32>,
    },

    /// Truth-or-dare spinner started
    #[serde(rename = "truth-or-dare-spin-start", rename_all = "camelCase")]
    TruthOrDareSpinStart {
        session_id: String,
        player_name: String,
    },

    /// Truth-or-dare spinner result
    #[serde(rename = "truth-or-dare-spin-result", rename_all = "camelCase")]
    TruthOrDareSpinResult {
        session_id: String,
        player_name: String,
        result: SpinResult,
    },
}

/// A message as it appears on the wire (history replay and fan-out)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub session_id: String,
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    pub message_type: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_number: Option<u32>,
    /// Server-assigned timestamp (milliseconds)
    pub timestamp: i64,
}

/// Events sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Join confirmation, sent only to the joiner
    #[serde(rename = "session-joined", rename_all = "camelCase")]
    SessionJoined {
        session_id: String,
        player_name: String,
        participant_count: u32,
    },

    /// History replay, sent only to the joiner before live events
    #[serde(rename = "chat-history", rename_all = "camelCase")]
    ChatHistory {
        session_id: String,
        messages: Vec<WireMessage>,
    },

    /// Another participant joined the room
    #[serde(rename = "user-joined", rename_all = "camelCase")]
    UserJoined {
        session_id: String,
        player_name: String,
        participant_count: u32,
    },

    /// A participant left the room
    #[serde(rename = "user-left", rename_all = "camelCase")]
    UserLeft {
        session_id: String,
        player_name: String,
        participant_count: u32,
    },

    /// Fan-out echo of an accepted message, delivered to the whole room
    /// including the original sender
    #[serde(rename = "chat message")]
    ChatMessage(WireMessage),

    /// Relay of a spinner start
    #[serde(rename = "truth-or-dare-spin-start", rename_all = "camelCase")]
    TruthOrDareSpinStart {
        session_id: String,
        player_name: String,
    },

    /// Relay of a spinner result (also mirrored as a synthetic chat message)
    #[serde(rename = "truth-or-dare-spin-result", rename_all = "camelCase")]
    TruthOrDareSpinResult {
        session_id: String,
        player_name: String,
        result: SpinResult,
    },

    /// Validation or membership error, sent only to the originating
    /// connection
    #[serde(rename = "error")]
    Error { message: String },
}
