//! Core domain models for the session core.

use serde::{Deserialize, Serialize};

use super::value_object::{PlayerName, SessionId, Timestamp};

/// Classification of a chat/game event.
///
/// The kind is derived server-side from the content (see
/// [`classify_content`](super::classify::classify_content)); clients only
/// influence it by flagging an image payload or by using a dedicated game
/// event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Chat,
    Emoji,
    Image,
    Question,
    Answer,
    Game,
    System,
}

impl MessageKind {
    /// Wire name of the kind (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Chat => "chat",
            MessageKind::Emoji => "emoji",
            MessageKind::Image => "image",
            MessageKind::Question => "question",
            MessageKind::Answer => "answer",
            MessageKind::Game => "game",
            MessageKind::System => "system",
        }
    }
}

/// Session metadata row in the persisted store.
///
/// `is_active` and `participant_count` are best-effort mirrors written by
/// the live core; the registry, not this record, is authoritative for who
/// is connected right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier (shareable code)
    pub session_id: SessionId,
    /// Optional display label
    pub title: Option<String>,
    /// Last participant count written by the live core
    pub participant_count: u32,
    /// Whether the session is considered live in storage
    pub is_active: bool,
    /// Timestamp when the session row was first created
    pub created_at: Timestamp,
    /// Timestamp of the last event seen for this session
    pub last_activity: Timestamp,
}

/// A message row as returned from the persisted store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Session the message belongs to
    pub session_id: SessionId,
    /// Display name of the sender
    pub sender: PlayerName,
    /// Text content (empty for pure image messages)
    pub body: String,
    /// Derived message classification
    pub kind: MessageKind,
    /// Prompt number for numbered-question events
    pub question_number: Option<u32>,
    /// Image payload reference (data URI or URL)
    pub image_ref: Option<String>,
    /// Server-assigned timestamp
    pub timestamp: Timestamp,
}

/// A message about to be written to the persisted store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub session_id: SessionId,
    pub sender: PlayerName,
    pub body: String,
    pub kind: MessageKind,
    pub question_number: Option<u32>,
    pub image_ref: Option<String>,
    pub timestamp: Timestamp,
}

impl NewMessage {
    /// Freeze this write request into the row shape the store returns
    pub fn into_stored(self) -> StoredMessage {
        StoredMessage {
            session_id: self.session_id,
            sender: self.sender,
            body: self.body,
            kind: self.kind,
            question_number: self.question_number,
            image_ref: self.image_ref,
            timestamp: self.timestamp,
        }
    }
}
