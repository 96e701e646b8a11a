//! Value Objects for domain models.
//!
//! Value Objects are immutable objects that represent values in the domain.
//! They are compared by their value, not by identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::error::ValueObjectError;

/// Maximum length of a session identifier
const SESSION_ID_MAX_LEN: usize = 64;

/// Maximum length of a player display name
const PLAYER_NAME_MAX_LEN: usize = 100;

/// Length of a generated shareable session code
const GENERATED_CODE_LEN: usize = 6;

/// Session identifier value object.
///
/// Either a user-visible shareable code (e.g. `"ABCD12"`) or any opaque
/// string a client supplies. Rooms are keyed by this value in the registry
/// and in the persisted store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new SessionId.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty or longer than 64 bytes.
    pub fn new(id: String) -> Result<Self, ValueObjectError> {
        if id.is_empty() {
            return Err(ValueObjectError::SessionIdEmpty);
        }
        if id.len() > SESSION_ID_MAX_LEN {
            return Err(ValueObjectError::SessionIdTooLong {
                max: SESSION_ID_MAX_LEN,
                actual: id.len(),
            });
        }
        Ok(Self(id))
    }

    /// Generate a short uppercase shareable session code.
    pub fn generate() -> Self {
        let code: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(GENERATED_CODE_LEN)
            .collect::<String>()
            .to_uppercase();
        Self(code)
    }

    /// Get the session id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the SessionId and return the inner String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Player display name value object.
///
/// A display name is not an authenticated identity; it is whatever the
/// client claimed when joining a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerName(String);

impl PlayerName {
    /// Create a new PlayerName.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or longer than 100 bytes.
    pub fn new(name: String) -> Result<Self, ValueObjectError> {
        if name.is_empty() {
            return Err(ValueObjectError::PlayerNameEmpty);
        }
        if name.len() > PLAYER_NAME_MAX_LEN {
            return Err(ValueObjectError::PlayerNameTooLong {
                max: PLAYER_NAME_MAX_LEN,
                actual: name.len(),
            });
        }
        Ok(Self(name))
    }

    /// Get the player name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the PlayerName and return the inner String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for PlayerName {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Identifier of a single live connection.
///
/// Connections are server-assigned and never persisted; a participant is the
/// pair of a ConnectionId and a claimed PlayerName.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh connection id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix timestamp value object (milliseconds, UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a new Timestamp from milliseconds since the Unix epoch
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    /// Get the timestamp in milliseconds
    pub fn value(&self) -> i64 {
        self.0
    }
}
