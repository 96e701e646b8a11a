//! Error types for the domain layer.

use thiserror::Error;

/// Validation errors for value objects
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    /// Session id is empty
    #[error("session id must not be empty")]
    SessionIdEmpty,

    /// Session id exceeds the maximum length
    #[error("session id too long: {actual} bytes (max: {max})")]
    SessionIdTooLong { max: usize, actual: usize },

    /// Player name is empty
    #[error("player name must not be empty")]
    PlayerNameEmpty,

    /// Player name exceeds the maximum length
    #[error("player name too long: {actual} bytes (max: {max})")]
    PlayerNameTooLong { max: usize, actual: usize },

    /// Message carries neither text nor an image payload
    #[error("message must carry text or an image payload")]
    MessageEmpty,
}

/// Errors reported by a persisted session store backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the operation
    #[error("store backend unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back to domain types
    #[error("invalid stored row: {0}")]
    InvalidRow(String),
}

/// Errors reported when pushing a message to a connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    /// The target connection is not registered
    #[error("connection '{0}' not found")]
    ConnectionNotFound(String),

    /// The underlying channel rejected the message
    #[error("failed to push message: {0}")]
    PushFailed(String),
}
