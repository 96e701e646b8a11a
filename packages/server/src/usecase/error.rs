//! Error types for the usecase layer.

use thiserror::Error;

/// Errors rejecting an inbound room event before broadcast
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    /// The connection is not a current registry member of the session.
    /// The client must rejoin before sending further events.
    #[error("not a member of session '{0}', please rejoin")]
    NotAMember(String),
}
