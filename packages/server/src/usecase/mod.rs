//! UseCase 層
//!
//! Broadcast Router と Reaper の操作単位のユースケースを定義します。
//! レジストリの変更はすべてこの層を経由します。

pub mod disconnect;
pub mod error;
pub mod game_event;
pub mod join_session;
pub mod reap_idle_sessions;
pub mod send_message;

pub use disconnect::DisconnectUseCase;
pub use error::BroadcastError;
pub use game_event::GameEventUseCase;
pub use join_session::{JoinOutput, JoinSessionUseCase};
pub use reap_idle_sessions::ReapIdleSessionsUseCase;
pub use send_message::SendMessageUseCase;
