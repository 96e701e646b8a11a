//! ドメイン層
//!
//! セッション・メッセージのドメインモデルと、ドメイン層が必要とする
//! インターフェース（Repository / MessagePusher）を定義します。

pub mod classify;
pub mod entity;
pub mod error;
pub mod pusher;
pub mod registry;
pub mod repository;
pub mod value_object;

pub use classify::classify_content;
pub use entity::{MessageKind, NewMessage, SessionRecord, StoredMessage};
pub use error::{MessagePushError, StoreError, ValueObjectError};
pub use pusher::{MessagePusher, PusherChannel};
pub use registry::{JoinOutcome, LeaveOutcome, RoomSnapshot, SessionRegistry};
pub use repository::SessionStore;
pub use value_object::{ConnectionId, PlayerName, SessionId, Timestamp};
