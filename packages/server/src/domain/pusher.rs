//! MessagePusher trait 定義
//!
//! 接続中のクライアントへのメッセージ送信（push_to / broadcast）を
//! 抽象化します。具体的な実装は Infrastructure 層が提供します。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{error::MessagePushError, value_object::ConnectionId};

/// クライアントへの送信チャンネル
///
/// UI 層が WebSocket 接続ごとに生成し、登録します。
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// メッセージ送信（通知）の抽象化
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 接続を登録する
    async fn register(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// 接続を登録解除する
    async fn unregister(&self, connection_id: &ConnectionId);

    /// 特定の接続にメッセージを送信する
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError>;

    /// 複数の接続にメッセージを送信する
    ///
    /// ブロードキャストは一部の送信失敗を許容します（ログのみ）。
    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        content: &str,
    ) -> Result<(), MessagePushError>;
}
