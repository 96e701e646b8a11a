//! UseCase: メッセージ送信処理（ルーム内配信の中核）
//!
//! 受信イベントごとの流れ:
//!
//! 1. メンバーシップチェック（違反はエラーとして送信者にのみ返す）
//! 2. レジストリの last_activity 更新
//! 3. 永続化（fire-and-forget。配信をブロックしない）
//! 4. ルーム全員へのファンアウト（送信者を含む）
//!
//! 送信者を含めるのは意図的です。クライアントは自分の送信を楽観的に
//! 確定せず、サーバーのブロードキャストを唯一の受理確認として扱います。

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{ConnectionId, MessagePusher, NewMessage, SessionRegistry};
use crate::infrastructure::repository::FallbackSessionStore;

use super::error::BroadcastError;

/// メッセージ送信のユースケース
pub struct SendMessageUseCase {
    /// レジストリ（ライブメンバーシップの唯一の信頼できる情報源）
    registry: Arc<Mutex<SessionRegistry>>,
    /// 永続ストアアダプタ（ベストエフォート）
    store: Arc<FallbackSessionStore>,
    /// MessagePusher（メッセージ通知の抽象化）
    pusher: Arc<dyn MessagePusher>,
}

impl SendMessageUseCase {
    /// 新しい SendMessageUseCase を作成
    pub fn new(
        registry: Arc<Mutex<SessionRegistry>>,
        store: Arc<FallbackSessionStore>,
        pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            registry,
            store,
            pusher,
        }
    }

    /// メッセージ送信を実行
    ///
    /// # Arguments
    ///
    /// * `connection_id` - 送信元の接続
    /// * `message` - 分類・タイムスタンプ付与済みのメッセージ
    /// * `payload_json` - ファンアウトする JSON（DTO 層で生成されたもの）
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ConnectionId>)` - 配信先（送信者を含むルーム全員）
    /// * `Err(BroadcastError)` - メンバーシップ違反
    pub async fn execute(
        &self,
        connection_id: ConnectionId,
        message: NewMessage,
        payload_json: String,
    ) -> Result<Vec<ConnectionId>, BroadcastError> {
        let targets = {
            let mut registry = self.registry.lock().await;
            if !registry.is_member(&message.session_id, &connection_id) {
                return Err(BroadcastError::NotAMember(
                    message.session_id.as_str().to_string(),
                ));
            }
            registry.touch(&message.session_id, message.timestamp.value());
            registry
                .get(&message.session_id)
                .map(|room| room.connection_ids())
                .unwrap_or_default()
        };

        // 永続化は配信を待たせない
        {
            let store = self.store.clone();
            let message = message.clone();
            tokio::spawn(async move {
                store.add_message(&message).await;
            });
        }

        if let Err(e) = self.pusher.broadcast(targets.clone(), &payload_json).await {
            tracing::warn!(
                "Fan-out failed for session '{}': {}",
                message.session_id,
                e
            );
        }

        Ok(targets)
    }
}
