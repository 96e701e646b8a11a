//! UseCase: 切断処理
//!
//! WebSocket の切断（正常・異常どちらも）をレジストリからの退出に
//! 変換します。退出で空になったルームは即時に非アクティブ化し、
//! 残った参加者には user-left を通知します。

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{ConnectionId, LeaveOutcome, MessagePusher, SessionRegistry};
use crate::infrastructure::repository::FallbackSessionStore;

/// 切断処理のユースケース
pub struct DisconnectUseCase {
    registry: Arc<Mutex<SessionRegistry>>,
    store: Arc<FallbackSessionStore>,
    pusher: Arc<dyn MessagePusher>,
}

impl DisconnectUseCase {
    /// 新しい DisconnectUseCase を作成
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

    /// 切断を実行
    ///
    /// どのルームにも参加していない接続では `None` を返します（join
    /// 前に切断したケース）。
    pub async fn execute(&self, connection_id: ConnectionId) -> Option<LeaveOutcome> {
        self.pusher.unregister(&connection_id).await;

        let outcome = {
            let mut registry = self.registry.lock().await;
            registry.leave(&connection_id)
        }?;

        let store = self.store.clone();
        let session_id = outcome.session_id.clone();
        if outcome.evicted {
            tokio::spawn(async move {
                store.deactivate(&session_id).await;
            });
        } else {
            let remaining = outcome.remaining as u32;
            tokio::spawn(async move {
                store.set_participant_count(&session_id, remaining).await;
            });
        }

        Some(outcome)
    }

    /// 残った参加者へ user-left を通知
    pub async fn broadcast_user_left(&self, outcome: &LeaveOutcome, payload_json: &str) {
        let targets = {
            let registry = self.registry.lock().await;
            registry
                .get(&outcome.session_id)
                .map(|room| room.connection_ids())
                .unwrap_or_default()
        };
        if targets.is_empty() {
            return;
        }
        if let Err(e) = self.pusher.broadcast(targets, payload_json).await {
            tracing::warn!(
                "user-left fan-out failed for session '{}': {}",
                outcome.session_id,
                e
            );
        }
    }
}
