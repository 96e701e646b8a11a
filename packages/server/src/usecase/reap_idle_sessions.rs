//! UseCase: アイドルセッション回収処理
//!
//! 一定時間アクティビティのないルームをレジストリから追い出し、
//! 永続行を非アクティブ化します。接続が残っているルームも対象です
//! （取り残された接続は次のイベントでメンバーシップ違反として
//! 再参加を促されます）。

use std::sync::Arc;

use kotatsu_shared::time::Clock;
use tokio::sync::Mutex;

use crate::domain::{SessionId, SessionRegistry};
use crate::infrastructure::repository::FallbackSessionStore;

/// アイドルセッション回収のユースケース
pub struct ReapIdleSessionsUseCase {
    registry: Arc<Mutex<SessionRegistry>>,
    store: Arc<FallbackSessionStore>,
    clock: Arc<dyn Clock>,
    /// これを超えてアクティビティのないルームを回収する（ミリ秒）
    idle_threshold_millis: i64,
}

impl ReapIdleSessionsUseCase {
    /// 新しい ReapIdleSessionsUseCase を作成
    pub fn new(
        registry: Arc<Mutex<SessionRegistry>>,
        store: Arc<FallbackSessionStore>,
        clock: Arc<dyn Clock>,
        idle_threshold_millis: i64,
    ) -> Self {
        Self {
            registry,
            store,
            clock,
            idle_threshold_millis,
        }
    }

    /// 1 回のスイープを実行し、回収したセッション ID を返す
    pub async fn execute(&self) -> Vec<SessionId> {
        let now = self.clock.now_millis();
        let evicted = {
            let mut registry = self.registry.lock().await;
            registry.sweep(now, self.idle_threshold_millis)
        };

        for session_id in &evicted {
            tracing::info!("Reaping idle session '{}'", session_id);
            let store = self.store.clone();
            let session_id = session_id.clone();
            tokio::spawn(async move {
                store.deactivate(&session_id).await;
            });
        }

        evicted
    }
}
