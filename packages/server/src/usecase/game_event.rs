//! UseCase: ゲームイベント中継処理
//!
//! スピナー系のイベントはチャットと同じメンバーシップ・活動更新の
//! 規律に従いますが、1 回の受信で複数のペイロードを配信できます
//! （スピン結果はゲームイベントと合成チャットメッセージの 2 通で
//! 配信されるため）。永続化するのは合成チャットメッセージだけです。

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{ConnectionId, MessagePusher, NewMessage, SessionId, SessionRegistry};
use crate::infrastructure::repository::FallbackSessionStore;

use super::error::BroadcastError;

/// ゲームイベント中継のユースケース
pub struct GameEventUseCase {
    registry: Arc<Mutex<SessionRegistry>>,
    store: Arc<FallbackSessionStore>,
    pusher: Arc<dyn MessagePusher>,
}

impl GameEventUseCase {
    /// 新しい GameEventUseCase を作成
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

    /// ゲームイベントを中継
    ///
    /// # Arguments
    ///
    /// * `connection_id` - 送信元の接続
    /// * `session_id` - 対象セッション
    /// * `record` - 永続化するメッセージ（スピン開始のように履歴に
    ///   残さないイベントでは `None`）
    /// * `payloads` - 配信順にファンアウトする JSON 群
    /// * `now` - レジストリの活動更新に使うタイムスタンプ
    pub async fn execute(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
        record: Option<NewMessage>,
        payloads: Vec<String>,
        now: i64,
    ) -> Result<Vec<ConnectionId>, BroadcastError> {
        let targets = {
            let mut registry = self.registry.lock().await;
            if !registry.is_member(&session_id, &connection_id) {
                return Err(BroadcastError::NotAMember(session_id.as_str().to_string()));
            }
            registry.touch(&session_id, now);
            registry
                .get(&session_id)
                .map(|room| room.connection_ids())
                .unwrap_or_default()
        };

        if let Some(message) = record {
            let store = self.store.clone();
            tokio::spawn(async move {
                store.add_message(&message).await;
            });
        }

        for payload in &payloads {
            if let Err(e) = self.pusher.broadcast(targets.clone(), payload).await {
                tracing::warn!("Fan-out failed for session '{}': {}", session_id, e);
            }
        }

        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageKind, PlayerName, SessionStore, Timestamp};
    use crate::infrastructure::pusher::WebSocketMessagePusher;
    use crate::infrastructure::repository::InMemorySessionStore;
    use tokio::sync::mpsc;

    fn sid(raw: &str) -> SessionId {
        SessionId::new(raw.to_string()).unwrap()
    }

    fn name(raw: &str) -> PlayerName {
        PlayerName::new(raw.to_string()).unwrap()
    }

    struct Harness {
        usecase: GameEventUseCase,
        registry: Arc<Mutex<SessionRegistry>>,
        backend: Arc<InMemorySessionStore>,
        pusher: Arc<WebSocketMessagePusher>,
    }

    fn create_harness() -> Harness {
        let registry = Arc::new(Mutex::new(SessionRegistry::new()));
        let backend = Arc::new(InMemorySessionStore::new());
        let store = Arc::new(FallbackSessionStore::from_backends(vec![backend.clone()]));
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let usecase = GameEventUseCase::new(registry.clone(), store, pusher.clone());
        Harness {
            usecase,
            registry,
            backend,
            pusher,
        }
    }

    async fn join(
        harness: &Harness,
        session: &str,
        who: &str,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let connection_id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        harness.pusher.register(connection_id, tx).await;
        harness
            .registry
            .lock()
            .await
            .join(sid(session), connection_id, name(who), 1000);
        (connection_id, rx)
    }

    #[tokio::test]
    async fn test_spin_result_emits_both_payloads_in_order() {
        // テスト項目: スピン結果がゲームイベントと合成チャットの 2 通で届く
        // given (前提条件):
        let harness = create_harness();
        let (alice, _alice_rx) = join(&harness, "ABCD", "alice").await;
        let (_bob, mut bob_rx) = join(&harness, "ABCD", "bob").await;

        // when (操作):
        harness
            .usecase
            .execute(
                alice,
                sid("ABCD"),
                None,
                vec!["game-event".to_string(), "synthetic-chat".to_string()],
                2000,
            )
            .await
            .unwrap();

        // then (期待する結果): ゲームイベントが先、合成チャットが後
        assert_eq!(bob_rx.recv().await, Some("game-event".to_string()));
        assert_eq!(bob_rx.recv().await, Some("synthetic-chat".to_string()));
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_record_is_persisted_when_present() {
        // テスト項目: record 付きのイベントは永続ストアに書き込まれる
        // given (前提条件):
        let harness = create_harness();
        let (alice, _rx) = join(&harness, "ABCD", "alice").await;
        let record = NewMessage {
            session_id: sid("ABCD"),
            sender: name("alice"),
            body: "DARE: sing a song".to_string(),
            kind: MessageKind::Game,
            question_number: None,
            image_ref: None,
            timestamp: Timestamp::new(2000),
        };

        // when (操作):
        harness
            .usecase
            .execute(
                alice,
                sid("ABCD"),
                Some(record),
                vec!["payload".to_string()],
                2000,
            )
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // then (期待する結果):
        let stored = harness
            .backend
            .list_messages(&sid("ABCD"), 100, 0)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind, MessageKind::Game);
    }

    #[tokio::test]
    async fn test_non_member_game_event_is_rejected() {
        // テスト項目: 非メンバーのゲームイベントはエラーになる
        // given (前提条件):
        let harness = create_harness();
        let (_alice, mut alice_rx) = join(&harness, "ABCD", "alice").await;
        let outsider = ConnectionId::new();

        // when (操作):
        let result = harness
            .usecase
            .execute(
                outsider,
                sid("ABCD"),
                None,
                vec!["payload".to_string()],
                2000,
            )
            .await;

        // then (期待する結果):
        assert_eq!(result, Err(BroadcastError::NotAMember("ABCD".to_string())));
        assert!(alice_rx.try_recv().is_err());
    }
}
