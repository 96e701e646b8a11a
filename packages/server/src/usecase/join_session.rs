//! UseCase: セッション参加処理
//!
//! ルームへの参加はこのユースケースだけが行います（複数のイベント
//! ハンドラに参加チェックを散らさない）。参加の流れ:
//!
//! 1. レジストリへの join（別ルームからの暗黙退出と即時退避を含む）
//! 2. 永続ストアの create-or-get（ベストエフォート、冪等）
//! 3. 参加者数ミラーの更新（fire-and-forget）
//! 4. 履歴リプレイの取得

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{
    ConnectionId, LeaveOutcome, PlayerName, SessionId, SessionRegistry, StoredMessage, Timestamp,
};
use crate::infrastructure::repository::FallbackSessionStore;

/// 履歴リプレイで返すメッセージ数の上限
const HISTORY_REPLAY_LIMIT: u32 = 200;

/// 暗黙退出が起きた別ルームの情報
#[derive(Debug, Clone)]
pub struct DepartedRoom {
    /// 退出の詳細
    pub outcome: LeaveOutcome,
    /// user-left を通知すべき残留参加者（退避された場合は空）
    pub targets: Vec<ConnectionId>,
}

/// `execute` の結果
#[derive(Debug, Clone)]
pub struct JoinOutput {
    /// join 後のルームの参加者数
    pub participant_count: u32,
    /// 履歴リプレイ（古い順）。永続ストアが全滅している場合は空。
    pub history: Vec<StoredMessage>,
    /// user-joined を通知すべき既存参加者
    pub others: Vec<ConnectionId>,
    /// 別ルームからの暗黙退出（あれば）
    pub departed: Option<DepartedRoom>,
}

/// セッション参加のユースケース
pub struct JoinSessionUseCase {
    /// レジストリ（ライブメンバーシップの唯一の信頼できる情報源）
    registry: Arc<Mutex<SessionRegistry>>,
    /// 永続ストアアダプタ（ベストエフォート）
    store: Arc<FallbackSessionStore>,
}

impl JoinSessionUseCase {
    /// 新しい JoinSessionUseCase を作成
    pub fn new(registry: Arc<Mutex<SessionRegistry>>, store: Arc<FallbackSessionStore>) -> Self {
        Self { registry, store }
    }

    /// セッション参加を実行
    ///
    /// レジストリ操作は失敗しません。未知のセッション ID はルームを
    /// 遅延作成します。永続化の失敗は履歴の欠落に退化します。
    pub async fn execute(
        &self,
        session_id: SessionId,
        connection_id: ConnectionId,
        player_name: PlayerName,
        now: i64,
    ) -> JoinOutput {
        let (outcome, others, departed) = {
            let mut registry = self.registry.lock().await;
            let outcome = registry.join(session_id.clone(), connection_id, player_name, now);
            let others: Vec<ConnectionId> = registry
                .get(&session_id)
                .map(|room| {
                    room.connection_ids()
                        .into_iter()
                        .filter(|id| *id != connection_id)
                        .collect()
                })
                .unwrap_or_default();
            let departed = outcome.departed.clone().map(|leave| DepartedRoom {
                targets: registry
                    .get(&leave.session_id)
                    .map(|room| room.connection_ids())
                    .unwrap_or_default(),
                outcome: leave,
            });
            (outcome, others, departed)
        };

        // 暗黙退出した別ルームの永続行を追従させる: 空になったルームは
        // 非アクティブ化し、参加者が残るルームは参加者数ミラーを更新する
        if let Some(departed) = &departed {
            let store = self.store.clone();
            let leave = departed.outcome.clone();
            tokio::spawn(async move {
                if leave.evicted {
                    store.deactivate(&leave.session_id).await;
                } else {
                    store
                        .set_participant_count(&leave.session_id, leave.remaining as u32)
                        .await;
                }
            });
        }

        // create-or-get は冪等で、既存行を再アクティブ化する
        self.store
            .create_or_get_session(&session_id, None, Timestamp::new(now))
            .await;

        let participant_count = outcome.participant_count as u32;
        {
            let store = self.store.clone();
            let session_id = session_id.clone();
            tokio::spawn(async move {
                store
                    .set_participant_count(&session_id, participant_count)
                    .await;
            });
        }

        let history = self
            .store
            .list_messages(&session_id, HISTORY_REPLAY_LIMIT, 0)
            .await;

        JoinOutput {
            participant_count,
            history,
            others,
            departed,
        }
    }
}
