//! SessionStore trait 定義
//!
//! ドメイン層が必要とする永続ストアへのインターフェースを定義します。
//! 具体的な実装（SQLite / インメモリ）は Infrastructure 層が提供します
//! （依存性の逆転）。
//!
//! 永続化はベストエフォートです。バックエンドの失敗をどう扱うかは
//! このインターフェースの責務ではなく、フォールバックアダプタ
//! （`infrastructure::repository::FallbackSessionStore`）が決めます。

use async_trait::async_trait;

use super::{
    entity::{NewMessage, SessionRecord, StoredMessage},
    error::StoreError,
    value_object::{SessionId, Timestamp},
};

/// 永続セッションストアのバックエンド
///
/// 実装は必ず冪等な create を提供すること: 同じ session_id での同時
/// create が一意性違反になった場合、エラーを伝播せず既存行を再読して
/// 返す。既存行が非アクティブであれば再アクティブ化する。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// セッション行を作成、または既存行を再アクティブ化して返す
    async fn create_or_get_session<'a>(
        &self,
        session_id: &SessionId,
        title: Option<&'a str>,
        now: Timestamp,
    ) -> Result<SessionRecord, StoreError>;

    /// メッセージを追記し、セッションの last_activity を更新する
    async fn add_message(&self, message: &NewMessage) -> Result<(), StoreError>;

    /// セッションの参加者数ミラーを更新する
    async fn set_participant_count(
        &self,
        session_id: &SessionId,
        count: u32,
    ) -> Result<(), StoreError>;

    /// セッションを非アクティブにする
    async fn deactivate(&self, session_id: &SessionId) -> Result<(), StoreError>;

    /// セッションのメッセージ履歴を古い順に取得する
    async fn list_messages(
        &self,
        session_id: &SessionId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<StoredMessage>, StoreError>;
}
