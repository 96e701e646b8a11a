//! Retry-then-fallback 永続化アダプタ
//!
//! 順序付きバックエンドリスト（プライマリ → フォールバック）に対して
//! 一律の書き込み規律を適用します:
//!
//! - 変更系はプライマリから順に試行し、失敗したらログを残して次の
//!   バックエンドへ。全滅した場合もログを残して握りつぶす。
//!   永続化はベストエフォートであり、ライブ配信経路を決して
//!   ブロックしたり失敗させたりしない。
//! - 読み取り（履歴リプレイ）は、そのセッションについて直近の書き込みが
//!   成功したバックエンドを優先する。どこにもデータがなければ空の履歴を
//!   返す（エラーにしない）。
//!
//! `SessionStore` trait 自体は実装しません。失敗の扱いがバックエンドと
//! 根本的に異なるためです。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{
    NewMessage, SessionId, SessionRecord, SessionStore, StoreError, StoredMessage, Timestamp,
};

/// 二重バックエンドを束ねるアダプタ
pub struct FallbackSessionStore {
    backends: Vec<Arc<dyn SessionStore>>,
    /// セッションごとに、直近の書き込みが成功したバックエンドの添字
    last_good: Mutex<HashMap<SessionId, usize>>,
}

impl FallbackSessionStore {
    /// プライマリとフォールバックからアダプタを作成
    pub fn new(primary: Arc<dyn SessionStore>, fallback: Arc<dyn SessionStore>) -> Self {
        Self::from_backends(vec![primary, fallback])
    }

    /// 順序付きバックエンドリストからアダプタを作成
    pub fn from_backends(backends: Vec<Arc<dyn SessionStore>>) -> Self {
        assert!(!backends.is_empty(), "at least one backend is required");
        Self {
            backends,
            last_good: Mutex::new(HashMap::new()),
        }
    }

    async fn record_success(&self, session_id: &SessionId, index: usize) {
        let mut last_good = self.last_good.lock().await;
        last_good.insert(session_id.clone(), index);
    }

    async fn preferred_index(&self, session_id: &SessionId) -> usize {
        let last_good = self.last_good.lock().await;
        last_good.get(session_id).copied().unwrap_or(0)
    }

    /// セッション行を作成または再アクティブ化する（ベストエフォート）
    ///
    /// 全バックエンドが失敗した場合は `None` を返す。呼び出し側は
    /// 永続化なしで処理を続行する。
    pub async fn create_or_get_session(
        &self,
        session_id: &SessionId,
        title: Option<&str>,
        now: Timestamp,
    ) -> Option<SessionRecord> {
        for (index, backend) in self.backends.iter().enumerate() {
            match backend.create_or_get_session(session_id, title, now).await {
                Ok(record) => {
                    self.record_success(session_id, index).await;
                    return Some(record);
                }
                Err(e) => log_backend_failure("create_or_get_session", session_id, index, &e),
            }
        }
        log_total_failure("create_or_get_session", session_id);
        None
    }

    /// メッセージを追記する（ベストエフォート）
    pub async fn add_message(&self, message: &NewMessage) {
        let session_id = message.session_id.clone();
        for (index, backend) in self.backends.iter().enumerate() {
            match backend.add_message(message).await {
                Ok(()) => {
                    self.record_success(&session_id, index).await;
                    return;
                }
                Err(e) => log_backend_failure("add_message", &session_id, index, &e),
            }
        }
        log_total_failure("add_message", &session_id);
    }

    /// 参加者数ミラーを更新する（ベストエフォート）
    pub async fn set_participant_count(&self, session_id: &SessionId, count: u32) {
        for (index, backend) in self.backends.iter().enumerate() {
            match backend.set_participant_count(session_id, count).await {
                Ok(()) => {
                    self.record_success(session_id, index).await;
                    return;
                }
                Err(e) => log_backend_failure("set_participant_count", session_id, index, &e),
            }
        }
        log_total_failure("set_participant_count", session_id);
    }

    /// セッションを非アクティブにする（ベストエフォート）
    pub async fn deactivate(&self, session_id: &SessionId) {
        for (index, backend) in self.backends.iter().enumerate() {
            match backend.deactivate(session_id).await {
                Ok(()) => {
                    self.record_success(session_id, index).await;
                    return;
                }
                Err(e) => log_backend_failure("deactivate", session_id, index, &e),
            }
        }
        log_total_failure("deactivate", session_id);
    }

    /// メッセージ履歴を取得する
    ///
    /// 直近の書き込みが成功したバックエンドを優先し、空なら他の
    /// バックエンドも確認する。どこにもなければ空の履歴を返す。
    pub async fn list_messages(
        &self,
        session_id: &SessionId,
        limit: u32,
        offset: u32,
    ) -> Vec<StoredMessage> {
        let preferred = self.preferred_index(session_id).await;

        let mut order: Vec<usize> = (0..self.backends.len()).collect();
        order.sort_by_key(|&i| if i == preferred { 0 } else { 1 });

        for index in order {
            match self.backends[index]
                .list_messages(session_id, limit, offset)
                .await
            {
                Ok(messages) if !messages.is_empty() => return messages,
                Ok(_) => {}
                Err(e) => log_backend_failure("list_messages", session_id, index, &e),
            }
        }

        Vec::new()
    }
}

fn log_backend_failure(operation: &str, session_id: &SessionId, index: usize, error: &StoreError) {
    tracing::warn!(
        "Store backend #{} failed during {} for session '{}': {}",
        index,
        operation,
        session_id,
        error
    );
}

fn log_total_failure(operation: &str, session_id: &SessionId) {
    tracing::error!(
        "All store backends failed during {} for session '{}'; continuing without persistence",
        operation,
        session_id
    );
}
