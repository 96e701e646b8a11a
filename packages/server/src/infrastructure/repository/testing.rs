//! ユニットテスト用のストアバックエンド

use async_trait::async_trait;

use crate::domain::{
    NewMessage, SessionId, SessionRecord, SessionStore, StoreError, StoredMessage, Timestamp,
};

/// deactivate の呼び出しを記録するバックエンド
///
/// 非アクティブ化は fire-and-forget で行われるため、結果を待ってから
/// このスパイで呼び出しを検証する。その他の操作は成功を返すだけ。
pub struct RecordingStore {
    deactivated: std::sync::Mutex<Vec<SessionId>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            deactivated: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// これまでに非アクティブ化されたセッション ID（呼び出し順）
    pub fn deactivated(&self) -> Vec<SessionId> {
        self.deactivated.lock().unwrap().clone()
    }
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn create_or_get_session<'a>(
        &self,
        session_id: &SessionId,
        title: Option<&'a str>,
        now: Timestamp,
    ) -> Result<SessionRecord, StoreError> {
        Ok(SessionRecord {
            session_id: session_id.clone(),
            title: title.map(str::to_string),
            participant_count: 0,
            is_active: true,
            created_at: now,
            last_activity: now,
        })
    }

    async fn add_message(&self, _message: &NewMessage) -> Result<(), StoreError> {
        Ok(())
    }

    async fn set_participant_count(
        &self,
        _session_id: &SessionId,
        _count: u32,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn deactivate(&self, session_id: &SessionId) -> Result<(), StoreError> {
        self.deactivated.lock().unwrap().push(session_id.clone());
        Ok(())
    }

    async fn list_messages(
        &self,
        _session_id: &SessionId,
        _limit: u32,
        _offset: u32,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        Ok(Vec::new())
    }
}
