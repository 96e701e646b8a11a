//! InMemory SessionStore 実装
//!
//! ドメイン層が定義する SessionStore trait のフォールバック実装。
//! HashMap をインメモリ DB として使用します。プライマリ（SQLite）が
//! 利用できない間の受け皿であり、プロセス終了で内容は消えます。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    NewMessage, SessionId, SessionRecord, SessionStore, StoreError, StoredMessage, Timestamp,
};

struct SessionData {
    record: SessionRecord,
    messages: Vec<StoredMessage>,
}

/// インメモリ SessionStore 実装
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, SessionData>>,
}

impl InMemorySessionStore {
    /// 新しい InMemorySessionStore を作成
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_or_get_session<'a>(
        &self,
        session_id: &SessionId,
        title: Option<&'a str>,
        now: Timestamp,
    ) -> Result<SessionRecord, StoreError> {
        let mut sessions = self.sessions.lock().await;

        if let Some(data) = sessions.get_mut(session_id) {
            // 既存行は再アクティブ化して返す（行を複製しない）
            data.record.is_active = true;
            data.record.last_activity = now;
            return Ok(data.record.clone());
        }

        let record = SessionRecord {
            session_id: session_id.clone(),
            title: title.map(str::to_string),
            participant_count: 0,
            is_active: true,
            created_at: now,
            last_activity: now,
        };
        sessions.insert(
            session_id.clone(),
            SessionData {
                record: record.clone(),
                messages: Vec::new(),
            },
        );
        Ok(record)
    }

    async fn add_message(&self, message: &NewMessage) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;

        // プライマリだけが create を見た後にフォールバックへ書き込みが
        // 落ちてくることがあるため、未知のセッションは遅延作成する
        let data = sessions
            .entry(message.session_id.clone())
            .or_insert_with(|| SessionData {
                record: SessionRecord {
                    session_id: message.session_id.clone(),
                    title: None,
                    participant_count: 0,
                    is_active: true,
                    created_at: message.timestamp,
                    last_activity: message.timestamp,
                },
                messages: Vec::new(),
            });

        data.messages.push(message.clone().into_stored());
        data.record.last_activity = message.timestamp;
        Ok(())
    }

    async fn set_participant_count(
        &self,
        session_id: &SessionId,
        count: u32,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(data) = sessions.get_mut(session_id) {
            data.record.participant_count = count;
        }
        Ok(())
    }

    async fn deactivate(&self, session_id: &SessionId) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(data) = sessions.get_mut(session_id) {
            data.record.is_active = false;
        }
        Ok(())
    }

    async fn list_messages(
        &self,
        session_id: &SessionId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let sessions = self.sessions.lock().await;
        let Some(data) = sessions.get(session_id) else {
            return Ok(Vec::new());
        };

        Ok(data
            .messages
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
