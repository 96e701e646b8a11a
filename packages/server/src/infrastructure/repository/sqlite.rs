//! SQLite SessionStore 実装
//!
//! プライマリの永続バックエンド。sqlx のランタイムクエリを使用します
//! （コンパイル時マクロは使わない）。スキーマは接続時にブートストラップ
//! します。

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::domain::{
    MessageKind, NewMessage, PlayerName, SessionId, SessionRecord, SessionStore, StoreError,
    StoredMessage, Timestamp,
};

/// SQLite をバックエンドとする SessionStore
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: String,
    title: Option<String>,
    participant_count: i64,
    is_active: i64,
    created_at: i64,
    last_activity: i64,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    session_id: String,
    sender: String,
    body: String,
    kind: String,
    question_number: Option<i64>,
    image_ref: Option<String>,
    timestamp: i64,
}

impl SqliteSessionStore {
    /// データベースに接続し、スキーマをブートストラップする
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite 接続 URL（例: `sqlite://kotatsu.db?mode=rwc`,
    ///   `sqlite::memory:`）
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        // SQLite は単一ライターなので接続は 1 本で直列化する
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self { pool };
        store.bootstrap_schema().await?;
        Ok(store)
    }

    async fn bootstrap_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                title TEXT,
                participant_count INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                last_activity INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                sender TEXT NOT NULL,
                body TEXT NOT NULL,
                kind TEXT NOT NULL,
                question_number INTEGER,
                image_ref TEXT,
                timestamp INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(())
    }

    async fn fetch_session(&self, session_id: &SessionId) -> Result<SessionRecord, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT session_id, title, participant_count, is_active, created_at, last_activity
             FROM sessions WHERE session_id = ?",
        )
        .bind(session_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        row_to_record(row)
    }
}

fn row_to_record(row: SessionRow) -> Result<SessionRecord, StoreError> {
    Ok(SessionRecord {
        session_id: SessionId::new(row.session_id).map_err(|e| StoreError::InvalidRow(e.to_string()))?,
        title: row.title,
        participant_count: row.participant_count.max(0) as u32,
        is_active: row.is_active != 0,
        created_at: Timestamp::new(row.created_at),
        last_activity: Timestamp::new(row.last_activity),
    })
}

fn row_to_message(row: MessageRow) -> Result<StoredMessage, StoreError> {
    let kind = match row.kind.as_str() {
        "chat" => MessageKind::Chat,
        "emoji" => MessageKind::Emoji,
        "image" => MessageKind::Image,
        "question" => MessageKind::Question,
        "answer" => MessageKind::Answer,
        "game" => MessageKind::Game,
        "system" => MessageKind::System,
        other => return Err(StoreError::InvalidRow(format!("unknown kind '{other}'"))),
    };

    Ok(StoredMessage {
        session_id: SessionId::new(row.session_id).map_err(|e| StoreError::InvalidRow(e.to_string()))?,
        sender: PlayerName::new(row.sender).map_err(|e| StoreError::InvalidRow(e.to_string()))?,
        body: row.body,
        kind,
        question_number: row.question_number.map(|n| n.max(0) as u32),
        image_ref: row.image_ref,
        timestamp: Timestamp::new(row.timestamp),
    })
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create_or_get_session<'a>(
        &self,
        session_id: &SessionId,
        title: Option<&'a str>,
        now: Timestamp,
    ) -> Result<SessionRecord, StoreError> {
        let inserted = sqlx::query(
            "INSERT INTO sessions (session_id, title, participant_count, is_active, created_at, last_activity)
             VALUES (?, ?, 0, 1, ?, ?)",
        )
        .bind(session_id.as_str())
        .bind(title)
        .bind(now.value())
        .bind(now.value())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                // 同時 create の一意性違反: 既存行を再アクティブ化して再読する
                sqlx::query(
                    "UPDATE sessions SET is_active = 1, last_activity = ? WHERE session_id = ?",
                )
                .bind(now.value())
                .bind(session_id.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
            Err(e) => return Err(StoreError::Unavailable(e.to_string())),
        }

        self.fetch_session(session_id).await
    }

    async fn add_message(&self, message: &NewMessage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO messages (session_id, sender, body, kind, question_number, image_ref, timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.session_id.as_str())
        .bind(message.sender.as_str())
        .bind(&message.body)
        .bind(message.kind.as_str())
        .bind(message.question_number.map(i64::from))
        .bind(&message.image_ref)
        .bind(message.timestamp.value())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        sqlx::query("UPDATE sessions SET last_activity = ? WHERE session_id = ?")
            .bind(message.timestamp.value())
            .bind(message.session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(())
    }

    async fn set_participant_count(
        &self,
        session_id: &SessionId,
        count: u32,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE sessions SET participant_count = ? WHERE session_id = ?")
            .bind(i64::from(count))
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn deactivate(&self, session_id: &SessionId) -> Result<(), StoreError> {
        sqlx::query("UPDATE sessions SET is_active = 0 WHERE session_id = ?")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn list_messages(
        &self,
        session_id: &SessionId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT session_id, sender, body, kind, question_number, image_ref, timestamp
             FROM messages WHERE session_id = ? ORDER BY id ASC LIMIT ? OFFSET ?",
        )
        .bind(session_id.as_str())
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        rows.into_iter().map(row_to_message).collect()
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}
