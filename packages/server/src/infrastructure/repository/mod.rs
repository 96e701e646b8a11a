//! 永続セッションストアの実装
//!
//! `SessionStore` trait の具体的な実装と、二重バックエンドを束ねる
//! フォールバックアダプタを提供します。
//!
//! - `sqlite`: SQLite（プライマリ）
//! - `inmemory`: インメモリ（フォールバック）
//! - `fallback`: retry-then-fallback アダプタ

pub mod fallback;
pub mod inmemory;
pub mod sqlite;
#[cfg(test)]
pub mod testing;

pub use fallback::FallbackSessionStore;
pub use inmemory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;
