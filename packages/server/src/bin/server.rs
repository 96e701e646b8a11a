//! WebSocket session server for paired chat sessions with mini-games.
//!
//! Clients join named sessions, exchange chat/game events, and receive a
//! history replay on (re)join. Idle sessions are reaped on a timer.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin server
//! cargo run --bin server -- --host 0.0.0.0 --port 3000 --database-url sqlite://kotatsu.db?mode=rwc
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kotatsu_server::{
    domain::SessionRegistry,
    infrastructure::{
        pusher::WebSocketMessagePusher,
        repository::{FallbackSessionStore, InMemorySessionStore, SqliteSessionStore},
    },
    ui::Server,
    usecase::{
        DisconnectUseCase, GameEventUseCase, JoinSessionUseCase, ReapIdleSessionsUseCase,
        SendMessageUseCase,
    },
};
use kotatsu_shared::{logger::setup_logger, time::SystemClock};
use tokio::sync::Mutex;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "WebSocket session server for paired chat with mini-games", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// SQLite connection URL for the primary message store
    #[arg(long, default_value = "sqlite://kotatsu.db?mode=rwc")]
    database_url: String,

    /// Seconds of inactivity before a session is reaped from the registry
    #[arg(long, default_value = "1800")]
    idle_timeout_secs: u64,

    /// Seconds between reaper sweeps
    #[arg(long, default_value = "60")]
    sweep_interval_secs: u64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger("kotatsu-server", env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. Store backends (SQLite primary + in-memory fallback)
    // 2. Registry / MessagePusher
    // 3. UseCases
    // 4. Server

    // 1. Create the persisted store adapter. A dead SQLite file degrades
    //    to in-memory-only persistence instead of refusing to start.
    let fallback = Arc::new(InMemorySessionStore::new());
    let store = match SqliteSessionStore::connect(&args.database_url).await {
        Ok(sqlite) => {
            tracing::info!("Primary store ready at {}", args.database_url);
            Arc::new(FallbackSessionStore::new(Arc::new(sqlite), fallback))
        }
        Err(e) => {
            tracing::error!(
                "Failed to open primary store at {}: {}; running with in-memory store only",
                args.database_url,
                e
            );
            Arc::new(FallbackSessionStore::from_backends(vec![fallback]))
        }
    };

    // 2. Create the registry and MessagePusher (WebSocket implementation)
    let registry = Arc::new(Mutex::new(SessionRegistry::new()));
    let pusher = Arc::new(WebSocketMessagePusher::new());

    // 3. Create UseCases
    let join_session_usecase = Arc::new(JoinSessionUseCase::new(registry.clone(), store.clone()));
    let send_message_usecase = Arc::new(SendMessageUseCase::new(
        registry.clone(),
        store.clone(),
        pusher.clone(),
    ));
    let game_event_usecase = Arc::new(GameEventUseCase::new(
        registry.clone(),
        store.clone(),
        pusher.clone(),
    ));
    let disconnect_usecase = Arc::new(DisconnectUseCase::new(
        registry.clone(),
        store.clone(),
        pusher.clone(),
    ));
    let reap_idle_sessions_usecase = Arc::new(ReapIdleSessionsUseCase::new(
        registry.clone(),
        store.clone(),
        Arc::new(SystemClock),
        (args.idle_timeout_secs * 1000) as i64,
    ));

    // 4. Create and run the server
    let server = Server::new(
        join_session_usecase,
        send_message_usecase,
        game_event_usecase,
        disconnect_usecase,
        reap_idle_sessions_usecase,
        pusher,
        Duration::from_secs(args.sweep_interval_secs),
    );
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
