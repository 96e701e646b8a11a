//! Server execution logic.

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::domain::MessagePusher;
use crate::usecase::{
    DisconnectUseCase, GameEventUseCase, JoinSessionUseCase, ReapIdleSessionsUseCase,
    SendMessageUseCase,
};

use super::{
    handler::{health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// WebSocket session server
///
/// This struct encapsulates the server configuration and provides methods to
/// run the server.
///
/// # Example
///
/// ```ignore
/// let server = Server::new(
///     join_session_usecase,
///     send_message_usecase,
///     game_event_usecase,
///     disconnect_usecase,
///     reap_idle_sessions_usecase,
///     pusher,
///     Duration::from_secs(60),
/// );
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    /// JoinSessionUseCase（セッション参加のユースケース）
    join_session_usecase: Arc<JoinSessionUseCase>,
    /// SendMessageUseCase（メッセージ送信のユースケース）
    send_message_usecase: Arc<SendMessageUseCase>,
    /// GameEventUseCase（ゲームイベント中継のユースケース）
    game_event_usecase: Arc<GameEventUseCase>,
    /// DisconnectUseCase（切断処理のユースケース）
    disconnect_usecase: Arc<DisconnectUseCase>,
    /// ReapIdleSessionsUseCase（アイドルセッション回収のユースケース）
    reap_idle_sessions_usecase: Arc<ReapIdleSessionsUseCase>,
    /// MessagePusher（メッセージ通知の抽象化）
    pusher: Arc<dyn MessagePusher>,
    /// Reaper のスイープ間隔
    sweep_interval: Duration,
}

impl Server {
    /// Create a new Server instance
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        join_session_usecase: Arc<JoinSessionUseCase>,
        send_message_usecase: Arc<SendMessageUseCase>,
        game_event_usecase: Arc<GameEventUseCase>,
        disconnect_usecase: Arc<DisconnectUseCase>,
        reap_idle_sessions_usecase: Arc<ReapIdleSessionsUseCase>,
        pusher: Arc<dyn MessagePusher>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            join_session_usecase,
            send_message_usecase,
            game_event_usecase,
            disconnect_usecase,
            reap_idle_sessions_usecase,
            pusher,
            sweep_interval,
        }
    }

    /// Run the WebSocket session server
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address
    /// or if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let app_state = Arc::new(AppState {
            join_session_usecase: self.join_session_usecase,
            send_message_usecase: self.send_message_usecase,
            game_event_usecase: self.game_event_usecase,
            disconnect_usecase: self.disconnect_usecase,
            pusher: self.pusher,
        });

        // Reaper は接続処理とは独立したタイマーで動く
        let reaper = self.reap_idle_sessions_usecase;
        let sweep_interval = self.sweep_interval;
        let reaper_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = reaper.execute().await;
                if !evicted.is_empty() {
                    tracing::info!("Reaper evicted {} idle session(s)", evicted.len());
                }
            }
        });

        // Define handlers
        let app = Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state);

        // Bind the server to the host and port
        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        // Start the server
        tracing::info!(
            "WebSocket session server listening on {}",
            listener.local_addr()?
        );
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        // Set up graceful shutdown signal handler
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        reaper_task.abort();
        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
