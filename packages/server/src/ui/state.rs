//! Server state and connection management.

use std::sync::Arc;

use crate::domain::MessagePusher;
use crate::usecase::{
    DisconnectUseCase, GameEventUseCase, JoinSessionUseCase, SendMessageUseCase,
};

/// Shared application state
pub struct AppState {
    /// JoinSessionUseCase（セッション参加のユースケース）
    pub join_session_usecase: Arc<JoinSessionUseCase>,
    /// SendMessageUseCase（メッセージ送信のユースケース）
    pub send_message_usecase: Arc<SendMessageUseCase>,
    /// GameEventUseCase（ゲームイベント中継のユースケース）
    pub game_event_usecase: Arc<GameEventUseCase>,
    /// DisconnectUseCase（切断処理のユースケース）
    pub disconnect_usecase: Arc<DisconnectUseCase>,
    /// MessagePusher（メッセージ通知の抽象化）
    pub pusher: Arc<dyn MessagePusher>,
}
