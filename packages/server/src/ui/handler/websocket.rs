//! WebSocket connection handlers.
//!
//! 1 接続 = 1 タスクペア（受信ループ + 送信ループ）。受信したイベントは
//! すべて UseCase 層を経由してルームに反映され、この接続への配信は
//! 登録済みの mpsc チャンネル経由で送信ループが行います。

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{
    domain::{
        ConnectionId, NewMessage, PlayerName, PusherChannel, SessionId, Timestamp,
        classify_content, MessageKind,
    },
    infrastructure::dto::websocket::{ClientEvent, ServerEvent, WireMessage},
    ui::state::AppState,
};
use kotatsu_shared::time::now_timestamp;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Spawns a task that receives messages from the rx channel and pushes them
/// to the WebSocket sender.
///
/// This function handles the outbound message flow: history replay, join
/// confirmations, and fan-out from other participants all arrive on the rx
/// channel and are written to this client's WebSocket connection.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

/// Send an error event to the originating connection only
fn send_error(tx: &PusherChannel, message: String) {
    let event = ServerEvent::Error { message };
    let json = serde_json::to_string(&event).unwrap();
    let _ = tx.send(json);
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = ConnectionId::new();
    let (sender, mut receiver) = socket.split();

    // Create a channel for this connection to receive messages
    let (tx, rx) = mpsc::unbounded_channel();
    state.pusher.register(connection_id, tx.clone()).await;
    tracing::info!("Connection '{}' established", connection_id);

    let mut send_task = pusher_loop(rx, sender);

    let state_clone = state.clone();
    let mut recv_task = tokio::spawn(async move {
        // join-session で確定した表示名。chat message イベントは送信者名を
        // 運ばないため、接続ごとにここで記憶する
        let mut joined_name: Option<PlayerName> = None;

        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!("WebSocket error on '{}': {}", connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let event = match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!("Malformed event from '{}': {}", connection_id, e);
                            send_error(&tx, format!("malformed event: {}", e));
                            continue;
                        }
                    };
                    handle_client_event(&state_clone, connection_id, event, &mut joined_name, &tx)
                        .await;
                }
                Message::Ping(_) => {
                    tracing::debug!("Received ping");
                    // Ping/pong is handled automatically by the WebSocket protocol
                }
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", connection_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    // Closing the connection is an implicit leave
    if let Some(outcome) = state.disconnect_usecase.execute(connection_id).await {
        tracing::info!(
            "Connection '{}' left session '{}' ({} remaining)",
            connection_id,
            outcome.session_id,
            outcome.remaining
        );
        let left = ServerEvent::UserLeft {
            session_id: outcome.session_id.as_str().to_string(),
            player_name: outcome.player_name.as_str().to_string(),
            participant_count: outcome.remaining as u32,
        };
        let left_json = serde_json::to_string(&left).unwrap();
        state
            .disconnect_usecase
            .broadcast_user_left(&outcome, &left_json)
            .await;
    } else {
        tracing::info!("Connection '{}' closed before joining", connection_id);
    }
}

/// Dispatch one inbound client event through the UseCase layer
async fn handle_client_event(
    state: &Arc<AppState>,
    connection_id: ConnectionId,
    event: ClientEvent,
    joined_name: &mut Option<PlayerName>,
    tx: &PusherChannel,
) {
    match event {
        ClientEvent::JoinSession {
            session_id,
            player_name,
        } => {
            let (session_id, player_name) =
                match validate_identity(session_id, player_name) {
                    Ok(pair) => pair,
                    Err(message) => return send_error(tx, message),
                };

            let now = now_timestamp();
            let output = state
                .join_session_usecase
                .execute(session_id.clone(), connection_id, player_name.clone(), now)
                .await;
            *joined_name = Some(player_name.clone());

            // 履歴リプレイと参加確認は参加者本人だけに、この順で送る
            let history = ServerEvent::ChatHistory {
                session_id: session_id.as_str().to_string(),
                messages: output.history.into_iter().map(WireMessage::from).collect(),
            };
            let _ = tx.send(serde_json::to_string(&history).unwrap());

            let joined = ServerEvent::SessionJoined {
                session_id: session_id.as_str().to_string(),
                player_name: player_name.as_str().to_string(),
                participant_count: output.participant_count,
            };
            let _ = tx.send(serde_json::to_string(&joined).unwrap());

            // 別ルームからの移動なら、元のルームの残留参加者に user-left を送る
            if let Some(departed) = output.departed
                && !departed.targets.is_empty()
            {
                let left = ServerEvent::UserLeft {
                    session_id: departed.outcome.session_id.as_str().to_string(),
                    player_name: departed.outcome.player_name.as_str().to_string(),
                    participant_count: departed.outcome.remaining as u32,
                };
                let json = serde_json::to_string(&left).unwrap();
                if let Err(e) = state.pusher.broadcast(departed.targets, &json).await {
                    tracing::warn!("user-left fan-out failed: {}", e);
                }
            }

            if !output.others.is_empty() {
                let user_joined = ServerEvent::UserJoined {
                    session_id: session_id.as_str().to_string(),
                    player_name: player_name.as_str().to_string(),
                    participant_count: output.participant_count,
                };
                let json = serde_json::to_string(&user_joined).unwrap();
                if let Err(e) = state.pusher.broadcast(output.others, &json).await {
                    tracing::warn!("user-joined fan-out failed: {}", e);
                }
            }
        }

        ClientEvent::ChatMessage {
            session_id,
            text,
            image_data,
            image_url,
            image_type: _,
            timestamp: _,
        } => {
            let session_id = match SessionId::new(session_id) {
                Ok(id) => id,
                Err(e) => return send_error(tx, e.to_string()),
            };
            let Some(sender) = joined_name.clone() else {
                return send_error(tx, "join a session before sending messages".to_string());
            };

            let image_ref = image_data.or(image_url);
            let body = text.unwrap_or_default();
            if body.trim().is_empty() && image_ref.is_none() {
                return send_error(tx, "message must not be empty".to_string());
            }

            let kind = classify_content(&body, image_ref.is_some());
            let message = NewMessage {
                session_id,
                sender,
                body,
                kind,
                question_number: None,
                image_ref,
                // クライアントのタイムスタンプは参考値。配信・保存には
                // サーバー時刻を使う
                timestamp: Timestamp::new(now_timestamp()),
            };
            broadcast_message(state, connection_id, message, tx).await;
        }

        ClientEvent::AskQuestion {
            session_id,
            question,
            player_name,
            question_number,
        } => {
            let (session_id, sender) = match validate_identity(session_id, player_name) {
                Ok(pair) => pair,
                Err(message) => return send_error(tx, message),
            };
            if question.trim().is_empty() {
                return send_error(tx, "question must not be empty".to_string());
            }

            let message = NewMessage {
                session_id,
                sender,
                body: question,
                kind: MessageKind::Question,
                question_number,
                image_ref: None,
                timestamp: Timestamp::new(now_timestamp()),
            };
            broadcast_message(state, connection_id, message, tx).await;
        }

        ClientEvent::QuestionAnswer {
            session_id,
            question: _,
            answer,
            player_name,
            question_number,
        } => {
            let (session_id, sender) = match validate_identity(session_id, player_name) {
                Ok(pair) => pair,
                Err(message) => return send_error(tx, message),
            };
            if answer.trim().is_empty() {
                return send_error(tx, "answer must not be empty".to_string());
            }

            // 回答は質問テキストでしか対応付けられない（安定した質問 ID は
            // 運ばない）。表示側はテキスト一致で突き合わせる
            let message = NewMessage {
                session_id,
                sender,
                body: answer,
                kind: MessageKind::Answer,
                question_number,
                image_ref: None,
                timestamp: Timestamp::new(now_timestamp()),
            };
            broadcast_message(state, connection_id, message, tx).await;
        }

        ClientEvent::TruthOrDareSpinStart {
            session_id,
            player_name,
        } => {
            let (session_id, sender) = match validate_identity(session_id, player_name) {
                Ok(pair) => pair,
                Err(message) => return send_error(tx, message),
            };

            let relay = ServerEvent::TruthOrDareSpinStart {
                session_id: session_id.as_str().to_string(),
                player_name: sender.as_str().to_string(),
            };
            let payload = serde_json::to_string(&relay).unwrap();
            let result = state
                .game_event_usecase
                .execute(
                    connection_id,
                    session_id,
                    None,
                    vec![payload],
                    now_timestamp(),
                )
                .await;
            if let Err(e) = result {
                send_error(tx, e.to_string());
            }
        }

        ClientEvent::TruthOrDareSpinResult {
            session_id,
            player_name,
            result,
        } => {
            let (session_id, sender) = match validate_identity(session_id, player_name) {
                Ok(pair) => pair,
                Err(message) => return send_error(tx, message),
            };

            let now = now_timestamp();
            let relay = ServerEvent::TruthOrDareSpinResult {
                session_id: session_id.as_str().to_string(),
                player_name: sender.as_str().to_string(),
                result: result.clone(),
            };
            let game_payload = serde_json::to_string(&relay).unwrap();

            // スピン結果は通常のメッセージ履歴にも出すため、合成チャット
            // メッセージとしてもう 1 通配信・保存する
            let record = NewMessage {
                session_id: session_id.clone(),
                sender,
                body: format!("{}: {}", result.r#type.to_uppercase(), result.content),
                kind: MessageKind::Game,
                question_number: None,
                image_ref: None,
                timestamp: Timestamp::new(now),
            };
            let synthetic = ServerEvent::ChatMessage(WireMessage::from(record.clone().into_stored()));
            let chat_payload = serde_json::to_string(&synthetic).unwrap();

            let outcome = state
                .game_event_usecase
                .execute(
                    connection_id,
                    session_id,
                    Some(record),
                    vec![game_payload, chat_payload],
                    now,
                )
                .await;
            if let Err(e) = outcome {
                send_error(tx, e.to_string());
            }
        }
    }
}

/// Validate the raw session id / player name pair from an inbound event
fn validate_identity(
    session_id: String,
    player_name: String,
) -> Result<(SessionId, PlayerName), String> {
    let session_id = SessionId::new(session_id).map_err(|e| e.to_string())?;
    let player_name = PlayerName::new(player_name).map_err(|e| e.to_string())?;
    Ok((session_id, player_name))
}

/// Classified メッセージを SendMessageUseCase 経由で配信する
async fn broadcast_message(
    state: &Arc<AppState>,
    connection_id: ConnectionId,
    message: NewMessage,
    tx: &PusherChannel,
) {
    let wire = ServerEvent::ChatMessage(WireMessage::from(message.clone().into_stored()));
    let payload = serde_json::to_string(&wire).unwrap();
    if let Err(e) = state
        .send_message_usecase
        .execute(connection_id, message, payload)
        .await
    {
        send_error(tx, e.to_string());
    }
}
