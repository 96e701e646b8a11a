//! セッションコアの結合テスト
//!
//! ネットワーク層を介さず、ハンドラと同じ順序でユースケースを呼び出して
//! セッションのライフサイクル全体（参加 → 配信 → 履歴リプレイ → 退出 →
//! 回収 → 再参加）を検証します。

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use kotatsu_server::domain::{
    ConnectionId, MessageKind, MessagePusher, NewMessage, PlayerName, SessionId, SessionRegistry,
    Timestamp, classify_content,
};
use kotatsu_server::infrastructure::dto::websocket::{ServerEvent, WireMessage};
use kotatsu_server::infrastructure::pusher::WebSocketMessagePusher;
use kotatsu_server::infrastructure::repository::{FallbackSessionStore, InMemorySessionStore};
use kotatsu_server::usecase::{
    BroadcastError, DisconnectUseCase, JoinSessionUseCase, ReapIdleSessionsUseCase,
    SendMessageUseCase,
};
use kotatsu_shared::time::FixedClock;

struct Core {
    registry: Arc<Mutex<SessionRegistry>>,
    store: Arc<FallbackSessionStore>,
    pusher: Arc<WebSocketMessagePusher>,
    join: JoinSessionUseCase,
    send: SendMessageUseCase,
    disconnect: DisconnectUseCase,
}

fn create_core() -> Core {
    let registry = Arc::new(Mutex::new(SessionRegistry::new()));
    let store = Arc::new(FallbackSessionStore::from_backends(vec![Arc::new(
        InMemorySessionStore::new(),
    )]));
    let pusher = Arc::new(WebSocketMessagePusher::new());
    Core {
        join: JoinSessionUseCase::new(registry.clone(), store.clone()),
        send: SendMessageUseCase::new(registry.clone(), store.clone(), pusher.clone()),
        disconnect: DisconnectUseCase::new(registry.clone(), store.clone(), pusher.clone()),
        registry,
        store,
        pusher,
    }
}

fn sid(raw: &str) -> SessionId {
    SessionId::new(raw.to_string()).unwrap()
}

fn name(raw: &str) -> PlayerName {
    PlayerName::new(raw.to_string()).unwrap()
}

/// ハンドラと同じ手順で chat message の NewMessage と配信ペイロードを作る
fn chat_event(session: &str, sender: &str, text: &str, now: i64) -> (NewMessage, String) {
    let message = NewMessage {
        session_id: sid(session),
        sender: name(sender),
        body: text.to_string(),
        kind: classify_content(text, false),
        question_number: None,
        image_ref: None,
        timestamp: Timestamp::new(now),
    };
    let payload = serde_json::to_string(&ServerEvent::ChatMessage(WireMessage::from(
        message.clone().into_stored(),
    )))
    .unwrap();
    (message, payload)
}

async fn connect(core: &Core) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
    let connection_id = ConnectionId::new();
    let (tx, rx) = mpsc::unbounded_channel();
    core.pusher.register(connection_id, tx).await;
    (connection_id, rx)
}

fn recv_chat(rx: &mut mpsc::UnboundedReceiver<String>) -> WireMessage {
    let raw = rx.try_recv().expect("expected a fan-out payload");
    match serde_json::from_str::<ServerEvent>(&raw).unwrap() {
        ServerEvent::ChatMessage(message) => message,
        other => panic!("expected chat message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_end_to_end_session_flow() {
    // テスト項目: 参加 → 配信 → 履歴リプレイ → 退出までの一連の流れ
    // given (前提条件):
    let core = create_core();
    let (alice, mut alice_rx) = connect(&core).await;

    // when (操作): alice が "ABCD" に参加する
    let output = core
        .join
        .execute(sid("ABCD"), alice, name("alice"), 1000)
        .await;

    // then (期待する結果): 初回参加なので履歴は空
    assert_eq!(output.participant_count, 1);
    assert!(output.history.is_empty());
    assert!(output.others.is_empty());

    // when (操作): alice が "hi" を送る
    let (message, payload) = chat_event("ABCD", "alice", "hi", 2000);
    let targets = core.send.execute(alice, message, payload).await.unwrap();

    // then (期待する結果): 送信者自身にもファンアウトされる
    assert_eq!(targets, vec![alice]);
    let echoed = recv_chat(&mut alice_rx);
    assert_eq!(echoed.sender, "alice");
    assert_eq!(echoed.text.as_deref(), Some("hi"));
    assert_eq!(echoed.message_type, MessageKind::Chat);

    // 永続化は fire-and-forget なので書き込み完了を待つ
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // when (操作): bob が後から参加する
    let (bob, mut bob_rx) = connect(&core).await;
    let output = core.join.execute(sid("ABCD"), bob, name("bob"), 3000).await;

    // then (期待する結果): 履歴リプレイに alice のメッセージが入っている
    assert_eq!(output.participant_count, 2);
    assert_eq!(output.history.len(), 1);
    assert_eq!(output.history[0].body, "hi");
    assert_eq!(output.others, vec![alice]);

    // when (操作): bob が送信すると両方に届く
    let (message, payload) = chat_event("ABCD", "bob", "hello", 4000);
    let targets = core.send.execute(bob, message, payload).await.unwrap();
    assert_eq!(targets.len(), 2);
    assert_eq!(recv_chat(&mut alice_rx).text.as_deref(), Some("hello"));
    assert_eq!(recv_chat(&mut bob_rx).text.as_deref(), Some("hello"));

    // when (操作): alice が切断する
    let outcome = core.disconnect.execute(alice).await.unwrap();
    assert!(!outcome.evicted);
    assert_eq!(outcome.remaining, 1);

    // then (期待する結果): bob は引き続きメンバーなので送信できる
    let (message, payload) = chat_event("ABCD", "bob", "still here", 5000);
    assert!(core.send.execute(bob, message, payload).await.is_ok());

    // 切断済みの alice の接続からの送信はメンバーシップ違反になる
    let (message, payload) = chat_event("ABCD", "alice", "ghost", 6000);
    assert_eq!(
        core.send.execute(alice, message, payload).await,
        Err(BroadcastError::NotAMember("ABCD".to_string()))
    );
}

#[tokio::test]
async fn test_last_leave_evicts_room_and_rejoin_reactivates() {
    // テスト項目: 最後の退出でルームが消え、再参加で復活する
    // given (前提条件):
    let core = create_core();
    let (alice, _rx) = connect(&core).await;
    core.join
        .execute(sid("WXYZ"), alice, name("alice"), 1000)
        .await;

    // when (操作): alice が切断する
    let outcome = core.disconnect.execute(alice).await.unwrap();

    // then (期待する結果): ルームはレジストリから消える
    assert!(outcome.evicted);
    assert!(core.registry.lock().await.get(&sid("WXYZ")).is_none());

    // when (操作): 同じコードで再参加する
    let (alice2, _rx2) = connect(&core).await;
    let output = core
        .join
        .execute(sid("WXYZ"), alice2, name("alice"), 2000)
        .await;

    // then (期待する結果): 参加者 1 人のアクティブなルームとして復活する
    assert_eq!(output.participant_count, 1);
    assert!(core.registry.lock().await.get(&sid("WXYZ")).is_some());
}

#[tokio::test]
async fn test_reaper_orphans_live_connections() {
    // テスト項目: 回収されたルームの接続は次の送信で再参加を要求される
    // given (前提条件): しきい値 5000ms、最終アクティビティ 1000、現在 10_000
    let core = create_core();
    let reaper = ReapIdleSessionsUseCase::new(
        core.registry.clone(),
        core.store.clone(),
        Arc::new(FixedClock::new(10_000)),
        5000,
    );
    let (alice, _rx) = connect(&core).await;
    core.join
        .execute(sid("ABCD"), alice, name("alice"), 1000)
        .await;

    // when (操作): スイープが走る
    let evicted = reaper.execute().await;
    assert_eq!(evicted, vec![sid("ABCD")]);

    // then (期待する結果): 取り残された接続の送信はメンバーシップ違反になる
    let (message, payload) = chat_event("ABCD", "alice", "anyone?", 11_000);
    assert_eq!(
        core.send.execute(alice, message, payload).await,
        Err(BroadcastError::NotAMember("ABCD".to_string()))
    );

    // 再参加すれば送信できるようになる
    core.join
        .execute(sid("ABCD"), alice, name("alice"), 12_000)
        .await;
    let (message, payload) = chat_event("ABCD", "alice", "back", 13_000);
    assert!(core.send.execute(alice, message, payload).await.is_ok());
}
