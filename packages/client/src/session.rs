//! WebSocket client session management.
//!
//! 接続ごとに 1 回実行され、join-session の送信、履歴リプレイの表示、
//! ライブ配信の表示を担当します。表示前のメッセージはすべて
//! [`Reconciler`] を通し、リプレイとライブの重複を 1 か所で排除します。

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use kotatsu_server::domain::MessageKind;
use kotatsu_server::infrastructure::dto::websocket::{
    ClientEvent, ServerEvent, SpinResult, WireMessage,
};
use kotatsu_shared::time::now_timestamp;

use crate::{error::ClientError, reconciler::Reconciler};

use super::{formatter::MessageFormatter, ui::redisplay_prompt};

/// 直近に受信した質問（/answer の対応付けに使う）
///
/// 質問は安定した ID を持たずテキストで対応付けるため、覚えておけるのは
/// 最後に見た 1 件だけです。
type LastQuestion = Arc<Mutex<Option<(String, Option<u32>)>>>;

const TRUTH_PROMPTS: [&str; 4] = [
    "What is the most embarrassing thing you have ever done?",
    "What is a secret you have never told anyone?",
    "Who was your first crush?",
    "What is the biggest lie you have ever told?",
];

const DARE_PROMPTS: [&str; 4] = [
    "Sing the chorus of your favorite song",
    "Speak in an accent for the next three messages",
    "Send the last photo you took",
    "Write a haiku about the other player",
];

/// Draw a truth-or-dare result locally
///
/// The spinner has no server-side randomness; each client draws its own
/// result and broadcasts it.
fn draw_spin_result(now: i64) -> SpinResult {
    let seconds = now.div_euclid(1000);
    let (kind, prompts) = if seconds % 2 == 0 {
        ("truth", &TRUTH_PROMPTS)
    } else {
        ("dare", &DARE_PROMPTS)
    };
    let index = seconds.div_euclid(2).rem_euclid(prompts.len() as i64) as usize;
    SpinResult {
        r#type: kind.to_string(),
        content: prompts[index].to_string(),
        difficulty: None,
    }
}

/// Run one WebSocket client session
///
/// The reconciler is shared across reconnects so a rejoin's history replay
/// does not redisplay messages the user has already seen.
pub async fn run_client_session(
    url: &str,
    session_id: &str,
    player_name: &str,
    reconciler: Arc<Mutex<Reconciler>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ws_stream, _response) = match connect_async(url).await {
        Ok(result) => result,
        Err(e) => {
            return Err(Box::new(ClientError::ConnectionError(e.to_string())));
        }
    };

    tracing::info!("Connected to session server!");
    println!(
        "\nYou are '{}' in session '{}'. Type messages and press Enter to send.\n\
         Commands: /ask <question>, /answer <text>, /spin, /img <url-or-data-uri>.\n\
         Press Ctrl+C to exit.\n",
        player_name, session_id
    );

    let (mut write, mut read) = ws_stream.split();

    // Join the session before anything else; history replay and the join
    // confirmation arrive as ordinary server events
    let join = ClientEvent::JoinSession {
        session_id: session_id.to_string(),
        player_name: player_name.to_string(),
    };
    write.send(Message::Text(serde_json::to_string(&join)?.into())).await?;

    let last_question: LastQuestion = Arc::new(Mutex::new(None));

    // Spawn a task to handle incoming messages
    let player_name_for_read = player_name.to_string();
    let last_question_for_read = last_question.clone();
    let mut read_task = tokio::spawn(async move {
        let mut connection_error = false;

        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            handle_server_event(
                                event,
                                &reconciler,
                                &last_question_for_read,
                                &player_name_for_read,
                            )
                            .await;
                        }
                        Err(_) => {
                            print!("{}", MessageFormatter::format_raw_message(&text));
                            redisplay_prompt(&player_name_for_read);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Server closed the connection");
                    connection_error = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    connection_error = true;
                    break;
                }
                _ => {}
            }
        }

        connection_error
    });

    // Create channel for rustyline input
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // Spawn a blocking thread for rustyline (synchronous readline)
    let prompt_name = player_name.to_string();
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        let prompt = format!("{}> ", prompt_name);

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            // Channel closed, exit thread
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    // Spawn a task to turn stdin lines into client events
    let session_id_for_write = session_id.to_string();
    let player_name_for_write = player_name.to_string();
    let mut write_task = tokio::spawn(async move {
        let mut write_error = false;
        let mut next_question_number: u32 = 1;

        while let Some(line) = input_rx.recv().await {
            let events = match build_events(
                &line,
                &session_id_for_write,
                &player_name_for_write,
                &mut next_question_number,
                &last_question,
            )
            .await
            {
                Some(events) => events,
                None => {
                    redisplay_prompt(&player_name_for_write);
                    continue;
                }
            };

            for event in events {
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to serialize event: {}", e);
                        continue;
                    }
                };

                if let Err(e) = write.send(Message::Text(json.into())).await {
                    tracing::warn!("Failed to send event: {}", e);
                    write_error = true;
                    break;
                }
            }
            if write_error {
                break;
            }
        }

        write_error
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        read_result = &mut read_task => {
            write_task.abort();
            let connection_error = read_result.unwrap_or(false);
            if connection_error {
                return Err(Box::new(ClientError::ConnectionError(
                    "Connection lost".to_string(),
                )));
            }
        }
        write_result = &mut write_task => {
            read_task.abort();
            let write_error = write_result.unwrap_or(false);
            if write_error {
                return Err(Box::new(ClientError::ConnectionError(
                    "Connection lost".to_string(),
                )));
            }
        }
    }

    Ok(())
}

/// Display one server event, gating messages through the reconciler
async fn handle_server_event(
    event: ServerEvent,
    reconciler: &Arc<Mutex<Reconciler>>,
    last_question: &LastQuestion,
    player_name: &str,
) {
    match event {
        ServerEvent::SessionJoined {
            session_id,
            player_name: joined_name,
            participant_count,
        } => {
            print!(
                "{}",
                MessageFormatter::format_session_joined(
                    &session_id,
                    &joined_name,
                    participant_count
                )
            );
            redisplay_prompt(player_name);
        }
        ServerEvent::ChatHistory { messages, .. } => {
            print!("{}", MessageFormatter::format_history_header(messages.len()));
            for message in messages {
                display_message(message, reconciler, last_question).await;
            }
            redisplay_prompt(player_name);
        }
        ServerEvent::UserJoined {
            player_name: who,
            participant_count,
            ..
        } => {
            print!(
                "{}",
                MessageFormatter::format_user_joined(&who, participant_count)
            );
            redisplay_prompt(player_name);
        }
        ServerEvent::UserLeft {
            player_name: who,
            participant_count,
            ..
        } => {
            print!(
                "{}",
                MessageFormatter::format_user_left(&who, participant_count)
            );
            redisplay_prompt(player_name);
        }
        ServerEvent::ChatMessage(message) => {
            display_message(message, reconciler, last_question).await;
            redisplay_prompt(player_name);
        }
        ServerEvent::TruthOrDareSpinStart {
            player_name: who, ..
        } => {
            print!("{}", MessageFormatter::format_spin_start(&who));
            redisplay_prompt(player_name);
        }
        ServerEvent::TruthOrDareSpinResult {
            player_name: who,
            result,
            ..
        } => {
            print!("{}", MessageFormatter::format_spin_result(&who, &result));
            redisplay_prompt(player_name);
        }
        ServerEvent::Error { message } => {
            print!("{}", MessageFormatter::format_error(&message));
            redisplay_prompt(player_name);
        }
    }
}

/// Print a message if the reconciler admits it, remembering questions for
/// later `/answer` correlation
async fn display_message(
    message: WireMessage,
    reconciler: &Arc<Mutex<Reconciler>>,
    last_question: &LastQuestion,
) {
    let admitted = reconciler.lock().await.admit(&message);
    if !admitted {
        tracing::debug!("Suppressed duplicate message from '{}'", message.sender);
        return;
    }
    if message.message_type == MessageKind::Question {
        let mut last = last_question.lock().await;
        *last = Some((
            message.text.clone().unwrap_or_default(),
            message.question_number,
        ));
    }
    print!("{}", MessageFormatter::format_message(&message));
}

/// Translate one input line into zero or more client events
///
/// Returns `None` when the line was consumed locally (bad command, missing
/// question to answer).
async fn build_events(
    line: &str,
    session_id: &str,
    player_name: &str,
    next_question_number: &mut u32,
    last_question: &LastQuestion,
) -> Option<Vec<ClientEvent>> {
    if let Some(question) = line.strip_prefix("/ask ") {
        let question_number = *next_question_number;
        *next_question_number += 1;
        return Some(vec![ClientEvent::AskQuestion {
            session_id: session_id.to_string(),
            question: question.trim().to_string(),
            player_name: player_name.to_string(),
            question_number: Some(question_number),
        }]);
    }

    if let Some(answer) = line.strip_prefix("/answer ") {
        let last = last_question.lock().await;
        let Some((question, question_number)) = last.clone() else {
            println!("(no question to answer yet)");
            return None;
        };
        return Some(vec![ClientEvent::QuestionAnswer {
            session_id: session_id.to_string(),
            question,
            answer: answer.trim().to_string(),
            player_name: player_name.to_string(),
            question_number,
        }]);
    }

    if line == "/spin" {
        // スピン開始と結果を続けて送る。結果はローカルで抽選する
        let result = draw_spin_result(now_timestamp());
        return Some(vec![
            ClientEvent::TruthOrDareSpinStart {
                session_id: session_id.to_string(),
                player_name: player_name.to_string(),
            },
            ClientEvent::TruthOrDareSpinResult {
                session_id: session_id.to_string(),
                player_name: player_name.to_string(),
                result,
            },
        ]);
    }

    if let Some(image) = line.strip_prefix("/img ") {
        let image = image.trim().to_string();
        let (image_data, image_url) = if image.starts_with("data:") {
            (Some(image), None)
        } else {
            (None, Some(image))
        };
        return Some(vec![ClientEvent::ChatMessage {
            session_id: session_id.to_string(),
            text: None,
            image_data,
            image_url,
            image_type: None,
            timestamp: Some(now_timestamp()),
        }]);
    }

    if line.starts_with('/') {
        println!("(unknown command: {})", line);
        return None;
    }

    Some(vec![ClientEvent::ChatMessage {
        session_id: session_id.to_string(),
        text: Some(line.to_string()),
        image_data: None,
        image_url: None,
        image_type: None,
        timestamp: Some(now_timestamp()),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last_question_with(question: &str, number: Option<u32>) -> LastQuestion {
        Arc::new(Mutex::new(Some((question.to_string(), number))))
    }

    #[tokio::test]
    async fn test_plain_line_becomes_chat_message() {
        // テスト項目: 通常の入力行が chat message イベントになる
        // given (前提条件):
        let mut counter = 1;
        let last = Arc::new(Mutex::new(None));

        // when (操作):
        let events = build_events("hello", "ABCD", "alice", &mut counter, &last)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(events.len(), 1);
        match &events[0] {
            ClientEvent::ChatMessage {
                session_id, text, ..
            } => {
                assert_eq!(session_id, "ABCD");
                assert_eq!(text.as_deref(), Some("hello"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ask_command_numbers_questions() {
        // テスト項目: /ask が質問番号を採番する
        // given (前提条件):
        let mut counter = 1;
        let last = Arc::new(Mutex::new(None));

        // when (操作):
        let first = build_events("/ask favorite food?", "ABCD", "alice", &mut counter, &last)
            .await
            .unwrap();
        let second = build_events("/ask favorite song?", "ABCD", "alice", &mut counter, &last)
            .await
            .unwrap();

        // then (期待する結果):
        match (&first[0], &second[0]) {
            (
                ClientEvent::AskQuestion {
                    question_number: n1,
                    ..
                },
                ClientEvent::AskQuestion {
                    question_number: n2,
                    ..
                },
            ) => {
                assert_eq!(*n1, Some(1));
                assert_eq!(*n2, Some(2));
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_answer_uses_last_seen_question() {
        // テスト項目: /answer が直近に見た質問と対応付けられる
        // given (前提条件):
        let mut counter = 1;
        let last = last_question_with("favorite food?", Some(3));

        // when (操作):
        let events = build_events("/answer ramen", "ABCD", "alice", &mut counter, &last)
            .await
            .unwrap();

        // then (期待する結果):
        match &events[0] {
            ClientEvent::QuestionAnswer {
                question,
                answer,
                question_number,
                ..
            } => {
                assert_eq!(question, "favorite food?");
                assert_eq!(answer, "ramen");
                assert_eq!(*question_number, Some(3));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_answer_without_question_is_consumed_locally() {
        // テスト項目: 質問が来ていない状態の /answer は送信されない
        // given (前提条件):
        let mut counter = 1;
        let last = Arc::new(Mutex::new(None));

        // when (操作):
        let events = build_events("/answer ramen", "ABCD", "alice", &mut counter, &last).await;

        // then (期待する結果):
        assert!(events.is_none());
    }

    #[tokio::test]
    async fn test_spin_command_emits_start_then_result() {
        // テスト項目: /spin がスピン開始と結果の 2 イベントを順に送る
        // given (前提条件):
        let mut counter = 1;
        let last = Arc::new(Mutex::new(None));

        // when (操作):
        let events = build_events("/spin", "ABCD", "alice", &mut counter, &last)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            ClientEvent::TruthOrDareSpinStart { .. }
        ));
        assert!(matches!(
            events[1],
            ClientEvent::TruthOrDareSpinResult { .. }
        ));
    }

    #[tokio::test]
    async fn test_img_command_separates_data_uri_from_url() {
        // テスト項目: /img が data URI と URL を使い分ける
        // given (前提条件):
        let mut counter = 1;
        let last = Arc::new(Mutex::new(None));

        // when (操作):
        let data_events = build_events(
            "/img data:image/png;base64,AAAA",
            "ABCD",
            "alice",
            &mut counter,
            &last,
        )
        .await
        .unwrap();
        let url_events = build_events(
            "/img https://example.com/cat.png",
            "ABCD",
            "alice",
            &mut counter,
            &last,
        )
        .await
        .unwrap();

        // then (期待する結果):
        match &data_events[0] {
            ClientEvent::ChatMessage {
                image_data,
                image_url,
                ..
            } => {
                assert!(image_data.is_some());
                assert!(image_url.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match &url_events[0] {
            ClientEvent::ChatMessage {
                image_data,
                image_url,
                ..
            } => {
                assert!(image_data.is_none());
                assert_eq!(image_url.as_deref(), Some("https://example.com/cat.png"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_draw_spin_result_alternates_by_second() {
        // テスト項目: 抽選結果の種別が秒のパリティで決まる
        // given (前提条件) / when (操作):
        let even = draw_spin_result(10_000);
        let odd = draw_spin_result(11_000);

        // then (期待する結果):
        assert_eq!(even.r#type, "truth");
        assert_eq!(odd.r#type, "dare");
        assert!(!even.content.is_empty());
        assert!(!odd.content.is_empty());
    }
}
