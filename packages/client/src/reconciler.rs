//! クライアント側メッセージ照合（重複排除）
//!
//! 参加時の履歴リプレイとその後のライブ配信は重なり得ます。さらに
//! サーバーは送信者自身にもメッセージをエコーバックするため、楽観的に
//! 自分の送信を表示する UI では同じメッセージが 2 回見えてしまいます。
//! `Reconciler` は受信メッセージごとに表示可否を 1 回だけ判定し、
//! 再接続をまたいでも同じメッセージを 2 度表示しません。
//!
//! 判定は 2 段階です:
//!
//! 1. 厳密キー: `(sessionId, sender, 本文先頭 20 文字, 秒単位に丸めた
//!    タイムスタンプ)` の完全一致
//! 2. あいまい判定: 同じ送信者・同じ本文・同じ種別のメッセージが、
//!    表示済みのものから約 2 秒以内に届いた場合
//!
//! あいまい判定が必要なのは、ネットワークジッタとクロック差のせいで
//! 実質同一のメッセージが「近いが一致しない」タイムスタンプを持ち得る
//! ためです。

use std::collections::HashSet;

use kotatsu_server::domain::MessageKind;
use kotatsu_server::infrastructure::dto::websocket::WireMessage;
use kotatsu_shared::time::round_to_nearest_second;

/// 厳密キーに使う本文の先頭文字数（Unicode スカラー値単位）
const KEY_CONTENT_PREFIX_CHARS: usize = 20;

/// あいまい判定の時間窓（ミリ秒）
const FUZZY_WINDOW_MILLIS: i64 = 2000;

/// 表示済みメッセージの要約（あいまい判定用）
#[derive(Debug, Clone)]
struct DisplayedEntry {
    sender: String,
    content: String,
    kind: MessageKind,
    timestamp: i64,
}

/// 受信メッセージの表示可否を判定する照合器
///
/// 1 クライアントにつき 1 つ生成し、履歴リプレイとライブ配信の両方を
/// 同じインスタンスに通します。
#[derive(Debug, Default)]
pub struct Reconciler {
    /// 厳密キーの既出集合
    seen_keys: HashSet<String>,
    /// あいまい判定用の表示済みエントリ（タイムスタンプ昇順とは限らない）
    displayed: Vec<DisplayedEntry>,
}

impl Reconciler {
    /// 新しい Reconciler を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// メッセージを表示すべきなら `true` を返し、表示済みとして記録する
    ///
    /// `false` は「既に表示したものと同一」を意味し、呼び出し側は
    /// そのメッセージを破棄します。
    pub fn admit(&mut self, message: &WireMessage) -> bool {
        let key = dedup_key(message);
        if self.seen_keys.contains(&key) {
            return false;
        }
        if self.is_fuzzy_duplicate(message) {
            return false;
        }

        self.seen_keys.insert(key);
        self.displayed.push(DisplayedEntry {
            sender: message.sender.clone(),
            content: content_of(message).to_string(),
            kind: message.message_type,
            timestamp: message.timestamp,
        });
        self.prune(message.timestamp);
        true
    }

    /// 表示済みメッセージ数（テスト・診断用）
    pub fn displayed_count(&self) -> usize {
        self.seen_keys.len()
    }

    fn is_fuzzy_duplicate(&self, message: &WireMessage) -> bool {
        let content = content_of(message);
        self.displayed.iter().any(|entry| {
            entry.sender == message.sender
                && entry.kind == message.message_type
                && entry.content == content
                && (entry.timestamp - message.timestamp).abs() <= FUZZY_WINDOW_MILLIS
        })
    }

    /// あいまい判定の時間窓から完全に外れたエントリを落とす
    ///
    /// 厳密キーは残すため、窓の外のメッセージも完全一致なら引き続き
    /// 排除される。
    fn prune(&mut self, now: i64) {
        self.displayed
            .retain(|entry| (now - entry.timestamp).abs() <= FUZZY_WINDOW_MILLIS * 2);
    }
}

/// 照合に使う本文（テキスト優先、画像のみなら画像参照）
fn content_of(message: &WireMessage) -> &str {
    match message.text.as_deref() {
        Some(text) if !text.is_empty() => text,
        _ => message.image_data.as_deref().unwrap_or(""),
    }
}

/// 厳密キーを計算する
fn dedup_key(message: &WireMessage) -> String {
    let prefix: String = content_of(message)
        .chars()
        .take(KEY_CONTENT_PREFIX_CHARS)
        .collect();
    format!(
        "{}|{}|{}|{}",
        message.session_id,
        message.sender,
        prefix,
        round_to_nearest_second(message.timestamp)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: &str, text: &str, kind: MessageKind, timestamp: i64) -> WireMessage {
        WireMessage {
            session_id: "ABCD".to_string(),
            sender: sender.to_string(),
            text: Some(text.to_string()),
            image_data: None,
            message_type: kind,
            question_number: None,
            timestamp,
        }
    }

    fn chat(sender: &str, text: &str, timestamp: i64) -> WireMessage {
        message(sender, text, MessageKind::Chat, timestamp)
    }

    #[test]
    fn test_first_sighting_is_admitted() {
        // テスト項目: 初見のメッセージは表示される
        // given (前提条件):
        let mut reconciler = Reconciler::new();

        // when (操作):
        let admitted = reconciler.admit(&chat("alice", "hi", 10_000));

        // then (期待する結果):
        assert!(admitted);
        assert_eq!(reconciler.displayed_count(), 1);
    }

    #[test]
    fn test_exact_duplicate_is_suppressed() {
        // テスト項目: 同一メッセージの再受信は破棄される
        // given (前提条件): 履歴リプレイで一度表示済み
        let mut reconciler = Reconciler::new();
        assert!(reconciler.admit(&chat("alice", "hi", 10_000)));

        // when (操作): ライブ配信で同じメッセージが届く
        let admitted = reconciler.admit(&chat("alice", "hi", 10_000));

        // then (期待する結果):
        assert!(!admitted);
        assert_eq!(reconciler.displayed_count(), 1);
    }

    #[test]
    fn test_same_second_rounding_collapses_key() {
        // テスト項目: 同じ秒に丸まるタイムスタンプは同一キーになる
        // given (前提条件): 10_200ms と 10_400ms はどちらも 10 秒に丸まる
        let mut reconciler = Reconciler::new();
        assert!(reconciler.admit(&chat("alice", "hi", 10_200)));

        // when (操作):
        let admitted = reconciler.admit(&chat("alice", "hi", 10_400));

        // then (期待する結果):
        assert!(!admitted);
    }

    #[test]
    fn test_fuzzy_duplicate_across_second_boundary_is_suppressed() {
        // テスト項目: 丸め秒が異なっても 2 秒以内の同一内容は破棄される
        // given (前提条件): 10_400ms → 10 秒、11_600ms → 12 秒（キー不一致）
        let mut reconciler = Reconciler::new();
        assert!(reconciler.admit(&chat("alice", "hi", 10_400)));

        // when (操作):
        let admitted = reconciler.admit(&chat("alice", "hi", 11_600));

        // then (期待する結果): あいまい判定が拾う
        assert!(!admitted);
    }

    #[test]
    fn test_same_text_outside_window_is_admitted() {
        // テスト項目: 時間窓の外で同じ本文を再送すれば表示される
        // given (前提条件):
        let mut reconciler = Reconciler::new();
        assert!(reconciler.admit(&chat("alice", "hi", 10_000)));

        // when (操作): 5 秒後に同じ本文
        let admitted = reconciler.admit(&chat("alice", "hi", 15_000));

        // then (期待する結果):
        assert!(admitted);
        assert_eq!(reconciler.displayed_count(), 2);
    }

    #[test]
    fn test_different_senders_are_independent() {
        // テスト項目: 別の送信者の同一本文は両方表示される
        // given (前提条件):
        let mut reconciler = Reconciler::new();
        assert!(reconciler.admit(&chat("alice", "hi", 10_000)));

        // when (操作):
        let admitted = reconciler.admit(&chat("bob", "hi", 10_000));

        // then (期待する結果):
        assert!(admitted);
    }

    #[test]
    fn test_different_kind_is_not_fuzzy_matched() {
        // テスト項目: 本文が同じでも種別が違えばあいまい判定にかからない
        // given (前提条件): 同秒丸めを避けるためタイムスタンプをずらす
        let mut reconciler = Reconciler::new();
        assert!(reconciler.admit(&message("alice", "hi", MessageKind::Chat, 10_400)));

        // when (操作):
        let admitted = reconciler.admit(&message("alice", "hi", MessageKind::Question, 11_600));

        // then (期待する結果):
        assert!(admitted);
    }

    #[test]
    fn test_key_uses_first_twenty_chars_only() {
        // テスト項目: 厳密キーは本文先頭 20 文字しか見ない
        // given (前提条件): 先頭 20 文字が一致する長文 2 通
        let mut reconciler = Reconciler::new();
        let base = "a".repeat(20);
        assert!(reconciler.admit(&chat("alice", &format!("{}-first", base), 10_000)));

        // when (操作): 同じ接頭辞・同じ丸め秒だが末尾が違う
        let admitted = reconciler.admit(&chat("alice", &format!("{}-second", base), 10_000));

        // then (期待する結果): キーが衝突して破棄される
        assert!(!admitted);
    }

    #[test]
    fn test_image_messages_dedup_on_image_ref() {
        // テスト項目: 本文のない画像メッセージは画像参照で照合される
        // given (前提条件):
        let mut reconciler = Reconciler::new();
        let image = WireMessage {
            session_id: "ABCD".to_string(),
            sender: "alice".to_string(),
            text: None,
            image_data: Some("data:image/png;base64,AAAA".to_string()),
            message_type: MessageKind::Image,
            question_number: None,
            timestamp: 10_000,
        };
        assert!(reconciler.admit(&image));

        // when (操作):
        let admitted = reconciler.admit(&image);

        // then (期待する結果):
        assert!(!admitted);
    }

    #[test]
    fn test_replay_then_live_shows_exactly_one_copy() {
        // テスト項目: 履歴リプレイ + ライブエコーで表示は 1 回だけ
        // given (前提条件): 履歴 3 通を表示済み
        let mut reconciler = Reconciler::new();
        let history = [
            chat("alice", "hi", 10_000),
            chat("bob", "hello", 11_000),
            chat("alice", "how are you", 12_000),
        ];
        for msg in &history {
            assert!(reconciler.admit(msg));
        }

        // when (操作): 最後の 1 通がライブでもう一度届く
        let admitted = reconciler.admit(&chat("alice", "how are you", 12_000));

        // then (期待する結果):
        assert!(!admitted);
        assert_eq!(reconciler.displayed_count(), 3);
    }

    #[test]
    fn test_exact_key_survives_pruning() {
        // テスト項目: あいまい窓から外れても厳密キーでは排除され続ける
        // given (前提条件): 大量のメッセージで窓を流す
        let mut reconciler = Reconciler::new();
        assert!(reconciler.admit(&chat("alice", "hi", 10_000)));
        for i in 0..10 {
            assert!(reconciler.admit(&chat("bob", &format!("msg {}", i), 20_000 + i * 1000)));
        }

        // when (操作): 最初のメッセージと完全同一のものが再送される
        let admitted = reconciler.admit(&chat("alice", "hi", 10_000));

        // then (期待する結果):
        assert!(!admitted);
    }
}
