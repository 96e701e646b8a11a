//! Message content classification.
//!
//! ドメイン層の純粋関数として実装します（副作用なし、テスト容易）。
//! 分類はサーバー側で決定的に行われ、クライアントが宣言した種別は
//! 画像フラグを除いて信用しません。

use super::entity::MessageKind;

/// Maximum number of Unicode code points for a text to qualify as an emoji
/// message.
const EMOJI_MAX_CODE_POINTS: usize = 2;

/// Classify message content into a [`MessageKind`].
///
/// Rules, in order:
/// 1. an image payload is present -> `Image` (regardless of any text),
/// 2. the text is 1–2 code points, all within recognized emoji ranges
///    -> `Emoji`,
/// 3. otherwise -> `Chat`.
///
/// Game events (`ask-question` / `question-answer` / spin results) bypass
/// this function; their kind comes from the event name itself.
pub fn classify_content(text: &str, has_image: bool) -> MessageKind {
    if has_image {
        return MessageKind::Image;
    }

    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if (1..=EMOJI_MAX_CODE_POINTS).contains(&count) && trimmed.chars().all(is_emoji_code_point) {
        return MessageKind::Emoji;
    }

    MessageKind::Chat
}

/// Check whether a single code point falls in a recognized emoji range.
fn is_emoji_code_point(c: char) -> bool {
    matches!(u32::from(c),
        // Miscellaneous Symbols and Pictographs, Emoticons, Transport,
        // Supplemental Symbols, Symbols and Pictographs Extended-A
        0x1F300..=0x1F5FF
        | 0x1F600..=0x1F64F
        | 0x1F680..=0x1F6FF
        | 0x1F900..=0x1F9FF
        | 0x1FA70..=0x1FAFF
        // Miscellaneous Symbols, Dingbats
        | 0x2600..=0x26FF
        | 0x2700..=0x27BF
        // Regional indicators (flag pairs)
        | 0x1F1E6..=0x1F1FF
        // Variation selector 16, zero-width joiner
        | 0xFE0F
        | 0x200D
    )
}
