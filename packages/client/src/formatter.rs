//! Message formatting utilities for client display.

use kotatsu_server::domain::MessageKind;
use kotatsu_server::infrastructure::dto::websocket::{SpinResult, WireMessage};
use kotatsu_shared::time::timestamp_to_rfc3339;

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the session-joined confirmation
    pub fn format_session_joined(
        session_id: &str,
        player_name: &str,
        participant_count: u32,
    ) -> String {
        let mut output = String::new();
        output.push_str("\n\n============================================================\n");
        output.push_str(&format!(
            "Joined session '{}' as '{}' ({} participant(s))\n",
            session_id, player_name, participant_count
        ));
        output.push_str("============================================================\n");
        output
    }

    /// Format the history replay header
    pub fn format_history_header(count: usize) -> String {
        if count == 0 {
            "\n(no earlier messages)\n".to_string()
        } else {
            format!("\n--- replaying {} earlier message(s) ---\n", count)
        }
    }

    /// Format a single message for display
    ///
    /// The prefix depends on the message kind so prompts, answers, and game
    /// results stand out from ordinary chat.
    pub fn format_message(message: &WireMessage) -> String {
        let timestamp_str = timestamp_to_rfc3339(message.timestamp);
        let body = match message.message_type {
            MessageKind::Image => "[image]".to_string(),
            MessageKind::Question => match message.question_number {
                Some(n) => format!("Q{}: {}", n, message.text.as_deref().unwrap_or("")),
                None => format!("Q: {}", message.text.as_deref().unwrap_or("")),
            },
            MessageKind::Answer => format!("A: {}", message.text.as_deref().unwrap_or("")),
            MessageKind::Game => format!("[game] {}", message.text.as_deref().unwrap_or("")),
            _ => message.text.as_deref().unwrap_or("").to_string(),
        };
        format!(
            "\n\n------------------------------------------------------------\n\
             @{}: {}\n\
             sent at {}\n\
             ------------------------------------------------------------\n",
            message.sender, body, timestamp_str
        )
    }

    /// Format a user-joined notification
    pub fn format_user_joined(player_name: &str, participant_count: u32) -> String {
        format!(
            "\n+ {} joined ({} participant(s))\n",
            player_name, participant_count
        )
    }

    /// Format a user-left notification
    pub fn format_user_left(player_name: &str, participant_count: u32) -> String {
        format!(
            "\n- {} left ({} participant(s))\n",
            player_name, participant_count
        )
    }

    /// Format a truth-or-dare spin start notification
    pub fn format_spin_start(player_name: &str) -> String {
        format!("\n* {} is spinning truth-or-dare...\n", player_name)
    }

    /// Format a truth-or-dare spin result
    pub fn format_spin_result(player_name: &str, result: &SpinResult) -> String {
        let difficulty = result
            .difficulty
            .as_deref()
            .map(|d| format!(" [{}]", d))
            .unwrap_or_default();
        format!(
            "\n* {} landed on {}{}: {}\n",
            player_name,
            result.r#type.to_uppercase(),
            difficulty,
            result.content
        )
    }

    /// Format a server error event
    pub fn format_error(message: &str) -> String {
        format!("\n! server error: {}\n", message)
    }

    /// Format a raw text message (when parsing fails)
    pub fn format_raw_message(text: &str) -> String {
        format!("\n← Received: {}\n", text)
    }
}
