//! UI utilities for the client.

use std::io::Write;

/// Redisplay the prompt after receiving a message
pub fn redisplay_prompt(player_name: &str) {
    print!("{}> ", player_name);
    std::io::stdout().flush().ok();
}
