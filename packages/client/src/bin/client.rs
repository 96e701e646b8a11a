//! CLI session client for paired chat with mini-games.
//!
//! Joins a named session on the WebSocket server, replays its history, and
//! exchanges chat/game events with the other participant. Automatically
//! reconnects on disconnection (max 5 attempts with 5 second interval);
//! a rejoin replays history without duplicating already-seen messages.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin client -- --player-name Alice
//! cargo run --bin client -- -n Bob -s ABC123
//! ```

use clap::Parser;

use kotatsu_server::domain::SessionId;
use kotatsu_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "WebSocket session client for paired chat with mini-games", long_about = None)]
struct Args {
    /// Display name shown to the other participant
    #[arg(short = 'n', long)]
    player_name: String,

    /// Session code to join; omit to start a new session with a generated code
    #[arg(short = 's', long)]
    session_id: Option<String>,

    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger("kotatsu-client", env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let session_id = match args.session_id {
        Some(id) => id,
        None => {
            let generated = SessionId::generate();
            println!(
                "Starting new session '{}'. Share this code with the other player.",
                generated
            );
            generated.into_string()
        }
    };

    // Run the client
    if let Err(e) = kotatsu_client::run_client(args.url, session_id, args.player_name).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
