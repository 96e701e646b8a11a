//! WebSocket session server implementation.

mod handler;
mod server;
mod signal;
pub mod state; // handler 層からアクセスするため public

pub use server::Server;
