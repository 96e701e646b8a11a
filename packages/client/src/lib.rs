//! WebSocket session client implementation.

pub mod error;
pub mod formatter;
pub mod reconciler;
mod runner;
mod session;
mod ui;

pub use runner::run_client;
