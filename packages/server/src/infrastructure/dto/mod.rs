//! Data Transfer Objects (DTOs) for the session core.
//!
//! DTOs are organized by protocol:
//! - `websocket`: the real-time event surface (client/server tagged events)

pub mod conversion;
pub mod websocket;
