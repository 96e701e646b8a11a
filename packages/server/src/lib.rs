//! kotatsu session server library.
//!
//! Real-time session and message-broadcast core for the kotatsu paired-chat
//! application: session registry, broadcast fan-out, dual-backend persistence
//! and the inactivity reaper.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
