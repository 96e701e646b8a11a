//! Shared utilities for the kotatsu chat application.
//!
//! This crate carries the pieces both the server and the client need:
//! clock abstraction, timestamp helpers and logger setup.

pub mod logger;
pub mod time;
