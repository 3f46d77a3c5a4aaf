//! Launchdeck CLI library.
//!
//! The binary in `main.rs` only parses arguments; the commands live here so
//! the integration tests can drive them against an in-memory backend.

pub mod commands;
