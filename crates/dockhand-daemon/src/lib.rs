//! `Dockhand` Daemon Library
//!
//! Core functionality for the Dockhand daemon:
//! - Interactive container terminals over WebSocket
//! - Multi-container log aggregation over server-sent events
//! - Project deployment with streamed progress events
//! - HTTP API server

pub mod deploy;
pub mod engine;
pub mod error;
pub mod relay;
pub mod server;
