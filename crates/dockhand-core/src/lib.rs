//! `Dockhand` Core Library
//!
//! Shared functionality for `Dockhand` components:
//! - Client-facing relay protocol (control messages, deploy events, log lines)
//! - Engine log stream de-framing
//! - Deploy output classification
//! - Configuration resolution and hierarchy
//! - Common error types

pub mod classify;
pub mod config;
pub mod error;
pub mod protocol;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
