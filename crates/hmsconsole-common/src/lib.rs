//! hmsconsole-common — Shared types and errors used across the console crates.

pub mod error;
pub mod reply;

// Re-export commonly used types
pub use error::{ConsoleError, Result};
pub use reply::{DaemonReply, DatabaseDescriptor, QueryResponse, Row};
