//! hmsconsole-web — HTTP front for the HMSSQL daemon.
//! Provides:
//!   - `POST /query` relay to the daemon's own query endpoint
//!   - `GET /health` with the supervised daemon's state
//!   - Static asset serving for the browser console
//!   - Supervision of the daemon process for the server's lifetime

pub mod router;
pub mod handlers;
pub mod proxy;
pub mod server;
pub mod state;
pub mod supervisor;
