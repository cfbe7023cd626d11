//! Shared application state for the web server.

use std::sync::Arc;

use crate::proxy::QueryProxy;
use crate::supervisor::DaemonSupervisor;

/// Shared state injected into every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub proxy: QueryProxy,
    /// The only owner allowed to signal the daemon.
    pub supervisor: Arc<DaemonSupervisor>,
}

impl AppState {
    pub fn new(proxy: QueryProxy, supervisor: Arc<DaemonSupervisor>) -> Self {
        Self { proxy, supervisor }
    }
}

pub type SharedState = Arc<AppState>;
