//! HMSSQL console web server.
//!
//! Run with: cargo run -p hmsconsole-web

use std::sync::Arc;

use anyhow::Context;
use hmsconsole_config::Config;
use hmsconsole_web::{
    proxy::QueryProxy,
    router::build_router,
    server,
    state::AppState,
    supervisor::DaemonSupervisor,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hmsconsole=debug,daemon=info,info")),
        )
        .init();

    info!("Starting HMSSQL console web server...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().context("Could not load configuration")?;

    let supervisor = Arc::new(DaemonSupervisor::new(config.daemon.clone()));
    let proxy = QueryProxy::from_config(&config.daemon)?;
    info!("Relaying /query to {}", proxy.endpoint());

    let state = AppState::new(proxy, supervisor.clone());
    let router = build_router(state, &config.server.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("Web server running on http://{}", config.server.bind);

    if config.daemon.autostart {
        if let Err(e) = supervisor.start().await {
            // Keep serving: queries will report the daemon as unreachable.
            error!("{}", e);
        }
    } else {
        warn!("Daemon autostart disabled, expecting it at {}", config.daemon.query_url);
    }

    server::serve(listener, router, supervisor, wait_for_signal()).await?;

    info!("Shutdown complete");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
