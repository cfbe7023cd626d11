//! Serving until shutdown, with the daemon stopped before the listener closes.

use std::future::Future;
use std::process::ExitStatus;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

use crate::supervisor::DaemonSupervisor;

/// Serve `router` until `signal` resolves.
///
/// On `signal` the daemon is signalled and reaped first; only then does axum
/// stop accepting connections and drain the ones in flight. Returns the
/// daemon's exit status, or `None` if no daemon was running.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    supervisor: Arc<DaemonSupervisor>,
    signal: F,
) -> std::io::Result<Option<ExitStatus>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (exit_tx, exit_rx) = oneshot::channel();
    let shutdown = async move {
        signal.await;
        info!("Shutting down...");
        let status = supervisor.stop().await;
        let _ = exit_tx.send(status);
        info!("Closing listener");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(exit_rx.await.ok().flatten())
}
