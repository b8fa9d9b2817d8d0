//! HTTP listener with signal-driven shutdown

use anyhow::{Context, Result};
use axum::Router;
use logoscope_core::Config;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serve `app` until SIGINT or SIGTERM. `shutdown` is cancelled when the signal lands so
/// background tasks (the staging sweeper, in-flight pipeline runs) wind down too.
pub async fn start_server(config: &Config, app: Router, shutdown: CancellationToken) -> Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.server_port()));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;

    tracing::info!(
        %addr,
        max_upload_bytes = config.max_file_size_bytes(),
        frontend_url = %config.frontend_url(),
        "Listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal(shutdown))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Ctrl+C handler failed");
            }
        }
        _ = terminate => {}
    }

    tracing::info!("Shutdown requested, draining connections");
    shutdown.cancel();
}
