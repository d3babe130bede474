//! HTTP router assembly and serving with graceful shutdown.
//!
//! Shutdown happens in two steps. When the shutdown future resolves the
//! server stops accepting connections and lets in-flight scrapes continue.
//! After the grace period the state's root token is cancelled, which ends
//! any collection still running with a partial snapshot.

use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::handlers::{config_handler, health_handler, metrics_handler, root_handler};
use crate::state::SharedState;

/// Builds the exporter's router over the shared state.
pub fn router(state: SharedState) -> Router {
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/config", get(config_handler));

    if state.config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    app.with_state(state)
}

/// Waits for `shutdown`, fires `stopping` right away and `root` once `grace`
/// has elapsed.
fn spawn_shutdown_sequence<F>(
    shutdown: F,
    stopping: CancellationToken,
    root: CancellationToken,
    grace: Duration,
) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        shutdown.await;
        info!("Stopped accepting connections, draining in-flight scrapes");
        stopping.cancel();

        tokio::select! {
            _ = root.cancelled() => {}
            _ = tokio::time::sleep(grace) => {
                warn!(
                    "In-flight scrapes did not finish within {:.1}s, cancelling them",
                    grace.as_secs_f64()
                );
                root.cancel();
            }
        }
    })
}

/// Serves the exporter over plain HTTP until `shutdown` resolves and every
/// in-flight request has been answered.
pub async fn serve<F>(
    listener: TcpListener,
    state: SharedState,
    shutdown: F,
    grace: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let root = state.shutdown.clone();
    let stopping = CancellationToken::new();
    let sequence = spawn_shutdown_sequence(shutdown, stopping.clone(), root.clone(), grace);

    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(stopping.cancelled_owned())
        .await;

    root.cancel();
    sequence.abort();
    result
}

/// Serves the exporter over HTTPS with the same shutdown sequence as [`serve`].
pub async fn serve_tls<F>(
    addr: SocketAddr,
    tls_config: RustlsConfig,
    state: SharedState,
    shutdown: F,
    grace: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let root = state.shutdown.clone();
    let stopping = CancellationToken::new();
    let sequence = spawn_shutdown_sequence(shutdown, stopping.clone(), root.clone(), grace);

    let handle = Handle::new();
    {
        let handle = handle.clone();
        tokio::spawn(async move {
            stopping.cancelled().await;
            // In-flight runs end at `grace`; leave them time to respond.
            handle.graceful_shutdown(Some(grace + Duration::from_secs(1)));
        });
    }

    let result = axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(router(state).into_make_service())
        .await;

    root.cancel();
    sequence.abort();
    result
}
