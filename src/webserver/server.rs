/// Axum webserver implementation
///
/// Binds the configured host/port, serves the webhook ingress and the
/// admin/status API, and shuts down when the cancellation token fires.
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;

use crate::logger::{self, LogTag};
use crate::webserver::{routes, state::AppState};

pub async fn start_server(
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let host = state.config.webserver.host.clone();
    let port = state.config.webserver.port;

    let app: Router = routes::build_router(state).layer(CompressionLayer::new());

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}:{}: {}", host, port, e))?;

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    if host == "0.0.0.0" {
        logger::info(
            LogTag::Webserver,
            &format!("Listening on {} (all interfaces)", addr),
        );
    } else {
        logger::info(LogTag::Webserver, &format!("Listening on {}", addr));
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            logger::info(LogTag::Webserver, "Shutdown requested, closing listener");
        })
        .await
        .map_err(|e| anyhow::anyhow!("Webserver error: {}", e))?;

    Ok(())
}
