use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tracing::{error, info};

async fn ok() -> &'static str {
    "OK"
}

/// Bind and serve the plain-text liveness endpoint in a background task.
/// Free-tier hosts also use it as a keep-alive target. A bind failure is a
/// startup error; once serving, it never touches the bot path.
pub async fn spawn(port: u16) -> Result<()> {
    let app = Router::new().route("/", get(ok)).route("/healthz", get(ok));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind health-check server on port {}", port))?;

    info!("Health-check server listening on port {}", port);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Health-check server error: {}", e);
        }
    });

    Ok(())
}
