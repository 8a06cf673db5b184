use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, response::Json, routing::get, Router};
use log::info;

use crate::grid::{GridStatus, StatusReporter};

type ReporterState = Arc<dyn StatusReporter>;

/// Build the status router
pub fn router(reporter: ReporterState) -> Router {
    Router::new()
        .route("/api/status", get(status_handler))
        .route("/health", get(health_handler))
        .with_state(reporter)
}

/// Start the status server and serve until the listener fails
pub async fn start_server(reporter: ReporterState, host: &str, port: u16) -> std::io::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Status server running on http://{}", addr);

    axum::serve(listener, router(reporter)).await
}

async fn status_handler(State(reporter): State<ReporterState>) -> Json<GridStatus> {
    Json(reporter.status().await)
}

async fn health_handler() -> &'static str {
    "ok"
}
