//! HTTP trigger for request-driven schedulers.
//!
//! Lets a scheduler that can only make HTTP requests (cron-as-a-service,
//! cloud schedulers) start a run. The request payload is ignored.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/run` | Perform one run and return its outcome |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Responses
//!
//! ```json
//! { "status": "ok", "report": { "run_id": "…", "newly_available": 2, … } }
//! { "status": "error", "stage": "fetch", "message": "fetch failed: …" }
//! ```
//!
//! A failed run answers `500`; its error email has already been sent by
//! the time the response is written. Overlapping requests are serialized.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::pipeline::{self, RunReport};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    /// Held for the duration of a run.
    run_lock: Arc<Mutex<()>>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum RunResponse {
    Ok {
        report: RunReport,
    },
    Error {
        stage: &'static str,
        message: String,
    },
}

/// Build the router. Exposed for tests.
pub fn router(config: Arc<Config>) -> Router {
    let state = AppState {
        config,
        run_lock: Arc::new(Mutex::new(())),
    };

    Router::new()
        .route("/run", post(handle_run))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(Arc::new(config.clone()));

    tracing::info!("trigger server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_run(State(state): State<AppState>) -> Response {
    let _guard = state.run_lock.lock().await;

    match pipeline::run_once(&state.config, false).await {
        Ok(report) => (StatusCode::OK, Json(RunResponse::Ok { report })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RunResponse::Error {
                stage: e.stage(),
                message: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
