//! Lifecycle REST handlers: status, start and stop of the protocol server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/server/status` | Running flag, port, endpoint, variable count |
//! | `POST` | `/api/server/start` | Start with the current variable registry |
//! | `POST` | `/api/server/stop` | Stop and discard the address space |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use opcsim_server::StopOutcome;
use tracing::info;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Generic success response shared by the mutating endpoints.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ActionResponse {
    /// Always `true`; failures are returned as errors.
    pub success: bool,
    /// Human-readable message.
    pub message: String,
}

impl ActionResponse {
    /// A successful action with `message`.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Body of `GET /api/server/status`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ServerStatus {
    /// Whether the protocol server is running.
    pub running: bool,
    /// Bound port while running, configured port otherwise.
    pub port: u16,
    /// Endpoint URL while running.
    pub endpoint: Option<String>,
    /// Number of variables in the registry.
    pub variable_count: usize,
}

// ---------------------------------------------------------------------------
// GET /api/server/status
// ---------------------------------------------------------------------------

/// Report whether the server runs and where.
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let settings = state.simulator.server_settings();
    let bound = state.simulator.endpoint().await;
    let variable_count = state.variables.read().await.len();

    Json(ServerStatus {
        running: bound.is_some(),
        port: bound.map_or(settings.port, |addr| addr.port()),
        endpoint: bound.map(|addr| format!("opc.tcp://{}:{}", settings.host, addr.port())),
        variable_count,
    })
}

// ---------------------------------------------------------------------------
// POST /api/server/start
// ---------------------------------------------------------------------------

/// Start the protocol server with a copy of the variable registry.
pub async fn start(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ObserverError> {
    let variables = state.variables.read().await.clone();
    let endpoint = state.simulator.start(&variables).await?;
    info!(%endpoint, variables = variables.len(), "Server started from observer");

    Ok(Json(ActionResponse::ok(format!("Server started on port {}", endpoint.port()))))
}

// ---------------------------------------------------------------------------
// POST /api/server/stop
// ---------------------------------------------------------------------------

/// Stop the protocol server.
pub async fn stop(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ObserverError> {
    match state.simulator.stop().await {
        StopOutcome::AlreadyStopped => Err(ObserverError::Conflict(String::from(
            "server is not running",
        ))),
        StopOutcome::Stopped(report) if report.is_clean() => {
            Ok(Json(ActionResponse::ok("Server stopped")))
        }
        StopOutcome::Stopped(_) => Ok(Json(ActionResponse::ok(
            "Server stopped; some background tasks had to be aborted",
        ))),
    }
}
