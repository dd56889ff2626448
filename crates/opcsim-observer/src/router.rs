//! Axum router construction for the Observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{control, handlers, variables, ws};

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/values` -- `WebSocket` value stream
/// - `GET /api/server/status`, `POST /api/server/start`,
///   `POST /api/server/stop` -- lifecycle control
/// - `GET|POST /api/variables`, `PUT|DELETE /api/variables/{name}` --
///   variable registry
/// - `GET /api/values`, `GET /api/history`, `GET /api/chart-data` --
///   live data
///
/// CORS is configured to allow any origin, matching the dashboard's
/// development setup.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/values", get(ws::ws_values))
        // Lifecycle
        .route("/api/server/status", get(control::status))
        .route("/api/server/start", post(control::start))
        .route("/api/server/stop", post(control::stop))
        // Variable registry
        .route("/api/variables", get(variables::list).post(variables::add))
        .route(
            "/api/variables/{name}",
            put(variables::update).delete(variables::delete),
        )
        // Live data
        .route("/api/values", get(handlers::get_values))
        .route("/api/history", get(handlers::get_history))
        .route("/api/chart-data", get(handlers::get_chart_data))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
