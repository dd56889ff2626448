//! Read-only REST handlers for the Observer server.
//!
//! All handlers read from the shared [`Simulator`] via [`AppState`].
//! When the protocol server is stopped they return empty collections.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/values` | Current value of every node |
//! | `GET` | `/api/history` | Merged history, newest first |
//! | `GET` | `/api/chart-data` | Chart series for random-walk tags |
//!
//! [`Simulator`]: opcsim_server::Simulator

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use opcsim_types::TagValue;

use crate::state::AppState;

/// Timestamp format of the merged history view.
const HISTORY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format of chart labels.
const CHART_TIME_FORMAT: &str = "%H:%M:%S";

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// One row of `GET /api/history`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HistoryRow {
    /// Sample time, `YYYY-MM-DD HH:MM:SS` in UTC.
    pub timestamp: String,
    /// Variable name.
    pub variable: String,
    /// Recorded value.
    pub value: TagValue,
}

/// One series of `GET /api/chart-data`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChartPayload {
    /// Sample times, `HH:MM:SS` in UTC, oldest first.
    pub labels: Vec<String>,
    /// Sample values aligned with `labels`.
    pub data: Vec<f64>,
    /// Lower bound of the range.
    pub min: f64,
    /// Upper bound of the range.
    pub max: f64,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing server status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let running = state.simulator.is_running().await;
    let endpoint = state
        .simulator
        .endpoint()
        .await
        .map_or_else(|| String::from("--"), |addr| addr.to_string());
    let variable_count = state.variables.read().await.len();
    let server_name = state.simulator.server_settings().server_name.clone();
    let (status_class, status_text) = if running {
        ("running", "RUNNING")
    } else {
        ("stopped", "STOPPED")
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>OPC UA Simulator</title>
    <style>
        body {{
            background: #101418;
            color: #d0d7de;
            font-family: 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 760px;
            margin: 0 auto;
        }}
        h1 {{ color: #79c0ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .card {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 0.8rem 1.2rem;
            margin: 0.4rem 0.4rem 0.4rem 0;
        }}
        .card .label {{ color: #8b949e; font-size: 0.8rem; }}
        .card .value {{ font-size: 1.3rem; font-weight: bold; }}
        .running {{ color: #3fb950; }}
        .stopped {{ color: #f85149; }}
        a {{ color: #79c0ff; }}
        code {{ color: #ffa657; }}
    </style>
</head>
<body>
    <h1>OPC UA Simulator</h1>
    <p class="subtitle">{server_name}</p>

    <div class="card"><div class="label">Server</div><div class="value {status_class}">{status_text}</div></div>
    <div class="card"><div class="label">Endpoint</div><div class="value">{endpoint}</div></div>
    <div class="card"><div class="label">Variables</div><div class="value">{variable_count}</div></div>

    <h2>API</h2>
    <ul>
        <li><a href="/api/server/status">GET /api/server/status</a></li>
        <li><code>POST /api/server/start</code>, <code>POST /api/server/stop</code></li>
        <li><a href="/api/variables">GET /api/variables</a>, <code>POST /api/variables</code></li>
        <li><code>PUT /api/variables/{{name}}</code>, <code>DELETE /api/variables/{{name}}</code></li>
        <li><a href="/api/values">GET /api/values</a></li>
        <li><a href="/api/history">GET /api/history</a></li>
        <li><a href="/api/chart-data">GET /api/chart-data</a></li>
    </ul>

    <h2>WebSocket</h2>
    <p><code>ws://host:port/ws/values</code> pushes <code>update_values</code> events.</p>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/values
// ---------------------------------------------------------------------------

/// Current value, type and descriptor of every node.
pub async fn get_values(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.simulator.current_values().await)
}

// ---------------------------------------------------------------------------
// GET /api/history
// ---------------------------------------------------------------------------

/// The 200 newest samples across all variables.
pub async fn get_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rows: Vec<HistoryRow> = state
        .simulator
        .history_view()
        .await
        .into_iter()
        .map(|record| HistoryRow {
            timestamp: record.timestamp.format(HISTORY_TIME_FORMAT).to_string(),
            variable: record.variable,
            value: record.value,
        })
        .collect();
    Json(rows)
}

// ---------------------------------------------------------------------------
// GET /api/chart-data
// ---------------------------------------------------------------------------

/// Chart series for random-walk numeric variables.
///
/// Ranges come from the variable registry, so an edited `min`/`max`
/// shows up in the chart before the next restart.
pub async fn get_chart_data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let variables = state.variables.read().await.clone();
    let chart: BTreeMap<String, ChartPayload> = state
        .simulator
        .chart_data(&variables)
        .await
        .into_iter()
        .map(|(name, series)| {
            let labels = series
                .timestamps
                .iter()
                .map(|t| t.format(CHART_TIME_FORMAT).to_string())
                .collect();
            (
                name,
                ChartPayload {
                    labels,
                    data: series.data,
                    min: series.min,
                    max: series.max,
                },
            )
        })
        .collect();
    Json(chart)
}
