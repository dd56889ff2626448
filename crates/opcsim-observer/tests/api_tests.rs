//! Integration tests for the Observer API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting the HTTP server. The protocol server behind the simulator
//! is real and binds `127.0.0.1:0`, so lifecycle endpoints exercise the
//! full start/stop path.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use opcsim_core::VariableSet;
use opcsim_core::config::{ServerSettings, SimulationSettings};
use opcsim_observer::build_router;
use opcsim_observer::state::AppState;
use opcsim_server::Simulator;
use opcsim_types::VariableConfig;
use serde_json::{Value, json};
use tower::ServiceExt;

fn make_state(variables: VariableSet) -> Arc<AppState> {
    let simulator = Simulator::new(
        ServerSettings {
            host: String::from("127.0.0.1"),
            port: 0,
            ..ServerSettings::default()
        },
        SimulationSettings {
            tick_interval_ms: 20,
            broadcast_interval_ms: 20,
            stop_timeout_ms: 1_000,
            seed: Some(11),
            ..SimulationSettings::default()
        },
    );
    Arc::new(AppState::new(Arc::new(simulator), variables))
}

async fn send(state: &Arc<AppState>, request: Request<Body>) -> Response {
    build_router(Arc::clone(state)).oneshot(request).await.unwrap()
}

async fn get(state: &Arc<AppState>, uri: &str) -> Response {
    send(state, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_empty(state: &Arc<AppState>, uri: &str) -> Response {
    send(state, Request::post(uri).body(Body::empty()).unwrap()).await
}

async fn with_json(state: &Arc<AppState>, method: &str, uri: &str, body: &Value) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(state, request).await
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn json_of(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// =========================================================================
// Status page and lifecycle
// =========================================================================

#[tokio::test]
async fn test_index_returns_html() {
    let state = make_state(VariableSet::demo());
    let response = get(&state, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.contains("text/html"));
}

#[tokio::test]
async fn test_status_when_stopped() {
    let state = make_state(VariableSet::demo());
    let (status, json) = json_of(get(&state, "/api/server/status").await).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["running"], false);
    assert_eq!(json["variable_count"], 4);
    assert!(json["endpoint"].is_null());
}

#[tokio::test]
async fn test_start_stop_flow() {
    let state = make_state(VariableSet::demo());

    let (status, json) = json_of(post_empty(&state, "/api/server/start").await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (_, json) = json_of(get(&state, "/api/server/status").await).await;
    assert_eq!(json["running"], true);
    assert_ne!(json["port"], 0);
    assert!(json["endpoint"].as_str().unwrap().starts_with("opc.tcp://"));

    let (status, json) = json_of(post_empty(&state, "/api/server/start").await).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);
    assert_eq!(json["status"], 409);

    let (_, values) = json_of(get(&state, "/api/values").await).await;
    assert_eq!(values.as_object().unwrap().len(), 4);
    assert!(values["Temperature"]["value"].is_number());
    assert_eq!(values["Temperature"]["type"], "Numeric");

    let (status, json) = json_of(post_empty(&state, "/api/server/stop").await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Server stopped");

    let (status, _) = json_of(post_empty(&state, "/api/server/stop").await).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, values) = json_of(get(&state, "/api/values").await).await;
    assert_eq!(values, json!({}));
}

#[tokio::test]
async fn test_start_without_variables_is_bad_request() {
    let state = make_state(VariableSet::new());
    let (status, json) = json_of(post_empty(&state, "/api/server/start").await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(!state.simulator.is_running().await);
}

// =========================================================================
// Variable registry
// =========================================================================

#[tokio::test]
async fn test_add_variable() {
    let state = make_state(VariableSet::demo());
    let body = json!({
        "name": "Flow",
        "config": {"type": "Numeric", "mode": "Random", "min": 0.0, "max": 10.0}
    });

    let (status, json) = json_of(with_json(&state, "POST", "/api/variables", &body).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Added Flow");

    let (_, list) = json_of(get(&state, "/api/variables").await).await;
    assert_eq!(list["Flow"]["type"], "Numeric");
    assert_eq!(list["Flow"]["max"], 10.0);

    let (status, _) = json_of(with_json(&state, "POST", "/api/variables", &body).await).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_add_variable_rejects_invalid_input() {
    let state = make_state(VariableSet::demo());

    let empty_name = json!({"name": "  ", "config": {"type": "Boolean", "value": true}});
    let (status, _) = json_of(with_json(&state, "POST", "/api/variables", &empty_name).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing_config = json!({"name": "Flag"});
    let (status, _) =
        json_of(with_json(&state, "POST", "/api/variables", &missing_config).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bad_range = json!({
        "name": "Flow",
        "config": {"type": "Numeric", "mode": "Random", "min": 10.0, "max": 0.0}
    });
    let (status, _) = json_of(with_json(&state, "POST", "/api/variables", &bad_range).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::post("/api/variables")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, json) = json_of(send(&state, request).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_variable_limit_is_enforced() {
    let state = make_state(VariableSet::new());
    for i in 0..30 {
        let body = json!({"name": format!("Tag{i}"), "config": {"type": "Boolean", "value": false}});
        let (status, _) = json_of(with_json(&state, "POST", "/api/variables", &body).await).await;
        assert_eq!(status, StatusCode::OK);
    }
    let body = json!({"name": "Tag30", "config": {"type": "Boolean", "value": false}});
    let (status, _) = json_of(with_json(&state, "POST", "/api/variables", &body).await).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_update_variable_pushes_value_while_running() {
    let state = make_state(VariableSet::demo());
    post_empty(&state, "/api/server/start").await;

    let (status, _) = json_of(
        with_json(&state, "PUT", "/api/variables/Status", &json!({"value": "Idle"})).await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, values) = json_of(get(&state, "/api/values").await).await;
    assert_eq!(values["Status"]["value"], "Idle");
    let (_, list) = json_of(get(&state, "/api/variables").await).await;
    assert_eq!(list["Status"]["value"], "Idle");
    assert_eq!(list["Status"]["use_dropdown"], true);

    let (status, _) = json_of(
        with_json(
            &state,
            "PUT",
            "/api/variables/Status",
            &json!({"type": "Boolean", "value": true}),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = json_of(
        with_json(&state, "PUT", "/api/variables/Missing", &json!({"value": 1})).await,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    state.simulator.stop().await;
}

#[tokio::test]
async fn test_update_variable_edits_range_while_stopped() {
    let state = make_state(VariableSet::demo());
    let (status, _) = json_of(
        with_json(
            &state,
            "PUT",
            "/api/variables/Temperature",
            &json!({"min": -20.0, "max": 40.0}),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let variables = state.variables.read().await;
    assert_eq!(
        variables.get("Temperature"),
        Some(&VariableConfig::random(-20.0, 40.0))
    );
}

#[tokio::test]
async fn test_delete_variable() {
    let state = make_state(VariableSet::demo());
    post_empty(&state, "/api/server/start").await;

    let request = Request::delete("/api/variables/DeviceID")
        .body(Body::empty())
        .unwrap();
    let (status, _) = json_of(send(&state, request).await).await;
    assert_eq!(status, StatusCode::CONFLICT);

    post_empty(&state, "/api/server/stop").await;

    let request = Request::delete("/api/variables/DeviceID")
        .body(Body::empty())
        .unwrap();
    let (status, json) = json_of(send(&state, request).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Deleted DeviceID");

    let request = Request::delete("/api/variables/DeviceID")
        .body(Body::empty())
        .unwrap();
    let (status, _) = json_of(send(&state, request).await).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =========================================================================
// Live data
// =========================================================================

#[tokio::test]
async fn test_history_and_chart_empty_when_stopped() {
    let state = make_state(VariableSet::demo());
    let (_, history) = json_of(get(&state, "/api/history").await).await;
    assert_eq!(history, json!([]));
    let (_, chart) = json_of(get(&state, "/api/chart-data").await).await;
    assert_eq!(chart, json!({}));
}

#[tokio::test]
async fn test_history_and_chart_formats() {
    let state = make_state(VariableSet::demo());
    post_empty(&state, "/api/server/start").await;

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let history = state.simulator.history_snapshot().await;
            if history.get("Temperature").is_some_and(|h| h.len() >= 2) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let (status, history) = json_of(get(&state, "/api/history").await).await;
    assert_eq!(status, StatusCode::OK);
    let rows = history.as_array().unwrap();
    assert!(rows.len() >= 8);
    let timestamp = rows[0]["timestamp"].as_str().unwrap();
    assert_eq!(timestamp.len(), "2025-01-01 00:00:00".len());
    assert!(rows[0]["variable"].is_string());

    let (_, chart) = json_of(get(&state, "/api/chart-data").await).await;
    let chart = chart.as_object().unwrap();
    assert!(chart.contains_key("Temperature"));
    assert!(chart.contains_key("Pressure"));
    assert!(!chart.contains_key("Status"));
    let temperature = &chart["Temperature"];
    let labels = temperature["labels"].as_array().unwrap();
    assert_eq!(labels.len(), temperature["data"].as_array().unwrap().len());
    assert_eq!(labels[0].as_str().unwrap().len(), "00:00:00".len());
    assert_eq!(temperature["max"], 100.0);

    state.simulator.stop().await;
}

#[tokio::test]
async fn test_nonexistent_route_returns_404() {
    let state = make_state(VariableSet::demo());
    let response = get(&state, "/api/nonexistent").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
