//! Variable registry REST handlers.
//!
//! The registry is the set of variables the next `start` builds nodes
//! from. Additions and edits are accepted at any time; deletions only
//! while the server is stopped. Editing a running variable's value
//! (`constant` for constant numerics, `value` for strings and booleans)
//! is also pushed into the live node.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/variables` | The registry, keyed by name |
//! | `POST` | `/api/variables` | Add `{name, config}` |
//! | `PUT` | `/api/variables/{name}` | Merge fields into a descriptor |
//! | `DELETE` | `/api/variables/{name}` | Remove a variable |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use opcsim_types::{NumericMode, TagValue, VariableConfig};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::control::ActionResponse;
use crate::error::ObserverError;
use crate::state::AppState;

/// Request body for `POST /api/variables`.
#[derive(Debug, serde::Deserialize)]
pub struct AddVariableRequest {
    /// Name of the new variable.
    #[serde(default)]
    pub name: String,
    /// Its descriptor.
    pub config: Option<VariableConfig>,
}

// ---------------------------------------------------------------------------
// GET /api/variables
// ---------------------------------------------------------------------------

/// Return the whole registry.
pub async fn list(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.variables.read().await.clone())
}

// ---------------------------------------------------------------------------
// POST /api/variables
// ---------------------------------------------------------------------------

/// Add a variable to the registry.
pub async fn add(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AddVariableRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Json(body) = body?;
    let config = body
        .config
        .ok_or_else(|| ObserverError::BadRequest(String::from("variable config is required")))?;

    state.variables.write().await.insert(body.name.as_str(), config)?;
    info!(variable = %body.name, "Variable added");

    Ok(Json(ActionResponse::ok(format!("Added {}", body.name))))
}

// ---------------------------------------------------------------------------
// PUT /api/variables/{name}
// ---------------------------------------------------------------------------

/// Merge the given fields into a variable's descriptor.
///
/// Changing the `type` is refused while the server runs, since the live
/// node keeps the type it was built with.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Json(patch) = body?;
    let running = state.simulator.is_running().await;

    let updated = {
        let mut variables = state.variables.write().await;
        let current = variables
            .get(&name)
            .ok_or_else(|| ObserverError::NotFound(format!("variable '{name}' not found")))?;
        let merged = merge(current, &patch)?;
        if running && merged.kind() != current.kind() {
            return Err(ObserverError::Conflict(String::from(
                "stop the server before changing a variable's type",
            )));
        }
        variables.replace(&name, merged.clone())?;
        merged
    };
    info!(variable = %name, "Variable updated");

    if running && let Some(value) = live_value(&updated, &patch) {
        if let Err(e) = state.simulator.try_update_variable(&name, value).await {
            warn!(variable = %name, error = %e, "Could not push edited value to running node");
        }
    }

    Ok(Json(ActionResponse::ok(format!("Updated {name}"))))
}

/// Overlay `patch` on the JSON form of `current` and parse the result.
fn merge(current: &VariableConfig, patch: &Map<String, Value>) -> Result<VariableConfig, ObserverError> {
    let mut fields = match serde_json::to_value(current)? {
        Value::Object(fields) => fields,
        _ => return Err(ObserverError::Internal(String::from("descriptor is not an object"))),
    };
    for (key, value) in patch {
        fields.insert(key.clone(), value.clone());
    }
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| ObserverError::BadRequest(format!("invalid variable config: {e}")))
}

/// The value an edit should push into a running node, if any.
fn live_value(config: &VariableConfig, patch: &Map<String, Value>) -> Option<TagValue> {
    match config {
        VariableConfig::Numeric {
            mode: NumericMode::Constant,
            constant,
            ..
        } if patch.contains_key("constant") => Some(TagValue::Numeric(*constant)),
        VariableConfig::Text {
            value: Some(value), ..
        } if patch.contains_key("value") => Some(TagValue::Text(value.clone())),
        VariableConfig::Boolean { value } if patch.contains_key("value") => {
            Some(TagValue::Flag(*value))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// DELETE /api/variables/{name}
// ---------------------------------------------------------------------------

/// Remove a variable from the registry.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    if state.simulator.is_running().await {
        return Err(ObserverError::Conflict(String::from(
            "stop the server before deleting variables",
        )));
    }

    state
        .variables
        .write()
        .await
        .remove(&name)
        .ok_or_else(|| ObserverError::NotFound(format!("variable '{name}' not found")))?;
    info!(variable = %name, "Variable deleted");

    Ok(Json(ActionResponse::ok(format!("Deleted {name}"))))
}
