//! Error types for the Observer API server.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Every
//! error body has the shape `{"success": false, "error", "status"}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use opcsim_core::{AddressSpaceError, VariableError};
use opcsim_server::ServerError;

/// Errors that can occur in the Observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested resource was not found.
    #[error("{0}")]
    NotFound(String),

    /// The request conflicts with the current state.
    #[error("{0}")]
    Conflict(String),

    /// The request body or parameters are invalid.
    #[error("{0}")]
    BadRequest(String),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<VariableError> for ObserverError {
    fn from(err: VariableError) -> Self {
        let message = err.to_string();
        match err {
            VariableError::NotFound { .. } => Self::NotFound(message),
            VariableError::Duplicate { .. } | VariableError::LimitReached { .. } => {
                Self::Conflict(message)
            }
            VariableError::EmptyName
            | VariableError::NonFinite { .. }
            | VariableError::InvalidRange { .. }
            | VariableError::EmptyDropdown { .. } => Self::BadRequest(message),
        }
    }
}

impl From<ServerError> for ObserverError {
    fn from(err: ServerError) -> Self {
        let message = err.to_string();
        match err {
            ServerError::AlreadyRunning | ServerError::NotRunning => Self::Conflict(message),
            ServerError::NoVariables => Self::BadRequest(message),
            ServerError::AddressSpace(AddressSpaceError::NotFound { .. }) => Self::NotFound(message),
            ServerError::AddressSpace(AddressSpaceError::TypeMismatch { .. }) => {
                Self::BadRequest(message)
            }
            ServerError::AddressSpace(AddressSpaceError::Poisoned { .. })
            | ServerError::InvalidEndpoint(_)
            | ServerError::Bind { .. } => Self::Internal(message),
        }
    }
}

impl From<JsonRejection> for ObserverError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Serialization(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
