//! Error types for the protocol server lifecycle.

use std::net::SocketAddr;

use opcsim_core::{AddressSpaceError, ConfigError};

/// Errors returned by [`Simulator`](crate::Simulator) operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `start` was called while the server is running.
    #[error("server is already running")]
    AlreadyRunning,

    /// The operation needs a running server.
    #[error("server is not running")]
    NotRunning,

    /// `start` was called with an empty variable set.
    #[error("no variables configured")]
    NoVariables,

    /// The configured host and port are not a valid endpoint.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] ConfigError),

    /// The endpoint could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// The address that failed to bind.
        address: SocketAddr,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A node read or write failed.
    #[error(transparent)]
    AddressSpace(#[from] AddressSpaceError),
}
