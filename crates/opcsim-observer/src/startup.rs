//! Observer server startup helper for embedding in the engine binary.
//!
//! Provides [`spawn_observer`] which binds the Observer HTTP +
//! `WebSocket` server and runs it on a background Tokio task, so the
//! binary can wait for Ctrl-C while the API serves requests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use opcsim_observer::startup::spawn_observer;
//!
//! let (addr, handle) = spawn_observer(&config.observer, state, shutdown).await?;
//! // The server is now running. Await the handle after signalling shutdown.
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use opcsim_core::config::ObserverSettings;
use tokio::task::JoinHandle;

use crate::server::{self, ServeError};
use crate::state::AppState;

/// Errors that can occur when spawning the Observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServeError),
}

/// Bind the Observer server and serve it on a background Tokio task.
///
/// The bind happens before the task is spawned, so a port conflict is
/// reported to the caller. Returns the bound address and a
/// [`JoinHandle`] that completes once `shutdown` fires and in-flight
/// requests drain.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address is invalid or cannot
/// be bound.
pub async fn spawn_observer<F>(
    settings: &ObserverSettings,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(SocketAddr, JoinHandle<()>), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = server::bind(settings).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServeError::Bind(e.to_string()))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "Observer server exited with error");
        }
    });

    tracing::info!(%addr, "Observer server spawned on background task");

    Ok((addr, handle))
}
