//! Observer HTTP server lifecycle management.
//!
//! Provides [`bind`] and [`serve`], which together run the Axum server
//! on a TCP port until the given shutdown future completes.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use opcsim_core::config::ObserverSettings;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Errors that can occur when starting or running the Observer server.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Bind the observer's TCP listener.
///
/// # Errors
///
/// Returns [`ServeError::Bind`] if the address is invalid or the port
/// cannot be bound.
pub async fn bind(settings: &ObserverSettings) -> Result<TcpListener, ServeError> {
    let addr = settings
        .socket_addr()
        .map_err(|e| ServeError::Bind(e.to_string()))?;

    TcpListener::bind(addr)
        .await
        .map_err(|e| ServeError::Bind(format!("bind failed on {addr}: {e}")))
}

/// Serve the observer on an already-bound listener until `shutdown`
/// completes.
///
/// # Errors
///
/// Returns [`ServeError::Serve`] if the server encounters a fatal I/O
/// error.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: Option<SocketAddr> = listener.local_addr().ok();
    info!(?addr, "Observer server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServeError::Serve(format!("serve error: {e}")))?;

    info!("Observer server stopped");
    Ok(())
}
