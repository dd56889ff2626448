//! Shared application state for the Observer API server.
//!
//! [`AppState`] holds the [`Simulator`] and the variable registry that
//! the next `start` builds its address space from. The registry is
//! edited through the REST API. The simulator is only read from, apart
//! from lifecycle calls and value pushes.

use std::sync::Arc;

use opcsim_core::VariableSet;
use opcsim_server::Simulator;
use opcsim_types::ValuesUpdate;
use tokio::sync::{RwLock, broadcast};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug)]
pub struct AppState {
    /// The protocol server and its simulation.
    pub simulator: Arc<Simulator>,
    /// Variables used by the next start.
    pub variables: RwLock<VariableSet>,
}

impl AppState {
    /// Create application state around a simulator and an initial
    /// variable registry.
    pub fn new(simulator: Arc<Simulator>, variables: VariableSet) -> Self {
        Self {
            simulator,
            variables: RwLock::new(variables),
        }
    }

    /// Subscribe to the periodic value broadcasts.
    pub fn subscribe(&self) -> broadcast::Receiver<ValuesUpdate> {
        self.simulator.subscribe()
    }
}
