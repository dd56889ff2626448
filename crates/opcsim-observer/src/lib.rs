//! Observer API server for the OPC UA tag simulator.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/values`) for real-time value
//!   streaming via [`tokio::sync::broadcast`]
//! - **Lifecycle endpoints** to start and stop the protocol server and
//!   query its status
//! - **Variable registry endpoints** to add, edit and remove the
//!   variables the next start serves
//! - **Data endpoints** for current values, merged history and chart
//!   series
//! - **Minimal HTML page** (`GET /`) showing server status and links
//!
//! # Architecture
//!
//! Handlers share one [`AppState`] holding the [`Simulator`] and the
//! variable registry. Reads go straight to the simulator, which only
//! takes per-node locks, so the observer never blocks simulation ticks.
//!
//! [`Simulator`]: opcsim_server::Simulator

pub mod control;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod variables;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServeError, bind, serve};
pub use startup::{StartupError, spawn_observer};
pub use state::AppState;
