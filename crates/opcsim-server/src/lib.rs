//! Protocol endpoint and lifecycle control for the OPC UA tag simulator.
//!
//! This crate exposes the simulated tags to clients over TCP and owns
//! the start/stop lifecycle of everything that runs while the server is
//! up:
//!
//! - **Simulation engine** ticking random-walk tags and recording
//!   history (from `opcsim-core`)
//! - **Update broadcaster** publishing value snapshots to in-process
//!   listeners such as the HTTP observer
//! - **Protocol listener** accepting client sessions that browse, read,
//!   write and subscribe to nodes using newline-delimited JSON
//!
//! # Architecture
//!
//! [`Simulator`] is an explicit object, shared behind an `Arc`. All of
//! its background tasks watch one lifecycle channel, so `stop` reaches
//! every loop at once and each task exits within one period. Sessions
//! and subscriptions are owned by the listener task and are torn down
//! with it.

pub mod error;
mod framing;
mod listener;
pub mod protocol;
mod session;
pub mod simulator;
mod subscription;

pub use error::ServerError;
pub use framing::MAX_LINE_BYTES;
pub use protocol::{NodeId, Request, RequestFrame, Response, ResponseFrame, StatusCode};
pub use session::MAX_SUBSCRIPTIONS_PER_SESSION;
pub use simulator::{Simulator, StopOutcome, StopReport};
