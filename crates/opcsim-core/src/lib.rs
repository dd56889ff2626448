//! Address space, rolling history and simulation engine for the OPC UA
//! tag simulator.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `opcsim-config.yaml` into
//!   strongly-typed structs.
//! - [`variables`] -- The validated [`VariableSet`].
//! - [`history`] -- Fixed-capacity [`HistoryBuffer`] per variable.
//! - [`address_space`] -- One live, writable [`Node`] per variable.
//! - [`ticker`] -- Lifecycle-aware periodic [`Ticker`].
//! - [`simulation`] -- The [`SimulationEngine`] random walk and history
//!   snapshotting.
//! - [`broadcaster`] -- The [`UpdateBroadcaster`] fan-out to listeners.
//! - [`views`] -- Merged history and chart views.

pub mod address_space;
pub mod broadcaster;
pub mod config;
pub mod history;
pub mod simulation;
pub mod ticker;
pub mod variables;
pub mod views;

pub use address_space::{AddressSpace, AddressSpaceError, Node, NodeSample};
pub use broadcaster::UpdateBroadcaster;
pub use config::{ConfigError, SimulatorConfig};
pub use history::HistoryBuffer;
pub use simulation::{SimulationEngine, TickReport};
pub use ticker::Ticker;
pub use variables::{MAX_VARIABLES, VariableError, VariableSet};
