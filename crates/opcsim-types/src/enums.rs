//! Enumeration types for the tag simulator.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Variable kinds
// ---------------------------------------------------------------------------

/// The declared data type of a tag variable.
///
/// Every node in the address space has exactly one kind, fixed when the
/// server starts. Writes are coerced to this kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum VariableKind {
    /// Floating-point measurement (temperature, pressure, ...).
    Numeric,
    /// Free text or a dropdown selection.
    #[serde(rename = "String")]
    Text,
    /// On/off flag.
    Boolean,
}

impl VariableKind {
    /// The name used on the wire and in configuration files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Numeric => "Numeric",
            Self::Text => "String",
            Self::Boolean => "Boolean",
        }
    }
}

impl core::fmt::Display for VariableKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a numeric variable evolves while the server runs.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub enum NumericMode {
    /// Bounded random walk between `min` and `max`.
    #[default]
    Random,
    /// Fixed value, only changed by external writes.
    Constant,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Process-wide lifecycle flag of the protocol server.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub enum ServerState {
    /// No address space exists; background tasks are not running.
    #[default]
    Stopped,
    /// The address space is live and the background tasks are ticking.
    Running,
}

impl ServerState {
    /// Whether the server is currently running.
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}
