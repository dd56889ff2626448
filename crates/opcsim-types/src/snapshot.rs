//! Point-in-time views of the address space handed to external listeners.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::VariableKind;
use crate::value::TagValue;
use crate::variable::VariableConfig;

/// One recorded sample in a variable's rolling history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HistoryEntry {
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// The node value at that time.
    pub value: TagValue,
}

/// Current value of one variable together with its descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CurrentValue {
    /// The node's current value.
    pub value: TagValue,
    /// The declared kind of the variable.
    #[serde(rename = "type")]
    pub kind: VariableKind,
    /// The descriptor the node was created from.
    pub config: VariableConfig,
}

/// Periodic fan-out message carrying every current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ValuesUpdate {
    /// Monotonic counter, restarting at 1 on every server start.
    pub sequence: u64,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Current values keyed by variable name.
    pub values: BTreeMap<String, CurrentValue>,
}

/// One row of the merged, cross-variable history view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HistoryRecord {
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// Which variable the sample belongs to.
    pub variable: String,
    /// The recorded value.
    pub value: TagValue,
}

/// Chart data for one random-walk numeric variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChartSeries {
    /// Sample times, oldest first.
    pub timestamps: Vec<DateTime<Utc>>,
    /// Sample values, aligned with `timestamps`.
    pub data: Vec<f64>,
    /// Lower bound of the variable's range.
    pub min: f64,
    /// Upper bound of the variable's range.
    pub max: f64,
}
