//! Shared type definitions for the OPC UA tag simulator.
//!
//! This crate is the single source of truth for the data that crosses
//! crate boundaries: variable descriptors, tag values, lifecycle state
//! and the snapshots pushed to monitoring clients. Types flow to
//! `TypeScript` via `ts-rs` for the monitoring front end.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers (protocol sessions)
//! - [`enums`] -- Variable kinds, numeric modes, server state
//! - [`value`] -- The [`TagValue`] sum type and its coercion rules
//! - [`variable`] -- The [`VariableConfig`] descriptor
//! - [`snapshot`] -- History entries, current-value snapshots, chart data

pub mod enums;
pub mod ids;
pub mod snapshot;
pub mod value;
pub mod variable;

// Re-export all public types at crate root for convenience.
pub use enums::{NumericMode, ServerState, VariableKind};
pub use ids::SessionId;
pub use snapshot::{ChartSeries, CurrentValue, HistoryEntry, HistoryRecord, ValuesUpdate};
pub use value::{TagValue, round2};
pub use variable::VariableConfig;

#[cfg(test)]
mod tests {
    //! Tests for type exports and `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs writes the bindings into `bindings/` relative to the
        // crate root when `export_all` is called.
        use ts_rs::TS;

        let _ = crate::ids::SessionId::export_all();

        let _ = crate::enums::VariableKind::export_all();
        let _ = crate::enums::NumericMode::export_all();
        let _ = crate::enums::ServerState::export_all();

        let _ = crate::value::TagValue::export_all();
        let _ = crate::variable::VariableConfig::export_all();

        let _ = crate::snapshot::HistoryEntry::export_all();
        let _ = crate::snapshot::CurrentValue::export_all();
        let _ = crate::snapshot::ValuesUpdate::export_all();
        let _ = crate::snapshot::HistoryRecord::export_all();
        let _ = crate::snapshot::ChartSeries::export_all();
    }

    #[test]
    fn current_value_uses_type_key() {
        let cv = crate::CurrentValue {
            value: crate::TagValue::Numeric(50.0),
            kind: crate::VariableKind::Numeric,
            config: crate::VariableConfig::random(0.0, 100.0),
        };
        let json = serde_json::to_value(&cv).unwrap_or_default();
        assert_eq!(json["type"], "Numeric");
        assert_eq!(json["value"], 50.0);
        assert_eq!(json["config"]["mode"], "Random");
    }
}
