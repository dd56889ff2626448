//! The address space: one live, writable node per tag variable.
//!
//! The set of nodes is fixed when the space is built, so the outer map
//! needs no lock. Each [`Node`] guards its own value and its own history
//! with separate `std::sync` locks. Critical sections never await and
//! never touch more than one node, so the simulation engine, protocol
//! sessions, the broadcaster and HTTP handlers can all work on the same
//! space without coordinating.
//!
//! A poisoned lock (a thread panicked while holding it) surfaces as
//! [`AddressSpaceError::Poisoned`], which periodic loops treat as a
//! transient failure for that one variable.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use opcsim_types::{
    CurrentValue, HistoryEntry, NumericMode, TagValue, VariableConfig, VariableKind, round2,
};
use tracing::warn;

use crate::history::HistoryBuffer;
use crate::variables::VariableSet;

/// Errors returned by node reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressSpaceError {
    /// No node exists under this name.
    #[error("node '{name}' not found")]
    NotFound {
        /// The requested name.
        name: String,
    },

    /// The written value cannot be converted to the node's kind.
    #[error("cannot write {found} value to {expected} node '{name}'")]
    TypeMismatch {
        /// The node name.
        name: String,
        /// The node's declared kind.
        expected: VariableKind,
        /// The type of the rejected value.
        found: &'static str,
    },

    /// The node's lock was poisoned by a panicking writer.
    #[error("node '{name}' is unavailable: {detail}")]
    Poisoned {
        /// The node name.
        name: String,
        /// Description of the poisoned lock.
        detail: String,
    },
}

/// The value half of a node at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSample {
    /// Current value.
    pub value: TagValue,
    /// When the value was last written.
    pub source_timestamp: DateTime<Utc>,
    /// Incremented on every write; lets subscribers detect changes.
    pub version: u64,
}

/// A server-side addressable, writable variable.
#[derive(Debug)]
pub struct Node {
    name: String,
    config: VariableConfig,
    state: RwLock<NodeSample>,
    history: Mutex<HistoryBuffer>,
}

impl Node {
    fn new(name: String, config: VariableConfig, history_capacity: usize) -> Self {
        let value = initial_value(&config);
        Self {
            name,
            config,
            state: RwLock::new(NodeSample {
                value,
                source_timestamp: Utc::now(),
                version: 0,
            }),
            history: Mutex::new(HistoryBuffer::with_capacity(history_capacity)),
        }
    }

    /// The variable name this node exposes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The descriptor the node was built from.
    pub const fn config(&self) -> &VariableConfig {
        &self.config
    }

    /// The declared kind of the node.
    pub const fn kind(&self) -> VariableKind {
        self.config.kind()
    }

    /// Read the current value, timestamp and version.
    pub fn sample(&self) -> Result<NodeSample, AddressSpaceError> {
        self.state
            .read()
            .map(|guard| guard.clone())
            .map_err(|err| self.poisoned(&err))
    }

    /// Read the current value.
    pub fn read(&self) -> Result<TagValue, AddressSpaceError> {
        self.sample().map(|s| s.value)
    }

    /// Coerce `value` to this node's kind and store it.
    ///
    /// Returns the value actually stored. On a type mismatch the node
    /// is left unchanged.
    pub fn write(&self, value: TagValue) -> Result<TagValue, AddressSpaceError> {
        let found = value.type_name();
        let coerced = value
            .coerce(self.kind())
            .ok_or_else(|| AddressSpaceError::TypeMismatch {
                name: self.name.clone(),
                expected: self.kind(),
                found,
            })?;
        self.store(coerced.clone(), Utc::now())?;
        Ok(coerced)
    }

    /// Store an already-typed value.
    pub(crate) fn store(
        &self,
        value: TagValue,
        at: DateTime<Utc>,
    ) -> Result<(), AddressSpaceError> {
        let mut guard = self.state.write().map_err(|err| self.poisoned(&err))?;
        guard.value = value;
        guard.source_timestamp = at;
        guard.version = guard.version.wrapping_add(1);
        Ok(())
    }

    /// Append a sample to this node's history.
    pub fn record(&self, timestamp: DateTime<Utc>, value: TagValue) -> Result<(), AddressSpaceError> {
        self.history
            .lock()
            .map_err(|err| self.poisoned(&err))?
            .append(timestamp, value);
        Ok(())
    }

    /// Copy of this node's history, most recent last.
    pub fn history(&self) -> Result<Vec<HistoryEntry>, AddressSpaceError> {
        self.history
            .lock()
            .map(|buffer| buffer.snapshot())
            .map_err(|err| self.poisoned(&err))
    }

    /// Snapshot of value, kind and descriptor.
    pub fn current(&self) -> Result<CurrentValue, AddressSpaceError> {
        Ok(CurrentValue {
            value: self.read()?,
            kind: self.kind(),
            config: self.config.clone(),
        })
    }

    fn poisoned(&self, err: &impl std::fmt::Display) -> AddressSpaceError {
        AddressSpaceError::Poisoned {
            name: self.name.clone(),
            detail: err.to_string(),
        }
    }
}

/// Compute the value a node starts with.
///
/// Numeric tags start at the midpoint of their range (random mode) or
/// at their constant, rounded to two decimals. Strings start at their
/// configured value, falling back to the first dropdown option or the
/// empty string. Booleans start at their configured value.
pub fn initial_value(config: &VariableConfig) -> TagValue {
    match config {
        VariableConfig::Numeric {
            mode,
            min,
            max,
            constant,
        } => {
            let start = match mode {
                NumericMode::Random => (min + max) / 2.0,
                NumericMode::Constant => *constant,
            };
            TagValue::Numeric(round2(start))
        }
        VariableConfig::Text {
            value,
            use_dropdown,
            dropdown_options,
        } => {
            let fallback = if *use_dropdown {
                dropdown_options.first().cloned()
            } else {
                None
            };
            TagValue::Text(value.clone().or(fallback).unwrap_or_default())
        }
        VariableConfig::Boolean { value } => TagValue::Flag(*value),
    }
}

/// The collection of all nodes exposed by a running server.
#[derive(Debug, Default)]
pub struct AddressSpace {
    nodes: BTreeMap<String, Node>,
}

impl AddressSpace {
    /// Build one node per variable, each with its own history buffer.
    pub fn build(variables: &VariableSet, history_capacity: usize) -> Self {
        let nodes = variables
            .iter()
            .map(|(name, config)| {
                (
                    name.clone(),
                    Node::new(name.clone(), config.clone(), history_capacity),
                )
            })
            .collect();
        Self { nodes }
    }

    /// Look up a node by name.
    pub fn node(&self, name: &str) -> Result<&Node, AddressSpaceError> {
        self.nodes.get(name).ok_or_else(|| AddressSpaceError::NotFound {
            name: name.to_owned(),
        })
    }

    /// Iterate over all nodes in name order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Whether a node with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the space has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Read a node's current value.
    pub fn read(&self, name: &str) -> Result<TagValue, AddressSpaceError> {
        self.node(name)?.read()
    }

    /// Coerce and write a value into a node.
    pub fn write(&self, name: &str, value: TagValue) -> Result<TagValue, AddressSpaceError> {
        self.node(name)?.write(value)
    }

    /// Current value, kind and descriptor of every readable node.
    ///
    /// Nodes whose lock is poisoned are logged and left out.
    pub fn snapshot(&self) -> BTreeMap<String, CurrentValue> {
        self.nodes
            .iter()
            .filter_map(|(name, node)| match node.current() {
                Ok(current) => Some((name.clone(), current)),
                Err(e) => {
                    warn!(variable = %name, error = %e, "Skipping node in snapshot");
                    None
                }
            })
            .collect()
    }

    /// Copy of every node's history, most recent last.
    pub fn history_snapshot(&self) -> BTreeMap<String, Vec<HistoryEntry>> {
        self.nodes
            .iter()
            .filter_map(|(name, node)| match node.history() {
                Ok(history) => Some((name.clone(), history)),
                Err(e) => {
                    warn!(variable = %name, error = %e, "Skipping node history");
                    None
                }
            })
            .collect()
    }
}
