//! The validated set of tag variables.
//!
//! [`VariableSet`] is the only way a map of descriptors reaches the
//! address space, so every invariant on descriptors is enforced here:
//! at most [`MAX_VARIABLES`] entries, non-empty unique names, finite
//! numeric fields with `min <= max`, and a non-empty option list for
//! dropdown strings.

use std::collections::BTreeMap;

use opcsim_types::VariableConfig;
use serde::{Deserialize, Serialize};

/// Maximum number of variables that may exist at once.
pub const MAX_VARIABLES: usize = 30;

/// Errors raised when a descriptor or the set as a whole is invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariableError {
    /// The variable name is empty or whitespace.
    #[error("variable name is required")]
    EmptyName,

    /// A variable with this name already exists.
    #[error("variable '{name}' already exists")]
    Duplicate {
        /// The conflicting name.
        name: String,
    },

    /// The set already holds the maximum number of variables.
    #[error("at most {max} variables are allowed")]
    LimitReached {
        /// The configured maximum.
        max: usize,
    },

    /// No variable with this name exists.
    #[error("variable '{name}' not found")]
    NotFound {
        /// The requested name.
        name: String,
    },

    /// A numeric field is NaN or infinite.
    #[error("variable '{name}': {field} must be a finite number")]
    NonFinite {
        /// The offending variable.
        name: String,
        /// The offending field.
        field: &'static str,
    },

    /// A random-walk range has `min > max`.
    #[error("variable '{name}': min must not exceed max")]
    InvalidRange {
        /// The offending variable.
        name: String,
    },

    /// A dropdown string has no options to choose from.
    #[error("variable '{name}': dropdown requires at least one option")]
    EmptyDropdown {
        /// The offending variable.
        name: String,
    },
}

/// Check a single descriptor in isolation.
pub fn validate(name: &str, config: &VariableConfig) -> Result<(), VariableError> {
    if name.trim().is_empty() {
        return Err(VariableError::EmptyName);
    }

    match config {
        VariableConfig::Numeric {
            min, max, constant, ..
        } => {
            for (field, value) in [("min", min), ("max", max), ("constant", constant)] {
                if !value.is_finite() {
                    return Err(VariableError::NonFinite {
                        name: name.to_owned(),
                        field,
                    });
                }
            }
            if min > max {
                return Err(VariableError::InvalidRange {
                    name: name.to_owned(),
                });
            }
        }
        VariableConfig::Text {
            use_dropdown,
            dropdown_options,
            ..
        } => {
            if *use_dropdown && dropdown_options.is_empty() {
                return Err(VariableError::EmptyDropdown {
                    name: name.to_owned(),
                });
            }
        }
        VariableConfig::Boolean { .. } => {}
    }

    Ok(())
}

/// A validated, name-keyed collection of variable descriptors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, VariableConfig>",
    into = "BTreeMap<String, VariableConfig>"
)]
pub struct VariableSet {
    entries: BTreeMap<String, VariableConfig>,
}

impl VariableSet {
    /// Create an empty set.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add a new variable.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        config: VariableConfig,
    ) -> Result<(), VariableError> {
        let name = name.into();
        validate(&name, &config)?;
        if self.entries.contains_key(&name) {
            return Err(VariableError::Duplicate { name });
        }
        if self.entries.len() >= MAX_VARIABLES {
            return Err(VariableError::LimitReached { max: MAX_VARIABLES });
        }
        self.entries.insert(name, config);
        Ok(())
    }

    /// Replace the descriptor of an existing variable, returning the old one.
    pub fn replace(
        &mut self,
        name: &str,
        config: VariableConfig,
    ) -> Result<VariableConfig, VariableError> {
        validate(name, &config)?;
        let slot = self
            .entries
            .get_mut(name)
            .ok_or_else(|| VariableError::NotFound {
                name: name.to_owned(),
            })?;
        Ok(std::mem::replace(slot, config))
    }

    /// Remove a variable, returning its descriptor.
    pub fn remove(&mut self, name: &str) -> Option<VariableConfig> {
        self.entries.remove(name)
    }

    /// Look up a descriptor by name.
    pub fn get(&self, name: &str) -> Option<&VariableConfig> {
        self.entries.get(name)
    }

    /// Whether a variable with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate over `(name, descriptor)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &VariableConfig)> {
        self.entries.iter()
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The built-in demo variables used when no configuration is given.
    pub fn demo() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            String::from("Temperature"),
            VariableConfig::random(0.0, 100.0),
        );
        entries.insert(String::from("Pressure"), VariableConfig::random(0.0, 50.0));
        entries.insert(
            String::from("Status"),
            VariableConfig::dropdown(
                Some("Active"),
                [
                    "Active",
                    "Idle",
                    "Scheduled Down",
                    "Maintenance",
                    "Unscheduled Down",
                ],
            ),
        );
        entries.insert(String::from("DeviceID"), VariableConfig::text("DEVICE-1001"));
        Self { entries }
    }
}

impl TryFrom<BTreeMap<String, VariableConfig>> for VariableSet {
    type Error = VariableError;

    fn try_from(map: BTreeMap<String, VariableConfig>) -> Result<Self, Self::Error> {
        let mut set = Self::new();
        for (name, config) in map {
            set.insert(name, config)?;
        }
        Ok(set)
    }
}

impl From<VariableSet> for BTreeMap<String, VariableConfig> {
    fn from(set: VariableSet) -> Self {
        set.entries
    }
}

impl<'a> IntoIterator for &'a VariableSet {
    type Item = (&'a String, &'a VariableConfig);
    type IntoIter = std::collections::btree_map::Iter<'a, String, VariableConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn demo_set_is_valid() {
        let demo = VariableSet::demo();
        assert_eq!(demo.len(), 4);
        for (name, config) in &demo {
            assert!(validate(name, config).is_ok(), "{name} should validate");
        }
    }

    #[test]
    fn rejects_duplicates_and_empty_names() {
        let mut set = VariableSet::new();
        set.insert("Temperature", VariableConfig::random(0.0, 100.0))
            .unwrap();
        assert_eq!(
            set.insert("Temperature", VariableConfig::boolean(true)),
            Err(VariableError::Duplicate {
                name: String::from("Temperature")
            })
        );
        assert_eq!(
            set.insert("  ", VariableConfig::boolean(true)),
            Err(VariableError::EmptyName)
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn enforces_variable_limit() {
        let mut set = VariableSet::new();
        for i in 0..MAX_VARIABLES {
            set.insert(format!("Tag{i}"), VariableConfig::boolean(false))
                .unwrap();
        }
        assert_eq!(
            set.insert("OneTooMany", VariableConfig::boolean(false)),
            Err(VariableError::LimitReached { max: MAX_VARIABLES })
        );
        assert_eq!(set.len(), MAX_VARIABLES);
    }

    #[test]
    fn rejects_invalid_numeric_fields() {
        assert_eq!(
            validate("Flow", &VariableConfig::random(10.0, 1.0)),
            Err(VariableError::InvalidRange {
                name: String::from("Flow")
            })
        );
        assert!(matches!(
            validate("Flow", &VariableConfig::random(f64::NAN, 1.0)),
            Err(VariableError::NonFinite { field: "min", .. })
        ));
        assert!(validate("Flow", &VariableConfig::random(3.0, 3.0)).is_ok());
    }

    #[test]
    fn rejects_empty_dropdown() {
        let config = VariableConfig::dropdown(None, Vec::<String>::new());
        assert!(matches!(
            validate("Mode", &config),
            Err(VariableError::EmptyDropdown { .. })
        ));
    }

    #[test]
    fn replace_requires_existing_name() {
        let mut set = VariableSet::demo();
        let old = set
            .replace("DeviceID", VariableConfig::text("DEVICE-2002"))
            .unwrap();
        assert_eq!(old, VariableConfig::text("DEVICE-1001"));
        assert!(matches!(
            set.replace("Missing", VariableConfig::boolean(true)),
            Err(VariableError::NotFound { .. })
        ));
    }

    #[test]
    fn deserializing_validates() {
        let ok: Result<VariableSet, _> =
            serde_json::from_str(r#"{"Valve": {"type": "Boolean", "value": true}}"#);
        assert_eq!(ok.unwrap().len(), 1);

        let bad: Result<VariableSet, _> = serde_json::from_str(
            r#"{"Level": {"type": "Numeric", "mode": "Random", "min": 5, "max": 1}}"#,
        );
        assert!(bad.is_err());
    }
}
