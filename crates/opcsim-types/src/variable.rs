//! Tag variable descriptors.
//!
//! A [`VariableConfig`] is keyed by the variable's name in every map that
//! holds it; the name is the variable's identity and never changes. The
//! JSON shape is internally tagged by `type`:
//!
//! ```json
//! {"type": "Numeric", "mode": "Random", "min": 0.0, "max": 100.0, "constant": 0.0}
//! {"type": "String", "value": "Active", "use_dropdown": true, "dropdown_options": ["Active", "Idle"]}
//! {"type": "Boolean", "value": false}
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{NumericMode, VariableKind};

/// Typed descriptor for one tag variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type")]
pub enum VariableConfig {
    /// A floating-point tag.
    Numeric {
        /// Random walk or constant.
        #[serde(default)]
        mode: NumericMode,
        /// Lower bound of the random walk.
        #[serde(default)]
        min: f64,
        /// Upper bound of the random walk.
        #[serde(default)]
        max: f64,
        /// Value used in constant mode.
        #[serde(default)]
        constant: f64,
    },
    /// A text tag, optionally restricted to a dropdown in the UI.
    #[serde(rename = "String")]
    Text {
        /// Default value published when the server starts.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        /// Whether the UI offers `dropdown_options` instead of free text.
        #[serde(default)]
        use_dropdown: bool,
        /// Choices offered when `use_dropdown` is set.
        #[serde(default)]
        dropdown_options: Vec<String>,
    },
    /// An on/off tag.
    Boolean {
        /// Default value published when the server starts.
        #[serde(default)]
        value: bool,
    },
}

impl VariableConfig {
    /// Shorthand for a random-walk numeric tag.
    pub const fn random(min: f64, max: f64) -> Self {
        Self::Numeric {
            mode: NumericMode::Random,
            min,
            max,
            constant: 0.0,
        }
    }

    /// Shorthand for a constant numeric tag.
    pub const fn constant(value: f64) -> Self {
        Self::Numeric {
            mode: NumericMode::Constant,
            min: 0.0,
            max: 0.0,
            constant: value,
        }
    }

    /// Shorthand for a free-text tag.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: Some(value.into()),
            use_dropdown: false,
            dropdown_options: Vec::new(),
        }
    }

    /// Shorthand for a dropdown text tag.
    pub fn dropdown<I, S>(value: Option<&str>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Text {
            value: value.map(str::to_owned),
            use_dropdown: true,
            dropdown_options: options.into_iter().map(Into::into).collect(),
        }
    }

    /// Shorthand for a boolean tag.
    pub const fn boolean(value: bool) -> Self {
        Self::Boolean { value }
    }

    /// The declared kind of this variable.
    pub const fn kind(&self) -> VariableKind {
        match self {
            Self::Numeric { .. } => VariableKind::Numeric,
            Self::Text { .. } => VariableKind::Text,
            Self::Boolean { .. } => VariableKind::Boolean,
        }
    }

    /// The `(min, max)` bounds when this is a random-walk numeric tag.
    pub const fn random_range(&self) -> Option<(f64, f64)> {
        match self {
            Self::Numeric {
                mode: NumericMode::Random,
                min,
                max,
                ..
            } => Some((*min, *max)),
            _ => None,
        }
    }
}
