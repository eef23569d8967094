//! Optimizable parameter definitions and their unit-scale handling.

use serde::{Deserialize, Serialize};

use crate::scale;

/// Single named numeric property attached to a categorical option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorProperty {
    pub key: String,
    pub value: f64,
}

/// One option of a categorical parameter, with optional named properties.
///
/// If properties are provided for any option of a parameter, they must be
/// provided for all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<DescriptorProperty>,
}

impl Descriptor {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: f64) -> Self {
        self.properties.push(DescriptorProperty {
            key: key.into(),
            value,
        });
        self
    }
}

/// Describes the value domain of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterRange {
    /// Continuous range [low_value, high_value].
    Continuous { low_value: f64, high_value: f64 },
    /// Discrete range [low_value, high_value] stepped by stride.
    Discrete {
        low_value: f64,
        high_value: f64,
        stride: f64,
    },
    /// Categorical choices.
    Categorical { descriptors: Vec<Descriptor> },
}

impl ParameterRange {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Continuous { .. } => "continuous",
            Self::Discrete { .. } => "discrete",
            Self::Categorical { .. } => "categorical",
        }
    }

    pub fn low(&self) -> Option<f64> {
        match self {
            Self::Continuous { low_value, .. } | Self::Discrete { low_value, .. } => {
                Some(*low_value)
            }
            Self::Categorical { .. } => None,
        }
    }

    pub fn high(&self) -> Option<f64> {
        match self {
            Self::Continuous { high_value, .. } | Self::Discrete { high_value, .. } => {
                Some(*high_value)
            }
            Self::Categorical { .. } => None,
        }
    }

    pub fn stride(&self) -> Option<f64> {
        match self {
            Self::Discrete { stride, .. } => Some(*stride),
            _ => None,
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, Self::Categorical { .. })
    }
}

/// A concrete value assigned to a parameter: numeric for continuous and
/// discrete parameters, a category name for categorical ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Category(String),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Category(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Category(s) => Some(s),
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Category(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Category(value.to_string())
    }
}

/// One optimizable variable of a configuration.
///
/// `scale` is derived from the defining bound during validation (see
/// [`Parameter::with_scale_floor`]) and holds the power of ten used to
/// rescale user units into service units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(flatten)]
    pub range: ParameterRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
}

impl Parameter {
    pub fn continuous(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            range: ParameterRange::Continuous {
                low_value: low,
                high_value: high,
            },
            description: None,
            scale: None,
        }
    }

    pub fn discrete(name: impl Into<String>, low: f64, high: f64, stride: f64) -> Self {
        Self {
            name: name.into(),
            range: ParameterRange::Discrete {
                low_value: low,
                high_value: high,
                stride,
            },
            description: None,
            scale: None,
        }
    }

    pub fn categorical(name: impl Into<String>, descriptors: Vec<Descriptor>) -> Self {
        Self {
            name: name.into(),
            range: ParameterRange::Categorical { descriptors },
            description: None,
            scale: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Derive the unit scale for this parameter under the given threshold.
    ///
    /// The defining bound is the first non-zero of low, stride, high; a
    /// literal zero low falls through to the next bound. Categorical
    /// parameters never carry a scale.
    pub fn with_scale_floor(mut self, scale_floor: i32) -> Self {
        self.scale = self
            .defining_bound()
            .and_then(|bound| scale::scale_exponent(bound, scale_floor));
        self
    }

    /// First non-zero bound among low, stride, high, in that order.
    /// `None` for categorical parameters or when every bound is zero.
    pub fn defining_bound(&self) -> Option<f64> {
        [self.range.low(), self.range.stride(), self.range.high()]
            .into_iter()
            .flatten()
            .find(|bound| *bound != 0.0)
    }

    /// Rescale a user-unit value into service units. Identity when no
    /// scale applies.
    pub fn to_service_units(&self, value: f64) -> f64 {
        match self.scale {
            Some(exponent) => scale::to_service_units(value, exponent),
            None => value,
        }
    }

    /// Rescale a service-unit value back into user units. Identity when
    /// no scale applies.
    pub fn to_user_units(&self, value: f64) -> f64 {
        match self.scale {
            Some(exponent) => scale::to_user_units(value, exponent),
            None => value,
        }
    }

    /// Rescale a [`ParamValue`] into service units; category values pass
    /// through unchanged.
    pub fn value_to_service_units(&self, value: &ParamValue) -> ParamValue {
        match value {
            ParamValue::Number(v) => ParamValue::Number(self.to_service_units(*v)),
            ParamValue::Category(s) => ParamValue::Category(s.clone()),
        }
    }

    /// Rescale a [`ParamValue`] into user units; category values pass
    /// through unchanged.
    pub fn value_to_user_units(&self, value: &ParamValue) -> ParamValue {
        match value {
            ParamValue::Number(v) => ParamValue::Number(self.to_user_units(*v)),
            ParamValue::Category(s) => ParamValue::Category(s.clone()),
        }
    }

    /// Description sent to the service, annotated with the unit scale when
    /// one applies so remote dashboards show the shifted units.
    pub fn service_description(&self) -> Option<String> {
        match self.scale {
            Some(exponent) => Some(format!(
                "{} in base units * 10^(-{exponent})",
                self.description.as_deref().unwrap_or_default()
            )),
            None => self.description.clone(),
        }
    }
}
