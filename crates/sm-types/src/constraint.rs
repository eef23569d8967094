//! Constraints restricting the joint values of one or more parameters.

use serde::{Deserialize, Serialize};

/// Kind of restriction applied by a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Exclusion,
    ConditionalExclusion,
    LinearEq,
    LinearLte,
    LinearGte,
    LinearBetween,
}

impl ConstraintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exclusion => "exclusion",
            Self::ConditionalExclusion => "conditional_exclusion",
            Self::LinearEq => "linear_eq",
            Self::LinearLte => "linear_lte",
            Self::LinearGte => "linear_gte",
            Self::LinearBetween => "linear_between",
        }
    }
}

/// One parameter's role inside a constraint.
///
/// Bound values are always carried as strings regardless of how they were
/// supplied; the remote service's numeric-as-string convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDefinition {
    pub parameter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Vec<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl ConstraintDefinition {
    pub fn new(parameter: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            bounds: None,
            weight: None,
        }
    }

    /// Attach bounds, stringifying every element. Already-string bounds
    /// pass through without re-quoting.
    pub fn with_bounds(mut self, bounds: Vec<Vec<serde_json::Value>>) -> Self {
        self.bounds = Some(
            bounds
                .into_iter()
                .map(|pair| pair.iter().map(bound_to_string).collect())
                .collect(),
        );
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
}

fn bound_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A named restriction over one or more parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ConstraintKind,
    pub definitions: Vec<ConstraintDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<f64>>,
}

impl Constraint {
    /// Create a constraint; the name defaults to the kind's wire name.
    pub fn new(kind: ConstraintKind, definitions: Vec<ConstraintDefinition>) -> Self {
        Self {
            name: kind.as_str().to_string(),
            kind,
            definitions,
            targets: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_targets(mut self, targets: Vec<f64>) -> Self {
        self.targets = Some(targets);
        self
    }
}
