//! Optimization objectives and multi-objective combination settings.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Direction in which an objective is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveGoal {
    Min,
    Max,
    Target,
}

impl Default for ObjectiveGoal {
    fn default() -> Self {
        Self::Max
    }
}

impl ObjectiveGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Target => "target",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::Min => "Min",
            Self::Max => "Max",
            Self::Target => "Target",
        }
    }
}

/// Remote strategy used to combine several objectives into one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MofFunction {
    Hierarchical,
    WeightedSum,
}

impl MofFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hierarchical => "hierarchical",
            Self::WeightedSum => "weighted_sum",
        }
    }
}

/// Tolerance an objective is willing to sacrifice in a hierarchical
/// combination. Exactly one form applies: `Relative` is a percentage
/// (0 to 100), `Absolute` is expressed in the objective's own units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tolerance {
    Relative(f64),
    Absolute(f64),
}

/// Per-objective settings for multi-objective combination.
///
/// `hierarchy` orders objectives for the hierarchical strategy (lower is
/// more important, unique per objective); `weight` feeds the weighted-sum
/// strategy and is renormalized against the other objectives' weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiObjectiveConfig {
    pub hierarchy: u32,
    #[serde(flatten)]
    pub tolerance: Tolerance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl MultiObjectiveConfig {
    /// Build from raw tolerance fields, enforcing that exactly one of
    /// `relative` / `absolute` is set and that every value is in range.
    pub fn new(
        hierarchy: u32,
        relative: Option<f64>,
        absolute: Option<f64>,
        weight: Option<f64>,
    ) -> Result<Self, ConfigError> {
        let tolerance = match (relative, absolute) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidValue {
                    field: "multi_objective_configuration".to_string(),
                    message: "set either 'relative' or 'absolute' tolerance, not both"
                        .to_string(),
                })
            }
            (None, None) => {
                return Err(ConfigError::InvalidValue {
                    field: "multi_objective_configuration".to_string(),
                    message: "one of 'relative' or 'absolute' tolerance is required"
                        .to_string(),
                })
            }
            (Some(rel), None) => {
                if !(0.0..=100.0).contains(&rel) {
                    return Err(ConfigError::OutOfRange {
                        field: "multi_objective_configuration.relative".to_string(),
                        value: rel,
                        low: 0.0,
                        high: 100.0,
                    });
                }
                Tolerance::Relative(rel)
            }
            (None, Some(abs)) => {
                if abs < 0.0 {
                    return Err(ConfigError::InvalidValue {
                        field: "multi_objective_configuration.absolute".to_string(),
                        message: format!("must be non-negative, got {abs}"),
                    });
                }
                Tolerance::Absolute(abs)
            }
        };
        if let Some(w) = weight {
            if w < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "multi_objective_configuration.weight".to_string(),
                    message: format!("must be non-negative, got {w}"),
                });
            }
        }
        Ok(Self {
            hierarchy,
            tolerance,
            weight,
        })
    }

    pub fn relative(&self) -> Option<f64> {
        match self.tolerance {
            Tolerance::Relative(v) => Some(v),
            Tolerance::Absolute(_) => None,
        }
    }

    pub fn absolute(&self) -> Option<f64> {
        match self.tolerance {
            Tolerance::Relative(_) => None,
            Tolerance::Absolute(v) => Some(v),
        }
    }
}

/// One measurable outcome of the optimization. The name must match a
/// measurement reported back by the caller.
///
/// Remote-assigned identity is intentionally not stored here; the
/// provisioning layer tracks remote ids separately so user-declared
/// identity keeps its equality semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub name: String,
    #[serde(default)]
    pub goal: ObjectiveGoal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_objective_configuration: Option<MultiObjectiveConfig>,
}

impl Objective {
    pub fn new(name: impl Into<String>, goal: ObjectiveGoal) -> Self {
        Self {
            name: name.into(),
            goal,
            target: None,
            multi_objective_configuration: None,
        }
    }

    pub fn with_target(mut self, target: f64) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_multi_objective(mut self, config: MultiObjectiveConfig) -> Self {
        self.multi_objective_configuration = Some(config);
        self
    }

    /// Human-readable description sent with the remote objective, e.g.
    /// "Max the yield strength".
    pub fn service_description(&self) -> String {
        format!("{} the {}", self.goal.title(), self.name.replace('_', " "))
    }
}
