//! Raw and validated configuration models.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use sm_types::{
    scale, ConfigError, Constraint, ConstraintDefinition, ConstraintKind, Descriptor,
    MofFunction, MultiObjectiveConfig, Objective, ObjectiveGoal, Parameter, SmResult,
    SummitError,
};

/// Default location of the optimization spec file.
pub const DEFAULT_CONFIG_PATH: &str = "config/optimization_config.json";

/// Environment variable consulted when no API key is supplied explicitly
/// or in the spec file.
pub const API_KEY_ENV: &str = "SUMMIT_API_KEY";

/// Account tier; selects the API subdomain and the feature set available
/// on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Enterprise,
    Academic,
}

impl AccountType {
    fn subdomain(&self) -> &'static str {
        match self {
            Self::Enterprise => "enterprise",
            Self::Academic => "research",
        }
    }
}

/// Deployment zone of the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceEnvironment {
    Com,
    Network,
    Dev,
}

impl ServiceEnvironment {
    fn zone(&self) -> &'static str {
        match self {
            Self::Com => "com",
            Self::Network => "network",
            Self::Dev => "dev",
        }
    }
}

/// Remote search algorithm driving the campaign. The algorithm itself is
/// opaque to this client; only the name is forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Falcondngo,
    Falcongpbo,
    Edboplus,
    Grid,
    Randomsearch,
    Semopt,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Falcondngo => "falcondngo",
            Self::Falcongpbo => "falcongpbo",
            Self::Edboplus => "edboplus",
            Self::Grid => "grid",
            Self::Randomsearch => "randomsearch",
            Self::Semopt => "semopt",
        }
    }
}

/// How suggestions travel between the campaign and this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Poll a shared file-exchange store and filter by campaign id.
    FileExchange,
    /// Query the latest-observations endpoint for the campaign directly.
    Direct,
}

impl TransportKind {
    /// Default unit-scale threshold for this transport. The two observed
    /// integrations disagree (see DESIGN.md); the config's `scale_floor`
    /// overrides either.
    pub fn default_scale_floor(&self) -> i32 {
        match self {
            Self::FileExchange => scale::EXCHANGE_SCALE_FLOOR,
            Self::Direct => scale::DIRECT_SCALE_FLOOR,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw (loader-phase) model
// ---------------------------------------------------------------------------

/// Permissive mirror of the spec file. Every field is optional here;
/// [`RawConfig::validate`] applies defaults and promotes the whole graph
/// into typed entities in one pass.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    pub parameters: Option<Vec<RawParameter>>,
    pub objectives: Option<Vec<RawObjective>>,
    pub constraints: Option<Vec<RawConstraint>>,
    pub optimization_name: Option<String>,
    pub description: Option<String>,
    pub api_key: Option<String>,
    pub group_id: Option<String>,
    pub account_type: Option<String>,
    pub environment: Option<String>,
    pub multi_objective_function: Option<String>,
    pub algorithm: Option<String>,
    pub batch_size: Option<u32>,
    pub budget: Option<u32>,
    pub random_seed: Option<i64>,
    pub always_restart: Option<bool>,
    pub inherit_data: Option<bool>,
    pub transport: Option<String>,
    pub scale_floor: Option<i32>,
    pub service_url: Option<String>,
    pub exchange_url: Option<String>,
    pub verify_workstation: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawParameter {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub low_value: Option<f64>,
    pub high_value: Option<f64>,
    pub stride: Option<f64>,
    pub description: Option<String>,
    pub descriptors: Option<Vec<Descriptor>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawObjective {
    pub name: Option<String>,
    pub goal: Option<String>,
    pub target: Option<f64>,
    pub multi_objective_configuration: Option<RawMultiObjective>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMultiObjective {
    pub hierarchy: Option<u32>,
    pub relative: Option<f64>,
    pub absolute: Option<f64>,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConstraint {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub definitions: Option<Vec<RawConstraintDefinition>>,
    pub targets: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConstraintDefinition {
    pub parameter: Option<String>,
    pub bounds: Option<Vec<Vec<serde_json::Value>>>,
    pub weight: Option<f64>,
}

impl RawConfig {
    /// Read a raw configuration from a JSON spec file.
    pub fn from_file(path: impl AsRef<Path>) -> SmResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ConfigError::Parse {
                message: format!("{}: {e}", path.display()),
            }
            .into()
        })
    }

    /// Read a raw configuration from an in-memory JSON value.
    pub fn from_value(value: serde_json::Value) -> SmResult<Self> {
        serde_json::from_value(value).map_err(|e| {
            ConfigError::Parse {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Promote this raw mapping into a validated [`OptimizationConfig`].
    /// Fails fast with an error naming the offending field.
    pub fn validate(self) -> Result<OptimizationConfig, ConfigError> {
        let transport = match self.transport.as_deref() {
            None => TransportKind::FileExchange,
            Some("file_exchange") => TransportKind::FileExchange,
            Some("direct") => TransportKind::Direct,
            Some(other) => {
                return Err(ConfigError::UnknownVariant {
                    field: "transport".to_string(),
                    value: other.to_string(),
                    allowed: "file_exchange, direct".to_string(),
                })
            }
        };
        let scale_floor = self
            .scale_floor
            .unwrap_or_else(|| transport.default_scale_floor());

        let account_type = match self.account_type.as_deref() {
            None => AccountType::Academic,
            Some("enterprise") => AccountType::Enterprise,
            Some("academic") => AccountType::Academic,
            Some(other) => {
                return Err(ConfigError::UnknownVariant {
                    field: "account_type".to_string(),
                    value: other.to_string(),
                    allowed: "enterprise, academic".to_string(),
                })
            }
        };
        let environment = match self.environment.as_deref() {
            None => ServiceEnvironment::Com,
            Some("com") => ServiceEnvironment::Com,
            Some("network") => ServiceEnvironment::Network,
            Some("dev") => ServiceEnvironment::Dev,
            Some(other) => {
                return Err(ConfigError::UnknownVariant {
                    field: "environment".to_string(),
                    value: other.to_string(),
                    allowed: "com, network, dev".to_string(),
                })
            }
        };
        let algorithm = match self.algorithm.as_deref() {
            None => Algorithm::Edboplus,
            Some("falcondngo") => Algorithm::Falcondngo,
            Some("falcongpbo") => Algorithm::Falcongpbo,
            Some("edboplus") => Algorithm::Edboplus,
            Some("grid") => Algorithm::Grid,
            Some("randomsearch") => Algorithm::Randomsearch,
            Some("semopt") => Algorithm::Semopt,
            Some(other) => {
                return Err(ConfigError::UnknownVariant {
                    field: "algorithm".to_string(),
                    value: other.to_string(),
                    allowed: "falcondngo, falcongpbo, edboplus, grid, randomsearch, semopt"
                        .to_string(),
                })
            }
        };
        let multi_objective_function = match self.multi_objective_function.as_deref() {
            None => None,
            Some("hierarchical") => Some(MofFunction::Hierarchical),
            Some("weighted_sum") => Some(MofFunction::WeightedSum),
            Some(other) => {
                return Err(ConfigError::UnknownVariant {
                    field: "multi_objective_function".to_string(),
                    value: other.to_string(),
                    allowed: "hierarchical, weighted_sum".to_string(),
                })
            }
        };

        let batch_size = self.batch_size.unwrap_or(1);
        if !(1..=20).contains(&batch_size) {
            return Err(ConfigError::OutOfRange {
                field: "batch_size".to_string(),
                value: batch_size as f64,
                low: 1.0,
                high: 20.0,
            });
        }
        let budget = self.budget.unwrap_or(20);
        if budget == 0 {
            return Err(ConfigError::InvalidValue {
                field: "budget".to_string(),
                message: "must be a positive measurement count".to_string(),
            });
        }

        let parameters = validate_parameters(self.parameters.unwrap_or_default(), scale_floor)?;
        let objectives = validate_objectives(self.objectives.unwrap_or_default())?;
        if objectives.len() > 1 {
            if multi_objective_function.is_none() {
                return Err(ConfigError::MissingField {
                    field: "multi_objective_function".to_string(),
                });
            }
            let mut hierarchies = HashSet::new();
            for (idx, objective) in objectives.iter().enumerate() {
                let moc = objective.multi_objective_configuration.as_ref().ok_or_else(|| {
                    ConfigError::MissingField {
                        field: format!("objectives[{idx}].multi_objective_configuration"),
                    }
                })?;
                if !hierarchies.insert(moc.hierarchy) {
                    return Err(ConfigError::InvalidValue {
                        field: format!(
                            "objectives[{idx}].multi_objective_configuration.hierarchy"
                        ),
                        message: format!("hierarchy {} is not unique", moc.hierarchy),
                    });
                }
            }
        }
        let constraints = validate_constraints(self.constraints.unwrap_or_default())?;

        Ok(OptimizationConfig {
            parameters,
            objectives,
            constraints,
            optimization_name: self
                .optimization_name
                .unwrap_or_else(|| "SampleOptimization".to_string()),
            description: self.description,
            api_key: self.api_key,
            group_id: self.group_id.unwrap_or_else(|| "summit".to_string()),
            account_type,
            environment,
            multi_objective_function,
            algorithm,
            batch_size,
            budget,
            random_seed: self.random_seed.unwrap_or(2022),
            always_restart: self.always_restart.unwrap_or(false),
            inherit_data: self.inherit_data.unwrap_or(false),
            transport,
            scale_floor,
            service_url_override: self.service_url,
            exchange_url_override: self.exchange_url,
            verify_workstation: self.verify_workstation.unwrap_or(false),
        })
    }
}

fn validate_parameters(
    raw: Vec<RawParameter>,
    scale_floor: i32,
) -> Result<Vec<Parameter>, ConfigError> {
    if raw.is_empty() {
        return Err(ConfigError::MissingField {
            field: "parameters".to_string(),
        });
    }
    let mut seen = HashSet::new();
    let mut parameters = Vec::with_capacity(raw.len());
    for (idx, prm) in raw.into_iter().enumerate() {
        let name = prm.name.ok_or_else(|| ConfigError::MissingField {
            field: format!("parameters[{idx}].name"),
        })?;
        if !seen.insert(name.clone()) {
            return Err(ConfigError::DuplicateName {
                kind: "parameter".to_string(),
                name,
            });
        }
        let kind = prm.kind.as_deref().unwrap_or("continuous");
        let require = |value: Option<f64>, field: &str| {
            value.ok_or_else(|| ConfigError::MissingField {
                field: format!("parameters[{idx}].{field}"),
            })
        };
        let mut parameter = match kind {
            "continuous" => Parameter::continuous(
                name.clone(),
                require(prm.low_value, "low_value")?,
                require(prm.high_value, "high_value")?,
            ),
            "discrete" => Parameter::discrete(
                name.clone(),
                require(prm.low_value, "low_value")?,
                require(prm.high_value, "high_value")?,
                require(prm.stride, "stride")?,
            ),
            "categorical" => {
                let descriptors = prm.descriptors.unwrap_or_default();
                if descriptors.is_empty() {
                    return Err(ConfigError::MissingField {
                        field: format!("parameters[{idx}].descriptors"),
                    });
                }
                let with_properties = descriptors
                    .iter()
                    .filter(|d| !d.properties.is_empty())
                    .count();
                if with_properties != 0 && with_properties != descriptors.len() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("parameters[{idx}].descriptors"),
                        message: "descriptor properties must be present for all options or none"
                            .to_string(),
                    });
                }
                Parameter::categorical(name.clone(), descriptors)
            }
            other => {
                return Err(ConfigError::UnknownVariant {
                    field: format!("parameters[{idx}].type"),
                    value: other.to_string(),
                    allowed: "continuous, discrete, categorical".to_string(),
                })
            }
        };
        if let Some(description) = prm.description {
            parameter = parameter.with_description(description);
        }
        if !parameter.range.is_categorical() && parameter.defining_bound().is_none() {
            return Err(ConfigError::ZeroBound { parameter: name });
        }
        parameters.push(parameter.with_scale_floor(scale_floor));
    }
    Ok(parameters)
}

fn validate_objectives(raw: Vec<RawObjective>) -> Result<Vec<Objective>, ConfigError> {
    if raw.is_empty() {
        return Err(ConfigError::MissingField {
            field: "objectives".to_string(),
        });
    }
    let mut seen = HashSet::new();
    let mut objectives = Vec::with_capacity(raw.len());
    for (idx, obj) in raw.into_iter().enumerate() {
        let name = obj.name.ok_or_else(|| ConfigError::MissingField {
            field: format!("objectives[{idx}].name"),
        })?;
        if !seen.insert(name.clone()) {
            return Err(ConfigError::DuplicateName {
                kind: "objective".to_string(),
                name,
            });
        }
        let goal = match obj.goal.as_deref() {
            None => ObjectiveGoal::Max,
            Some("min") => ObjectiveGoal::Min,
            Some("max") => ObjectiveGoal::Max,
            Some("target") => ObjectiveGoal::Target,
            Some(other) => {
                return Err(ConfigError::UnknownVariant {
                    field: format!("objectives[{idx}].goal"),
                    value: other.to_string(),
                    allowed: "min, max, target".to_string(),
                })
            }
        };
        let mut objective = Objective::new(name, goal);
        if let Some(target) = obj.target {
            objective = objective.with_target(target);
        }
        if let Some(moc) = obj.multi_objective_configuration {
            objective = objective.with_multi_objective(MultiObjectiveConfig::new(
                moc.hierarchy.unwrap_or(0),
                moc.relative,
                moc.absolute,
                moc.weight,
            )?);
        }
        objectives.push(objective);
    }
    Ok(objectives)
}

fn validate_constraints(raw: Vec<RawConstraint>) -> Result<Vec<Constraint>, ConfigError> {
    let mut constraints = Vec::with_capacity(raw.len());
    for (idx, cstr) in raw.into_iter().enumerate() {
        let kind = match cstr.kind.as_deref() {
            None => ConstraintKind::LinearEq,
            Some("exclusion") => ConstraintKind::Exclusion,
            Some("conditional_exclusion") => ConstraintKind::ConditionalExclusion,
            Some("linear_eq") => ConstraintKind::LinearEq,
            Some("linear_lte") => ConstraintKind::LinearLte,
            Some("linear_gte") => ConstraintKind::LinearGte,
            Some("linear_between") => ConstraintKind::LinearBetween,
            Some(other) => {
                return Err(ConfigError::UnknownVariant {
                    field: format!("constraints[{idx}].type"),
                    value: other.to_string(),
                    allowed: "exclusion, conditional_exclusion, linear_eq, linear_lte, \
                              linear_gte, linear_between"
                        .to_string(),
                })
            }
        };
        let mut definitions = Vec::new();
        for (def_idx, def) in cstr.definitions.unwrap_or_default().into_iter().enumerate() {
            let parameter = def.parameter.ok_or_else(|| ConfigError::MissingField {
                field: format!("constraints[{idx}].definitions[{def_idx}].parameter"),
            })?;
            let mut definition = ConstraintDefinition::new(parameter);
            if let Some(bounds) = def.bounds {
                definition = definition.with_bounds(bounds);
            }
            if let Some(weight) = def.weight {
                definition = definition.with_weight(weight);
            }
            definitions.push(definition);
        }
        let mut constraint = Constraint::new(kind, definitions);
        if let Some(name) = cstr.name {
            constraint = constraint.with_name(name);
        }
        if let Some(targets) = cstr.targets {
            constraint = constraint.with_targets(targets);
        }
        constraints.push(constraint);
    }
    Ok(constraints)
}

// ---------------------------------------------------------------------------
// Validated model
// ---------------------------------------------------------------------------

/// Fully validated optimization problem description. Built once, never
/// mutated afterwards; budget/batch/seed changes are pushed to the remote
/// template during provisioning instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationConfig {
    pub parameters: Vec<Parameter>,
    pub objectives: Vec<Objective>,
    pub constraints: Vec<Constraint>,
    pub optimization_name: String,
    pub description: Option<String>,
    pub api_key: Option<String>,
    pub group_id: String,
    pub account_type: AccountType,
    pub environment: ServiceEnvironment,
    pub multi_objective_function: Option<MofFunction>,
    pub algorithm: Algorithm,
    pub batch_size: u32,
    pub budget: u32,
    pub random_seed: i64,
    pub always_restart: bool,
    pub inherit_data: bool,
    pub transport: TransportKind,
    pub scale_floor: i32,
    pub service_url_override: Option<String>,
    pub exchange_url_override: Option<String>,
    pub verify_workstation: bool,
}

impl OptimizationConfig {
    /// Base URL of the campaign service, derived from account type and
    /// environment unless overridden.
    pub fn service_url(&self) -> String {
        self.service_url_override.clone().unwrap_or_else(|| {
            format!(
                "https://api.{}.summitlabs.{}/campaigns/latest",
                self.account_type.subdomain(),
                self.environment.zone()
            )
        })
    }

    /// Base URL of the file-exchange service.
    pub fn exchange_url(&self) -> String {
        self.exchange_url_override.clone().unwrap_or_else(|| {
            format!(
                "https://{}.summitlabs.{}/exchange/api/latest",
                self.account_type.subdomain(),
                self.environment.zone()
            )
        })
    }

    /// Look up a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Names of all objectives, in declaration order. These double as the
    /// workstation measurement schema.
    pub fn objective_names(&self) -> Vec<String> {
        self.objectives.iter().map(|o| o.name.clone()).collect()
    }
}

/// Builder tying together the loader phase inputs: an optional spec file
/// path, optional in-memory contents, and an optional explicit API key.
///
/// Precedence: in-memory contents > file path > default file path. The
/// API key resolves as explicit argument > spec field > `SUMMIT_API_KEY`;
/// a missing key is not an error at this layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    path: Option<std::path::PathBuf>,
    content: Option<serde_json::Value>,
    api_key: Option<String>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn build(self) -> SmResult<OptimizationConfig> {
        let mut raw = match self.content {
            Some(content) => RawConfig::from_value(content)?,
            None => {
                let path = self
                    .path
                    .unwrap_or_else(|| DEFAULT_CONFIG_PATH.into());
                RawConfig::from_file(path)?
            }
        };
        if let Some(api_key) = self.api_key {
            raw.api_key = Some(api_key);
        }
        if raw.api_key.is_none() {
            raw.api_key = std::env::var(API_KEY_ENV).ok();
        }
        raw.validate().map_err(SummitError::from)
    }
}
