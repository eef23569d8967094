//! Wire shapes exchanged with the remote services.
//!
//! Read shapes and creation requests are kept separate (`Workstation` vs
//! [`NewWorkstation`] and so on); the service addresses every resource by
//! an opaque string id it assigns at creation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use sm_types::{Descriptor, ParamValue, Parameter};

/// One key/value entry of an optimizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

impl ConfigEntry {
    pub fn new(key: impl Into<String>, value: impl ToString) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Workstations and parameters
// ---------------------------------------------------------------------------

/// Connection binding a workstation to a file-exchange project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConnection {
    pub format: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_api_key: Option<String>,
}

impl ExchangeConnection {
    pub fn new(project_name: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            format: "json".to_string(),
            kind: "exchange".to_string(),
            project_name: project_name.into(),
            user_api_key: api_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkstationSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workstation {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub bandwidth: u32,
    pub measurements: Vec<String>,
    pub parameters: Vec<RemoteParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ExchangeConnection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkstation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub bandwidth: u32,
    pub measurements: Vec<String>,
    /// Ids of previously created parameters.
    pub parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ExchangeConnection>,
}

/// A parameter as stored by the service, in service units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteParameter {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stride: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptors: Option<Vec<Descriptor>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stride: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptors: Option<Vec<Descriptor>>,
}

impl NewParameter {
    /// Build the creation request for a configured parameter, converting
    /// its bounds into service units and annotating the description with
    /// the applied unit scale.
    pub fn from_parameter(parameter: &Parameter) -> Self {
        Self {
            name: parameter.name.clone(),
            kind: parameter.range.kind_name().to_string(),
            low_value: parameter.range.low().map(|v| parameter.to_service_units(v)),
            high_value: parameter.range.high().map(|v| parameter.to_service_units(v)),
            stride: parameter
                .range
                .stride()
                .map(|v| parameter.to_service_units(v)),
            description: parameter.service_description(),
            descriptors: match &parameter.range {
                sm_types::ParameterRange::Categorical { descriptors } => {
                    Some(descriptors.clone())
                }
                _ => None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Optimizers, objectives, constraints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optimizer {
    pub id: String,
    pub name: String,
    pub function: String,
    pub configuration: Vec<ConfigEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOptimizer {
    pub name: String,
    pub function: String,
    pub configuration: Vec<ConfigEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteObjective {
    pub id: String,
    pub name: String,
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewObjective {
    pub name: String,
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
}

/// Per-objective entry of a multi-objective function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MofEntry {
    pub objective_id: String,
    pub hierarchy: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMultiObjectiveFunction {
    pub name: String,
    pub function: String,
    pub configuration: Vec<MofEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMultiObjectiveFunction {
    pub id: String,
    pub name: String,
    pub function: String,
}

/// Constraint definition with the parameter reference already resolved to
/// a template-scoped parameter id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConstraintDefinition {
    pub parameter_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Vec<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConstraint {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub definitions: Vec<ResolvedConstraintDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConstraint {
    pub id: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Templates and campaigns
// ---------------------------------------------------------------------------

/// A parameter reference inside a template step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParameterRef {
    pub parameter_id: String,
    pub workstation_id: String,
}

/// One level of a template's parameter plan. This client always provisions
/// a single level 1 step containing every parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepGroup {
    pub level: u32,
    pub parameters: Vec<TemplateParameterRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub budget: u32,
    /// Optimizer id.
    pub optimizer: String,
    /// Objective id, present for single-objective templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    /// Multi-objective-function id, present otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_objective_function: Option<String>,
    pub parameters: Vec<StepGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub budget: u32,
    pub optimizer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_objective_function: Option<String>,
    pub parameters: Vec<StepGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<String>>,
}

impl NewTemplate {
    /// Rebuild an update payload from a live template, carrying over its
    /// sub-resource ids. Used when only scalar fields (budget) change.
    pub fn from_template(template: &Template) -> Self {
        Self {
            name: template.name.clone(),
            budget: template.budget,
            optimizer: template.optimizer.clone(),
            objective: template.objective.clone(),
            multi_objective_function: template.multi_objective_function.clone(),
            parameters: template.parameters.clone(),
            constraints: template.constraints.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRef {
    pub id: String,
}

/// Campaigns of one template grouped by their lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignStateGroup {
    pub state: String,
    pub campaigns: Vec<CampaignRef>,
}

impl CampaignStateGroup {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub preload_data: bool,
}

// ---------------------------------------------------------------------------
// Observations (direct transport)
// ---------------------------------------------------------------------------

/// Name/value pair in the service's numeric-as-string convention. A
/// missing value marks a measurement not yet reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl NamedValue {
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: Some(value.to_string()),
        }
    }
}

/// One pending suggestion record on the direct endpoint, together with
/// the measurement slots the service expects back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub reference: String,
    pub iteration: u32,
    pub batch: u32,
    pub parameters: Vec<NamedValue>,
    pub measurements: Vec<NamedValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionStatus {
    pub reference: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SubmissionStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

// ---------------------------------------------------------------------------
// File exchange
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeFile {
    pub id: String,
    pub name: String,
}

/// Grouping of files on the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Pending suggestions produced by the campaign.
    Parameters,
    /// Completed results uploaded by this client.
    Properties,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parameters => "parameters",
            Self::Properties => "properties",
        }
    }
}

/// Artifact body exchanged through the file store. The campaign writes
/// one per suggestion; this client answers with a copy carrying the
/// measured `properties` and the (service-unit) `processes` it ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionArtifact {
    pub campaign_id: String,
    pub iteration: u32,
    pub batch: u32,
    pub processes: BTreeMap<String, ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, f64>>,
    /// Any metadata the campaign attached; carried back verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sm_types::scale::DIRECT_SCALE_FLOOR;

    #[test]
    fn new_parameter_converts_bounds_to_service_units() {
        let parameter = Parameter::continuous("flow_rate", 0.001, 0.01)
            .with_description("pump flow")
            .with_scale_floor(DIRECT_SCALE_FLOOR);
        let spec = NewParameter::from_parameter(&parameter);
        assert_eq!(spec.kind, "continuous");
        assert_eq!(spec.low_value, Some(1.0));
        assert_eq!(spec.high_value, Some(10.0));
        assert_eq!(spec.stride, None);
        assert_eq!(
            spec.description.as_deref(),
            Some("pump flow in base units * 10^(-3)")
        );
    }

    #[test]
    fn new_parameter_keeps_large_bounds_unchanged() {
        let parameter = Parameter::continuous("temperature", 5.0, 50.0)
            .with_scale_floor(DIRECT_SCALE_FLOOR);
        let spec = NewParameter::from_parameter(&parameter);
        assert_eq!(spec.low_value, Some(5.0));
        assert_eq!(spec.high_value, Some(50.0));
    }

    #[test]
    fn suggestion_artifact_round_trips_extra_metadata() {
        let json = serde_json::json!({
            "campaign_id": "cpg-1",
            "iteration": 2,
            "batch": 0,
            "processes": {"flow_rate": 1.5, "solvent": "ethanol"},
            "origin": "scheduler-7"
        });
        let artifact: SuggestionArtifact = serde_json::from_value(json).unwrap();
        assert_eq!(artifact.campaign_id, "cpg-1");
        assert_eq!(
            artifact.extra.get("origin"),
            Some(&serde_json::json!("scheduler-7"))
        );

        let back = serde_json::to_value(&artifact).unwrap();
        assert_eq!(back["origin"], "scheduler-7");
        assert_eq!(back["processes"]["solvent"], "ethanol");
    }

    #[test]
    fn template_update_payload_carries_sub_resource_ids() {
        let template = Template {
            id: "tpl-1".to_string(),
            name: "Batch Reactor Optimization Template".to_string(),
            budget: 20,
            optimizer: "opt-1".to_string(),
            objective: Some("obj-1".to_string()),
            multi_objective_function: None,
            parameters: vec![StepGroup {
                level: 1,
                parameters: vec![TemplateParameterRef {
                    parameter_id: "prm-1".to_string(),
                    workstation_id: "wst-1".to_string(),
                }],
            }],
            constraints: None,
        };
        let mut update = NewTemplate::from_template(&template);
        update.budget = 40;
        assert_eq!(update.optimizer, "opt-1");
        assert_eq!(update.objective.as_deref(), Some("obj-1"));
        assert_eq!(update.parameters, template.parameters);
    }
}
