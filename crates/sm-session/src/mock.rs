//! In-memory stand-in for the remote services, used by tests.
//!
//! Serves seeded resources, mints ids for created ones, and records call
//! counts plus the payloads that crossed the wire so tests can assert on
//! provisioning and exchange behavior.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

use sm_client::{
    CampaignApi, CampaignRef, CampaignStateGroup, ConfigEntry, ExchangeApi, ExchangeConnection,
    ExchangeFile, FileKind, LaunchSpec, NewConstraint, NewMultiObjectiveFunction, NewObjective,
    NewOptimizer, NewParameter, NewTemplate, NewWorkstation, Observation, Optimizer, Project,
    RemoteConstraint, RemoteMultiObjectiveFunction, RemoteObjective, RemoteParameter,
    SubmissionStatus, SuggestionArtifact, Template, TemplateSummary, Workstation,
    WorkstationSummary,
};
use sm_config::{OptimizationConfig, TransportKind};
use sm_types::{ParamValue, RemoteError, SmResult};

#[derive(Debug, Default)]
pub(crate) struct CallCounters {
    pub create_workstation: u32,
    pub create_parameter: u32,
    pub copy_parameter: u32,
    pub create_optimizer: u32,
    pub create_objective: u32,
    pub create_mof: u32,
    pub create_constraint: u32,
    pub create_template: u32,
    pub update_template: u32,
    pub launch_campaign: u32,
    pub stop_campaign: u32,
    pub campaign_state_queries: u32,
    pub latest_observation_polls: u32,
    pub list_file_polls: u32,
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub counters: CallCounters,
    next_id: u32,

    // campaign service
    pub workstations: Vec<Workstation>,
    pub parameters: Vec<RemoteParameter>,
    pub template_parameters: Vec<RemoteParameter>,
    pub template_parameter_ids: Vec<String>,
    pub optimizers: Vec<Optimizer>,
    pub optimizer_updates: Vec<(String, Vec<ConfigEntry>)>,
    pub objectives: Vec<RemoteObjective>,
    pub mofs: Vec<NewMultiObjectiveFunction>,
    pub constraints: Vec<NewConstraint>,
    pub templates: Vec<Template>,
    pub campaign_states: HashMap<String, Vec<CampaignStateGroup>>,
    pub stopped_campaigns: Vec<String>,
    pub observations: Vec<Observation>,
    pub rejected_references: HashSet<String>,
    pub submitted_observations: Vec<Vec<Observation>>,

    // file exchange
    pub projects: Vec<Project>,
    pub files: Vec<(ExchangeFile, SuggestionArtifact)>,
    pub uploaded_artifacts: Vec<(String, String, SuggestionArtifact)>,
    pub event_log: Vec<String>,
}

impl MockState {
    fn mint(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockService {
    pub state: Mutex<MockState>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workstation matching the configuration, as if an earlier
    /// run had provisioned it. Returns the workstation id.
    pub fn seed_workstation(&self, config: &OptimizationConfig) -> String {
        self.seed_workstation_object(config).id
    }

    /// Same as [`MockService::seed_workstation`], returning the object.
    pub fn seed_workstation_object(&self, config: &OptimizationConfig) -> Workstation {
        let mut state = self.state.lock();
        let mut parameters = Vec::with_capacity(config.parameters.len());
        for parameter in &config.parameters {
            let spec = NewParameter::from_parameter(parameter);
            let remote = RemoteParameter {
                id: state.mint("prm"),
                name: spec.name,
                kind: spec.kind,
                low_value: spec.low_value,
                high_value: spec.high_value,
                stride: spec.stride,
                description: spec.description,
                descriptors: spec.descriptors,
            };
            state.parameters.push(remote.clone());
            parameters.push(remote);
        }
        let connection = match config.transport {
            TransportKind::FileExchange => Some(ExchangeConnection::new(
                config.optimization_name.clone(),
                None,
            )),
            TransportKind::Direct => None,
        };
        let workstation = Workstation {
            id: state.mint("wst"),
            name: config.optimization_name.clone(),
            description: config.description.clone(),
            bandwidth: 99,
            measurements: config.objective_names(),
            parameters,
            connection,
        };
        state.workstations.push(workstation.clone());
        workstation
    }

    /// Register a template for the seeded workstation with the given
    /// remote budget. Returns the template id.
    pub fn seed_template(&self, config: &OptimizationConfig, budget: u32) -> String {
        let mut state = self.state.lock();
        let workstation = state
            .workstations
            .iter()
            .find(|w| w.name == config.optimization_name)
            .expect("seed the workstation first")
            .clone();
        let optimizer_id = state.mint("opt");
        state.optimizers.push(Optimizer {
            id: optimizer_id.clone(),
            name: format!("{}-{}", config.group_id, config.algorithm.as_str()),
            function: config.algorithm.as_str().to_string(),
            configuration: Vec::new(),
        });
        let objective_id = state.mint("obj");
        let template = Template {
            id: state.mint("tpl"),
            name: format!("{} Optimization Template", workstation.name),
            budget,
            optimizer: optimizer_id,
            objective: Some(objective_id),
            multi_objective_function: None,
            parameters: vec![sm_client::StepGroup {
                level: 1,
                parameters: workstation
                    .parameters
                    .iter()
                    .map(|p| sm_client::TemplateParameterRef {
                        parameter_id: p.id.clone(),
                        workstation_id: workstation.id.clone(),
                    })
                    .collect(),
            }],
            constraints: None,
        };
        let id = template.id.clone();
        state.templates.push(template);
        id
    }

    /// Register the exchange project the workstation connection points at.
    pub fn seed_exchange_project(&self, config: &OptimizationConfig) {
        let mut state = self.state.lock();
        let id = state.mint("proj");
        state.projects.push(Project {
            id,
            name: config.optimization_name.clone(),
        });
    }

    /// Drop a pending parameter artifact on the exchange, carrying a
    /// service-unit `thickness` value and an `ethanol` solvent pick.
    pub fn seed_parameter_file(
        &self,
        file_id: &str,
        file_name: &str,
        campaign_id: &str,
        thickness: f64,
    ) {
        let mut state = self.state.lock();
        let mut processes = BTreeMap::new();
        processes.insert("thickness".to_string(), ParamValue::Number(thickness));
        processes.insert(
            "solvent".to_string(),
            ParamValue::Category("ethanol".to_string()),
        );
        state.files.push((
            ExchangeFile {
                id: file_id.to_string(),
                name: file_name.to_string(),
            },
            SuggestionArtifact {
                campaign_id: campaign_id.to_string(),
                iteration: 1,
                batch: 0,
                processes,
                properties: None,
                extra: BTreeMap::new(),
            },
        ));
    }
}

fn not_found(resource: &str, name: &str) -> sm_types::SummitError {
    RemoteError::NotFound {
        resource: resource.to_string(),
        name: name.to_string(),
    }
    .into()
}

#[async_trait]
impl CampaignApi for MockService {
    async fn list_workstations(&self, _group_id: &str) -> SmResult<Vec<WorkstationSummary>> {
        Ok(self
            .state
            .lock()
            .workstations
            .iter()
            .map(|w| WorkstationSummary {
                id: w.id.clone(),
                name: w.name.clone(),
            })
            .collect())
    }

    async fn get_workstation(&self, workstation_id: &str) -> SmResult<Workstation> {
        self.state
            .lock()
            .workstations
            .iter()
            .find(|w| w.id == workstation_id)
            .cloned()
            .ok_or_else(|| not_found("workstation", workstation_id))
    }

    async fn create_workstation(&self, spec: &NewWorkstation) -> SmResult<Workstation> {
        let mut state = self.state.lock();
        state.counters.create_workstation += 1;
        let parameters = spec
            .parameters
            .iter()
            .map(|id| {
                state
                    .parameters
                    .iter()
                    .find(|p| &p.id == id)
                    .cloned()
                    .ok_or_else(|| not_found("parameter", id))
            })
            .collect::<SmResult<Vec<_>>>()?;
        let workstation = Workstation {
            id: state.mint("wst"),
            name: spec.name.clone(),
            description: spec.description.clone(),
            bandwidth: spec.bandwidth,
            measurements: spec.measurements.clone(),
            parameters,
            connection: spec.connection.clone(),
        };
        state.workstations.push(workstation.clone());
        Ok(workstation)
    }

    async fn create_parameter(&self, spec: &NewParameter) -> SmResult<RemoteParameter> {
        let mut state = self.state.lock();
        state.counters.create_parameter += 1;
        let parameter = RemoteParameter {
            id: state.mint("prm"),
            name: spec.name.clone(),
            kind: spec.kind.clone(),
            low_value: spec.low_value,
            high_value: spec.high_value,
            stride: spec.stride,
            description: spec.description.clone(),
            descriptors: spec.descriptors.clone(),
        };
        state.parameters.push(parameter.clone());
        Ok(parameter)
    }

    async fn copy_parameter(&self, parameter_id: &str, name: &str) -> SmResult<RemoteParameter> {
        let mut state = self.state.lock();
        state.counters.copy_parameter += 1;
        let source = state
            .parameters
            .iter()
            .find(|p| p.id == parameter_id)
            .cloned()
            .ok_or_else(|| not_found("parameter", parameter_id))?;
        let copy = RemoteParameter {
            id: state.mint("tpl-prm"),
            name: name.to_string(),
            ..source
        };
        state.template_parameter_ids.push(copy.id.clone());
        state.template_parameters.push(copy.clone());
        Ok(copy)
    }

    async fn create_optimizer(&self, spec: &NewOptimizer) -> SmResult<Optimizer> {
        let mut state = self.state.lock();
        state.counters.create_optimizer += 1;
        let optimizer = Optimizer {
            id: state.mint("opt"),
            name: spec.name.clone(),
            function: spec.function.clone(),
            configuration: spec.configuration.clone(),
        };
        state.optimizers.push(optimizer.clone());
        Ok(optimizer)
    }

    async fn update_optimizer_configuration(
        &self,
        optimizer_id: &str,
        entries: &[ConfigEntry],
    ) -> SmResult<()> {
        self.state
            .lock()
            .optimizer_updates
            .push((optimizer_id.to_string(), entries.to_vec()));
        Ok(())
    }

    async fn create_objective(&self, spec: &NewObjective) -> SmResult<RemoteObjective> {
        let mut state = self.state.lock();
        state.counters.create_objective += 1;
        let objective = RemoteObjective {
            id: state.mint("obj"),
            name: spec.name.clone(),
            goal: spec.goal.clone(),
            description: spec.description.clone(),
        };
        state.objectives.push(objective.clone());
        Ok(objective)
    }

    async fn create_multi_objective_function(
        &self,
        spec: &NewMultiObjectiveFunction,
    ) -> SmResult<RemoteMultiObjectiveFunction> {
        let mut state = self.state.lock();
        state.counters.create_mof += 1;
        let mof = RemoteMultiObjectiveFunction {
            id: state.mint("mof"),
            name: spec.name.clone(),
            function: spec.function.clone(),
        };
        state.mofs.push(spec.clone());
        Ok(mof)
    }

    async fn create_constraint(&self, spec: &NewConstraint) -> SmResult<RemoteConstraint> {
        let mut state = self.state.lock();
        state.counters.create_constraint += 1;
        let constraint = RemoteConstraint {
            id: state.mint("cst"),
            name: spec.name.clone(),
        };
        state.constraints.push(spec.clone());
        Ok(constraint)
    }

    async fn list_templates(&self, _group_id: &str) -> SmResult<Vec<TemplateSummary>> {
        Ok(self
            .state
            .lock()
            .templates
            .iter()
            .map(|t| TemplateSummary {
                id: t.id.clone(),
                name: t.name.clone(),
            })
            .collect())
    }

    async fn get_template(&self, template_id: &str) -> SmResult<Template> {
        self.state
            .lock()
            .templates
            .iter()
            .find(|t| t.id == template_id)
            .cloned()
            .ok_or_else(|| not_found("template", template_id))
    }

    async fn create_template(&self, spec: &NewTemplate) -> SmResult<Template> {
        let mut state = self.state.lock();
        state.counters.create_template += 1;
        let template = Template {
            id: state.mint("tpl"),
            name: spec.name.clone(),
            budget: spec.budget,
            optimizer: spec.optimizer.clone(),
            objective: spec.objective.clone(),
            multi_objective_function: spec.multi_objective_function.clone(),
            parameters: spec.parameters.clone(),
            constraints: spec.constraints.clone(),
        };
        state.templates.push(template.clone());
        Ok(template)
    }

    async fn update_template(&self, template_id: &str, spec: &NewTemplate) -> SmResult<Template> {
        let mut state = self.state.lock();
        state.counters.update_template += 1;
        let template = state
            .templates
            .iter_mut()
            .find(|t| t.id == template_id)
            .ok_or_else(|| not_found("template", template_id))?;
        template.budget = spec.budget;
        template.optimizer = spec.optimizer.clone();
        template.objective = spec.objective.clone();
        template.multi_objective_function = spec.multi_objective_function.clone();
        template.parameters = spec.parameters.clone();
        template.constraints = spec.constraints.clone();
        Ok(template.clone())
    }

    async fn campaign_states(
        &self,
        template_ids: &[String],
        _group_id: &str,
    ) -> SmResult<Vec<CampaignStateGroup>> {
        let mut state = self.state.lock();
        state.counters.campaign_state_queries += 1;
        Ok(template_ids
            .iter()
            .flat_map(|id| state.campaign_states.get(id).cloned().unwrap_or_default())
            .collect())
    }

    async fn stop_campaign(&self, campaign_id: &str) -> SmResult<()> {
        let mut state = self.state.lock();
        state.counters.stop_campaign += 1;
        state.stopped_campaigns.push(campaign_id.to_string());
        Ok(())
    }

    async fn launch_campaign(
        &self,
        _template_id: &str,
        _spec: &LaunchSpec,
    ) -> SmResult<CampaignRef> {
        let mut state = self.state.lock();
        state.counters.launch_campaign += 1;
        Ok(CampaignRef {
            id: state.mint("cpg"),
        })
    }

    async fn latest_observations(&self, _campaign_id: &str) -> SmResult<Vec<Observation>> {
        let mut state = self.state.lock();
        state.counters.latest_observation_polls += 1;
        Ok(state.observations.clone())
    }

    async fn submit_observations(
        &self,
        _campaign_id: &str,
        observations: &[Observation],
    ) -> SmResult<Vec<SubmissionStatus>> {
        let mut state = self.state.lock();
        state.submitted_observations.push(observations.to_vec());
        Ok(observations
            .iter()
            .map(|observation| {
                if state.rejected_references.contains(&observation.reference) {
                    SubmissionStatus {
                        reference: observation.reference.clone(),
                        status: "rejected".to_string(),
                        detail: Some("measurement rejected by validator".to_string()),
                    }
                } else {
                    SubmissionStatus {
                        reference: observation.reference.clone(),
                        status: "ok".to_string(),
                        detail: None,
                    }
                }
            })
            .collect())
    }
}

#[async_trait]
impl ExchangeApi for MockService {
    async fn list_projects(&self, _group_id: &str) -> SmResult<Vec<Project>> {
        Ok(self.state.lock().projects.clone())
    }

    async fn list_files(&self, _project_id: &str, kind: FileKind) -> SmResult<Vec<ExchangeFile>> {
        let mut state = self.state.lock();
        state.counters.list_file_polls += 1;
        if kind != FileKind::Parameters {
            return Ok(Vec::new());
        }
        Ok(state.files.iter().map(|(file, _)| file.clone()).collect())
    }

    async fn download_artifact(&self, file_id: &str) -> SmResult<SuggestionArtifact> {
        self.state
            .lock()
            .files
            .iter()
            .find(|(file, _)| file.id == file_id)
            .map(|(_, artifact)| artifact.clone())
            .ok_or_else(|| not_found("file", file_id))
    }

    async fn upload_artifact(
        &self,
        project_id: &str,
        _kind: FileKind,
        file_name: &str,
        artifact: &SuggestionArtifact,
    ) -> SmResult<ExchangeFile> {
        let mut state = self.state.lock();
        state.event_log.push(format!("upload:{file_name}"));
        state.uploaded_artifacts.push((
            project_id.to_string(),
            file_name.to_string(),
            artifact.clone(),
        ));
        let id = state.mint("file");
        Ok(ExchangeFile {
            id,
            name: file_name.to_string(),
        })
    }

    async fn delete_file(&self, file_id: &str) -> SmResult<()> {
        let mut state = self.state.lock();
        state.event_log.push(format!("delete:{file_id}"));
        state.files.retain(|(file, _)| file.id != file_id);
        Ok(())
    }
}
