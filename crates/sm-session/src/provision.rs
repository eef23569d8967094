//! Idempotent provisioning of the remote campaign chain.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sm_client::{
    CampaignApi, ConfigEntry, ExchangeConnection, LaunchSpec, MofEntry, NewConstraint,
    NewMultiObjectiveFunction, NewObjective, NewOptimizer, NewParameter, NewTemplate,
    NewWorkstation, ResolvedConstraintDefinition, StepGroup, Template, TemplateParameterRef,
    Workstation,
};
use sm_config::{OptimizationConfig, TransportKind};
use sm_types::{RemoteError, SmResult, SummitError};

/// Recommendations a workstation may hold in flight.
const WORKSTATION_BANDWIDTH: u32 = 99;

/// Default wait after stopping running campaigns, before a relaunch.
const STOP_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Progress of the provisioning chain. Terminal success state is
/// [`ProvisionState::CampaignActive`]; failures propagate immediately and
/// leave already-created remote resources in place (no rollback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisionState {
    Unlinked,
    WorkstationLinked,
    TemplateLinked,
    CampaignActive,
}

/// The remote identifiers a completed provisioning run yields.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedCampaign {
    pub workstation: Workstation,
    pub template: Template,
    pub campaign_id: String,
}

/// Maps an [`OptimizationConfig`] onto remote resources, reusing whatever
/// already exists under the configured names.
///
/// Lookups resolve to the first match in listing order; the service does
/// not guarantee a stable order for same-named resources.
pub struct Provisioner {
    api: Arc<dyn CampaignApi>,
    config: Arc<OptimizationConfig>,
    state: ProvisionState,
    settle_delay: Duration,
}

impl Provisioner {
    pub fn new(api: Arc<dyn CampaignApi>, config: Arc<OptimizationConfig>) -> Self {
        Self {
            api,
            config,
            state: ProvisionState::Unlinked,
            settle_delay: STOP_SETTLE_DELAY,
        }
    }

    /// Override the campaign-stop settling delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn state(&self) -> ProvisionState {
        self.state
    }

    /// Walk the full chain to an active campaign.
    pub async fn run(&mut self) -> SmResult<ProvisionedCampaign> {
        let workstation = self.ensure_workstation().await?;
        self.state = ProvisionState::WorkstationLinked;
        info!(workstation_id = %workstation.id, "linked to workstation");

        let template = self.ensure_template(&workstation).await?;
        self.state = ProvisionState::TemplateLinked;
        info!(template_id = %template.id, "linked to template");

        let campaign_id = self.ensure_campaign(&template).await?;
        self.state = ProvisionState::CampaignActive;
        info!(%campaign_id, template_id = %template.id, "campaign active");

        Ok(ProvisionedCampaign {
            workstation,
            template,
            campaign_id,
        })
    }

    /// Find the workstation named after the optimization, or create it
    /// along with its remote parameters.
    ///
    /// A found workstation is reused as-is; its parameter/measurement set
    /// is NOT compared against the current configuration unless
    /// `verify_workstation` is enabled, so a same-named workstation with a
    /// different schema goes unnoticed by default.
    async fn ensure_workstation(&self) -> SmResult<Workstation> {
        let config = &self.config;
        let workstations = self.api.list_workstations(&config.group_id).await?;
        if let Some(existing) = workstations
            .iter()
            .find(|w| w.name == config.optimization_name)
        {
            let workstation = self.api.get_workstation(&existing.id).await?;
            if config.verify_workstation {
                verify_workstation_schema(config, &workstation)?;
            }
            info!(workstation_id = %workstation.id, "reusing existing workstation");
            return Ok(workstation);
        }

        info!(
            name = %config.optimization_name,
            parameters = config.parameters.len(),
            measurements = config.objectives.len(),
            "creating workstation"
        );
        let mut parameter_ids = Vec::with_capacity(config.parameters.len());
        for parameter in &config.parameters {
            let created = self
                .api
                .create_parameter(&NewParameter::from_parameter(parameter))
                .await?;
            parameter_ids.push(created.id);
        }
        let connection = match config.transport {
            TransportKind::FileExchange => Some(ExchangeConnection::new(
                config.optimization_name.clone(),
                config.api_key.clone(),
            )),
            TransportKind::Direct => None,
        };
        self.api
            .create_workstation(&NewWorkstation {
                name: config.optimization_name.clone(),
                description: config.description.clone(),
                bandwidth: WORKSTATION_BANDWIDTH,
                measurements: config.objective_names(),
                parameters: parameter_ids,
                connection,
            })
            .await
    }

    /// Find the template named after the workstation, refreshing its
    /// mutable fields, or create the whole template graph.
    async fn ensure_template(&self, workstation: &Workstation) -> SmResult<Template> {
        let name = template_name(&workstation.name);
        let templates = self.api.list_templates(&self.config.group_id).await?;
        if let Some(existing) = templates.iter().find(|t| t.name == name) {
            let template = self.api.get_template(&existing.id).await?;
            return self.refresh_template(template).await;
        }
        self.create_template(workstation, name).await
    }

    /// The only update path in the chain: push a changed budget, and
    /// always push batch size and random seed into the optimizer.
    async fn refresh_template(&self, template: Template) -> SmResult<Template> {
        let config = &self.config;
        let template = if template.budget != config.budget {
            info!(
                template_id = %template.id,
                remote = template.budget,
                configured = config.budget,
                "updating template budget"
            );
            let mut spec = NewTemplate::from_template(&template);
            spec.budget = config.budget;
            self.api.update_template(&template.id, &spec).await?
        } else {
            template
        };
        self.api
            .update_optimizer_configuration(
                &template.optimizer,
                &optimizer_entries(config),
            )
            .await?;
        Ok(template)
    }

    async fn create_template(
        &self,
        workstation: &Workstation,
        name: String,
    ) -> SmResult<Template> {
        let config = &self.config;

        // Template-scoped copies of the workstation parameters.
        let mut template_parameters = Vec::with_capacity(workstation.parameters.len());
        for parameter in &workstation.parameters {
            let copy = self.api.copy_parameter(&parameter.id, &parameter.name).await?;
            template_parameters.push(copy);
        }

        let optimizer = self
            .api
            .create_optimizer(&NewOptimizer {
                name: format!("{}-{}", config.group_id, config.algorithm.as_str()),
                function: config.algorithm.as_str().to_string(),
                configuration: optimizer_entries(config).to_vec(),
            })
            .await?;

        // One remote objective per configured objective; names must match
        // the workstation measurements.
        let mut remote_objectives = Vec::with_capacity(config.objectives.len());
        for objective in &config.objectives {
            let created = self
                .api
                .create_objective(&NewObjective {
                    name: objective.name.clone(),
                    goal: objective.goal.as_str().to_string(),
                    description: Some(objective.service_description()),
                    target: objective.target,
                })
                .await?;
            remote_objectives.push(created);
        }

        let (objective, multi_objective_function) = if remote_objectives.len() == 1 {
            (Some(remote_objectives[0].id.clone()), None)
        } else {
            let function = self.config.multi_objective_function.ok_or_else(|| {
                SummitError::usage(
                    "multi_objective_function is required with several objectives",
                )
            })?;
            let mut entries = Vec::with_capacity(config.objectives.len());
            for objective in &config.objectives {
                // Resolve the remote id by name before wiring the entry.
                let objective_id = remote_objectives
                    .iter()
                    .find(|remote| remote.name == objective.name)
                    .map(|remote| remote.id.clone())
                    .ok_or_else(|| RemoteError::NotFound {
                        resource: "objective".to_string(),
                        name: objective.name.clone(),
                    })?;
                let moc = objective
                    .multi_objective_configuration
                    .as_ref()
                    .ok_or_else(|| {
                        SummitError::usage(format!(
                            "objective '{}' is missing its multi-objective configuration",
                            objective.name
                        ))
                    })?;
                entries.push(MofEntry {
                    objective_id,
                    hierarchy: moc.hierarchy,
                    relative: moc.relative(),
                    absolute: moc.absolute(),
                    weight: moc.weight,
                });
            }
            let mof = self
                .api
                .create_multi_objective_function(&NewMultiObjectiveFunction {
                    name: function.as_str().to_string(),
                    function: function.as_str().to_string(),
                    configuration: entries,
                })
                .await?;
            (None, Some(mof.id))
        };

        // Constraint definitions reference template-scoped parameter ids.
        let mut constraint_ids = Vec::with_capacity(config.constraints.len());
        for constraint in &config.constraints {
            let mut definitions = Vec::with_capacity(constraint.definitions.len());
            for definition in &constraint.definitions {
                let parameter_id = template_parameters
                    .iter()
                    .find(|p| p.name == definition.parameter)
                    .map(|p| p.id.clone())
                    .ok_or_else(|| RemoteError::NotFound {
                        resource: "parameter".to_string(),
                        name: definition.parameter.clone(),
                    })?;
                definitions.push(ResolvedConstraintDefinition {
                    parameter_id,
                    bounds: definition.bounds.clone(),
                    weight: definition.weight,
                });
            }
            let created = self
                .api
                .create_constraint(&NewConstraint {
                    name: constraint.name.clone(),
                    kind: constraint.kind.as_str().to_string(),
                    definitions,
                    targets: constraint.targets.clone(),
                })
                .await?;
            constraint_ids.push(created.id);
        }

        self.api
            .create_template(&NewTemplate {
                name,
                budget: config.budget,
                optimizer: optimizer.id,
                objective,
                multi_objective_function,
                parameters: vec![StepGroup {
                    level: 1,
                    parameters: template_parameters
                        .iter()
                        .map(|p| TemplateParameterRef {
                            parameter_id: p.id.clone(),
                            workstation_id: workstation.id.clone(),
                        })
                        .collect(),
                }],
                constraints: (!constraint_ids.is_empty()).then_some(constraint_ids),
            })
            .await
    }

    /// Adopt a running campaign, or stop everything and launch fresh when
    /// `always_restart` is set.
    async fn ensure_campaign(&self, template: &Template) -> SmResult<String> {
        let config = &self.config;
        let states = self
            .api
            .campaign_states(&[template.id.clone()], &config.group_id)
            .await?;

        let mut adopted = None;
        let mut stopped = false;
        for group in states.iter().filter(|g| g.is_running()) {
            if config.always_restart {
                info!(
                    campaigns = group.campaigns.len(),
                    "always_restart set; stopping running campaigns"
                );
                for campaign in &group.campaigns {
                    self.api.stop_campaign(&campaign.id).await?;
                }
                stopped = true;
            } else if let Some(campaign) = group.campaigns.first() {
                info!(campaign_id = %campaign.id, "continuing active campaign");
                adopted = Some(campaign.id.clone());
                break;
            }
        }
        if stopped {
            // Give the service time to settle the stops before relaunching.
            tokio::time::sleep(self.settle_delay).await;
        }

        match adopted {
            Some(id) => Ok(id),
            None => {
                let campaign = self
                    .api
                    .launch_campaign(
                        &template.id,
                        &LaunchSpec {
                            preload_data: config.inherit_data,
                        },
                    )
                    .await?;
                info!(
                    campaign_id = %campaign.id,
                    preload_data = config.inherit_data,
                    "new campaign launched"
                );
                Ok(campaign.id)
            }
        }
    }
}

fn template_name(workstation_name: &str) -> String {
    format!("{workstation_name} Optimization Template")
}

fn optimizer_entries(config: &OptimizationConfig) -> [ConfigEntry; 2] {
    [
        ConfigEntry::new("batch_size", config.batch_size),
        ConfigEntry::new("random_seed", config.random_seed),
    ]
}

/// Opt-in consistency check for reused workstations: parameter and
/// measurement names must match the configuration exactly.
fn verify_workstation_schema(
    config: &OptimizationConfig,
    workstation: &Workstation,
) -> SmResult<()> {
    let configured: Vec<&str> = config.parameters.iter().map(|p| p.name.as_str()).collect();
    let remote: Vec<&str> = workstation
        .parameters
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    let measurements = config.objective_names();
    if configured != remote || measurements != workstation.measurements {
        warn!(
            workstation_id = %workstation.id,
            "reused workstation schema does not match the configuration"
        );
        return Err(SummitError::usage(format!(
            "workstation '{}' exists with a different parameter/measurement set; \
             rename the optimization or drop the remote workstation",
            workstation.name
        )));
    }
    Ok(())
}
