//! Capability traits abstracting the remote services.

use async_trait::async_trait;
use sm_types::SmResult;

use crate::wire::{
    CampaignRef, CampaignStateGroup, ConfigEntry, ExchangeFile, FileKind, LaunchSpec,
    NewConstraint, NewMultiObjectiveFunction, NewObjective, NewOptimizer, NewParameter,
    NewTemplate, NewWorkstation, Observation, Optimizer, Project, RemoteConstraint,
    RemoteMultiObjectiveFunction, RemoteObjective, RemoteParameter, SubmissionStatus,
    SuggestionArtifact, Template, TemplateSummary, Workstation, WorkstationSummary,
};

/// CRUD surface of the remote campaign service.
///
/// Implementations may talk to the real HTTP API (see
/// [`crate::HttpClient`]) or serve everything in-process for tests.
#[async_trait]
pub trait CampaignApi: Send + Sync {
    // -- Workstations -------------------------------------------------------

    /// List workstations visible within a group.
    async fn list_workstations(&self, group_id: &str) -> SmResult<Vec<WorkstationSummary>>;

    /// Fetch one workstation with its full parameter set.
    async fn get_workstation(&self, workstation_id: &str) -> SmResult<Workstation>;

    /// Create a workstation referencing previously created parameters.
    async fn create_workstation(&self, spec: &NewWorkstation) -> SmResult<Workstation>;

    // -- Parameters ---------------------------------------------------------

    /// Create a workstation-scoped parameter.
    async fn create_parameter(&self, spec: &NewParameter) -> SmResult<RemoteParameter>;

    /// Copy an existing parameter into template scope under `name`.
    async fn copy_parameter(&self, parameter_id: &str, name: &str) -> SmResult<RemoteParameter>;

    // -- Optimizers, objectives, constraints --------------------------------

    async fn create_optimizer(&self, spec: &NewOptimizer) -> SmResult<Optimizer>;

    /// Overwrite matching configuration entries of an optimizer.
    async fn update_optimizer_configuration(
        &self,
        optimizer_id: &str,
        entries: &[ConfigEntry],
    ) -> SmResult<()>;

    async fn create_objective(&self, spec: &NewObjective) -> SmResult<RemoteObjective>;

    async fn create_multi_objective_function(
        &self,
        spec: &NewMultiObjectiveFunction,
    ) -> SmResult<RemoteMultiObjectiveFunction>;

    async fn create_constraint(&self, spec: &NewConstraint) -> SmResult<RemoteConstraint>;

    // -- Templates ----------------------------------------------------------

    async fn list_templates(&self, group_id: &str) -> SmResult<Vec<TemplateSummary>>;

    async fn get_template(&self, template_id: &str) -> SmResult<Template>;

    async fn create_template(&self, spec: &NewTemplate) -> SmResult<Template>;

    async fn update_template(&self, template_id: &str, spec: &NewTemplate) -> SmResult<Template>;

    // -- Campaign lifecycle -------------------------------------------------

    /// Campaigns of the given templates grouped by state.
    async fn campaign_states(
        &self,
        template_ids: &[String],
        group_id: &str,
    ) -> SmResult<Vec<CampaignStateGroup>>;

    async fn stop_campaign(&self, campaign_id: &str) -> SmResult<()>;

    /// Launch a new campaign from a template.
    async fn launch_campaign(&self, template_id: &str, spec: &LaunchSpec)
        -> SmResult<CampaignRef>;

    // -- Observations (direct transport) ------------------------------------

    /// Latest pending parameter proposals for a campaign.
    async fn latest_observations(&self, campaign_id: &str) -> SmResult<Vec<Observation>>;

    /// Submit completed observations; returns one status per item.
    async fn submit_observations(
        &self,
        campaign_id: &str,
        observations: &[Observation],
    ) -> SmResult<Vec<SubmissionStatus>>;
}

/// File-exchange surface used by the file-based suggestion transport.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// List exchange projects visible within a group.
    async fn list_projects(&self, group_id: &str) -> SmResult<Vec<Project>>;

    /// List files of one kind within a project.
    async fn list_files(&self, project_id: &str, kind: FileKind) -> SmResult<Vec<ExchangeFile>>;

    /// Download and decode a suggestion artifact.
    async fn download_artifact(&self, file_id: &str) -> SmResult<SuggestionArtifact>;

    /// Upload a result artifact under `file_name`.
    async fn upload_artifact(
        &self,
        project_id: &str,
        kind: FileKind,
        file_name: &str,
        artifact: &SuggestionArtifact,
    ) -> SmResult<ExchangeFile>;

    /// Delete a consumed file.
    async fn delete_file(&self, file_id: &str) -> SmResult<()>;
}
