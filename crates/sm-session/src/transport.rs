//! Suggestion transports: how proposals and measurements travel between
//! the campaign and this client.
//!
//! Two integrations exist. [`FileExchangeTransport`] polls a shared file
//! store and filters artifacts by embedded campaign id; an exhausted poll
//! yields an empty collection. [`DirectTransport`] queries the
//! latest-observations endpoint; an exhausted poll raises
//! [`ExchangeError::NoSuggestions`]. Callers must handle both end states.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sm_client::{
    CampaignApi, ExchangeApi, ExchangeFile, FileKind, NamedValue, Observation,
    SuggestionArtifact, Workstation,
};
use sm_config::OptimizationConfig;
use sm_types::{
    ExchangeError, ParamValue, Parameter, Recommendation, RemoteError, SmResult,
    SubmissionOutcome, SuggestionRef, SummitError,
};

/// Default retry count when polling for suggestions.
pub const DEFAULT_FETCH_RETRIES: u32 = 2;

/// Default delay between polling attempts.
pub const DEFAULT_FETCH_SLEEP: Duration = Duration::from_secs(15);

/// Retries used when re-reading artifacts during submission.
const SUBMIT_LOOKUP_RETRIES: u32 = 2;
const SUBMIT_LOOKUP_SLEEP: Duration = Duration::from_secs(10);

/// Everything a transport needs to know about the running session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub config: Arc<OptimizationConfig>,
    pub workstation: Option<Workstation>,
    pub campaign_id: Option<String>,
}

impl SessionContext {
    pub fn new(config: Arc<OptimizationConfig>) -> Self {
        Self {
            config,
            workstation: None,
            campaign_id: None,
        }
    }

    fn active_campaign(&self) -> SmResult<&str> {
        self.campaign_id.as_deref().ok_or_else(|| {
            SummitError::usage("no active campaign; run initialize_optimization first")
        })
    }

    fn parameter(&self, name: &str) -> SmResult<&Parameter> {
        self.config.parameter(name).ok_or_else(|| {
            RemoteError::NotFound {
                resource: "parameter".to_string(),
                name: name.to_string(),
            }
            .into()
        })
    }
}

/// A strategy for fetching suggestions and submitting measurements.
#[async_trait]
pub trait SuggestionTransport: Send + Sync {
    /// Poll for new suggestions, up to `max_retries` attempts with a fixed
    /// `sleep_time` between them, stopping early on a non-empty result.
    /// Returned numeric values are in user units.
    async fn fetch_suggestions(
        &self,
        ctx: &SessionContext,
        max_retries: u32,
        sleep_time: Duration,
    ) -> SmResult<Vec<Recommendation>>;

    /// Submit completed recommendations, converting values back to
    /// service units. Per-item rejections are logged and reported in the
    /// outcome collection; they do not abort the batch.
    async fn submit_measurements(
        &self,
        ctx: &SessionContext,
        recommendations: Vec<Recommendation>,
    ) -> SmResult<Vec<SubmissionOutcome>>;

    /// Transport name for logging.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Direct endpoint transport
// ---------------------------------------------------------------------------

/// Queries the campaign's latest-observations endpoint directly.
pub struct DirectTransport {
    api: Arc<dyn CampaignApi>,
}

impl DirectTransport {
    pub fn new(api: Arc<dyn CampaignApi>) -> Self {
        Self { api }
    }

    fn recommendation_from(
        ctx: &SessionContext,
        observation: &Observation,
    ) -> SmResult<Recommendation> {
        let mut values = BTreeMap::new();
        for named in &observation.parameters {
            let raw = named.value.as_deref().ok_or_else(|| RemoteError::Decode {
                message: format!("observation parameter '{}' has no value", named.name),
            })?;
            let parameter = ctx.parameter(&named.name)?;
            let value = if parameter.range.is_categorical() {
                ParamValue::Category(raw.to_string())
            } else {
                let number: f64 = raw.parse().map_err(|_| RemoteError::Decode {
                    message: format!(
                        "observation parameter '{}' is not numeric: '{raw}'",
                        named.name
                    ),
                })?;
                ParamValue::Number(parameter.to_user_units(number))
            };
            values.insert(named.name.clone(), value);
        }
        let mut recommendation = Recommendation::new(
            observation.iteration,
            observation.batch,
            values,
            SuggestionRef::Observation {
                reference: observation.reference.clone(),
            },
        );
        for named in &observation.measurements {
            if let Some(value) = named.value.as_deref().and_then(|v| v.parse().ok()) {
                recommendation.measurements.insert(named.name.clone(), value);
            }
        }
        Ok(recommendation)
    }
}

#[async_trait]
impl SuggestionTransport for DirectTransport {
    async fn fetch_suggestions(
        &self,
        ctx: &SessionContext,
        max_retries: u32,
        sleep_time: Duration,
    ) -> SmResult<Vec<Recommendation>> {
        let campaign_id = ctx.active_campaign()?;
        let mut observations = Vec::new();
        for attempt in 0..max_retries {
            if attempt > 0 {
                info!(attempt, ?sleep_time, "waiting for new observations");
                tokio::time::sleep(sleep_time).await;
            }
            observations = self.api.latest_observations(campaign_id).await?;
            if !observations.is_empty() {
                info!(count = observations.len(), "fetched observations");
                break;
            }
        }
        if observations.is_empty() {
            return Err(ExchangeError::NoSuggestions {
                campaign_id: campaign_id.to_string(),
                attempts: max_retries,
            }
            .into());
        }
        observations
            .iter()
            .map(|observation| Self::recommendation_from(ctx, observation))
            .collect()
    }

    async fn submit_measurements(
        &self,
        ctx: &SessionContext,
        recommendations: Vec<Recommendation>,
    ) -> SmResult<Vec<SubmissionOutcome>> {
        let campaign_id = ctx.active_campaign()?;
        let mut batch = Vec::with_capacity(recommendations.len());
        for recommendation in &recommendations {
            let mut parameters = Vec::with_capacity(recommendation.param_values.len());
            for (name, value) in &recommendation.param_values {
                let parameter = ctx.parameter(name)?;
                parameters.push(NamedValue::new(
                    name,
                    parameter.value_to_service_units(value),
                ));
            }
            let measurements = recommendation
                .measurements
                .iter()
                .map(|(name, value)| NamedValue::new(name, value))
                .collect();
            batch.push(Observation {
                reference: recommendation.source.reference().to_string(),
                iteration: recommendation.iteration,
                batch: recommendation.batch,
                parameters,
                measurements,
            });
        }

        let statuses = self.api.submit_observations(campaign_id, &batch).await?;
        Ok(statuses
            .into_iter()
            .map(|status| {
                let accepted = status.is_ok();
                if !accepted {
                    warn!(
                        reference = %status.reference,
                        status = %status.status,
                        "measurement submission rejected"
                    );
                }
                SubmissionOutcome {
                    reference: status.reference,
                    accepted,
                    detail: status.detail,
                }
            })
            .collect())
    }

    fn name(&self) -> &str {
        "direct"
    }
}

// ---------------------------------------------------------------------------
// File exchange transport
// ---------------------------------------------------------------------------

/// Polls the shared file exchange attached to the workstation's project.
pub struct FileExchangeTransport {
    api: Arc<dyn ExchangeApi>,
}

impl FileExchangeTransport {
    pub fn new(api: Arc<dyn ExchangeApi>) -> Self {
        Self { api }
    }

    async fn project_id(&self, ctx: &SessionContext) -> SmResult<String> {
        let project_name = ctx
            .workstation
            .as_ref()
            .and_then(|w| w.connection.as_ref())
            .map(|c| c.project_name.clone())
            .ok_or_else(|| {
                SummitError::usage("workstation has no exchange connection configured")
            })?;
        let projects = self.api.list_projects(&ctx.config.group_id).await?;
        projects
            .into_iter()
            .find(|p| p.name == project_name)
            .map(|p| p.id)
            .ok_or_else(|| ExchangeError::ProjectNotFound { name: project_name }.into())
    }

    /// Poll the project for parameter artifacts belonging to the campaign.
    /// The store is shared and eventually consistent, so every attempt
    /// lists everything and filters by the embedded campaign id.
    async fn poll_artifacts(
        &self,
        project_id: &str,
        campaign_id: &str,
        file_ids: Option<&[String]>,
        max_retries: u32,
        sleep_time: Duration,
    ) -> SmResult<Vec<(ExchangeFile, SuggestionArtifact)>> {
        let mut collected = Vec::new();
        for attempt in 0..max_retries {
            if attempt > 0 {
                info!(attempt, ?sleep_time, "waiting for new parameter files");
                tokio::time::sleep(sleep_time).await;
            }
            for file in self.api.list_files(project_id, FileKind::Parameters).await? {
                if let Some(wanted) = file_ids {
                    if !wanted.iter().any(|id| id == &file.id) {
                        continue;
                    }
                }
                let artifact = self.api.download_artifact(&file.id).await?;
                if artifact.campaign_id == campaign_id {
                    collected.push((file, artifact));
                }
            }
            if !collected.is_empty() {
                info!(count = collected.len(), "fetched parameter files");
                break;
            }
        }
        Ok(collected)
    }
}

#[async_trait]
impl SuggestionTransport for FileExchangeTransport {
    async fn fetch_suggestions(
        &self,
        ctx: &SessionContext,
        max_retries: u32,
        sleep_time: Duration,
    ) -> SmResult<Vec<Recommendation>> {
        let campaign_id = ctx.active_campaign()?.to_string();
        let project_id = self.project_id(ctx).await?;
        let artifacts = self
            .poll_artifacts(&project_id, &campaign_id, None, max_retries, sleep_time)
            .await?;

        let mut recommendations = Vec::with_capacity(artifacts.len());
        for (file, artifact) in artifacts {
            let mut values = BTreeMap::new();
            for (name, value) in &artifact.processes {
                let parameter = ctx.parameter(name)?;
                values.insert(name.clone(), parameter.value_to_user_units(value));
            }
            recommendations.push(Recommendation::new(
                artifact.iteration,
                artifact.batch,
                values,
                SuggestionRef::ExchangeFile {
                    file_id: file.id,
                    file_name: file.name,
                },
            ));
        }
        // An empty collection after exhausting retries is a valid end
        // state for this transport.
        Ok(recommendations)
    }

    async fn submit_measurements(
        &self,
        ctx: &SessionContext,
        recommendations: Vec<Recommendation>,
    ) -> SmResult<Vec<SubmissionOutcome>> {
        let campaign_id = ctx.active_campaign()?.to_string();
        let project_id = self.project_id(ctx).await?;
        let file_ids: Vec<String> = recommendations
            .iter()
            .map(|r| r.source.reference().to_string())
            .collect();
        let artifacts = self
            .poll_artifacts(
                &project_id,
                &campaign_id,
                Some(&file_ids),
                SUBMIT_LOOKUP_RETRIES,
                SUBMIT_LOOKUP_SLEEP,
            )
            .await?;

        let mut outcomes = Vec::with_capacity(recommendations.len());
        for recommendation in &recommendations {
            let reference = recommendation.source.reference().to_string();
            let Some((file, artifact)) = artifacts
                .iter()
                .find(|(file, _)| file.id == reference)
            else {
                warn!(%reference, "pending parameter file vanished before submission");
                outcomes.push(SubmissionOutcome {
                    reference,
                    accepted: false,
                    detail: Some("pending parameter file not found".to_string()),
                });
                continue;
            };

            let mut processes = BTreeMap::new();
            for (name, value) in &recommendation.param_values {
                let parameter = ctx.parameter(name)?;
                processes.insert(name.clone(), parameter.value_to_service_units(value));
            }
            let mut response = artifact.clone();
            response.processes = processes;
            response.properties = Some(recommendation.measurements.clone());

            match self
                .api
                .upload_artifact(&project_id, FileKind::Properties, &file.name, &response)
                .await
            {
                Ok(_) => {
                    info!(file_id = %file.id, file_name = %file.name, "properties uploaded");
                    // Retire the consumed input only after the upload landed.
                    let detail = match self.api.delete_file(&file.id).await {
                        Ok(()) => {
                            info!(file_id = %file.id, "parameter file deleted");
                            None
                        }
                        Err(e) => {
                            warn!(file_id = %file.id, error = %e, "failed to delete parameter file");
                            Some(format!("submitted, but input file not deleted: {e}"))
                        }
                    };
                    outcomes.push(SubmissionOutcome {
                        reference,
                        accepted: true,
                        detail,
                    });
                }
                Err(e) => {
                    warn!(file_id = %file.id, error = %e, "properties upload rejected");
                    outcomes.push(SubmissionOutcome {
                        reference,
                        accepted: false,
                        detail: Some(e.to_string()),
                    });
                }
            }
        }
        Ok(outcomes)
    }

    fn name(&self) -> &str {
        "file_exchange"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockService;
    use serde_json::json;
    use sm_config::RawConfig;
    use sm_types::SummitError;

    fn direct_config() -> Arc<OptimizationConfig> {
        let spec = json!({
            "optimization_name": "electrolyte_screen",
            "parameters": [
                {"name": "flow_rate", "type": "continuous", "low_value": 0.001, "high_value": 0.01},
                {"name": "solvent", "type": "categorical",
                 "descriptors": [{"category": "ethanol"}, {"category": "acetone"}]}
            ],
            "objectives": [{"name": "conversion"}],
            "transport": "direct"
        });
        Arc::new(RawConfig::from_value(spec).unwrap().validate().unwrap())
    }

    fn exchange_config() -> Arc<OptimizationConfig> {
        let spec = json!({
            "optimization_name": "film_coating",
            "parameters": [
                {"name": "thickness", "type": "continuous", "low_value": 2e-6, "high_value": 9e-6},
                {"name": "solvent", "type": "categorical",
                 "descriptors": [{"category": "ethanol"}, {"category": "acetone"}]}
            ],
            "objectives": [{"name": "uniformity"}],
            "transport": "file_exchange"
        });
        Arc::new(RawConfig::from_value(spec).unwrap().validate().unwrap())
    }

    fn direct_ctx(api: &Arc<MockService>) -> SessionContext {
        let mut ctx = SessionContext::new(direct_config());
        ctx.workstation = Some(api.seed_workstation_object(&ctx.config));
        ctx.campaign_id = Some("cpg-1".to_string());
        ctx
    }

    fn exchange_ctx(api: &Arc<MockService>) -> SessionContext {
        let mut ctx = SessionContext::new(exchange_config());
        ctx.workstation = Some(api.seed_workstation_object(&ctx.config));
        ctx.campaign_id = Some("cpg-1".to_string());
        ctx
    }

    #[tokio::test]
    async fn fetch_before_initialization_is_a_usage_error() {
        let api = Arc::new(MockService::new());
        let transport = DirectTransport::new(api.clone());
        let ctx = SessionContext::new(direct_config());
        let err = transport
            .fetch_suggestions(&ctx, 2, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, SummitError::Usage(_)));
        assert_eq!(api.state.lock().counters.latest_observation_polls, 0);
    }

    #[tokio::test]
    async fn direct_fetch_rescales_numeric_values_to_user_units() {
        let api = Arc::new(MockService::new());
        let ctx = direct_ctx(&api);
        api.state.lock().observations = vec![Observation {
            reference: "obs-1".to_string(),
            iteration: 2,
            batch: 0,
            parameters: vec![
                NamedValue::new("flow_rate", "5.0"),
                NamedValue::new("solvent", "ethanol"),
            ],
            measurements: vec![NamedValue {
                name: "conversion".to_string(),
                value: None,
            }],
        }];

        let transport = DirectTransport::new(api.clone());
        let recommendations = transport
            .fetch_suggestions(&ctx, 2, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(recommendations.len(), 1);
        let rec = &recommendations[0];
        assert_eq!(rec.iteration, 2);
        // 5.0 service units / 10^3 = 0.005 user units
        assert_eq!(
            rec.param_values.get("flow_rate"),
            Some(&ParamValue::Number(0.005))
        );
        assert_eq!(
            rec.param_values.get("solvent"),
            Some(&ParamValue::Category("ethanol".to_string()))
        );
        assert!(rec.measurements.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn direct_fetch_exhausts_retries_with_fixed_delay() {
        let api = Arc::new(MockService::new());
        let ctx = direct_ctx(&api);
        let transport = DirectTransport::new(api.clone());

        let sleep_time = Duration::from_secs(15);
        let started = tokio::time::Instant::now();
        let err = transport
            .fetch_suggestions(&ctx, 4, sleep_time)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SummitError::Exchange(ExchangeError::NoSuggestions { attempts: 4, .. })
        ));
        assert_eq!(api.state.lock().counters.latest_observation_polls, 4);
        // three sleeps between four polls
        assert_eq!(started.elapsed(), sleep_time * 3);
    }

    #[tokio::test]
    async fn direct_submit_reports_partial_failures_without_raising() {
        let api = Arc::new(MockService::new());
        let ctx = direct_ctx(&api);
        api.state
            .lock()
            .rejected_references
            .insert("obs-2".to_string());

        let mut first = Recommendation::new(
            1,
            0,
            BTreeMap::from([("flow_rate".to_string(), ParamValue::Number(0.005))]),
            SuggestionRef::Observation {
                reference: "obs-1".to_string(),
            },
        );
        first.record_measurement("conversion", 0.81);
        let mut second = Recommendation::new(
            1,
            1,
            BTreeMap::from([("flow_rate".to_string(), ParamValue::Number(0.007))]),
            SuggestionRef::Observation {
                reference: "obs-2".to_string(),
            },
        );
        second.record_measurement("conversion", 0.44);

        let transport = DirectTransport::new(api.clone());
        let outcomes = transport
            .submit_measurements(&ctx, vec![first, second])
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().any(|o| o.reference == "obs-1" && o.accepted));
        assert!(outcomes.iter().any(|o| o.reference == "obs-2" && !o.accepted));

        // submitted parameter values went back in service units
        let state = api.state.lock();
        let batch = state.submitted_observations.last().unwrap();
        let first_flow = batch[0]
            .parameters
            .iter()
            .find(|p| p.name == "flow_rate")
            .unwrap();
        assert_eq!(first_flow.value.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn exchange_fetch_filters_by_campaign_id() {
        let api = Arc::new(MockService::new());
        let ctx = exchange_ctx(&api);
        api.seed_exchange_project(&ctx.config);
        // artifact values are stored in service units (thickness scale 10^6)
        api.seed_parameter_file("file-1", "iter_1_batch_0.json", "cpg-1", 4.0);
        api.seed_parameter_file("file-2", "iter_1_batch_0.json", "cpg-other", 5.0);

        let transport = FileExchangeTransport::new(api.clone());
        let recommendations = transport
            .fetch_suggestions(&ctx, 2, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(recommendations.len(), 1);
        assert_eq!(
            recommendations[0].source,
            SuggestionRef::ExchangeFile {
                file_id: "file-1".to_string(),
                file_name: "iter_1_batch_0.json".to_string(),
            }
        );
        // 4.0 service units back to 4e-6 user units
        assert_eq!(
            recommendations[0].param_values.get("thickness"),
            Some(&ParamValue::Number(4e-6))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exchange_fetch_returns_empty_after_exhausting_retries() {
        let api = Arc::new(MockService::new());
        let ctx = exchange_ctx(&api);
        api.seed_exchange_project(&ctx.config);

        let transport = FileExchangeTransport::new(api.clone());
        let sleep_time = Duration::from_secs(10);
        let started = tokio::time::Instant::now();
        let recommendations = transport
            .fetch_suggestions(&ctx, 3, sleep_time)
            .await
            .unwrap();

        assert!(recommendations.is_empty());
        assert_eq!(api.state.lock().counters.list_file_polls, 3);
        assert_eq!(started.elapsed(), sleep_time * 2);
    }

    #[tokio::test]
    async fn exchange_submit_uploads_then_deletes_the_input() {
        let api = Arc::new(MockService::new());
        let ctx = exchange_ctx(&api);
        api.seed_exchange_project(&ctx.config);
        api.seed_parameter_file("file-1", "iter_2_batch_0.json", "cpg-1", 4.0);

        let mut recommendation = Recommendation::new(
            2,
            0,
            BTreeMap::from([
                ("thickness".to_string(), ParamValue::Number(4e-6)),
                (
                    "solvent".to_string(),
                    ParamValue::Category("acetone".to_string()),
                ),
            ]),
            SuggestionRef::ExchangeFile {
                file_id: "file-1".to_string(),
                file_name: "iter_2_batch_0.json".to_string(),
            },
        );
        recommendation.record_measurement("uniformity", 0.93);

        let transport = FileExchangeTransport::new(api.clone());
        let outcomes = transport
            .submit_measurements(&ctx, vec![recommendation])
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].accepted);

        let state = api.state.lock();
        // delete strictly follows the upload
        assert_eq!(
            state.event_log,
            vec![
                "upload:iter_2_batch_0.json".to_string(),
                "delete:file-1".to_string(),
            ]
        );
        let (_, _, artifact) = state.uploaded_artifacts.last().unwrap();
        // thickness scaled by 10^6 into service units, category untouched
        assert_eq!(
            artifact.processes.get("thickness"),
            Some(&ParamValue::Number(4.0))
        );
        assert_eq!(
            artifact.processes.get("solvent"),
            Some(&ParamValue::Category("acetone".to_string()))
        );
        assert_eq!(
            artifact.properties.as_ref().unwrap().get("uniformity"),
            Some(&0.93)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exchange_submit_tolerates_a_vanished_input_file() {
        let api = Arc::new(MockService::new());
        let ctx = exchange_ctx(&api);
        api.seed_exchange_project(&ctx.config);

        let recommendation = Recommendation::new(
            1,
            0,
            BTreeMap::from([("thickness".to_string(), ParamValue::Number(3e-6))]),
            SuggestionRef::ExchangeFile {
                file_id: "file-gone".to_string(),
                file_name: "iter_1_batch_0.json".to_string(),
            },
        );

        let transport = FileExchangeTransport::new(api.clone());
        let outcomes = transport
            .submit_measurements(&ctx, vec![recommendation])
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].accepted);
        assert!(outcomes[0].detail.as_deref().unwrap().contains("not found"));
    }
}
