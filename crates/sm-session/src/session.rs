//! Session handle binding a configuration to an active remote campaign.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use sm_client::{CampaignApi, ExchangeApi, HttpClient, HttpClientConfig};
use sm_config::{OptimizationConfig, TransportKind};
use sm_types::{Recommendation, SmResult, SubmissionOutcome, SummitError};

use crate::provision::{ProvisionState, Provisioner};
use crate::transport::{DirectTransport, FileExchangeTransport, SessionContext, SuggestionTransport};

/// Options accepted by [`initialize_optimization`].
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub api_key: Option<String>,
    pub spec_file_path: Option<String>,
    pub spec_file_content: Option<serde_json::Value>,
    pub inherit_data: Option<bool>,
    pub always_restart: Option<bool>,
}

impl InitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_spec_file_path(mut self, path: impl Into<String>) -> Self {
        self.spec_file_path = Some(path.into());
        self
    }

    pub fn with_spec_file_content(mut self, content: serde_json::Value) -> Self {
        self.spec_file_content = Some(content);
        self
    }

    pub fn with_inherit_data(mut self, inherit_data: bool) -> Self {
        self.inherit_data = Some(inherit_data);
        self
    }

    pub fn with_always_restart(mut self, always_restart: bool) -> Self {
        self.always_restart = Some(always_restart);
        self
    }
}

/// One optimization session: a provisioned campaign plus the transport
/// used to exchange suggestions and measurements with it.
///
/// The session assumes it is the only driver of its campaign within the
/// process; concurrent sessions against the same campaign need external
/// coordination.
pub struct OptimizationSession {
    id: Uuid,
    campaign_api: Arc<dyn CampaignApi>,
    transport: Box<dyn SuggestionTransport>,
    context: SessionContext,
    state: ProvisionState,
    settle_delay: Option<Duration>,
}

impl OptimizationSession {
    /// Create an unprovisioned session over explicit service handles.
    /// Call [`OptimizationSession::initialize`] before exchanging data.
    pub fn new(
        config: Arc<OptimizationConfig>,
        campaign_api: Arc<dyn CampaignApi>,
        exchange_api: Arc<dyn ExchangeApi>,
    ) -> Self {
        let transport: Box<dyn SuggestionTransport> = match config.transport {
            TransportKind::Direct => Box::new(DirectTransport::new(Arc::clone(&campaign_api))),
            TransportKind::FileExchange => Box::new(FileExchangeTransport::new(exchange_api)),
        };
        Self {
            id: Uuid::new_v4(),
            campaign_api,
            transport,
            context: SessionContext::new(config),
            state: ProvisionState::Unlinked,
            settle_delay: None,
        }
    }

    /// Override the campaign-stop settling delay used during provisioning.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = Some(delay);
        self
    }

    /// Run the provisioning chain to an active campaign. Idempotent on
    /// the remote side; calling it twice re-walks the reuse paths.
    pub async fn initialize(&mut self) -> SmResult<()> {
        let mut provisioner = Provisioner::new(
            Arc::clone(&self.campaign_api),
            Arc::clone(&self.context.config),
        );
        if let Some(delay) = self.settle_delay {
            provisioner = provisioner.with_settle_delay(delay);
        }
        let provisioned = provisioner.run().await?;
        info!(
            session_id = %self.id,
            campaign_id = %provisioned.campaign_id,
            transport = self.transport.name(),
            "optimization session ready"
        );
        self.context.workstation = Some(provisioned.workstation);
        self.context.campaign_id = Some(provisioned.campaign_id);
        self.state = ProvisionState::CampaignActive;
        Ok(())
    }

    /// Poll for new suggestions. Fails with a usage error before
    /// [`OptimizationSession::initialize`] has produced a campaign.
    pub async fn get_new_suggestions(
        &self,
        max_retries: u32,
        sleep_time: Duration,
    ) -> SmResult<Vec<Recommendation>> {
        self.ensure_active()?;
        self.transport
            .fetch_suggestions(&self.context, max_retries, sleep_time)
            .await
    }

    /// Submit completed recommendations and report per-item outcomes.
    pub async fn send_measurements(
        &self,
        recommendations: Vec<Recommendation>,
    ) -> SmResult<Vec<SubmissionOutcome>> {
        self.ensure_active()?;
        if recommendations.is_empty() {
            return Ok(Vec::new());
        }
        self.transport
            .submit_measurements(&self.context, recommendations)
            .await
    }

    fn ensure_active(&self) -> SmResult<()> {
        if self.state != ProvisionState::CampaignActive {
            return Err(SummitError::usage(
                "no active campaign; run initialize_optimization first",
            ));
        }
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ProvisionState {
        self.state
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.context.config
    }

    /// Id of the active campaign, once provisioned.
    pub fn campaign_id(&self) -> Option<&str> {
        self.context.campaign_id.as_deref()
    }
}

/// Build (or reuse) the process-wide configuration, provision the remote
/// campaign chain, and return a session bound to the active campaign.
pub async fn initialize_optimization(options: InitOptions) -> SmResult<OptimizationSession> {
    let config = sm_config::init(
        options.spec_file_path.as_deref(),
        options.spec_file_content,
        options.api_key.as_deref(),
    )?;
    // The cached config stays untouched; the session gets a copy with the
    // per-run overrides applied.
    let mut config = (*config).clone();
    if let Some(inherit_data) = options.inherit_data {
        config.inherit_data = inherit_data;
    }
    if let Some(always_restart) = options.always_restart {
        config.always_restart = always_restart;
    }
    let config = Arc::new(config);

    let client = Arc::new(HttpClient::new(HttpClientConfig {
        service_url: config.service_url(),
        exchange_url: config.exchange_url(),
        api_key: config.api_key.clone(),
    })?);
    let campaign_api: Arc<dyn CampaignApi> = client.clone();
    let exchange_api: Arc<dyn ExchangeApi> = client;
    let mut session = OptimizationSession::new(config, campaign_api, exchange_api);
    session.initialize().await?;
    Ok(session)
}
