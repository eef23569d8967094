//! reqwest-backed implementation of the remote service traits.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use sm_types::{ConfigError, RemoteError, SmResult};

use crate::api::{CampaignApi, ExchangeApi};
use crate::wire::{
    CampaignRef, CampaignStateGroup, ConfigEntry, ExchangeFile, FileKind, LaunchSpec,
    NewConstraint, NewMultiObjectiveFunction, NewObjective, NewOptimizer, NewParameter,
    NewTemplate, NewWorkstation, Observation, Optimizer, Project, RemoteConstraint,
    RemoteMultiObjectiveFunction, RemoteObjective, RemoteParameter, SubmissionStatus,
    SuggestionArtifact, Template, TemplateSummary, Workstation, WorkstationSummary,
};

const API_KEY_HEADER: &str = "X-API-KEY";

/// Endpoints and credentials for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub service_url: String,
    pub exchange_url: String,
    /// Missing key is allowed here; the service answers with an
    /// authentication error on first use.
    pub api_key: Option<String>,
}

/// Single resources arrive wrapped in an `object` envelope,
/// collections in an `objects` envelope.
#[derive(serde::Deserialize)]
struct ObjectEnvelope<T> {
    object: T,
}

#[derive(serde::Deserialize)]
struct ListEnvelope<T> {
    objects: Vec<T>,
}

/// HTTP client for the campaign service and the file exchange.
#[derive(Debug)]
pub struct HttpClient {
    http: reqwest::Client,
    service_url: String,
    exchange_url: String,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> SmResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let value = HeaderValue::from_str(api_key).map_err(|_| ConfigError::InvalidValue {
                field: "api_key".to_string(),
                message: "contains characters not allowed in a header value".to_string(),
            })?;
            headers.insert(API_KEY_HEADER, value);
        }
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| RemoteError::Http {
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            service_url: config.service_url.trim_end_matches('/').to_string(),
            exchange_url: config.exchange_url.trim_end_matches('/').to_string(),
        })
    }

    fn service(&self, path: &str) -> String {
        format!("{}/{path}", self.service_url)
    }

    fn exchange(&self, path: &str) -> String {
        format!("{}/{path}", self.exchange_url)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        body: Option<&(impl Serialize + ?Sized)>,
    ) -> SmResult<T> {
        debug!(%url, %method, "remote call");
        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| RemoteError::Http {
            message: e.to_string(),
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::AuthenticationFailed { message }.into());
        }
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound {
                resource: "resource".to_string(),
                name: url,
            }
            .into());
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        response.json::<T>().await.map_err(|e| {
            RemoteError::Decode {
                message: e.to_string(),
            }
            .into()
        })
    }

    async fn get_object<T: DeserializeOwned>(&self, url: String) -> SmResult<T> {
        let envelope: ObjectEnvelope<T> = self.request(Method::GET, url, None::<&()>).await?;
        Ok(envelope.object)
    }

    async fn get_list<T: DeserializeOwned>(&self, url: String) -> SmResult<Vec<T>> {
        let envelope: ListEnvelope<T> = self.request(Method::GET, url, None::<&()>).await?;
        Ok(envelope.objects)
    }

    async fn post_object<T: DeserializeOwned>(
        &self,
        url: String,
        body: &(impl Serialize + ?Sized),
    ) -> SmResult<T> {
        let envelope: ObjectEnvelope<T> = self.request(Method::POST, url, Some(body)).await?;
        Ok(envelope.object)
    }
}

#[async_trait]
impl CampaignApi for HttpClient {
    async fn list_workstations(&self, group_id: &str) -> SmResult<Vec<WorkstationSummary>> {
        self.get_list(self.service(&format!("workstations?group_id={group_id}")))
            .await
    }

    async fn get_workstation(&self, workstation_id: &str) -> SmResult<Workstation> {
        self.get_object(self.service(&format!("workstations/{workstation_id}")))
            .await
    }

    async fn create_workstation(&self, spec: &NewWorkstation) -> SmResult<Workstation> {
        self.post_object(self.service("workstations"), spec).await
    }

    async fn create_parameter(&self, spec: &NewParameter) -> SmResult<RemoteParameter> {
        self.post_object(self.service("parameters"), spec).await
    }

    async fn copy_parameter(&self, parameter_id: &str, name: &str) -> SmResult<RemoteParameter> {
        self.post_object(
            self.service(&format!("parameters/{parameter_id}/copy")),
            &serde_json::json!({ "name": name }),
        )
        .await
    }

    async fn create_optimizer(&self, spec: &NewOptimizer) -> SmResult<Optimizer> {
        self.post_object(self.service("optimizers"), spec).await
    }

    async fn update_optimizer_configuration(
        &self,
        optimizer_id: &str,
        entries: &[ConfigEntry],
    ) -> SmResult<()> {
        let _: ObjectEnvelope<serde_json::Value> = self
            .request(
                Method::PATCH,
                self.service(&format!("optimizers/{optimizer_id}/configuration")),
                Some(&entries),
            )
            .await?;
        Ok(())
    }

    async fn create_objective(&self, spec: &NewObjective) -> SmResult<RemoteObjective> {
        self.post_object(self.service("objectives"), spec).await
    }

    async fn create_multi_objective_function(
        &self,
        spec: &NewMultiObjectiveFunction,
    ) -> SmResult<RemoteMultiObjectiveFunction> {
        self.post_object(self.service("multi-objective-functions"), spec)
            .await
    }

    async fn create_constraint(&self, spec: &NewConstraint) -> SmResult<RemoteConstraint> {
        self.post_object(self.service("constraints"), spec).await
    }

    async fn list_templates(&self, group_id: &str) -> SmResult<Vec<TemplateSummary>> {
        self.get_list(self.service(&format!("templates?group_id={group_id}")))
            .await
    }

    async fn get_template(&self, template_id: &str) -> SmResult<Template> {
        self.get_object(self.service(&format!("templates/{template_id}")))
            .await
    }

    async fn create_template(&self, spec: &NewTemplate) -> SmResult<Template> {
        self.post_object(self.service("templates"), spec).await
    }

    async fn update_template(&self, template_id: &str, spec: &NewTemplate) -> SmResult<Template> {
        let envelope: ObjectEnvelope<Template> = self
            .request(
                Method::PUT,
                self.service(&format!("templates/{template_id}")),
                Some(spec),
            )
            .await?;
        Ok(envelope.object)
    }

    async fn campaign_states(
        &self,
        template_ids: &[String],
        group_id: &str,
    ) -> SmResult<Vec<CampaignStateGroup>> {
        let ids = template_ids.join(",");
        self.get_list(self.service(&format!(
            "campaigns/state?template_ids={ids}&group_id={group_id}"
        )))
        .await
    }

    async fn stop_campaign(&self, campaign_id: &str) -> SmResult<()> {
        let _: ObjectEnvelope<serde_json::Value> = self
            .request(
                Method::POST,
                self.service(&format!("campaigns/{campaign_id}/operation")),
                Some(&serde_json::json!({ "operation": "stop" })),
            )
            .await?;
        Ok(())
    }

    async fn launch_campaign(
        &self,
        template_id: &str,
        spec: &LaunchSpec,
    ) -> SmResult<CampaignRef> {
        self.post_object(self.service(&format!("templates/{template_id}/run")), spec)
            .await
    }

    async fn latest_observations(&self, campaign_id: &str) -> SmResult<Vec<Observation>> {
        self.get_list(self.service(&format!("campaigns/{campaign_id}/observations/latest")))
            .await
    }

    async fn submit_observations(
        &self,
        campaign_id: &str,
        observations: &[Observation],
    ) -> SmResult<Vec<SubmissionStatus>> {
        let envelope: ListEnvelope<SubmissionStatus> = self
            .request(
                Method::POST,
                self.service(&format!("campaigns/{campaign_id}/observations")),
                Some(&observations),
            )
            .await?;
        Ok(envelope.objects)
    }
}

#[async_trait]
impl ExchangeApi for HttpClient {
    async fn list_projects(&self, group_id: &str) -> SmResult<Vec<Project>> {
        self.get_list(self.exchange(&format!("projects?group_id={group_id}")))
            .await
    }

    async fn list_files(&self, project_id: &str, kind: FileKind) -> SmResult<Vec<ExchangeFile>> {
        self.get_list(self.exchange(&format!(
            "files?project_id={project_id}&group_type={}",
            kind.as_str()
        )))
        .await
    }

    async fn download_artifact(&self, file_id: &str) -> SmResult<SuggestionArtifact> {
        self.get_object(self.exchange(&format!("files/{file_id}/content")))
            .await
    }

    async fn upload_artifact(
        &self,
        project_id: &str,
        kind: FileKind,
        file_name: &str,
        artifact: &SuggestionArtifact,
    ) -> SmResult<ExchangeFile> {
        self.post_object(
            self.exchange(&format!(
                "projects/{project_id}/files?group_type={}",
                kind.as_str()
            )),
            &serde_json::json!({ "file_name": file_name, "content": artifact }),
        )
        .await
    }

    async fn delete_file(&self, file_id: &str) -> SmResult<()> {
        let url = self.exchange(&format!("files/{file_id}"));
        debug!(%url, "deleting exchange file");
        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|e| RemoteError::Http {
                message: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }
        Ok(())
    }
}
