//! HTTP implementation of [`CloudControllerApi`] on top of `reqwest`

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use super::CloudControllerApi;
use super::types::{App, AsyncOperation, Binding, BindingFilter, Job, JobRef, ServiceInstance};
use super::wire::{
    AppResource, BindingResource, CreateBindingRelationships, CreateBindingRequest,
    CreateServiceInstanceRequest, ErrorEnvelope, JobResource, Page, ServiceInstanceResource,
    SpaceRelationship, ToOne,
};
use crate::config::ResolvedTarget;
use crate::config::config::DEFAULT_REQUEST_TIMEOUT;
use crate::error::{CoreError, ResourceKind, Result};

/// User agent string for drainctl HTTP requests
const USER_AGENT: &str = concat!("drainctl/", env!("CARGO_PKG_VERSION"));

/// Maximum number of guids sent in one filter parameter
const GUID_BATCH_SIZE: usize = 50;

/// Largest page size the v3 API accepts
const PER_PAGE: &str = "5000";

/// Cloud Controller v3 client scoped to one space
#[derive(Clone)]
pub struct CloudControllerClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    space_guid: String,
}

impl fmt::Debug for CloudControllerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudControllerClient")
            .field("api_url", &self.api_url)
            .field("space_guid", &self.space_guid)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Builder for [`CloudControllerClient`]
#[derive(Debug, Default)]
pub struct CloudControllerClientBuilder {
    api_url: Option<String>,
    token: Option<String>,
    space_guid: Option<String>,
    skip_ssl_validation: bool,
    timeout: Option<Duration>,
}

impl CloudControllerClientBuilder {
    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn space_guid(mut self, space_guid: impl Into<String>) -> Self {
        self.space_guid = Some(space_guid.into());
        self
    }

    pub fn skip_ssl_validation(mut self, skip: bool) -> Self {
        self.skip_ssl_validation = skip;
        self
    }

    /// Timeout applied to every request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<CloudControllerClient> {
        let api_url = required(self.api_url, "api_url")?;
        let token = required(self.token, "token")?;
        let space_guid = required(self.space_guid, "space_guid")?;

        Url::parse(&api_url).map_err(|e| {
            CoreError::InvalidArgument(format!("invalid API URL '{}': {}", api_url, e))
        })?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .danger_accept_invalid_certs(self.skip_ssl_validation)
            .build()?;

        Ok(CloudControllerClient {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            space_guid,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CoreError::InvalidArgument(format!("{} is required", field)))
}

impl CloudControllerClient {
    pub fn builder() -> CloudControllerClientBuilder {
        CloudControllerClientBuilder::default()
    }

    /// Build a client for a resolved profile
    pub fn from_target(target: &ResolvedTarget) -> Result<Self> {
        Self::builder()
            .api_url(&target.api_url)
            .token(&target.token)
            .space_guid(&target.space_guid)
            .skip_ssl_validation(target.skip_ssl_validation)
            .timeout(target.request_timeout)
            .build()
    }

    /// Space this client is scoped to
    pub fn space_guid(&self) -> &str {
        &self.space_guid
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.api_url, path))
            .map_err(|e| CoreError::InvalidArgument(format!("invalid request URL: {}", e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        resource: Option<(ResourceKind, &str)>,
    ) -> Result<Response> {
        debug!("{} {}", method, url.path());
        trace!("Full request URL: {}", url);

        let mut request = self.http.request(method, url).bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        debug!("Request failed with HTTP {}", status.as_u16());
        Err(classify_error(status, &text, resource))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        resource: Option<(ResourceKind, &str)>,
    ) -> Result<T> {
        let path = url.path().to_string();
        let response = self.execute(Method::GET, url, None, resource).await?;
        decode(&path, response).await
    }

    /// Fetch every page of a list endpoint
    async fn list_all<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
        let mut resources = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next.take() {
            let page: Page<T> = self.get_json(url, None).await?;
            if let Some(href) = page.next_href() {
                next = Some(Url::parse(href).map_err(|e| {
                    CoreError::Decode(format!("invalid pagination link '{}': {}", href, e))
                })?);
            }
            resources.extend(page.resources);
        }

        Ok(resources)
    }

    async fn mutate(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        resource: Option<(ResourceKind, &str)>,
    ) -> Result<AsyncOperation> {
        let response = self.execute(method, url, body, resource).await?;
        async_operation(&self.api_url, &response)
    }
}

/// Turn a non-success response into the error taxonomy
fn classify_error(
    status: StatusCode,
    body: &str,
    resource: Option<(ResourceKind, &str)>,
) -> CoreError {
    let envelope: Option<ErrorEnvelope> = serde_json::from_str(body).ok();
    let entries = envelope.map(|e| e.errors).unwrap_or_default();

    let message = if entries.is_empty() {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        entries
            .iter()
            .map(|e| e.detail.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    };

    match status {
        StatusCode::UNAUTHORIZED => CoreError::Unauthorized(message),
        StatusCode::FORBIDDEN => CoreError::Forbidden(message),
        StatusCode::NOT_FOUND => match resource {
            Some((kind, name)) => CoreError::NotFound {
                kind,
                name: name.to_string(),
            },
            None => CoreError::Remote {
                status: status.as_u16(),
                message,
            },
        },
        StatusCode::CONFLICT => CoreError::Conflict(message),
        StatusCode::UNPROCESSABLE_ENTITY
            if entries.iter().any(|e| {
                matches!(e.code, 60002 | 90003)
                    || e.title == "CF-ServiceInstanceNameTaken"
                    || e.detail.contains("name is taken")
                    || e.detail.contains("already bound")
            }) =>
        {
            CoreError::Conflict(message)
        }
        _ => CoreError::Remote {
            status: status.as_u16(),
            message,
        },
    }
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| CoreError::Decode(format!("{}: {}", path, e)))
}

/// 202 + `Location: .../v3/jobs/<guid>` means the operation continues remotely
fn async_operation(api_url: &str, response: &Response) -> Result<AsyncOperation> {
    if response.status() != StatusCode::ACCEPTED {
        return Ok(AsyncOperation::Completed);
    }

    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| CoreError::Decode("202 Accepted without a Location header".to_string()))?;

    job_guid_from_location(api_url, location)
        .map(|guid| AsyncOperation::Job(JobRef::new(guid)))
        .ok_or_else(|| CoreError::Decode(format!("unrecognised job location '{}'", location)))
}

/// Relative locations resolve against the API URL
fn job_guid_from_location(api_url: &str, location: &str) -> Option<String> {
    let url = Url::parse(api_url).ok()?.join(location).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [.., "jobs", guid] => Some((*guid).to_string()),
        _ => None,
    }
}

#[async_trait]
impl CloudControllerApi for CloudControllerClient {
    async fn app_guid(&self, name: &str) -> Result<String> {
        let url = self.url(
            "/v3/apps",
            &[("names", name), ("space_guids", self.space_guid.as_str())],
        )?;
        let page: Page<AppResource> = self.get_json(url, None).await?;
        page.resources
            .into_iter()
            .next()
            .map(|app| app.guid)
            .ok_or_else(|| CoreError::NotFound {
                kind: ResourceKind::App,
                name: name.to_string(),
            })
    }

    async fn list_apps(&self, guids: &[String]) -> Result<Vec<App>> {
        let mut apps = Vec::new();
        for batch in guids.chunks(GUID_BATCH_SIZE) {
            let joined = batch.join(",");
            let url = self.url("/v3/apps", &[("guids", joined.as_str()), ("per_page", PER_PAGE)])?;
            let resources: Vec<AppResource> = self.list_all(url).await?;
            apps.extend(resources.into_iter().map(App::from));
        }
        Ok(apps)
    }

    async fn service_instance(&self, name: &str) -> Result<ServiceInstance> {
        let url = self.url(
            "/v3/service_instances",
            &[
                ("names", name),
                ("type", "user-provided"),
                ("space_guids", self.space_guid.as_str()),
            ],
        )?;
        let page: Page<ServiceInstanceResource> = self.get_json(url, None).await?;
        page.resources
            .into_iter()
            .next()
            .map(ServiceInstance::from)
            .ok_or_else(|| CoreError::NotFound {
                kind: ResourceKind::Drain,
                name: name.to_string(),
            })
    }

    async fn list_service_instances(&self) -> Result<Vec<ServiceInstance>> {
        let url = self.url(
            "/v3/service_instances",
            &[
                ("type", "user-provided"),
                ("space_guids", self.space_guid.as_str()),
                ("per_page", PER_PAGE),
            ],
        )?;
        let resources: Vec<ServiceInstanceResource> = self.list_all(url).await?;
        Ok(resources.into_iter().map(ServiceInstance::from).collect())
    }

    async fn create_service_instance(
        &self,
        name: &str,
        syslog_drain_url: &str,
    ) -> Result<ServiceInstance> {
        let request = CreateServiceInstanceRequest {
            kind: "user-provided",
            name,
            syslog_drain_url,
            relationships: SpaceRelationship {
                space: ToOne::to(&self.space_guid),
            },
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| CoreError::Decode(format!("failed to encode request: {}", e)))?;

        let url = self.url("/v3/service_instances", &[])?;
        let response = self.execute(Method::POST, url, Some(body), None).await?;
        let created: ServiceInstanceResource = decode("/v3/service_instances", response).await?;
        Ok(created.into())
    }

    async fn delete_service_instance(&self, guid: &str) -> Result<AsyncOperation> {
        let url = self.url(&format!("/v3/service_instances/{}", guid), &[])?;
        self.mutate(
            Method::DELETE,
            url,
            None,
            Some((ResourceKind::Drain, guid)),
        )
        .await
    }

    async fn list_bindings(&self, filter: &BindingFilter) -> Result<Vec<Binding>> {
        let instance_batches: Vec<Option<String>> = if filter.service_instance_guids.is_empty() {
            vec![None]
        } else {
            filter
                .service_instance_guids
                .chunks(GUID_BATCH_SIZE)
                .map(|batch| Some(batch.join(",")))
                .collect()
        };
        let app_guids = filter.app_guids.join(",");

        let mut bindings = Vec::new();
        for batch in instance_batches {
            let mut query = vec![("type", "app"), ("per_page", PER_PAGE)];
            if let Some(ref guids) = batch {
                query.push(("service_instance_guids", guids.as_str()));
            }
            if !app_guids.is_empty() {
                query.push(("app_guids", app_guids.as_str()));
            }

            let url = self.url("/v3/service_credential_bindings", &query)?;
            let resources: Vec<BindingResource> = self.list_all(url).await?;
            bindings.extend(
                resources
                    .into_iter()
                    .filter_map(BindingResource::into_binding),
            );
        }

        Ok(bindings)
    }

    async fn create_binding(
        &self,
        service_instance_guid: &str,
        app_guid: &str,
    ) -> Result<AsyncOperation> {
        let request = CreateBindingRequest {
            kind: "app",
            relationships: CreateBindingRelationships {
                service_instance: ToOne::to(service_instance_guid),
                app: ToOne::to(app_guid),
            },
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| CoreError::Decode(format!("failed to encode request: {}", e)))?;

        let url = self.url("/v3/service_credential_bindings", &[])?;
        self.mutate(Method::POST, url, Some(body), None).await
    }

    async fn delete_binding(&self, guid: &str) -> Result<AsyncOperation> {
        let url = self.url(&format!("/v3/service_credential_bindings/{}", guid), &[])?;
        self.mutate(
            Method::DELETE,
            url,
            None,
            Some((ResourceKind::Binding, guid)),
        )
        .await
    }

    async fn get_job(&self, job: &JobRef) -> Result<Job> {
        let url = self.url(&format!("/v3/jobs/{}", job.guid), &[])?;
        let resource: JobResource = self
            .get_json(url, Some((ResourceKind::Job, job.guid.as_str())))
            .await?;
        Ok(resource.into())
    }
}
