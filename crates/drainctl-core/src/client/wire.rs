//! Serde models for the v3 JSON payloads
//!
//! Only the fields the drain engine reads are modelled; everything else in
//! the remote responses is ignored.

use serde::{Deserialize, Serialize};

use super::types::{App, Binding, BindingState, Job, JobState, ServiceInstance};

#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default = "Vec::new")]
    pub resources: Vec<T>,
}

impl<T> Page<T> {
    pub fn next_href(&self) -> Option<&str> {
        self.pagination
            .as_ref()
            .and_then(|p| p.next.as_ref())
            .map(|link| link.href.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Pagination {
    #[serde(default)]
    pub next: Option<Link>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Link {
    pub href: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppResource {
    pub guid: String,
    pub name: String,
}

impl From<AppResource> for App {
    fn from(r: AppResource) -> Self {
        App {
            guid: r.guid,
            name: r.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceInstanceResource {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub syslog_drain_url: Option<String>,
}

impl From<ServiceInstanceResource> for ServiceInstance {
    fn from(r: ServiceInstanceResource) -> Self {
        ServiceInstance {
            guid: r.guid,
            name: r.name,
            syslog_drain_url: r.syslog_drain_url.filter(|url| !url.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BindingResource {
    pub guid: String,
    #[serde(default)]
    pub last_operation: Option<LastOperation>,
    pub relationships: BindingRelationships,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LastOperation {
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BindingRelationships {
    #[serde(default)]
    pub app: Option<ToOne>,
    pub service_instance: ToOne,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ToOne {
    #[serde(default)]
    pub data: Option<Relationship>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Relationship {
    pub guid: String,
}

impl ToOne {
    pub fn to(guid: &str) -> Self {
        ToOne {
            data: Some(Relationship {
                guid: guid.to_string(),
            }),
        }
    }

    fn guid(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.guid.as_str())
    }
}

impl BindingResource {
    /// Key bindings carry no app relationship and are not drains' concern
    pub fn into_binding(self) -> Option<Binding> {
        let app_guid = self.relationships.app.as_ref()?.guid()?.to_string();
        let service_instance_guid = self.relationships.service_instance.guid()?.to_string();
        Some(Binding {
            guid: self.guid,
            app_guid,
            service_instance_guid,
            state: BindingState::from_remote(
                self.last_operation.as_ref().map(|op| op.state.as_str()),
            ),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobResource {
    pub guid: String,
    pub state: String,
    #[serde(default)]
    pub errors: Vec<ApiErrorEntry>,
}

impl From<JobResource> for Job {
    fn from(r: JobResource) -> Self {
        Job {
            guid: r.guid,
            state: JobState::from_remote(&r.state),
            errors: r.errors.into_iter().map(|e| e.detail).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(default)]
    pub errors: Vec<ApiErrorEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorEntry {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateServiceInstanceRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'a str,
    pub syslog_drain_url: &'a str,
    pub relationships: SpaceRelationship,
}

#[derive(Debug, Serialize)]
pub(crate) struct SpaceRelationship {
    pub space: ToOne,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateBindingRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub relationships: CreateBindingRelationships,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateBindingRelationships {
    pub service_instance: ToOne,
    pub app: ToOne,
}
