//! Typed resources returned by [`CloudControllerApi`](super::CloudControllerApi)

use serde::Serialize;
use std::fmt;

/// An application, identified by its platform-assigned guid
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct App {
    pub guid: String,
    pub name: String,
}

/// A user-provided service instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInstance {
    pub guid: String,
    pub name: String,
    /// Raw drain URL as stored remotely, including any type tag
    pub syslog_drain_url: Option<String>,
}

/// State of a binding's last operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingState {
    InProgress,
    Succeeded,
    Failed,
}

impl BindingState {
    /// Parse the `last_operation.state` value; a missing operation means the
    /// binding was created synchronously.
    pub fn from_remote(state: Option<&str>) -> Self {
        match state.map(str::to_ascii_lowercase).as_deref() {
            None | Some("succeeded") => BindingState::Succeeded,
            Some("failed") => BindingState::Failed,
            Some(_) => BindingState::InProgress,
        }
    }
}

impl fmt::Display for BindingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingState::InProgress => write!(f, "in progress"),
            BindingState::Succeeded => write!(f, "succeeded"),
            BindingState::Failed => write!(f, "failed"),
        }
    }
}

/// A link between a service instance and an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub guid: String,
    pub app_guid: String,
    pub service_instance_guid: String,
    pub state: BindingState,
}

impl Binding {
    /// Only succeeded bindings count as active
    pub fn is_active(&self) -> bool {
        self.state == BindingState::Succeeded
    }
}

/// Filter for listing bindings; empty lists mean "no restriction"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingFilter {
    pub service_instance_guids: Vec<String>,
    pub app_guids: Vec<String>,
}

impl BindingFilter {
    /// Bindings of any of the given service instances
    pub fn for_instances(guids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            service_instance_guids: guids.into_iter().map(Into::into).collect(),
            app_guids: Vec::new(),
        }
    }

    /// Bindings between one service instance and one application
    pub fn for_pair(service_instance_guid: &str, app_guid: &str) -> Self {
        Self {
            service_instance_guids: vec![service_instance_guid.to_string()],
            app_guids: vec![app_guid.to_string()],
        }
    }

    /// Whether a binding passes this filter
    pub fn matches(&self, binding: &Binding) -> bool {
        (self.service_instance_guids.is_empty()
            || self
                .service_instance_guids
                .contains(&binding.service_instance_guid))
            && (self.app_guids.is_empty() || self.app_guids.contains(&binding.app_guid))
    }
}

/// Handle to an asynchronous remote job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobRef {
    pub guid: String,
}

impl JobRef {
    pub fn new(guid: impl Into<String>) -> Self {
        Self { guid: guid.into() }
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.guid)
    }
}

/// Outcome of a mutating call that may finish later
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncOperation {
    /// The remote side finished the operation before responding
    Completed,
    /// The remote side accepted the operation; poll the job
    Job(JobRef),
}

/// State of an asynchronous job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Processing,
    Complete,
    Failed,
}

impl JobState {
    /// Parse the remote state enum (`PROCESSING`, `POLLING`, `COMPLETE`, `FAILED`)
    pub fn from_remote(state: &str) -> Self {
        match state.to_ascii_uppercase().as_str() {
            "COMPLETE" => JobState::Complete,
            "FAILED" => JobState::Failed,
            _ => JobState::Processing,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Processing)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Processing => write!(f, "processing"),
            JobState::Complete => write!(f, "complete"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of an asynchronous job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub guid: String,
    pub state: JobState,
    /// Remote error details, populated when the job failed
    pub errors: Vec<String>,
}

impl Job {
    /// The remote failure reason, or a generic one if none was given
    pub fn error_detail(&self) -> String {
        if self.errors.is_empty() {
            format!("job {} failed without an error detail", self.guid)
        } else {
            self.errors.join("; ")
        }
    }
}
