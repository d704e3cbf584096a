//! In-memory [`CloudControllerApi`] for exercising workflows without a foundation
//!
//! [`FakeCloudController`] keeps apps, user-provided service instances,
//! bindings and jobs in memory and mimics the remote semantics the drain
//! engine relies on: unique instance names, asynchronous bind/unbind jobs
//! and per-app failure injection.
//!
//! ```rust,ignore
//! let fake = FakeCloudController::new()
//!     .with_app("web-app")
//!     .async_jobs(2)
//!     .fail_unbind_for("worker", "Service broker timed out");
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::client::{
    App, AsyncOperation, Binding, BindingFilter, BindingState, CloudControllerApi, Job, JobRef,
    JobState, ServiceInstance,
};
use crate::error::{CoreError, ResourceKind, Result};

/// How a scripted job ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeJobOutcome {
    Complete,
    Failed(String),
}

/// What a job does to the fake's state once it reaches its outcome
#[derive(Debug, Clone)]
enum JobEffect {
    None,
    /// Binding becomes succeeded, or failed if the job fails
    Bind(String),
    /// Binding is removed, or left failed if the job fails
    Unbind(String),
    /// Instance is removed
    DeleteInstance(String),
}

#[derive(Debug)]
struct FakeJob {
    remaining: u32,
    outcome: FakeJobOutcome,
    effect: JobEffect,
    polls: u32,
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: u64,
    apps: Vec<App>,
    instances: Vec<ServiceInstance>,
    bindings: Vec<Binding>,
    jobs: HashMap<String, FakeJob>,
    /// `None` answers mutations synchronously
    async_polls: Option<u32>,
    jobs_never_finish: bool,
    fail_bind: HashMap<String, String>,
    fail_unbind: HashMap<String, String>,
    /// API method name to the remote detail it fails with
    fail_calls: HashMap<String, String>,
    calls: Vec<String>,
}

impl FakeState {
    /// Log a call and fail it if its method was scripted to fail
    fn record(&mut self, call: String) -> Result<()> {
        let method = call.split_whitespace().next().unwrap_or_default().to_string();
        self.calls.push(call);
        match self.fail_calls.get(&method) {
            Some(detail) => Err(CoreError::Remote {
                status: 500,
                message: detail.clone(),
            }),
            None => Ok(()),
        }
    }

    fn next_guid(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn app_name(&self, guid: &str) -> Option<String> {
        self.apps
            .iter()
            .find(|a| a.guid == guid)
            .map(|a| a.name.clone())
    }

    fn start_job(&mut self, outcome: FakeJobOutcome, effect: JobEffect) -> JobRef {
        let guid = self.next_guid("job");
        let remaining = self.async_polls.unwrap_or(0);
        self.jobs.insert(
            guid.clone(),
            FakeJob {
                remaining,
                outcome,
                effect,
                polls: 0,
            },
        );
        JobRef::new(guid)
    }

    fn set_binding_state(&mut self, guid: &str, state: BindingState) {
        if let Some(binding) = self.bindings.iter_mut().find(|b| b.guid == guid) {
            binding.state = state;
        }
    }

    fn apply(&mut self, effect: &JobEffect, succeeded: bool) {
        match (effect, succeeded) {
            (JobEffect::None, _) => {}
            (JobEffect::Bind(guid), true) => self.set_binding_state(guid, BindingState::Succeeded),
            (JobEffect::Bind(guid), false) | (JobEffect::Unbind(guid), false) => {
                self.set_binding_state(guid, BindingState::Failed)
            }
            (JobEffect::Unbind(guid), true) => self.bindings.retain(|b| &b.guid != guid),
            (JobEffect::DeleteInstance(guid), true) => self.instances.retain(|i| &i.guid != guid),
            (JobEffect::DeleteInstance(_), false) => {}
        }
    }
}

/// Fully in-memory stand-in for the remote API
#[derive(Debug, Default)]
pub struct FakeCloudController {
    state: Mutex<FakeState>,
}

impl FakeCloudController {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Seeding

    /// Add an application to the space
    pub fn with_app(self, name: &str) -> Self {
        {
            let mut state = self.state();
            let guid = state.next_guid("app");
            state.apps.push(App {
                guid,
                name: name.to_string(),
            });
        }
        self
    }

    /// Add a user-provided service instance with a raw (possibly tagged) drain URL
    pub fn with_drain(self, name: &str, raw_url: &str) -> Self {
        {
            let mut state = self.state();
            let guid = state.next_guid("si");
            state.instances.push(ServiceInstance {
                guid,
                name: name.to_string(),
                syslog_drain_url: Some(raw_url.to_string()),
            });
        }
        self
    }

    /// Add a user-provided service instance that is not a drain
    pub fn with_plain_instance(self, name: &str) -> Self {
        {
            let mut state = self.state();
            let guid = state.next_guid("si");
            state.instances.push(ServiceInstance {
                guid,
                name: name.to_string(),
                syslog_drain_url: None,
            });
        }
        self
    }

    /// Add a binding between an existing drain and app
    ///
    /// Unknown names are ignored so seeding never panics.
    pub fn with_binding(self, drain: &str, app: &str, binding_state: BindingState) -> Self {
        {
            let mut state = self.state();
            let instance = state
                .instances
                .iter()
                .find(|i| i.name == drain)
                .map(|i| i.guid.clone());
            let app_guid = state
                .apps
                .iter()
                .find(|a| a.name == app)
                .map(|a| a.guid.clone());
            if let (Some(service_instance_guid), Some(app_guid)) = (instance, app_guid) {
                let guid = state.next_guid("binding");
                state.bindings.push(Binding {
                    guid,
                    app_guid,
                    service_instance_guid,
                    state: binding_state,
                });
            }
        }
        self
    }

    // Behaviour

    /// Answer bind, unbind and delete with jobs that need `polls` processing
    /// polls before reaching their outcome
    pub fn async_jobs(self, polls: u32) -> Self {
        self.state().async_polls = Some(polls);
        self
    }

    /// Jobs stay processing forever
    pub fn jobs_never_finish(self) -> Self {
        {
            let mut state = self.state();
            state.jobs_never_finish = true;
            state.async_polls.get_or_insert(0);
        }
        self
    }

    /// Binding this app fails with the given remote detail
    pub fn fail_bind_for(self, app: &str, detail: &str) -> Self {
        self.state()
            .fail_bind
            .insert(app.to_string(), detail.to_string());
        self
    }

    /// Unbinding this app fails with the given remote detail
    pub fn fail_unbind_for(self, app: &str, detail: &str) -> Self {
        self.state()
            .fail_unbind
            .insert(app.to_string(), detail.to_string());
        self
    }

    /// Every call to the API method fails with HTTP 500 and the given detail
    pub fn fail_call(self, method: &str, detail: &str) -> Self {
        self.state()
            .fail_calls
            .insert(method.to_string(), detail.to_string());
        self
    }

    /// Let binding this app succeed again
    pub fn clear_bind_failure(&self, app: &str) {
        self.state().fail_bind.remove(app);
    }

    /// Register a standalone job for poller tests
    pub fn add_job(&self, polls_before_done: u32, outcome: FakeJobOutcome) -> JobRef {
        let mut state = self.state();
        let job = state.start_job(outcome, JobEffect::None);
        if let Some(entry) = state.jobs.get_mut(&job.guid) {
            entry.remaining = polls_before_done;
        }
        job
    }

    // Inspection

    pub fn instances(&self) -> Vec<ServiceInstance> {
        self.state().instances.clone()
    }

    pub fn instance(&self, name: &str) -> Option<ServiceInstance> {
        self.state()
            .instances
            .iter()
            .find(|i| i.name == name)
            .cloned()
    }

    pub fn bindings(&self) -> Vec<Binding> {
        self.state().bindings.clone()
    }

    /// Bindings between the named drain and app
    pub fn bindings_between(&self, drain: &str, app: &str) -> Vec<Binding> {
        let state = self.state();
        let Some(instance) = state.instances.iter().find(|i| i.name == drain) else {
            return Vec::new();
        };
        state
            .bindings
            .iter()
            .filter(|b| {
                b.service_instance_guid == instance.guid
                    && state.app_name(&b.app_guid).as_deref() == Some(app)
            })
            .cloned()
            .collect()
    }

    /// Number of times a job was fetched
    pub fn job_polls(&self, job: &JobRef) -> u32 {
        self.state()
            .jobs
            .get(&job.guid)
            .map(|j| j.polls)
            .unwrap_or_default()
    }

    /// Every API method invoked so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Number of calls to one API method
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(method))
            .count()
    }
}

#[async_trait]
impl CloudControllerApi for FakeCloudController {
    async fn app_guid(&self, name: &str) -> Result<String> {
        let mut state = self.state();
        state.record(format!("app_guid {}", name))?;
        state
            .apps
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.guid.clone())
            .ok_or_else(|| CoreError::NotFound {
                kind: ResourceKind::App,
                name: name.to_string(),
            })
    }

    async fn list_apps(&self, guids: &[String]) -> Result<Vec<App>> {
        let mut state = self.state();
        state.record("list_apps".to_string())?;
        Ok(state
            .apps
            .iter()
            .filter(|a| guids.contains(&a.guid))
            .cloned()
            .collect())
    }

    async fn service_instance(&self, name: &str) -> Result<ServiceInstance> {
        let mut state = self.state();
        state.record(format!("service_instance {}", name))?;
        state
            .instances
            .iter()
            .find(|i| i.name == name)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                kind: ResourceKind::Drain,
                name: name.to_string(),
            })
    }

    async fn list_service_instances(&self) -> Result<Vec<ServiceInstance>> {
        let mut state = self.state();
        state.record("list_service_instances".to_string())?;
        Ok(state.instances.clone())
    }

    async fn create_service_instance(
        &self,
        name: &str,
        syslog_drain_url: &str,
    ) -> Result<ServiceInstance> {
        let mut state = self.state();
        state.record(format!("create_service_instance {}", name))?;
        if state.instances.iter().any(|i| i.name == name) {
            return Err(CoreError::Conflict(format!(
                "The service instance name is taken: {}",
                name
            )));
        }
        let instance = ServiceInstance {
            guid: state.next_guid("si"),
            name: name.to_string(),
            syslog_drain_url: Some(syslog_drain_url.to_string()),
        };
        state.instances.push(instance.clone());
        Ok(instance)
    }

    async fn delete_service_instance(&self, guid: &str) -> Result<AsyncOperation> {
        let mut state = self.state();
        state.record(format!("delete_service_instance {}", guid))?;
        if !state.instances.iter().any(|i| i.guid == guid) {
            return Err(CoreError::NotFound {
                kind: ResourceKind::Drain,
                name: guid.to_string(),
            });
        }
        if state.bindings.iter().any(|b| b.service_instance_guid == guid) {
            return Err(CoreError::Remote {
                status: 422,
                message: "Cannot delete service instance with bindings".to_string(),
            });
        }
        if state.async_polls.is_some() {
            let effect = JobEffect::DeleteInstance(guid.to_string());
            return Ok(AsyncOperation::Job(
                state.start_job(FakeJobOutcome::Complete, effect),
            ));
        }
        state.instances.retain(|i| i.guid != guid);
        Ok(AsyncOperation::Completed)
    }

    async fn list_bindings(&self, filter: &BindingFilter) -> Result<Vec<Binding>> {
        let mut state = self.state();
        state.record("list_bindings".to_string())?;
        Ok(state
            .bindings
            .iter()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect())
    }

    async fn create_binding(
        &self,
        service_instance_guid: &str,
        app_guid: &str,
    ) -> Result<AsyncOperation> {
        let mut state = self.state();
        state.record(format!("create_binding {} {}", service_instance_guid, app_guid))?;

        if !state
            .instances
            .iter()
            .any(|i| i.guid == service_instance_guid)
        {
            return Err(CoreError::NotFound {
                kind: ResourceKind::Drain,
                name: service_instance_guid.to_string(),
            });
        }
        let Some(app_name) = state.app_name(app_guid) else {
            return Err(CoreError::NotFound {
                kind: ResourceKind::App,
                name: app_guid.to_string(),
            });
        };
        if state
            .bindings
            .iter()
            .any(|b| b.service_instance_guid == service_instance_guid && b.app_guid == app_guid)
        {
            return Err(CoreError::Conflict(
                "The app is already bound to the service instance".to_string(),
            ));
        }

        let failure = state.fail_bind.get(&app_name).cloned();
        let asynchronous = state.async_polls.is_some();
        if let (false, Some(detail)) = (asynchronous, &failure) {
            return Err(CoreError::Remote {
                status: 502,
                message: detail.clone(),
            });
        }

        let guid = state.next_guid("binding");
        state.bindings.push(Binding {
            guid: guid.clone(),
            app_guid: app_guid.to_string(),
            service_instance_guid: service_instance_guid.to_string(),
            state: if asynchronous {
                BindingState::InProgress
            } else {
                BindingState::Succeeded
            },
        });

        if !asynchronous {
            return Ok(AsyncOperation::Completed);
        }
        let outcome = match failure {
            Some(detail) => FakeJobOutcome::Failed(detail),
            None => FakeJobOutcome::Complete,
        };
        Ok(AsyncOperation::Job(
            state.start_job(outcome, JobEffect::Bind(guid)),
        ))
    }

    async fn delete_binding(&self, guid: &str) -> Result<AsyncOperation> {
        let mut state = self.state();
        state.record(format!("delete_binding {}", guid))?;

        let Some(binding) = state.bindings.iter().find(|b| b.guid == guid).cloned() else {
            return Err(CoreError::NotFound {
                kind: ResourceKind::Binding,
                name: guid.to_string(),
            });
        };
        let failure = state
            .app_name(&binding.app_guid)
            .and_then(|app| state.fail_unbind.get(&app).cloned());

        if state.async_polls.is_none() {
            return match failure {
                Some(detail) => {
                    state.set_binding_state(guid, BindingState::Failed);
                    Err(CoreError::Remote {
                        status: 502,
                        message: detail,
                    })
                }
                None => {
                    state.bindings.retain(|b| b.guid != guid);
                    Ok(AsyncOperation::Completed)
                }
            };
        }

        state.set_binding_state(guid, BindingState::InProgress);
        let outcome = match failure {
            Some(detail) => FakeJobOutcome::Failed(detail),
            None => FakeJobOutcome::Complete,
        };
        Ok(AsyncOperation::Job(
            state.start_job(outcome, JobEffect::Unbind(guid.to_string())),
        ))
    }

    async fn get_job(&self, job: &JobRef) -> Result<Job> {
        let mut state = self.state();
        state.record(format!("get_job {}", job.guid))?;
        let never_finish = state.jobs_never_finish;

        let Some(entry) = state.jobs.get_mut(&job.guid) else {
            return Err(CoreError::NotFound {
                kind: ResourceKind::Job,
                name: job.guid.clone(),
            });
        };
        entry.polls += 1;

        if never_finish || entry.remaining > 0 {
            entry.remaining = entry.remaining.saturating_sub(1);
            return Ok(Job {
                guid: job.guid.clone(),
                state: JobState::Processing,
                errors: Vec::new(),
            });
        }

        let outcome = entry.outcome.clone();
        // Effects apply once; later polls just report the outcome
        let effect = std::mem::replace(&mut entry.effect, JobEffect::None);
        let succeeded = outcome == FakeJobOutcome::Complete;
        state.apply(&effect, succeeded);

        Ok(match outcome {
            FakeJobOutcome::Complete => Job {
                guid: job.guid.clone(),
                state: JobState::Complete,
                errors: Vec::new(),
            },
            FakeJobOutcome::Failed(detail) => Job {
                guid: job.guid.clone(),
                state: JobState::Failed,
                errors: vec![detail],
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_binding_is_visible() {
        let fake = FakeCloudController::new()
            .with_app("web-app")
            .with_drain("my-drain", "syslog://logs.example.com:6000")
            .with_binding("my-drain", "web-app", BindingState::Succeeded);

        assert_eq!(fake.bindings_between("my-drain", "web-app").len(), 1);
        let si = fake.service_instance("my-drain").await.unwrap().guid;
        let bindings = fake
            .list_bindings(&BindingFilter::for_instances([si]))
            .await
            .unwrap();
        assert_eq!(bindings.len(), 1);
    }

    #[tokio::test]
    async fn test_async_bind_reaches_succeeded_after_polling() {
        let fake = FakeCloudController::new()
            .with_app("web-app")
            .with_drain("my-drain", "syslog://h:1")
            .async_jobs(1);
        let si = fake.service_instance("my-drain").await.unwrap().guid;
        let app = fake.app_guid("web-app").await.unwrap();

        let AsyncOperation::Job(job) = fake.create_binding(&si, &app).await.unwrap() else {
            panic!("expected a job");
        };
        assert_eq!(
            fake.bindings_between("my-drain", "web-app")[0].state,
            BindingState::InProgress
        );

        assert_eq!(fake.get_job(&job).await.unwrap().state, JobState::Processing);
        assert_eq!(fake.get_job(&job).await.unwrap().state, JobState::Complete);
        assert_eq!(
            fake.bindings_between("my-drain", "web-app")[0].state,
            BindingState::Succeeded
        );
    }

    #[tokio::test]
    async fn test_duplicate_instance_name_conflicts() {
        let fake = FakeCloudController::new().with_drain("my-drain", "syslog://h:1");
        let err = fake
            .create_service_instance("my-drain", "syslog://other:2")
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(
            fake.instance("my-drain").unwrap().syslog_drain_url.as_deref(),
            Some("syslog://h:1")
        );
    }

    #[tokio::test]
    async fn test_call_log_records_methods() {
        let fake = FakeCloudController::new();
        let _ = fake.app_guid("missing").await;
        let _ = fake.list_service_instances().await;
        assert_eq!(fake.calls(), vec!["app_guid missing", "list_service_instances"]);
        assert_eq!(fake.call_count("app_guid"), 1);
    }

    #[tokio::test]
    async fn test_scripted_call_failure_is_logged_and_returned() {
        let fake = FakeCloudController::new()
            .with_app("web-app")
            .fail_call("list_apps", "CC database unavailable");

        let err = fake.list_apps(&["app-1".to_string()]).await.unwrap_err();
        assert!(err.is_server_error());
        assert!(err.to_string().contains("CC database unavailable"));
        assert_eq!(fake.call_count("list_apps"), 1);
        assert!(fake.app_guid("web-app").await.is_ok());
    }
}
