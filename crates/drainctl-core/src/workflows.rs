//! Multi-step drain operations that wait for every asynchronous step
//!
//! Each workflow resolves names first, mutates second, and polls any job the
//! remote side hands back before moving on. The first failure aborts the
//! workflow and comes back wrapped in [`CoreError::Context`] naming the step,
//! drain and application. Nothing is rolled back: whatever already happened
//! stays in place and re-running the failed command picks up from there.
//!
//! # Example
//!
//! ```rust,ignore
//! use drainctl_core::WaitConfig;
//! use drainctl_core::workflows::{BindOutcome, bind_drain_and_wait};
//!
//! match bind_drain_and_wait(&client, "web-app", "my-drain", &WaitConfig::default(), None).await? {
//!     BindOutcome::AlreadyBound => println!("nothing to do"),
//!     BindOutcome::Bound => println!("bound"),
//! }
//! ```

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::{AsyncOperation, BindingFilter, BindingState, CloudControllerApi};
use crate::drain::{Drain, DrainType, encode_drain_url, validate_drain_url};
use crate::error::{CoreError, ResourceKind, Result, Step};
use crate::progress::{ProgressCallback, WaitConfig, poll_job};

/// Input for [`create_drain_and_wait`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDrainRequest {
    pub app_name: String,
    pub drain_name: String,
    pub url: String,
    /// Raw `--type` value; `None` means logs
    pub drain_type: Option<String>,
}

impl CreateDrainRequest {
    pub fn new(
        app_name: impl Into<String>,
        drain_name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            drain_name: drain_name.into(),
            url: url.into(),
            drain_type: None,
        }
    }

    pub fn drain_type(mut self, drain_type: impl Into<String>) -> Self {
        self.drain_type = Some(drain_type.into());
        self
    }
}

/// Result of [`bind_drain_and_wait`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindOutcome {
    /// A succeeded binding already existed; nothing was changed
    AlreadyBound,
    /// A new binding was created and reached `succeeded`
    Bound,
}

/// Result of [`delete_drain_and_wait`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    pub drain: String,
    /// Applications unbound before deletion, in the order they were processed
    pub unbound_apps: Vec<String>,
}

/// Create a drain and bind it to an application
///
/// # Steps
///
/// 1. Validate the type (default `logs`) and URL
/// 2. Resolve the application; nothing is created if it does not exist
/// 3. Create the service instance; a taken name is a `Conflict` and the
///    existing drain is left untouched
/// 4. Bind and wait for the binding to finish
///
/// If step 4 fails the drain is left in place. `bind-drain` with the same
/// names resumes from there.
pub async fn create_drain_and_wait(
    api: &dyn CloudControllerApi,
    request: &CreateDrainRequest,
    wait: &WaitConfig,
    on_progress: Option<&ProgressCallback>,
) -> Result<Drain> {
    let drain = request.drain_name.as_str();
    let app = request.app_name.as_str();

    // Step 1: Validate input before touching anything remote
    let drain_type = DrainType::parse_optional(request.drain_type.as_deref())?;
    validate_drain_url(&request.url)?;

    // Step 2: Resolve the application
    let app_guid = api
        .app_guid(app)
        .await
        .map_err(|e| e.in_step(Step::ResolveApp, drain, Some(app)))?;

    // Step 3: Create the service instance
    let stored_url = encode_drain_url(&request.url, drain_type);
    let instance = api
        .create_service_instance(drain, &stored_url)
        .await
        .map_err(|e| e.in_step(Step::CreateDrain, drain, None))?;
    info!("Created drain '{}' ({}) as {}", drain, drain_type, instance.guid);

    // Step 4: Bind and wait
    if let Err(e) = bind(api, &instance.guid, &app_guid, wait, on_progress).await {
        warn!(
            "Drain '{}' exists but binding to '{}' did not finish; not rolling back",
            drain, app
        );
        return Err(e.in_step(Step::Bind, drain, Some(app)));
    }
    info!("Bound drain '{}' to '{}'", drain, app);

    Ok(Drain {
        name: instance.name,
        guid: instance.guid,
        url: request.url.clone(),
        drain_type,
        apps: vec![app.to_string()],
    })
}

/// Bind an existing drain to an application
///
/// Idempotent: an existing succeeded binding is reported as
/// [`BindOutcome::AlreadyBound`]. A binding still in progress is a
/// `Conflict`. A failed binding, such as one left behind by
/// `create-drain`, is removed and replaced.
pub async fn bind_drain_and_wait(
    api: &dyn CloudControllerApi,
    app_name: &str,
    drain_name: &str,
    wait: &WaitConfig,
    on_progress: Option<&ProgressCallback>,
) -> Result<BindOutcome> {
    let app = Some(app_name);

    // Step 1: Resolve both names
    let app_guid = api
        .app_guid(app_name)
        .await
        .map_err(|e| e.in_step(Step::ResolveApp, drain_name, app))?;
    let instance_guid = resolve_drain(api, drain_name)
        .await
        .map_err(|e| e.in_step(Step::ResolveDrain, drain_name, app))?;

    // Step 2: Inspect existing bindings between the pair
    let existing = api
        .list_bindings(&BindingFilter::for_pair(&instance_guid, &app_guid))
        .await
        .map_err(|e| e.in_step(Step::ListBindings, drain_name, app))?;

    if existing.iter().any(|b| b.state == BindingState::Succeeded) {
        info!("Drain '{}' already bound to '{}'", drain_name, app_name);
        return Ok(BindOutcome::AlreadyBound);
    }
    if existing.iter().any(|b| b.state == BindingState::InProgress) {
        return Err(CoreError::Conflict(format!(
            "another operation on the binding between '{}' and '{}' is in progress; retry once it finishes",
            drain_name, app_name
        ))
        .in_step(Step::Bind, drain_name, app));
    }

    // Step 3: Clear out failed attempts
    for stale in existing.iter().filter(|b| b.state == BindingState::Failed) {
        debug!("Removing failed binding {}", stale.guid);
        let op = api
            .delete_binding(&stale.guid)
            .await
            .map_err(|e| e.in_step(Step::Unbind, drain_name, app))?;
        wait_for(api, op, wait, on_progress)
            .await
            .map_err(|e| e.in_step(Step::Unbind, drain_name, app))?;
    }

    // Step 4: Bind and wait
    bind(api, &instance_guid, &app_guid, wait, on_progress)
        .await
        .map_err(|e| e.in_step(Step::Bind, drain_name, app))?;
    info!("Bound drain '{}' to '{}'", drain_name, app_name);

    Ok(BindOutcome::Bound)
}

/// Unbind a drain from every application, then delete it
///
/// Bindings are removed in application-name order and each one must finish
/// before the next starts. The first failed unbind aborts: the drain and the
/// bindings not yet processed stay in place, and the error names the app.
pub async fn delete_drain_and_wait(
    api: &dyn CloudControllerApi,
    drain_name: &str,
    wait: &WaitConfig,
    on_progress: Option<&ProgressCallback>,
) -> Result<DeleteSummary> {
    // Step 1: Resolve the drain
    let instance_guid = resolve_drain(api, drain_name)
        .await
        .map_err(|e| e.in_step(Step::ResolveDrain, drain_name, None))?;

    // Step 2: Find its bindings and the apps behind them
    let bindings = api
        .list_bindings(&BindingFilter::for_instances([instance_guid.as_str()]))
        .await
        .map_err(|e| e.in_step(Step::ListBindings, drain_name, None))?;

    let app_guids: Vec<String> = bindings.iter().map(|b| b.app_guid.clone()).collect();
    let app_names: HashMap<String, String> = if app_guids.is_empty() {
        HashMap::new()
    } else {
        api.list_apps(&app_guids)
            .await
            .map_err(|e| e.in_step(Step::ListBindings, drain_name, None))?
            .into_iter()
            .map(|a| (a.guid, a.name))
            .collect()
    };

    let mut targets: Vec<(String, String)> = bindings
        .into_iter()
        .map(|b| {
            let app = app_names
                .get(&b.app_guid)
                .cloned()
                .unwrap_or_else(|| b.app_guid.clone());
            (app, b.guid)
        })
        .collect();
    targets.sort();

    // Step 3: Unbind one at a time
    let mut unbound_apps = Vec::with_capacity(targets.len());
    for (app, binding_guid) in targets {
        debug!("Unbinding '{}' from '{}'", drain_name, app);
        let op = api
            .delete_binding(&binding_guid)
            .await
            .map_err(|e| e.in_step(Step::Unbind, drain_name, Some(&app)))?;
        wait_for(api, op, wait, on_progress)
            .await
            .map_err(|e| e.in_step(Step::Unbind, drain_name, Some(&app)))?;
        info!("Unbound drain '{}' from '{}'", drain_name, app);
        unbound_apps.push(app);
    }

    // Step 4: Delete the instance once nothing references it
    let op = api
        .delete_service_instance(&instance_guid)
        .await
        .map_err(|e| e.in_step(Step::DeleteDrain, drain_name, None))?;
    wait_for(api, op, wait, on_progress)
        .await
        .map_err(|e| e.in_step(Step::DeleteDrain, drain_name, None))?;
    info!("Deleted drain '{}'", drain_name);

    Ok(DeleteSummary {
        drain: drain_name.to_string(),
        unbound_apps,
    })
}

/// Guid of the named drain; an instance without a drain URL is not a drain
async fn resolve_drain(api: &dyn CloudControllerApi, name: &str) -> Result<String> {
    let instance = api.service_instance(name).await?;
    if instance.syslog_drain_url.is_none() {
        debug!("Service instance '{}' has no syslog drain URL", name);
        return Err(CoreError::NotFound {
            kind: ResourceKind::Drain,
            name: name.to_string(),
        });
    }
    Ok(instance.guid)
}

async fn bind(
    api: &dyn CloudControllerApi,
    instance_guid: &str,
    app_guid: &str,
    wait: &WaitConfig,
    on_progress: Option<&ProgressCallback>,
) -> Result<()> {
    let op = api.create_binding(instance_guid, app_guid).await?;
    wait_for(api, op, wait, on_progress).await
}

async fn wait_for(
    api: &dyn CloudControllerApi,
    op: AsyncOperation,
    wait: &WaitConfig,
    on_progress: Option<&ProgressCallback>,
) -> Result<()> {
    match op {
        AsyncOperation::Completed => Ok(()),
        AsyncOperation::Job(job) => poll_job(api, &job, wait, on_progress).await.map(|_| ()),
    }
}
