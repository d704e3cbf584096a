//! Unified error handling for drainctl-core
//!
//! Every layer returns [`CoreError`]. Remote failures are classified by the
//! client into the variants below; workflows wrap them in
//! [`CoreError::Context`] so the user learns which step, drain and
//! application a failure belongs to.
//!
//! # Example
//!
//! ```rust
//! use drainctl_core::{CoreError, Step};
//! use drainctl_core::error::ResourceKind;
//!
//! let err = CoreError::NotFound {
//!     kind: ResourceKind::App,
//!     name: "web-app".to_string(),
//! }
//! .in_step(Step::ResolveApp, "my-drain", Some("web-app"));
//!
//! // Predicates look through the step context
//! assert!(err.is_not_found());
//! assert_eq!(err.step(), Some(Step::ResolveApp));
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Kind of remote resource a lookup was about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    App,
    Drain,
    Binding,
    Job,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::App => write!(f, "App"),
            ResourceKind::Drain => write!(f, "Drain"),
            ResourceKind::Binding => write!(f, "Binding"),
            ResourceKind::Job => write!(f, "Job"),
        }
    }
}

/// Workflow step a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ResolveApp,
    ResolveDrain,
    CreateDrain,
    ListBindings,
    Bind,
    Unbind,
    DeleteDrain,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Step::ResolveApp => "resolving app",
            Step::ResolveDrain => "resolving drain",
            Step::CreateDrain => "creating drain",
            Step::ListBindings => "listing bindings",
            Step::Bind => "binding drain",
            Step::Unbind => "unbinding drain",
            Step::DeleteDrain => "deleting drain",
        };
        f.write_str(text)
    }
}

/// Core error type for API calls and workflows
#[derive(Error, Debug)]
pub enum CoreError {
    /// A flag or argument value was rejected before any remote call
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A name or identifier did not resolve
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    /// A uniqueness constraint was violated remotely
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The token was missing, expired or rejected (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The caller lacks rights for the operation (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Polling gave up before the job reached a terminal state.
    ///
    /// The remote operation may still finish on its own, so the outcome is
    /// indeterminate rather than failed.
    #[error("Job {job} did not finish within {after:?}; the operation may still complete")]
    Timeout { job: String, after: Duration },

    /// The job reached its `failed` state
    #[error("Job {job} failed: {detail}")]
    JobFailed { job: String, detail: String },

    /// Any other non-success response, message passed through verbatim
    #[error("API error (HTTP {status}): {message}")]
    Remote { status: u16, message: String },

    /// The request never produced a response
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response did not have the expected shape
    #[error("Unexpected API response: {0}")]
    Decode(String),

    /// Configuration could not be loaded or resolved
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A failure annotated with the workflow step it aborted
    #[error("{step} failed for drain '{drain}'{}: {source}", describe_app(.app))]
    Context {
        step: Step,
        drain: String,
        app: Option<String>,
        #[source]
        source: Box<CoreError>,
    },
}

fn describe_app(app: &Option<String>) -> String {
    match app {
        Some(app) => format!(" and app '{}'", app),
        None => String::new(),
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Attach workflow context to this error
    #[must_use]
    pub fn in_step(self, step: Step, drain: &str, app: Option<&str>) -> Self {
        CoreError::Context {
            step,
            drain: drain.to_string(),
            app: app.map(str::to_string),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through any step context
    #[must_use]
    pub fn root(&self) -> &CoreError {
        let mut current = self;
        while let CoreError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// The step this error aborted, if it carries workflow context
    #[must_use]
    pub fn step(&self) -> Option<Step> {
        match self {
            CoreError::Context { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The application named in the workflow context, if any
    #[must_use]
    pub fn app(&self) -> Option<&str> {
        match self {
            CoreError::Context { app, .. } => app.as_deref(),
            _ => None,
        }
    }

    /// The drain named in the workflow context, if any
    #[must_use]
    pub fn drain(&self) -> Option<&str> {
        match self {
            CoreError::Context { drain, .. } => Some(drain),
            _ => None,
        }
    }

    /// Returns true if a flag or argument was rejected
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self.root(), CoreError::InvalidArgument(_))
    }

    /// Returns true if this is a "not found" error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), CoreError::NotFound { .. })
    }

    /// Returns true if this is a conflict error
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self.root(), CoreError::Conflict(_))
    }

    /// Returns true if this is an authentication error (401)
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.root(), CoreError::Unauthorized(_))
    }

    /// Returns true if this is an authorization error (403)
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self.root(), CoreError::Forbidden(_))
    }

    /// Returns true if a job failed remotely
    #[must_use]
    pub fn is_job_failed(&self) -> bool {
        matches!(self.root(), CoreError::JobFailed { .. })
    }

    /// Returns true if this is a timeout, either polling or transport
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self.root() {
            CoreError::Timeout { .. } => true,
            CoreError::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns true if the remote outcome is unknown (polling timed out)
    #[must_use]
    pub fn is_indeterminate(&self) -> bool {
        matches!(self.root(), CoreError::Timeout { .. })
    }

    /// Returns true if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self.root(), CoreError::Remote { status, .. } if *status >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found_app() -> CoreError {
        CoreError::NotFound {
            kind: ResourceKind::App,
            name: "web-app".to_string(),
        }
    }

    #[test]
    fn test_not_found_display() {
        assert_eq!(not_found_app().to_string(), "App 'web-app' not found");
    }

    #[test]
    fn test_context_display_includes_step_drain_and_app() {
        let err = CoreError::JobFailed {
            job: "job-1".to_string(),
            detail: "Service broker error".to_string(),
        }
        .in_step(Step::Bind, "my-drain", Some("web-app"));

        let msg = err.to_string();
        assert!(msg.starts_with("binding drain failed for drain 'my-drain' and app 'web-app'"));
        assert!(msg.contains("Service broker error"));
    }

    #[test]
    fn test_context_display_without_app() {
        let err = CoreError::Conflict("The service instance name is taken: my-drain".to_string())
            .in_step(Step::CreateDrain, "my-drain", None);
        assert_eq!(
            err.to_string(),
            "creating drain failed for drain 'my-drain': Conflict: The service instance name is taken: my-drain"
        );
    }

    #[test]
    fn test_predicates_look_through_context() {
        let err = not_found_app().in_step(Step::ResolveApp, "my-drain", Some("web-app"));
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
        assert_eq!(err.step(), Some(Step::ResolveApp));
        assert_eq!(err.app(), Some("web-app"));
        assert_eq!(err.drain(), Some("my-drain"));
    }

    #[test]
    fn test_timeout_is_indeterminate() {
        let err = CoreError::Timeout {
            job: "job-1".to_string(),
            after: Duration::from_secs(60),
        };
        assert!(err.is_timeout());
        assert!(err.is_indeterminate());
        assert!(!err.is_job_failed());
        assert!(err.to_string().contains("may still complete"));
    }

    #[test]
    fn test_remote_classification() {
        let err = CoreError::Remote {
            status: 502,
            message: "Bad gateway".to_string(),
        };
        assert!(err.is_server_error());
        assert!(!err.is_not_found());

        let err = CoreError::Remote {
            status: 400,
            message: "Bad request".to_string(),
        };
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_auth_errors_are_distinct() {
        let unauthorized = CoreError::Unauthorized("Invalid Auth Token".to_string());
        let forbidden = CoreError::Forbidden("You are not authorized".to_string());
        assert!(unauthorized.is_unauthorized());
        assert!(!unauthorized.is_forbidden());
        assert!(forbidden.is_forbidden());
        assert!(!forbidden.is_unauthorized());
    }
}
