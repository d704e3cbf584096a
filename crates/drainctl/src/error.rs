//! Error types for drainctl
//!
//! Wraps the core and config errors and turns them into cargo-style
//! diagnostics with tips on how to recover.

use colored::Colorize;
use drainctl_core::error::ResourceKind;
use drainctl_core::{ConfigError, CoreError, Step};
use thiserror::Error;

/// Cargo-style diagnostic formatter for CLI errors.
///
/// Produces structured output like:
/// ```text
/// error: binding drain failed for drain 'my-drain' and app 'web-app': Job 9a1c failed: broker unreachable
///
///   tip: the drain exists; retry the binding with:
///       drainctl bind-drain web-app my-drain
/// ```
pub struct CliDiagnostic {
    message: String,
    detail: Option<String>,
    tips: Vec<(String, Vec<String>)>,
}

impl CliDiagnostic {
    /// Start a new error diagnostic with the given message.
    pub fn error(message: &str) -> Self {
        Self {
            message: message.to_string(),
            detail: None,
            tips: Vec::new(),
        }
    }

    /// Add a detail line below the error message.
    pub fn detail(mut self, text: &str) -> Self {
        self.detail = Some(text.to_string());
        self
    }

    /// Add a tip with optional example commands.
    pub fn tip(mut self, description: &str, commands: &[String]) -> Self {
        self.tips.push((description.to_string(), commands.to_vec()));
        self
    }

    /// Print the diagnostic to stderr with colored formatting.
    pub fn print(&self) {
        eprint!("{}{}", "error".red().bold(), ": ".bold());
        eprintln!("{}", self.message);

        if let Some(detail) = &self.detail {
            eprintln!("  {}", detail);
        }

        for (description, commands) in &self.tips {
            eprintln!();
            eprint!("  {}{}", "tip".yellow().bold(), ": ".bold());
            eprintln!("{}", description);
            for cmd in commands {
                eprintln!("      {}", cmd);
            }
        }
    }
}

/// A recovery hint: what to do and, optionally, the command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub commands: Vec<String>,
}

impl Suggestion {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            commands: Vec::new(),
        }
    }

    fn run(text: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            commands: vec![command.into()],
        }
    }
}

/// Main error type for the drainctl application
#[derive(Error, Debug)]
pub enum DrainCtlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(CoreError),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Output formatting error: {message}")]
    OutputError { message: String },
}

/// Result type for drainctl operations
pub type Result<T> = std::result::Result<T, DrainCtlError>;

impl From<CoreError> for DrainCtlError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config(config_err) => DrainCtlError::Config(config_err),
            other => DrainCtlError::Core(other),
        }
    }
}

impl From<anyhow::Error> for DrainCtlError {
    fn from(err: anyhow::Error) -> Self {
        DrainCtlError::OutputError {
            message: format!("{:#}", err),
        }
    }
}

impl From<serde_json::Error> for DrainCtlError {
    fn from(err: serde_json::Error) -> Self {
        DrainCtlError::OutputError {
            message: format!("JSON error: {}", err),
        }
    }
}

impl From<std::io::Error> for DrainCtlError {
    fn from(err: std::io::Error) -> Self {
        DrainCtlError::OutputError {
            message: format!("IO error: {}", err),
        }
    }
}

impl DrainCtlError {
    /// Get helpful suggestions for resolving this error
    pub fn suggestions(&self) -> Vec<Suggestion> {
        match self {
            DrainCtlError::Config(err) => config_suggestions(err),
            DrainCtlError::Core(err) => core_suggestions(err),
            DrainCtlError::InvalidInput { .. } => vec![Suggestion::run(
                "Check the command syntax:",
                "drainctl <command> --help",
            )],
            DrainCtlError::OutputError { .. } => vec![],
        }
    }

    /// Extra line shown under the message, if any
    fn detail(&self) -> Option<&'static str> {
        match self {
            DrainCtlError::Core(err) if err.is_indeterminate() => {
                Some("The outcome is unknown: the platform may still finish the job.")
            }
            _ => None,
        }
    }

    /// Print a cargo-style diagnostic to stderr using colored formatting.
    pub fn print_diagnostic(&self) {
        let mut diag = CliDiagnostic::error(&self.to_string());
        if let Some(detail) = self.detail() {
            diag = diag.detail(detail);
        }

        for suggestion in self.suggestions() {
            diag = diag.tip(&suggestion.text, &suggestion.commands);
        }

        diag.print();
    }
}

fn config_suggestions(err: &ConfigError) -> Vec<Suggestion> {
    match err {
        ConfigError::NoProfiles { .. } => vec![
            Suggestion::new("Add a [profiles.<name>] table with api_url, token and space_guid to the config file"),
            Suggestion::new("Or export DRAINCTL_API_URL, DRAINCTL_TOKEN and DRAINCTL_SPACE_GUID"),
        ],
        ConfigError::ProfileNotFound { name } => vec![
            Suggestion::new(format!("Check the spelling of profile '{}'", name)),
            Suggestion::new("Set default_profile in the config file or pass --profile"),
        ],
        ConfigError::MissingField { name, field } => vec![
            Suggestion::new(format!("Set '{}' in profile '{}'", field, name)),
            Suggestion::new("Variables such as ${CF_ACCESS_TOKEN} must be exported before running drainctl"),
        ],
        ConfigError::InvalidApiUrl { .. } => vec![Suggestion::new(
            "api_url must be the http(s) URL of the Cloud Controller, e.g. https://api.sys.example.com",
        )],
        ConfigError::ParseError(_) | ConfigError::LoadError { .. } => {
            vec![Suggestion::new("Check the config file syntax (TOML)")]
        }
        ConfigError::ConfigDirError => vec![Suggestion::new(
            "Pass the config file explicitly with --config-file",
        )],
    }
}

fn core_suggestions(err: &CoreError) -> Vec<Suggestion> {
    let drain = err.drain().unwrap_or("<drain>");
    let app = err.app().unwrap_or("<app>");
    let root = err.root();

    if err.is_indeterminate() {
        return vec![
            Suggestion::run("Check the current state with:", "drainctl drains"),
            Suggestion::new("Increase --wait-timeout for slow service brokers"),
        ];
    }

    match (err.step(), root) {
        (_, CoreError::Unauthorized(_)) => vec![Suggestion::new(
            "Refresh your token (e.g. `cf oauth-token`) and update the profile or DRAINCTL_TOKEN",
        )],
        (_, CoreError::Forbidden(_)) => vec![Suggestion::new(
            "Check that your user has the SpaceDeveloper role in the target space",
        )],
        (_, CoreError::NotFound {
            kind: ResourceKind::App,
            ..
        }) => vec![Suggestion::run(
            "Check the application name with:",
            "cf apps",
        )],
        (_, CoreError::NotFound {
            kind: ResourceKind::Drain,
            ..
        }) => vec![Suggestion::run("List existing drains with:", "drainctl drains")],
        (Some(Step::CreateDrain), CoreError::Conflict(_)) => vec![Suggestion::run(
            "Pick another drain name, or remove the existing drain first:",
            format!("drainctl delete-drain {}", drain),
        )],
        (Some(Step::Bind), CoreError::Conflict(_)) => vec![Suggestion::run(
            "Wait for the running operation to finish, then retry:",
            format!("drainctl bind-drain {} {}", app, drain),
        )],
        (Some(Step::Bind), _) => vec![Suggestion::run(
            format!("The drain '{}' exists; retry the binding with:", drain),
            format!("drainctl bind-drain {} {}", app, drain),
        )],
        (Some(Step::Unbind) | Some(Step::DeleteDrain), _) => vec![Suggestion::run(
            "The drain and its remaining bindings are intact; retry with:",
            format!("drainctl delete-drain {}", drain),
        )],
        (_, CoreError::InvalidArgument(_)) => vec![Suggestion::run(
            "Check the command syntax:",
            "drainctl <command> --help",
        )],
        (_, CoreError::Transport(e)) if e.to_string().contains("certificate") => vec![
            Suggestion::new("For lab foundations with self-signed certificates set skip_ssl_validation = true"),
            Suggestion::new("Check that api_url is correct and reachable"),
        ],
        (_, CoreError::Transport(_)) => vec![
            Suggestion::new("Check network connectivity"),
            Suggestion::new("Check that api_url is correct and reachable"),
        ],
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn commands(err: &DrainCtlError) -> Vec<String> {
        err.suggestions()
            .into_iter()
            .flat_map(|s| s.commands)
            .collect()
    }

    #[test]
    fn test_failed_bind_suggests_bind_drain() {
        let err = DrainCtlError::from(
            CoreError::JobFailed {
                job: "job-1".to_string(),
                detail: "broker unreachable".to_string(),
            }
            .in_step(Step::Bind, "my-drain", Some("web-app")),
        );
        assert_eq!(commands(&err), vec!["drainctl bind-drain web-app my-drain"]);
    }

    #[test]
    fn test_failed_unbind_suggests_retrying_delete() {
        let err = DrainCtlError::from(
            CoreError::Remote {
                status: 502,
                message: "bad gateway".to_string(),
            }
            .in_step(Step::Unbind, "my-drain", Some("worker")),
        );
        assert_eq!(commands(&err), vec!["drainctl delete-drain my-drain"]);
    }

    #[test]
    fn test_timeout_is_described_as_indeterminate() {
        let err = DrainCtlError::from(
            CoreError::Timeout {
                job: "job-1".to_string(),
                after: Duration::from_secs(300),
            }
            .in_step(Step::Bind, "my-drain", Some("web-app")),
        );
        assert!(err.detail().unwrap().contains("unknown"));
        assert_eq!(commands(&err), vec!["drainctl drains"]);
    }

    #[test]
    fn test_config_error_inside_core_error_is_unwrapped() {
        let err = DrainCtlError::from(CoreError::Config(ConfigError::ProfileNotFound {
            name: "prod".to_string(),
        }));
        assert!(matches!(err, DrainCtlError::Config(_)));
        assert_eq!(err.to_string(), "Profile 'prod' not found");
    }

    #[test]
    fn test_message_is_passed_through() {
        let err = DrainCtlError::from(
            CoreError::Conflict("The service instance name is taken: my-drain".to_string())
                .in_step(Step::CreateDrain, "my-drain", None),
        );
        assert!(
            err.to_string()
                .contains("The service instance name is taken: my-drain")
        );
        assert_eq!(commands(&err), vec!["drainctl delete-drain my-drain"]);
    }
}
