//! CLI structure and command definitions

use clap::{Parser, Subcommand};

use crate::commands::async_utils::AsyncOperationArgs;

/// Manage syslog drains for Cloud Foundry applications
#[derive(Parser, Debug)]
#[command(name = "drainctl")]
#[command(version, about = "Manage syslog drains for Cloud Foundry applications")]
#[command(long_about = "
Manage syslog drains for Cloud Foundry applications

A drain is a user-provided service instance carrying a syslog URL. Binding it
to an application forwards that application's logs, metrics or both.

EXAMPLES:
    # List drains and the apps bound to them
    drainctl drains

    # Forward logs and metrics of web-app to a syslog endpoint
    drainctl create-drain web-app my-drain syslog://logs.example.com:6000 --type all

    # Attach an existing drain to another app (safe to repeat)
    drainctl bind-drain worker my-drain

    # Unbind everywhere and delete, without prompting
    drainctl delete-drain my-drain --force

    # Machine-readable output filtered with JMESPath
    drainctl drains -o json -q '[?type==`all`].name'

Targets come from a profile in the config file or from the
DRAINCTL_API_URL, DRAINCTL_TOKEN and DRAINCTL_SPACE_GUID environment variables.
")]
pub struct Cli {
    /// Profile to use for this command
    #[arg(long, short, global = true, env = "DRAINCTL_PROFILE")]
    pub profile: Option<String>,

    /// Path to alternate configuration file
    #[arg(long, global = true, env = "DRAINCTL_CONFIG_FILE")]
    pub config_file: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "auto")]
    pub output: OutputFormat,

    /// JMESPath query to filter output
    #[arg(long, short = 'q', global = true)]
    pub query: Option<String>,

    /// Enable verbose logging
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Table for people, JSON when a query is given
    Auto,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Human-readable table format
    Table,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List drains and the applications bound to them
    #[command(name = "drains")]
    #[command(after_help = "EXAMPLES:
    drainctl drains
    drainctl drains -o yaml
    drainctl drains -q '[].name'
")]
    Drains,

    /// Create a drain and bind it to an application
    #[command(name = "create-drain")]
    #[command(after_help = "EXAMPLES:
    drainctl create-drain web-app my-drain syslog://logs.example.com:6000
    drainctl create-drain web-app my-drain syslog-tls://logs.example.com:6514 --type all
    drainctl create-drain web-app metrics https://logs.example.com/ingest?token=abc --type metrics

If binding fails the drain is kept; finish with `drainctl bind-drain <app> <drain>`.
")]
    CreateDrain {
        /// Application to bind the new drain to
        app: String,

        /// Name of the drain (must be unique in the space)
        drain: String,

        /// Syslog destination (syslog://, syslog-tls:// or https://)
        url: String,

        /// What to forward: logs, metrics or all
        #[arg(long = "type", value_name = "TYPE")]
        drain_type: Option<String>,

        #[command(flatten)]
        wait: AsyncOperationArgs,
    },

    /// Bind an existing drain to an application
    #[command(name = "bind-drain")]
    BindDrain {
        /// Application to bind
        app: String,

        /// Existing drain
        drain: String,

        #[command(flatten)]
        wait: AsyncOperationArgs,
    },

    /// Unbind a drain from all applications and delete it
    #[command(name = "delete-drain")]
    DeleteDrain {
        /// Drain to delete
        drain: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        force: bool,

        #[command(flatten)]
        wait: AsyncOperationArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_create_drain_args() {
        let cli = Cli::parse_from([
            "drainctl",
            "create-drain",
            "web-app",
            "my-drain",
            "syslog://h:1",
            "--type",
            "all",
            "--wait-timeout",
            "60",
        ]);
        match cli.command {
            Commands::CreateDrain {
                app,
                drain,
                url,
                drain_type,
                wait,
            } => {
                assert_eq!(app, "web-app");
                assert_eq!(drain, "my-drain");
                assert_eq!(url, "syslog://h:1");
                assert_eq!(drain_type.as_deref(), Some("all"));
                assert_eq!(wait.wait_timeout, 60);
                assert_eq!(wait.wait_interval, 2);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["drainctl", "drains", "-o", "json", "-vv"]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.verbose, 2);
    }
}
