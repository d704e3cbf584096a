//! The drain commands: `drains`, `create-drain`, `bind-drain`, `delete-drain`

use std::io::IsTerminal;

use dialoguer::Confirm;
use drainctl_core::workflows::{
    BindOutcome, CreateDrainRequest, bind_drain_and_wait, create_drain_and_wait,
    delete_drain_and_wait,
};
use drainctl_core::drain::validate_drain_url;
use drainctl_core::{DrainRepository, DrainType};
use serde_json::json;
use tracing::{debug, warn};

use crate::cli::OutputFormat;
use crate::commands::async_utils::{AsyncOperationArgs, JobSpinner};
use crate::connection::ConnectionManager;
use crate::error::{DrainCtlError, Result as CliResult};
use crate::output::{drains_table, print_output};

/// Shared inputs every drain command needs
pub struct CommandContext<'a> {
    pub conn_mgr: &'a ConnectionManager,
    pub profile: Option<&'a str>,
    pub output: OutputFormat,
    pub query: Option<&'a str>,
}

impl CommandContext<'_> {
    /// Table unless a machine format or a query was asked for
    fn wants_text(&self) -> bool {
        match self.output {
            OutputFormat::Auto | OutputFormat::Table => self.query.is_none(),
            OutputFormat::Json | OutputFormat::Yaml => false,
        }
    }

    fn print<T: serde::Serialize>(&self, data: T) -> CliResult<()> {
        print_output(data, self.output.into(), self.query)?;
        Ok(())
    }
}

/// List drains
pub async fn handle_drains(ctx: &CommandContext<'_>) -> CliResult<()> {
    let client = ctx.conn_mgr.create_client(ctx.profile)?;
    let drains = DrainRepository::new(&client).list_drains().await?;
    debug!("Found {} drains", drains.len());

    if !ctx.wants_text() {
        return ctx.print(&drains);
    }

    if drains.is_empty() {
        println!("No drains found");
    } else {
        println!("{}", drains_table(&drains));
    }
    Ok(())
}

/// Create a drain and bind it
pub async fn handle_create_drain(
    ctx: &CommandContext<'_>,
    app: &str,
    drain: &str,
    url: &str,
    drain_type: Option<&str>,
    wait: &AsyncOperationArgs,
) -> CliResult<()> {
    // Reject bad input before resolving any profile
    DrainType::parse_optional(drain_type)?;
    validate_drain_url(url)?;

    let client = ctx.conn_mgr.create_client(ctx.profile)?;
    let mut request = CreateDrainRequest::new(app, drain, url);
    if let Some(drain_type) = drain_type {
        request = request.drain_type(drain_type);
    }

    let spinner = JobSpinner::new(format!("Creating drain '{}'", drain));
    let callback = spinner.callback(&format!("Binding '{}' to '{}'", drain, app));
    let created =
        create_drain_and_wait(&client, &request, &wait.wait_config(), Some(&callback)).await;
    spinner.finish();
    let created = created?;

    if ctx.wants_text() {
        println!(
            "Created drain '{}' ({}) and bound it to '{}'",
            created.name, created.drain_type, app
        );
        return Ok(());
    }
    ctx.print(&created)
}

/// Bind an existing drain to an app
pub async fn handle_bind_drain(
    ctx: &CommandContext<'_>,
    app: &str,
    drain: &str,
    wait: &AsyncOperationArgs,
) -> CliResult<()> {
    let client = ctx.conn_mgr.create_client(ctx.profile)?;

    let spinner = JobSpinner::new(format!("Binding '{}' to '{}'", drain, app));
    let callback = spinner.callback(&format!("Binding '{}' to '{}'", drain, app));
    let outcome =
        bind_drain_and_wait(&client, app, drain, &wait.wait_config(), Some(&callback)).await;
    spinner.finish();
    let outcome = outcome?;

    // A failed read-back after a finished bind is only a warning
    let current = match DrainRepository::new(&client).find_drain(drain).await {
        Ok(current) => Some(current),
        Err(e) => {
            warn!(
                "Bind succeeded but reading back drain '{}' failed: {}",
                drain, e
            );
            None
        }
    };

    if ctx.wants_text() {
        match outcome {
            BindOutcome::AlreadyBound => {
                println!("Drain '{}' is already bound to '{}'", drain, app)
            }
            BindOutcome::Bound => println!("Bound drain '{}' to '{}'", drain, app),
        }
        if let Some(current) = current {
            println!("Bound apps: {}", current.apps.join(", "));
        }
        return Ok(());
    }
    ctx.print(json!({
        "outcome": outcome,
        "drain": current,
    }))
}

/// Unbind a drain everywhere and delete it
pub async fn handle_delete_drain(
    ctx: &CommandContext<'_>,
    drain: &str,
    force: bool,
    wait: &AsyncOperationArgs,
) -> CliResult<()> {
    if !force && !confirm_delete(drain)? {
        println!("Drain deletion cancelled");
        return Ok(());
    }

    let client = ctx.conn_mgr.create_client(ctx.profile)?;

    let spinner = JobSpinner::new(format!("Deleting drain '{}'", drain));
    let callback = spinner.callback(&format!("Deleting '{}'", drain));
    let summary =
        delete_drain_and_wait(&client, drain, &wait.wait_config(), Some(&callback)).await;
    spinner.finish();
    let summary = summary?;

    if ctx.wants_text() {
        if !summary.unbound_apps.is_empty() {
            println!("Unbound from: {}", summary.unbound_apps.join(", "));
        }
        println!("Deleted drain '{}'", summary.drain);
        return Ok(());
    }
    ctx.print(&summary)
}

fn confirm_delete(drain: &str) -> CliResult<bool> {
    if !std::io::stdin().is_terminal() {
        return Err(DrainCtlError::InvalidInput {
            message: format!(
                "refusing to delete drain '{}' without confirmation; pass --force in non-interactive use",
                drain
            ),
        });
    }

    Confirm::new()
        .with_prompt(format!(
            "Delete drain '{}' and unbind it from all applications?",
            drain
        ))
        .default(false)
        .interact()
        .map_err(|e| DrainCtlError::InvalidInput {
            message: format!("Failed to read confirmation: {}", e),
        })
}
