use anyhow::Result;
use clap::Parser;
use drainctl_core::Config;
use tracing::{debug, info, trace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod connection;
mod error;
mod output;

use cli::{Cli, Commands};
use commands::drain::{
    CommandContext, handle_bind_drain, handle_create_drain, handle_delete_drain, handle_drains,
};
use connection::ConnectionManager;
use error::DrainCtlError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        e.print_diagnostic();
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: &Cli) -> Result<(), DrainCtlError> {
    // Load configuration from specified path or default location
    let (config, config_path) = if let Some(config_file) = &cli.config_file {
        let path = std::path::PathBuf::from(config_file);
        debug!("Loading config from explicit path: {:?}", path);
        let config = Config::load_from_path(&path)?;
        (config, Some(path))
    } else {
        debug!("Loading config from default location");
        (Config::load()?, None)
    };
    let conn_mgr = ConnectionManager::with_config_path(config, config_path);

    execute_command(cli, &conn_mgr).await
}

fn init_tracing(verbose: u8) {
    // Check for RUST_LOG env var first, then fall back to verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "drainctl=warn,drainctl_core=warn",
            1 => "drainctl=info,drainctl_core=info",
            2 => "drainctl=debug,drainctl_core=debug",
            _ => "drainctl=trace,drainctl_core=trace",
        };
        tracing_subscriber::EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .init();

    debug!("Tracing initialized with verbosity level: {}", verbose);
}

async fn execute_command(cli: &Cli, conn_mgr: &ConnectionManager) -> Result<(), DrainCtlError> {
    trace!("Output: {:?}, query: {:?}", cli.output, cli.query);
    info!("Command: {}", format_command(&cli.command));

    let ctx = CommandContext {
        conn_mgr,
        profile: cli.profile.as_deref(),
        output: cli.output,
        query: cli.query.as_deref(),
    };

    let start = std::time::Instant::now();
    let result = match &cli.command {
        Commands::Drains => handle_drains(&ctx).await,
        Commands::CreateDrain {
            app,
            drain,
            url,
            drain_type,
            wait,
        } => {
            handle_create_drain(&ctx, app, drain, url, drain_type.as_deref(), wait).await
        }
        Commands::BindDrain { app, drain, wait } => {
            handle_bind_drain(&ctx, app, drain, wait).await
        }
        Commands::DeleteDrain { drain, force, wait } => {
            handle_delete_drain(&ctx, drain, *force, wait).await
        }
    };

    let duration = start.elapsed();
    match &result {
        Ok(_) => info!(
            "Command completed successfully in {:.2}s",
            duration.as_secs_f64()
        ),
        Err(e) => debug!("Command failed after {:.2}s: {}", duration.as_secs_f64(), e),
    }

    result
}

/// Command summary for logs; drain URLs may carry credentials so they are left out
fn format_command(command: &Commands) -> String {
    match command {
        Commands::Drains => "drains".to_string(),
        Commands::CreateDrain {
            app,
            drain,
            drain_type,
            ..
        } => format!(
            "create-drain {} {} (type: {})",
            app,
            drain,
            drain_type.as_deref().unwrap_or("logs")
        ),
        Commands::BindDrain { app, drain, .. } => format!("bind-drain {} {}", app, drain),
        Commands::DeleteDrain { drain, force, .. } => {
            format!("delete-drain {}{}", drain, if *force { " --force" } else { "" })
        }
    }
}
