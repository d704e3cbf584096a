//! Connection management: turns profiles or environment variables into a client

use std::path::PathBuf;

use drainctl_core::config::ResolvedTarget;
use drainctl_core::{CloudControllerClient, Config, Profile};
use tracing::{debug, info, trace, warn};

use crate::error::Result as CliResult;

/// Environment variables that together describe a target
pub const ENV_API_URL: &str = "DRAINCTL_API_URL";
pub const ENV_TOKEN: &str = "DRAINCTL_TOKEN";
pub const ENV_SPACE_GUID: &str = "DRAINCTL_SPACE_GUID";

/// Connection manager for creating authenticated clients
#[derive(Clone)]
pub struct ConnectionManager {
    pub config: Config,
    pub config_path: Option<PathBuf>,
}

impl ConnectionManager {
    /// Create a new connection manager with a custom config path
    pub fn with_config_path(config: Config, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    /// Resolve where to connect, with environment variable override support
    ///
    /// When --config-file is explicitly specified, environment variables are
    /// ignored so an isolated config really is isolated.
    pub fn resolve_target(&self, profile_name: Option<&str>) -> CliResult<ResolvedTarget> {
        let use_env_vars = self.config_path.is_none();
        debug!(
            "Config path: {:?}, use_env_vars: {}",
            self.config_path, use_env_vars
        );

        if use_env_vars {
            if let Some(profile) = profile_from_env(|key| std::env::var(key).ok()) {
                info!("Using target from environment variables");
                return Ok(profile.to_target("environment")?);
            }
        } else {
            info!("--config-file specified explicitly, ignoring environment variables");
        }

        let name = self.config.resolve_profile_name(profile_name)?;
        info!("Using profile: {}", name);
        Ok(self.config.profile(&name)?.to_target(&name)?)
    }

    /// Create a Cloud Controller client for the resolved target
    pub fn create_client(&self, profile_name: Option<&str>) -> CliResult<CloudControllerClient> {
        let target = self.resolve_target(profile_name)?;
        trace!("Target API: {}, space: {}", target.api_url, target.space_guid);
        Ok(CloudControllerClient::from_target(&target)?)
    }
}

/// Build a profile from `DRAINCTL_*` variables if all three are set
fn profile_from_env(lookup: impl Fn(&str) -> Option<String>) -> Option<Profile> {
    let api_url = lookup(ENV_API_URL);
    let token = lookup(ENV_TOKEN);
    let space_guid = lookup(ENV_SPACE_GUID);

    match (api_url, token, space_guid) {
        (Some(api_url), Some(token), Some(space_guid)) => Some(Profile {
            api_url,
            token,
            space_guid,
            skip_ssl_validation: false,
            request_timeout_secs: None,
        }),
        (None, None, None) => None,
        _ => {
            warn!(
                "Ignoring partial environment target: {}, {} and {} must all be set",
                ENV_API_URL, ENV_TOKEN, ENV_SPACE_GUID
            );
            None
        }
    }
}
