//! Configuration management for drainctl
//!
//! Handles configuration loading from files and profile resolution.
//! Configuration is stored in TOML format with support for multiple named profiles.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use super::error::{ConfigError, Result};

/// Per-request timeout used when a profile does not set one
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Profile used when none is given on the command line
    #[serde(default)]
    pub default_profile: Option<String>,
    /// Map of profile name -> profile configuration
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// Individual profile configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Profile {
    /// Base URL of the Cloud Controller API
    pub api_url: String,
    /// Bearer token, with or without the `bearer ` prefix
    pub token: String,
    /// Space that drains are created in and listed from
    pub space_guid: String,
    /// Accept self-signed certificates
    #[serde(default)]
    pub skip_ssl_validation: bool,
    /// Timeout for each HTTP request, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

/// A fully validated target, ready to build a client from
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub api_url: String,
    pub token: String,
    pub space_guid: String,
    pub skip_ssl_validation: bool,
    pub request_timeout: Duration,
}

impl Profile {
    /// Validate this profile and turn it into a [`ResolvedTarget`]
    ///
    /// `name` is only used for error messages.
    pub fn to_target(&self, name: &str) -> Result<ResolvedTarget> {
        let api_url = self.api_url.trim().trim_end_matches('/').to_string();
        if api_url.is_empty() || is_unexpanded(&api_url) {
            return Err(ConfigError::MissingField {
                name: name.to_string(),
                field: "api_url".to_string(),
            });
        }
        let parsed = Url::parse(&api_url).map_err(|e| ConfigError::InvalidApiUrl {
            url: api_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidApiUrl {
                url: api_url,
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let token = strip_bearer(self.token.trim());
        if token.is_empty() || is_unexpanded(token) {
            return Err(ConfigError::MissingField {
                name: name.to_string(),
                field: "token".to_string(),
            });
        }

        let space_guid = self.space_guid.trim();
        if space_guid.is_empty() || is_unexpanded(space_guid) {
            return Err(ConfigError::MissingField {
                name: name.to_string(),
                field: "space_guid".to_string(),
            });
        }

        Ok(ResolvedTarget {
            api_url,
            token: token.to_string(),
            space_guid: space_guid.to_string(),
            skip_ssl_validation: self.skip_ssl_validation,
            request_timeout: self
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }
}

/// `${VAR}` left in place by expansion means the variable was not set
fn is_unexpanded(value: &str) -> bool {
    value.starts_with("${")
}

fn strip_bearer(token: &str) -> &str {
    match token.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => token[7..].trim_start(),
        _ => token,
    }
}

impl Config {
    /// Resolve the profile name to use
    ///
    /// Resolution order: explicit name, `default_profile`, then the first
    /// profile alphabetically.
    pub fn resolve_profile_name(&self, explicit_profile: Option<&str>) -> Result<String> {
        if let Some(profile_name) = explicit_profile {
            return Ok(profile_name.to_string());
        }

        if let Some(ref default) = self.default_profile {
            return Ok(default.clone());
        }

        if let Some((name, _)) = self.list_profiles().first() {
            return Ok((*name).clone());
        }

        Err(ConfigError::NoProfiles {
            suggestion: format!(
                "Add a profile to {} or set DRAINCTL_API_URL, DRAINCTL_TOKEN and DRAINCTL_SPACE_GUID.",
                Self::config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "the config file".to_string())
            ),
        })
    }

    /// Look up a profile by name
    pub fn profile(&self, name: &str) -> Result<&Profile> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.to_string(),
            })
    }

    /// Resolve and validate the target for the given (or default) profile
    pub fn resolve_target(&self, explicit_profile: Option<&str>) -> Result<ResolvedTarget> {
        let name = self.resolve_profile_name(explicit_profile)?;
        self.profile(&name)?.to_target(&name)
    }

    /// List all profiles sorted by name
    pub fn list_profiles(&self) -> Vec<(&String, &Profile)> {
        let mut profiles: Vec<_> = self.profiles.iter().collect();
        profiles.sort_by_key(|(name, _)| *name);
        profiles
    }

    /// Load configuration from the standard location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::LoadError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        // Expand environment variables in the config content
        let expanded_content = Self::expand_env_vars(&content);

        let config: Config = toml::from_str(&expanded_content)?;

        Ok(config)
    }

    /// Get the path to the configuration file
    ///
    /// On Linux: ~/.config/drainctl/config.toml
    /// On macOS: ~/Library/Application Support/io.drainctl.drainctl/config.toml
    /// On Windows: %APPDATA%\drainctl\drainctl\config\config.toml
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs =
            ProjectDirs::from("io", "drainctl", "drainctl").ok_or(ConfigError::ConfigDirError)?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Expand environment variables in configuration content
    ///
    /// Supports ${VAR} and ${VAR:-default} syntax.
    ///
    /// Example:
    /// ```toml
    /// token = "${CF_ACCESS_TOKEN}"
    /// api_url = "${CF_API:-https://api.sys.example.com}"
    /// ```
    fn expand_env_vars(content: &str) -> String {
        // Unset variables stay as-is so unused profiles do not break loading
        let expanded =
            shellexpand::env_with_context_no_errors(content, |var| std::env::var(var).ok());
        expanded.to_string()
    }
}
