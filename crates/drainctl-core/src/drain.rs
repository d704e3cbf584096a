//! The drain model and its encoding on a user-provided service instance
//!
//! The drain type travels as a `drain-type` query parameter on the stored
//! syslog URL. `logs` is the platform default and is stored untagged, so a
//! plain drain URL reads back exactly as it was given.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::client::ServiceInstance;
use crate::error::{CoreError, Result};

/// Query parameter that carries the drain type
pub const DRAIN_TYPE_PARAM: &str = "drain-type";

/// URL schemes the platform can deliver to
pub const SUPPORTED_SCHEMES: &[&str] = &["syslog", "syslog-tls", "https"];

/// What a drain forwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainType {
    #[default]
    Logs,
    Metrics,
    All,
}

impl DrainType {
    /// Parse an optional `--type` value, defaulting to [`DrainType::Logs`]
    pub fn parse_optional(value: Option<&str>) -> Result<Self> {
        match value {
            None => Ok(DrainType::default()),
            Some(v) => v.parse(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DrainType::Logs => "logs",
            DrainType::Metrics => "metrics",
            DrainType::All => "all",
        }
    }
}

impl FromStr for DrainType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "logs" => Ok(DrainType::Logs),
            "metrics" => Ok(DrainType::Metrics),
            "all" => Ok(DrainType::All),
            _ => Err(CoreError::InvalidArgument(format!(
                "invalid drain type '{}' (valid: logs, metrics, all)",
                s
            ))),
        }
    }
}

impl fmt::Display for DrainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A syslog drain and the applications bound to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drain {
    pub name: String,
    pub guid: String,
    /// Destination URL without the type tag
    pub url: String,
    #[serde(rename = "type")]
    pub drain_type: DrainType,
    /// Names of applications with a succeeded binding, sorted
    pub apps: Vec<String>,
}

impl Drain {
    /// Build a drain from a service instance, or `None` if it has no drain URL
    pub fn from_instance(instance: &ServiceInstance, apps: Vec<String>) -> Option<Self> {
        let raw = instance.syslog_drain_url.as_deref()?;
        let (url, drain_type) = decode_drain_url(raw);
        Some(Drain {
            name: instance.name.clone(),
            guid: instance.guid.clone(),
            url,
            drain_type,
            apps,
        })
    }
}

/// Check that a user-supplied drain URL is something the platform can use
pub fn validate_drain_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url)
        .map_err(|e| CoreError::InvalidArgument(format!("invalid drain URL '{}': {}", url, e)))?;

    if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
        return Err(CoreError::InvalidArgument(format!(
            "unsupported drain URL scheme '{}' (valid: {})",
            parsed.scheme(),
            SUPPORTED_SCHEMES.join(", ")
        )));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(CoreError::InvalidArgument(format!(
            "drain URL '{}' has no host",
            url
        )));
    }

    if parsed.query_pairs().any(|(key, _)| key == DRAIN_TYPE_PARAM) {
        return Err(CoreError::InvalidArgument(format!(
            "drain URL must not contain '{}'; use --type instead",
            DRAIN_TYPE_PARAM
        )));
    }

    Ok(())
}

/// Tag a validated drain URL with its type
pub fn encode_drain_url(url: &str, drain_type: DrainType) -> String {
    if drain_type == DrainType::Logs {
        return url.to_string();
    }

    // The tag goes before any fragment so it stays part of the query
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };
    let separator = if !base.contains('?') {
        "?"
    } else if base.ends_with('?') || base.ends_with('&') {
        ""
    } else {
        "&"
    };

    let mut encoded = format!(
        "{}{}{}={}",
        base,
        separator,
        DRAIN_TYPE_PARAM,
        drain_type.as_str()
    );
    if let Some(fragment) = fragment {
        encoded.push('#');
        encoded.push_str(fragment);
    }
    encoded
}

/// Split a stored drain URL into the user-facing URL and its type
///
/// Other query parameters are kept verbatim and in order. A missing or
/// unknown tag reads as [`DrainType::Logs`].
pub fn decode_drain_url(raw: &str) -> (String, DrainType) {
    let (without_fragment, fragment) = match raw.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (raw, None),
    };
    let Some((base, query)) = without_fragment.split_once('?') else {
        return (raw.to_string(), DrainType::Logs);
    };

    let mut drain_type = DrainType::Logs;
    let mut kept = Vec::new();
    for segment in query.split('&') {
        match segment.split_once('=') {
            Some((key, value)) if key == DRAIN_TYPE_PARAM => {
                drain_type = value.parse().unwrap_or_default();
            }
            _ if segment == DRAIN_TYPE_PARAM => {}
            _ => kept.push(segment),
        }
    }

    let mut url = base.to_string();
    let kept: Vec<&str> = kept.into_iter().filter(|s| !s.is_empty()).collect();
    if !kept.is_empty() {
        url.push('?');
        url.push_str(&kept.join("&"));
    }
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    (url, drain_type)
}
