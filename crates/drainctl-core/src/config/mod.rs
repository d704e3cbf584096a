//! Configuration and profile management for drainctl
//!
// Allow nested config module - this is intentional for the config subsystem

#![allow(clippy::module_inception)]
//!
//! A profile names one target: the API endpoint, the bearer token used to
//! reach it and the space drains live in. Login is out of scope; the token is
//! taken as given, usually through `${VAR}` expansion from the environment.
//!
//! # Features
//!
//! - Multiple named profiles with a default
//! - Environment variable expansion in config files
//! - Platform-specific config file locations

pub mod config;
pub mod error;

// Re-export main types for convenience
pub use config::{Config, Profile, ResolvedTarget};
pub use error::{ConfigError, Result};
