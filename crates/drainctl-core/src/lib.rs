//! # drainctl-core
//!
//! The engine behind `drainctl`: everything needed to manage syslog drains on a
//! Cloud Foundry style platform without any terminal concerns.
//!
//! A drain is stored remotely as a user-provided service instance whose
//! `syslog_drain_url` points at the syslog endpoint. Attaching it to an
//! application is a service binding, which the platform may complete
//! asynchronously through a job that has to be polled.
//!
//! ## Layers
//!
//! - [`client`] - the [`CloudControllerApi`] trait, its HTTP implementation and
//!   the typed resources it returns
//! - [`repository`] - read side: joins instances, bindings and apps into [`Drain`]s
//! - [`workflows`] - write side: create, bind and delete drains, waiting for
//!   every asynchronous step to finish
//! - [`progress`] - the job poller shared by all workflows
//! - [`config`] - profiles and the config file
//! - `testing` - an in-memory [`CloudControllerApi`] for tests, behind the
//!   `testing` feature
//!
//! ## Example
//!
//! ```rust,ignore
//! use drainctl_core::{CloudControllerClient, DrainRepository, WaitConfig};
//! use drainctl_core::workflows::{CreateDrainRequest, create_drain_and_wait};
//!
//! let client = CloudControllerClient::builder()
//!     .api_url("https://api.sys.example.com")
//!     .token(token)
//!     .space_guid(space_guid)
//!     .build()?;
//!
//! let request = CreateDrainRequest::new("web-app", "my-drain", "syslog://logs.example.com:6000")
//!     .drain_type("all");
//! create_drain_and_wait(&client, &request, &WaitConfig::default(), None).await?;
//!
//! for drain in DrainRepository::new(&client).list_drains().await? {
//!     println!("{} {} {:?}", drain.name, drain.drain_type, drain.apps);
//! }
//! ```

pub mod client;
pub mod config;
pub mod drain;
pub mod error;
pub mod progress;
pub mod repository;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod workflows;

pub use client::{CloudControllerApi, CloudControllerClient};
pub use config::{Config, ConfigError, Profile};
pub use drain::{Drain, DrainType};
pub use error::{CoreError, Result, Step};
pub use progress::{ProgressCallback, ProgressEvent, WaitConfig, poll_job};
pub use repository::DrainRepository;
