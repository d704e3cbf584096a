//! Access to the platform's resource-management (Cloud Controller v3) API
//!
//! [`CloudControllerApi`] is the seam between the drain logic and the network.
//! [`CloudControllerClient`] talks HTTP; [`crate::testing::FakeCloudController`]
//! keeps everything in memory so workflows can be exercised without a live
//! foundation.
//!
//! All lookups are scoped to the space the client was built for.

mod http;
pub mod types;
mod wire;

pub use http::{CloudControllerClient, CloudControllerClientBuilder};
pub use types::{
    App, AsyncOperation, Binding, BindingFilter, BindingState, Job, JobRef, JobState,
    ServiceInstance,
};

use crate::error::Result;
use async_trait::async_trait;

/// Operations the drain engine needs from the remote API
///
/// Every method fails with [`CoreError::NotFound`](crate::CoreError::NotFound)
/// when a name or guid does not resolve, `Conflict` on uniqueness violations,
/// `Unauthorized`/`Forbidden` on auth failures and `Remote` for any other
/// non-success answer, with the remote message kept verbatim.
#[async_trait]
pub trait CloudControllerApi: Send + Sync {
    /// Resolve an application name to its guid
    async fn app_guid(&self, name: &str) -> Result<String>;

    /// Fetch the applications with the given guids; unknown guids are skipped
    async fn list_apps(&self, guids: &[String]) -> Result<Vec<App>>;

    /// Look up a user-provided service instance by name
    async fn service_instance(&self, name: &str) -> Result<ServiceInstance>;

    /// List all user-provided service instances
    async fn list_service_instances(&self) -> Result<Vec<ServiceInstance>>;

    /// Create a user-provided service instance carrying a syslog drain URL
    async fn create_service_instance(
        &self,
        name: &str,
        syslog_drain_url: &str,
    ) -> Result<ServiceInstance>;

    /// Delete a service instance; it must not have bindings left
    async fn delete_service_instance(&self, guid: &str) -> Result<AsyncOperation>;

    /// List app bindings matching the filter
    async fn list_bindings(&self, filter: &BindingFilter) -> Result<Vec<Binding>>;

    /// Bind a service instance to an application
    async fn create_binding(
        &self,
        service_instance_guid: &str,
        app_guid: &str,
    ) -> Result<AsyncOperation>;

    /// Remove a binding
    async fn delete_binding(&self, guid: &str) -> Result<AsyncOperation>;

    /// Fetch the current state of a job
    async fn get_job(&self, job: &JobRef) -> Result<Job>;
}
