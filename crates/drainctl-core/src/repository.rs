//! Read side: assembles [`Drain`]s from instances, bindings and apps
//!
//! The join is built in memory. A listing costs one instance query, one
//! batched binding query and one batched app query no matter how many drains
//! the space holds.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::client::{BindingFilter, CloudControllerApi, ServiceInstance};
use crate::drain::Drain;
use crate::error::{CoreError, ResourceKind, Result};

/// Queries drains through a [`CloudControllerApi`]
pub struct DrainRepository<'a> {
    api: &'a dyn CloudControllerApi,
}

impl<'a> DrainRepository<'a> {
    pub fn new(api: &'a dyn CloudControllerApi) -> Self {
        Self { api }
    }

    /// All drains in the space, sorted by name, each with its bound apps
    ///
    /// Only bindings that reached `succeeded` count. Any failed lookup fails
    /// the whole listing.
    pub async fn list_drains(&self) -> Result<Vec<Drain>> {
        let instances = self.api.list_service_instances().await?;
        self.join(instances).await
    }

    /// A single drain by name
    pub async fn find_drain(&self, name: &str) -> Result<Drain> {
        let instances: Vec<ServiceInstance> = self
            .api
            .list_service_instances()
            .await?
            .into_iter()
            .filter(|i| i.name == name)
            .collect();

        self.join(instances)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::NotFound {
                kind: ResourceKind::Drain,
                name: name.to_string(),
            })
    }

    async fn join(&self, instances: Vec<ServiceInstance>) -> Result<Vec<Drain>> {
        let instances: Vec<ServiceInstance> = instances
            .into_iter()
            .filter(|i| i.syslog_drain_url.is_some())
            .collect();
        if instances.is_empty() {
            return Ok(Vec::new());
        }

        let bindings: Vec<_> = self
            .api
            .list_bindings(&BindingFilter::for_instances(
                instances.iter().map(|i| i.guid.as_str()),
            ))
            .await?
            .into_iter()
            .filter(|b| b.is_active())
            .collect();

        let app_guids: Vec<String> = bindings
            .iter()
            .map(|b| b.app_guid.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let app_names: HashMap<String, String> = if app_guids.is_empty() {
            HashMap::new()
        } else {
            self.api
                .list_apps(&app_guids)
                .await?
                .into_iter()
                .map(|app| (app.guid, app.name))
                .collect()
        };

        let mut apps_by_instance: HashMap<&str, Vec<String>> = HashMap::new();
        for binding in &bindings {
            match app_names.get(&binding.app_guid) {
                Some(name) => apps_by_instance
                    .entry(binding.service_instance_guid.as_str())
                    .or_default()
                    .push(name.clone()),
                None => debug!(
                    "Skipping binding {}: app {} not visible",
                    binding.guid, binding.app_guid
                ),
            }
        }

        let mut drains: Vec<Drain> = instances
            .iter()
            .filter_map(|instance| {
                let mut apps = apps_by_instance
                    .remove(instance.guid.as_str())
                    .unwrap_or_default();
                apps.sort();
                Drain::from_instance(instance, apps)
            })
            .collect();
        drains.sort_by(|a, b| a.name.cmp(&b.name));

        debug!("Assembled {} drains from {} bindings", drains.len(), bindings.len());
        Ok(drains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BindingState;
    use crate::drain::DrainType;
    use crate::testing::FakeCloudController;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_list_drains_joins_and_sorts() {
        let fake = FakeCloudController::new()
            .with_app("worker")
            .with_app("web-app")
            .with_drain("zeta", "syslog://z:1?drain-type=all")
            .with_drain("alpha", "https://a/in")
            .with_plain_instance("credentials")
            .with_binding("zeta", "worker", BindingState::Succeeded)
            .with_binding("zeta", "web-app", BindingState::Succeeded);

        let drains = DrainRepository::new(&fake).list_drains().await.unwrap();

        let names: Vec<&str> = drains.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(drains[0].apps.is_empty());
        assert_eq!(drains[1].apps, vec!["web-app", "worker"]);
        assert_eq!(drains[1].drain_type, DrainType::All);
        assert_eq!(drains[1].url, "syslog://z:1");
    }

    #[tokio::test]
    async fn test_unfinished_bindings_are_not_listed() {
        let fake = FakeCloudController::new()
            .with_app("web-app")
            .with_app("worker")
            .with_app("api")
            .with_drain("my-drain", "syslog://h:1")
            .with_binding("my-drain", "web-app", BindingState::InProgress)
            .with_binding("my-drain", "worker", BindingState::Failed)
            .with_binding("my-drain", "api", BindingState::Succeeded);

        let drains = DrainRepository::new(&fake).list_drains().await.unwrap();
        assert_eq!(drains[0].apps, vec!["api"]);
    }

    #[tokio::test]
    async fn test_remote_calls_do_not_grow_with_drain_count() {
        let mut fake = FakeCloudController::new().with_app("web-app");
        for i in 0..20 {
            let name = format!("drain-{i:02}");
            fake = fake
                .with_drain(&name, "syslog://h:1")
                .with_binding(&name, "web-app", BindingState::Succeeded);
        }

        let drains = DrainRepository::new(&fake).list_drains().await.unwrap();
        assert_eq!(drains.len(), 20);
        assert_eq!(fake.call_count("list_service_instances"), 1);
        assert_eq!(fake.call_count("list_bindings"), 1);
        assert_eq!(fake.call_count("list_apps"), 1);
    }

    #[tokio::test]
    async fn test_empty_space_makes_one_call() {
        let fake = FakeCloudController::new();
        let drains = DrainRepository::new(&fake).list_drains().await.unwrap();
        assert!(drains.is_empty());
        assert_eq!(fake.calls(), vec!["list_service_instances"]);
    }

    #[tokio::test]
    async fn test_find_drain() {
        let fake = FakeCloudController::new()
            .with_app("web-app")
            .with_drain("my-drain", "syslog://h:1?drain-type=metrics")
            .with_binding("my-drain", "web-app", BindingState::Succeeded);
        let repo = DrainRepository::new(&fake);

        let drain = repo.find_drain("my-drain").await.unwrap();
        assert_eq!(drain.drain_type, DrainType::Metrics);
        assert_eq!(drain.apps, vec!["web-app"]);

        assert!(repo.find_drain("other").await.unwrap_err().is_not_found());
    }

    fn bound_space() -> FakeCloudController {
        FakeCloudController::new()
            .with_app("web-app")
            .with_drain("my-drain", "syslog://h:1")
            .with_binding("my-drain", "web-app", BindingState::Succeeded)
    }

    #[tokio::test]
    async fn test_failed_instance_fetch_fails_listing() {
        let fake = bound_space().fail_call("list_service_instances", "CC unavailable");

        let err = DrainRepository::new(&fake).list_drains().await.unwrap_err();
        assert!(err.is_server_error());
        assert_eq!(fake.call_count("list_bindings"), 0);
    }

    #[tokio::test]
    async fn test_failed_binding_fetch_fails_listing() {
        let fake = bound_space().fail_call("list_bindings", "CC unavailable");

        let err = DrainRepository::new(&fake).list_drains().await.unwrap_err();
        assert!(err.to_string().contains("CC unavailable"));
        assert_eq!(fake.call_count("list_apps"), 0);
    }

    #[tokio::test]
    async fn test_failed_app_fetch_fails_listing() {
        // No drain comes back with an empty app set
        let fake = bound_space().fail_call("list_apps", "CC unavailable");

        let result = DrainRepository::new(&fake).list_drains().await;
        assert!(result.is_err());
        assert!(
            DrainRepository::new(&fake)
                .find_drain("my-drain")
                .await
                .unwrap_err()
                .is_server_error()
        );
    }
}
