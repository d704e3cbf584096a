//! End-to-end runs of the binary against a mock Cloud Controller

use assert_cmd::Command;
use assert_cmd::assert::{Assert, OutputAssertExt};
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Run drainctl with the environment pointing at the mock server
async fn run(server: &MockServer, args: &[&str]) -> Assert {
    let home = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("drainctl").unwrap();
    cmd.args(args)
        .env("DRAINCTL_API_URL", server.uri())
        .env("DRAINCTL_TOKEN", "test-token")
        .env("DRAINCTL_SPACE_GUID", "space-1")
        .env_remove("DRAINCTL_PROFILE")
        .env_remove("DRAINCTL_CONFIG_FILE")
        .env_remove("RUST_LOG")
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path());

    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();
    output.assert()
}

fn page(resources: Value) -> Value {
    json!({"pagination": {"next": null}, "resources": resources})
}

fn binding(guid: &str, instance: &str, app: &str, state: &str) -> Value {
    json!({
        "guid": guid,
        "type": "app",
        "last_operation": {"type": "create", "state": state},
        "relationships": {
            "app": {"data": {"guid": app}},
            "service_instance": {"data": {"guid": instance}}
        }
    })
}

async fn mount_app(server: &MockServer, name: &str, guid: &str) {
    Mock::given(method("GET"))
        .and(path("/v3/apps"))
        .and(query_param("names", name))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page(json!([{"guid": guid, "name": name}]))),
        )
        .mount(server)
        .await;
}

async fn mount_job(server: &MockServer, guid: &str, state: &str, detail: Option<&str>) {
    let errors = match detail {
        Some(detail) => json!([{"code": 10001, "title": "CF-Error", "detail": detail}]),
        None => json!([]),
    };
    Mock::given(method("GET"))
        .and(path(format!("/v3/jobs/{}", guid)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "guid": guid,
            "state": state,
            "errors": errors
        })))
        .mount(server)
        .await;
}

fn accepted(server: &MockServer, job: &str) -> ResponseTemplate {
    ResponseTemplate::new(202).insert_header(
        "Location",
        format!("{}/v3/jobs/{}", server.uri(), job).as_str(),
    )
}

/// A space with one drain bound to two apps and one plain credentials instance
async fn mount_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v3/service_instances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([
            {"guid": "si-1", "name": "my-drain", "syslog_drain_url": "syslog://logs.example.com:6000?drain-type=all"},
            {"guid": "si-2", "name": "credentials", "syslog_drain_url": null}
        ]))))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v3/service_credential_bindings"))
        .and(query_param("service_instance_guids", "si-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([
            binding("b-1", "si-1", "app-2", "succeeded"),
            binding("b-2", "si-1", "app-1", "succeeded")
        ]))))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v3/apps"))
        .and(query_param("guids", "app-1,app-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([
            {"guid": "app-1", "name": "web-app"},
            {"guid": "app-2", "name": "worker"}
        ]))))
        .mount(server)
        .await;
}

#[tokio::test]
async fn drains_lists_as_json() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let assert = run(&server, &["drains", "-o", "json"]).await.success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let drains: Value = serde_json::from_str(&stdout).unwrap();

    assert_eq!(
        drains,
        json!([{
            "name": "my-drain",
            "guid": "si-1",
            "url": "syslog://logs.example.com:6000",
            "type": "all",
            "apps": ["web-app", "worker"]
        }])
    );
}

#[tokio::test]
async fn drains_renders_table_by_default() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    run(&server, &["drains"])
        .await
        .success()
        .stdout(predicate::str::contains("bound apps"))
        .stdout(predicate::str::contains("my-drain"))
        .stdout(predicate::str::contains("web-app, worker"))
        .stdout(predicate::str::contains("credentials").not());
}

#[tokio::test]
async fn drains_query_selects_fields() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    run(&server, &["drains", "-q", "[].name"])
        .await
        .success()
        .stdout(predicate::str::contains("\"my-drain\""))
        .stdout(predicate::str::contains("bound apps").not());
}

#[tokio::test]
async fn drains_in_empty_space() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/service_instances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([]))))
        .mount(&server)
        .await;

    run(&server, &["drains"])
        .await
        .success()
        .stdout(predicate::str::contains("No drains found"));
}

#[tokio::test]
async fn create_drain_stores_typed_url_and_binds() {
    let server = MockServer::start().await;
    mount_app(&server, "web-app", "app-1").await;

    Mock::given(method("POST"))
        .and(path("/v3/service_instances"))
        .and(body_partial_json(json!({
            "type": "user-provided",
            "name": "my-drain",
            "syslog_drain_url": "syslog://logs.example.com:6000?drain-type=all"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "guid": "si-1",
            "name": "my-drain",
            "syslog_drain_url": "syslog://logs.example.com:6000?drain-type=all"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v3/service_credential_bindings"))
        .and(body_partial_json(json!({
            "type": "app",
            "relationships": {
                "service_instance": {"data": {"guid": "si-1"}},
                "app": {"data": {"guid": "app-1"}}
            }
        })))
        .respond_with(accepted(&server, "job-1"))
        .expect(1)
        .mount(&server)
        .await;
    mount_job(&server, "job-1", "COMPLETE", None).await;

    run(
        &server,
        &[
            "create-drain",
            "web-app",
            "my-drain",
            "syslog://logs.example.com:6000",
            "--type",
            "all",
        ],
    )
    .await
    .success()
    .stdout(predicate::str::contains(
        "Created drain 'my-drain' (all) and bound it to 'web-app'",
    ));
}

#[tokio::test]
async fn create_drain_with_taken_name_suggests_delete() {
    let server = MockServer::start().await;
    mount_app(&server, "web-app", "app-1").await;

    Mock::given(method("POST"))
        .and(path("/v3/service_instances"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "errors": [{
                "code": 60002,
                "title": "CF-ServiceInstanceNameTaken",
                "detail": "The service instance name is taken: my-drain"
            }]
        })))
        .mount(&server)
        .await;

    run(
        &server,
        &["create-drain", "web-app", "my-drain", "syslog://logs.example.com:6000"],
    )
    .await
    .failure()
    .code(1)
    .stderr(predicate::str::contains("name is taken"))
    .stderr(predicate::str::contains("drainctl delete-drain my-drain"));
}

#[tokio::test]
async fn create_drain_failed_bind_suggests_bind_drain() {
    let server = MockServer::start().await;
    mount_app(&server, "web-app", "app-1").await;

    Mock::given(method("POST"))
        .and(path("/v3/service_instances"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "guid": "si-1",
            "name": "my-drain",
            "syslog_drain_url": "syslog://logs.example.com:6000"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/service_credential_bindings"))
        .respond_with(accepted(&server, "job-1"))
        .mount(&server)
        .await;
    mount_job(&server, "job-1", "FAILED", Some("drain endpoint unreachable")).await;

    // The instance is left in place; no delete is ever issued
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    run(
        &server,
        &["create-drain", "web-app", "my-drain", "syslog://logs.example.com:6000"],
    )
    .await
    .failure()
    .code(1)
    .stderr(predicate::str::contains("drain endpoint unreachable"))
    .stderr(predicate::str::contains("drainctl bind-drain web-app my-drain"));
}

#[tokio::test]
async fn bind_drain_when_already_bound() {
    let server = MockServer::start().await;
    mount_app(&server, "web-app", "app-1").await;

    // Serves both the name lookup and the follow-up listing
    Mock::given(method("GET"))
        .and(path("/v3/service_instances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([
            {"guid": "si-1", "name": "my-drain", "syslog_drain_url": "syslog://logs.example.com:6000"}
        ]))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/service_credential_bindings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([
            binding("b-1", "si-1", "app-1", "succeeded")
        ]))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/apps"))
        .and(query_param("guids", "app-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([
            {"guid": "app-1", "name": "web-app"}
        ]))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    run(&server, &["bind-drain", "web-app", "my-drain"])
        .await
        .success()
        .stdout(predicate::str::contains(
            "Drain 'my-drain' is already bound to 'web-app'",
        ))
        .stdout(predicate::str::contains("Bound apps: web-app"));
}

#[tokio::test]
async fn bind_drain_unknown_app() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([]))))
        .mount(&server)
        .await;

    run(&server, &["bind-drain", "ghost", "my-drain"])
        .await
        .failure()
        .code(1)
        .stderr(predicate::str::contains("App 'ghost' not found"))
        .stderr(predicate::str::contains("cf apps"));
}

#[tokio::test]
async fn delete_drain_unbinds_then_deletes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/service_instances"))
        .and(query_param("names", "my-drain"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([
            {"guid": "si-1", "name": "my-drain", "syslog_drain_url": "syslog://logs.example.com:6000"}
        ]))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/service_credential_bindings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([
            binding("b-1", "si-1", "app-1", "succeeded")
        ]))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/apps"))
        .and(query_param("guids", "app-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([
            {"guid": "app-1", "name": "web-app"}
        ]))))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/v3/service_credential_bindings/b-1"))
        .respond_with(accepted(&server, "job-1"))
        .expect(1)
        .mount(&server)
        .await;
    mount_job(&server, "job-1", "COMPLETE", None).await;
    Mock::given(method("DELETE"))
        .and(path("/v3/service_instances/si-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    run(&server, &["delete-drain", "my-drain", "--force"])
        .await
        .success()
        .stdout(predicate::str::contains("Unbound from: web-app"))
        .stdout(predicate::str::contains("Deleted drain 'my-drain'"));
}

#[tokio::test]
async fn unauthorized_token_gets_login_tip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{"code": 1000, "title": "CF-InvalidAuthToken", "detail": "Invalid Auth Token"}]
        })))
        .mount(&server)
        .await;

    run(&server, &["drains"])
        .await
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid Auth Token"))
        .stderr(predicate::str::contains("tip"));
}

#[tokio::test]
async fn drains_fails_whole_listing_when_binding_fetch_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/service_instances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([
            {"guid": "si-1", "name": "my-drain", "syslog_drain_url": "syslog://logs.example.com:6000"}
        ]))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/service_credential_bindings"))
        .respond_with(ResponseTemplate::new(503).set_body_string("bindings unavailable"))
        .mount(&server)
        .await;

    run(&server, &["drains"])
        .await
        .failure()
        .code(1)
        .stdout(predicate::str::contains("my-drain").not())
        .stderr(predicate::str::contains("bindings unavailable"));
}

#[tokio::test]
async fn bind_drain_succeeds_when_read_back_fails() {
    let server = MockServer::start().await;
    mount_app(&server, "web-app", "app-1").await;

    Mock::given(method("GET"))
        .and(path("/v3/service_instances"))
        .and(query_param("names", "my-drain"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([
            {"guid": "si-1", "name": "my-drain", "syslog_drain_url": "syslog://logs.example.com:6000"}
        ]))))
        .with_priority(1)
        .mount(&server)
        .await;
    // The follow-up listing breaks
    Mock::given(method("GET"))
        .and(path("/v3/service_instances"))
        .respond_with(ResponseTemplate::new(500).set_body_string("listing unavailable"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/service_credential_bindings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([]))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/service_credential_bindings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(binding(
            "b-1",
            "si-1",
            "app-1",
            "succeeded",
        )))
        .expect(1)
        .mount(&server)
        .await;

    run(&server, &["bind-drain", "web-app", "my-drain"])
        .await
        .success()
        .stdout(predicate::str::contains("Bound drain 'my-drain' to 'web-app'"))
        .stdout(predicate::str::contains("Bound apps").not())
        .stderr(predicate::str::contains("Bind succeeded but reading back"));
}

#[tokio::test]
async fn delete_drain_refuses_plain_service_instance() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/service_instances"))
        .and(query_param("names", "db-creds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([
            {"guid": "si-9", "name": "db-creds", "syslog_drain_url": ""}
        ]))))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    run(&server, &["delete-drain", "db-creds", "--force"])
        .await
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Drain 'db-creds' not found"))
        .stderr(predicate::str::contains("drainctl drains"));
}
