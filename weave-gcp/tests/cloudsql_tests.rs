//! Contract tests for the Cloud SQL resources

use serde_json::json;
use test_case::test_case;
use weave_gcp::{
    AvailabilityType, CredentialsConfig, Database, DatabaseConfig, DatabaseInstance,
    DatabaseInstanceConfig, GcpClient, SqlUser, SqlUserConfig, TokenSource,
};
use weave_resource::{Dependency, FieldValue, Resource, ResourceError};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn instance_config() -> DatabaseInstanceConfig {
    DatabaseInstanceConfig {
        project_id: "test-project".to_string(),
        credentials: CredentialsConfig::Json(json!({"type": "service_account"})),
        region: "europe-west4".to_string(),
        instance_name: "main-db".to_string(),
        database_version: "POSTGRES_15".to_string(),
        tier: "db-f1-micro".to_string(),
        availability_type: AvailabilityType::Zonal,
        backup_enabled: true,
        deletion_protection: false,
        authorized_networks: vec![],
        enable_public_ip: true,
    }
}

fn client(server: &MockServer) -> GcpClient {
    GcpClient::with_token_source(TokenSource::fixed("test-token"))
        .unwrap()
        .with_api_base(server.uri())
}

fn runnable_instance() -> serde_json::Value {
    json!({
        "name": "main-db",
        "state": "RUNNABLE",
        "region": "europe-west4",
        "databaseVersion": "POSTGRES_15",
        "settings": {"tier": "db-f1-micro"},
        "ipAddresses": [{"type": "PRIMARY", "ipAddress": "34.1.2.3"}]
    })
}

const INSTANCE_PATH: &str = "/projects/test-project/instances/main-db";

#[tokio::test]
async fn instance_create_inserts_and_waits_for_runnable() {
    let server = MockServer::start().await;

    // First existence probe: not there yet.
    Mock::given(method("GET"))
        .and(path(INSTANCE_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "The Cloud SQL instance does not exist."}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/instances"))
        .and(body_partial_json(json!({
            "name": "main-db",
            "region": "europe-west4",
            "databaseVersion": "POSTGRES_15"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "op-1"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(INSTANCE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(runnable_instance()))
        .mount(&server)
        .await;

    let resource = DatabaseInstance::new("main-db", instance_config()).with_client(client(&server));
    let outputs = resource.on_create().await.unwrap();

    assert_eq!(outputs.connection_name, "test-project:europe-west4:main-db");
    assert_eq!(outputs.public_ip.as_deref(), Some("34.1.2.3"));
    assert!(outputs.ready);
    assert!(outputs.console_url.contains("main-db"));
}

#[tokio::test]
async fn instance_create_is_idempotent_for_existing_instance() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(INSTANCE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(runnable_instance()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/instances"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let resource = DatabaseInstance::new("main-db", instance_config()).with_client(client(&server));
    let outputs = resource.on_create().await.unwrap();

    assert!(outputs.ready);
}

#[tokio::test]
async fn instance_delete_of_missing_instance_is_a_no_op() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(INSTANCE_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "The Cloud SQL instance does not exist."}
        })))
        .mount(&server)
        .await;

    let resource = DatabaseInstance::new("main-db", instance_config()).with_client(client(&server));
    resource.on_delete().await.unwrap();
}

#[tokio::test]
async fn instance_update_rejects_version_change() {
    let mut previous = instance_config();
    previous.database_version = "POSTGRES_14".to_string();

    let resource = DatabaseInstance::new("main-db", instance_config());
    let err = resource.on_update(&previous).await.unwrap_err();

    assert!(matches!(err, ResourceError::Immutable("database_version")));
}

#[test_case("db" ; "short name")]
#[test_case("valid-instance-1" ; "hyphenated name")]
fn instance_name_validation_accepts(name: &str) {
    let mut config = instance_config();
    config.instance_name = name.to_string();

    let resource = DatabaseInstance::new("main-db", config);
    let err = tokio_block(resource.on_create());
    // Fails on the network (no client configured), not on validation.
    assert!(!matches!(err, Some(ResourceError::Validation(_))));
}

#[test_case("1starts-with-digit")]
#[test_case("has_underscore")]
#[test_case("")]
fn instance_name_validation_rejects(name: &str) {
    let mut config = instance_config();
    config.instance_name = name.to_string();

    let resource = DatabaseInstance::new("main-db", config);
    let err = tokio_block(resource.on_create());
    assert!(matches!(err, Some(ResourceError::Validation(_))));
}

#[test]
fn database_version_validation_rejects_unknown_prefix() {
    let mut config = instance_config();
    config.database_version = "ORACLE_19".to_string();

    let resource = DatabaseInstance::new("main-db", config);
    let err = tokio_block(resource.on_create());
    assert!(matches!(err, Some(ResourceError::Validation(_))));
}

/// Run a lifecycle future to completion on a throwaway runtime, returning the
/// error if any.
fn tokio_block<F>(future: F) -> Option<ResourceError>
where
    F: std::future::Future<Output = Result<weave_gcp::DatabaseInstanceOutputs, ResourceError>>,
{
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
        .err()
}

fn instance_dependency() -> Dependency<DatabaseInstance> {
    Dependency::resolved("gcp/cloudsql/database_instance:main-db", instance_config(), None)
}

#[tokio::test]
async fn database_create_maps_connection_outputs() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/instances/main-db/databases"))
        .and(body_partial_json(json!({"name": "app"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "op-1"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(INSTANCE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(runnable_instance()))
        .mount(&server)
        .await;

    let config = DatabaseConfig {
        instance: instance_dependency(),
        database_name: "app".to_string(),
    };

    let resource = Database::new("app-db", config).with_client(client(&server));
    let outputs = resource.on_create().await.unwrap();

    assert_eq!(outputs.database_name, "app");
    assert_eq!(outputs.instance_name, "main-db");
    assert_eq!(outputs.host, "34.1.2.3");
    assert_eq!(outputs.port, 5432);
    assert_eq!(outputs.url, "postgresql://34.1.2.3:5432/app");
}

#[tokio::test]
async fn database_create_tolerates_existing_database() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/instances/main-db/databases"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "Database app already exists.", "status": "ALREADY_EXISTS"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(INSTANCE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(runnable_instance()))
        .mount(&server)
        .await;

    let config = DatabaseConfig {
        instance: instance_dependency(),
        database_name: "app".to_string(),
    };

    let resource = Database::new("app-db", config).with_client(client(&server));
    let outputs = resource.on_create().await.unwrap();

    assert_eq!(outputs.database_name, "app");
}

#[tokio::test]
async fn database_update_rejects_name_change() {
    let previous = DatabaseConfig {
        instance: instance_dependency(),
        database_name: "old".to_string(),
    };
    let config = DatabaseConfig {
        instance: instance_dependency(),
        database_name: "app".to_string(),
    };

    let resource = Database::new("app-db", config);
    let err = resource.on_update(&previous).await.unwrap_err();

    assert!(matches!(err, ResourceError::Immutable("database_name")));
}

#[tokio::test]
async fn database_delete_of_missing_database_is_a_no_op() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/projects/test-project/instances/main-db/databases/app"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "Database does not exist."}
        })))
        .mount(&server)
        .await;

    let config = DatabaseConfig {
        instance: instance_dependency(),
        database_name: "app".to_string(),
    };

    let resource = Database::new("app-db", config).with_client(client(&server));
    resource.on_delete().await.unwrap();
}

#[tokio::test]
async fn user_create_inserts_and_maps_outputs() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/instances/main-db/users"))
        .and(body_partial_json(json!({"name": "app-user", "password": "s3cret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "op-1"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(INSTANCE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(runnable_instance()))
        .mount(&server)
        .await;

    let config = SqlUserConfig {
        instance: instance_dependency(),
        username: "app-user".to_string(),
        password: FieldValue::literal("s3cret".to_string()),
    };

    let resource = SqlUser::new("app-user", config).with_client(client(&server));
    let outputs = resource.on_create().await.unwrap();

    assert_eq!(outputs.username, "app-user");
    assert_eq!(outputs.instance_name, "main-db");
    assert_eq!(outputs.port, 5432);
}

#[tokio::test]
async fn user_update_rewrites_password() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/projects/test-project/instances/main-db/users"))
        .and(query_param("name", "app-user"))
        .and(body_partial_json(json!({"password": "new-secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "op-2"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(INSTANCE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(runnable_instance()))
        .mount(&server)
        .await;

    let previous = SqlUserConfig {
        instance: instance_dependency(),
        username: "app-user".to_string(),
        password: FieldValue::literal("s3cret".to_string()),
    };
    let config = SqlUserConfig {
        instance: instance_dependency(),
        username: "app-user".to_string(),
        password: FieldValue::literal("new-secret".to_string()),
    };

    let resource = SqlUser::new("app-user", config).with_client(client(&server));
    let outputs = resource.on_update(&previous).await.unwrap();

    assert_eq!(outputs.username, "app-user");
}

#[tokio::test]
async fn user_delete_of_missing_user_is_a_no_op() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/projects/test-project/instances/main-db/users"))
        .and(query_param("name", "app-user"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "User does not exist."}
        })))
        .mount(&server)
        .await;

    let config = SqlUserConfig {
        instance: instance_dependency(),
        username: "app-user".to_string(),
        password: FieldValue::literal("s3cret".to_string()),
    };

    let resource = SqlUser::new("app-user", config).with_client(client(&server));
    resource.on_delete().await.unwrap();
}
