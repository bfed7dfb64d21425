//! Contract tests for the Secret Manager resource

use serde_json::json;
use weave_gcp::{CredentialsConfig, GcpClient, Secret, SecretConfig, TokenSource};
use weave_resource::{FieldValue, Resource, ResourceError};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> CredentialsConfig {
    CredentialsConfig::Json(json!({"type": "service_account", "project_id": "test-project"}))
}

fn config() -> SecretConfig {
    SecretConfig {
        project_id: "test-project".to_string(),
        secret_id: "my-secret".to_string(),
        data: FieldValue::literal("super-secret-value".to_string()),
        credentials: credentials(),
        labels: None,
    }
}

fn client(server: &MockServer) -> GcpClient {
    GcpClient::with_token_source(TokenSource::fixed("test-token"))
        .unwrap()
        .with_api_base(server.uri())
}

#[tokio::test]
async fn create_creates_secret_and_version() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/secrets"))
        .and(query_param("secretId", "my-secret"))
        .and(body_partial_json(json!({"replication": {"automatic": {}}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/test-project/secrets/my-secret"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/secrets/my-secret:addVersion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/test-project/secrets/my-secret/versions/1",
            "state": "ENABLED"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resource = Secret::new("my-secret", config()).with_client(client(&server));
    let outputs = resource.on_create().await.unwrap();

    assert_eq!(outputs.resource_name, "projects/test-project/secrets/my-secret");
    assert_eq!(
        outputs.version_name,
        "projects/test-project/secrets/my-secret/versions/1"
    );
    assert_eq!(outputs.version_id, "1");
}

#[tokio::test]
async fn create_tolerates_existing_secret() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/secrets"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {
                "code": 409,
                "message": "Secret [my-secret] already exists.",
                "status": "ALREADY_EXISTS"
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/secrets/my-secret:addVersion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/test-project/secrets/my-secret/versions/7"
        })))
        .mount(&server)
        .await;

    let resource = Secret::new("my-secret", config()).with_client(client(&server));
    let outputs = resource.on_create().await.unwrap();

    assert_eq!(outputs.version_id, "7");
}

#[tokio::test]
async fn create_surfaces_permission_denied() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/secrets"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "Permission denied on resource project.",
                "status": "PERMISSION_DENIED"
            }
        })))
        .mount(&server)
        .await;

    let resource = Secret::new("my-secret", config()).with_client(client(&server));
    let err = resource.on_create().await.unwrap_err();

    assert!(matches!(err, ResourceError::PermissionDenied(_)));
}

#[tokio::test]
async fn update_with_unchanged_data_returns_cached_outputs() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let cached = weave_gcp::SecretOutputs {
        resource_name: "projects/test-project/secrets/my-secret".to_string(),
        version_name: "projects/test-project/secrets/my-secret/versions/1".to_string(),
        version_id: "1".to_string(),
    };

    let resource = Secret::new("my-secret", config())
        .with_outputs(cached.clone())
        .with_client(client(&server));
    let outputs = resource.on_update(&config()).await.unwrap();

    assert_eq!(outputs, cached);
}

#[tokio::test]
async fn update_with_changed_data_adds_a_version() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/secrets"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {"code": 409, "message": "exists", "status": "ALREADY_EXISTS"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/secrets/my-secret:addVersion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/test-project/secrets/my-secret/versions/2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut previous = config();
    previous.data = FieldValue::literal("old-value".to_string());

    let resource = Secret::new("my-secret", config()).with_client(client(&server));
    let outputs = resource.on_update(&previous).await.unwrap();

    assert_eq!(outputs.version_id, "2");
}

#[tokio::test]
async fn update_rejects_secret_id_change() {
    let mut previous = config();
    previous.secret_id = "other-secret".to_string();

    let resource = Secret::new("my-secret", config());
    let err = resource.on_update(&previous).await.unwrap_err();

    assert!(matches!(err, ResourceError::Immutable("secret_id")));
}

#[tokio::test]
async fn delete_of_missing_secret_is_a_no_op() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/projects/test-project/secrets/my-secret"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "code": 404,
                "message": "Secret [my-secret] not found.",
                "status": "NOT_FOUND"
            }
        })))
        .mount(&server)
        .await;

    let resource = Secret::new("my-secret", config()).with_client(client(&server));
    resource.on_delete().await.unwrap();
}

#[tokio::test]
async fn validation_rejects_bad_secret_id() {
    let mut config = config();
    config.secret_id = "not/allowed".to_string();

    let resource = Secret::new("my-secret", config);
    let err = resource.on_create().await.unwrap_err();

    assert!(matches!(err, ResourceError::Validation(_)));
}

#[tokio::test]
async fn unresolved_data_reference_fails_before_version_add() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/secrets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/test-project/secrets/my-secret"
        })))
        .mount(&server)
        .await;

    let mut config = config();
    config.data = FieldValue::reference("generator.outputs.value");

    let resource = Secret::new("my-secret", config).with_client(client(&server));
    let err = resource.on_create().await.unwrap_err();

    assert!(matches!(err, ResourceError::UnresolvedReference(_)));
}
