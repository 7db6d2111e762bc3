/// Parameter Manager facade against the in-memory backends
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use spartan_gcp::backend::memory::{MemoryParameterBackend, MemorySecretBackend};
use spartan_gcp::backend::{ParameterFormat, Replication, SecretBackend};
use spartan_gcp::config::CacheConfig;
use spartan_gcp::parameter_manager::{
    ParameterCreateRequest, ParameterListRequest, ParameterUpdateRequest, ParameterVersionCreateRequest,
    ParameterVersionListRequest,
};
use spartan_gcp::validation::MAX_PAYLOAD_BYTES;
use spartan_gcp::{ErrorKind, ParameterManagerService};
use tokio_test::{assert_err, assert_ok};

const PROJECT: &str = "test-project";

fn service_with(backend: Arc<MemoryParameterBackend>, cache: bool) -> ParameterManagerService {
    ParameterManagerService::with_backend(
        backend,
        PROJECT,
        "global",
        &CacheConfig {
            enabled: cache,
            ttl_seconds: 300,
        },
    )
}

fn service(cache: bool) -> (Arc<MemoryParameterBackend>, ParameterManagerService) {
    let backend = Arc::new(MemoryParameterBackend::new());
    (backend.clone(), service_with(backend, cache))
}

async fn seed(service: &ParameterManagerService, name: &str, format: ParameterFormat, data: Value) {
    assert_ok!(service.create_parameter(ParameterCreateRequest::new(name, format)).await);
    assert_ok!(
        service
            .create_parameter_version(ParameterVersionCreateRequest::new(name, "v1", data, format))
            .await
    );
}

fn blob(len: usize) -> Value {
    Value::String("a".repeat(len))
}

#[tokio::test]
async fn test_payload_size_boundary() {
    let (backend, service) = service(false);
    assert_ok!(
        service
            .create_parameter(ParameterCreateRequest::new("big", ParameterFormat::Unformatted))
            .await
    );

    assert_ok!(
        service
            .create_parameter_version(ParameterVersionCreateRequest::new(
                "big",
                "fits",
                blob(MAX_PAYLOAD_BYTES),
                ParameterFormat::Unformatted,
            ))
            .await
    );

    let err = assert_err!(
        service
            .create_parameter_version(ParameterVersionCreateRequest::new(
                "big",
                "too-big",
                blob(MAX_PAYLOAD_BYTES + 1),
                ParameterFormat::Unformatted,
            ))
            .await
    );
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    assert_eq!(backend.calls("create_parameter_version"), 1);
}

#[tokio::test]
async fn test_json_parameter_round_trip_and_latest() {
    let (_, service) = service(false);
    seed(&service, "app-config", ParameterFormat::Json, json!({"debug": false})).await;
    assert_ok!(
        service
            .create_parameter_version(ParameterVersionCreateRequest::new(
                "app-config",
                "v2",
                json!({"debug": true}),
                ParameterFormat::Json,
            ))
            .await
    );

    let latest = assert_ok!(service.get_parameter("app-config", None).await);
    assert_eq!(latest.version, "v2");
    assert_eq!(latest.data, json!({"debug": true}));
    assert_eq!(latest.format_type, "JSON");

    let pinned = assert_ok!(service.get_parameter("app-config", Some("v1")).await);
    assert_eq!(pinned.data, json!({"debug": false}));

    let versions = assert_ok!(
        service
            .list_parameter_versions(ParameterVersionListRequest::new("app-config"))
            .await
    );
    assert_eq!(versions.versions.len(), 2);

    let metadata = assert_ok!(service.get_parameter_metadata("app-config").await);
    assert_eq!(metadata.version_count, Some(2));
}

#[tokio::test]
async fn test_yaml_string_is_validated() {
    let (backend, service) = service(false);
    assert_ok!(
        service
            .create_parameter(ParameterCreateRequest::new("routes", ParameterFormat::Yaml))
            .await
    );

    let err = assert_err!(
        service
            .create_parameter_version(ParameterVersionCreateRequest::new(
                "routes",
                "v1",
                json!("key: [unclosed"),
                ParameterFormat::Yaml,
            ))
            .await
    );
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    assert_eq!(backend.calls("create_parameter_version"), 0);

    assert_ok!(
        service
            .create_parameter_version(ParameterVersionCreateRequest::new(
                "routes",
                "v1",
                json!("paths:\n  - /a\n  - /b\n"),
                ParameterFormat::Yaml,
            ))
            .await
    );
    let fetched = assert_ok!(service.get_parameter("routes", None).await);
    assert_eq!(fetched.data, json!({"paths": ["/a", "/b"]}));
}

#[tokio::test]
async fn test_update_invalidates_cache_and_replaces_labels() {
    let (backend, service) = service(true);
    seed(&service, "flags", ParameterFormat::Json, json!({"beta": false})).await;

    assert_ok!(service.get_parameter("flags", None).await);
    assert_ok!(service.get_parameter("flags", None).await);
    assert_eq!(backend.calls("get_parameter_version"), 1);

    let updated = assert_ok!(
        service
            .update_parameter(ParameterUpdateRequest {
                parameter_name: "flags".to_string(),
                version_name: "v2".to_string(),
                data: json!({"beta": true}),
                labels: Some(HashMap::from([("team".to_string(), "web".to_string())])),
            })
            .await
    );
    assert_eq!(updated.version, "v2");

    let fetched = assert_ok!(service.get_parameter("flags", None).await);
    assert_eq!(fetched.version, "v2");
    assert_eq!(fetched.data, json!({"beta": true}));
    assert_eq!(
        fetched.labels.as_ref().and_then(|l| l.get("team")).map(String::as_str),
        Some("web")
    );
}

#[tokio::test]
async fn test_batch_get_counts_cache_hits_and_errors() {
    let (_, service) = service(true);
    seed(&service, "a", ParameterFormat::Unformatted, json!("one")).await;
    seed(&service, "b", ParameterFormat::Unformatted, json!("two")).await;
    assert_ok!(service.get_parameter("a", None).await);

    let names = vec!["a".to_string(), "b".to_string(), "missing".to_string()];
    let batch = service.get_parameters_batch(&names, None).await;

    assert_eq!(batch.total_requested, 3);
    assert_eq!(batch.cache_hits, 1);
    assert_eq!(batch.api_calls, 2);
    assert_eq!(batch.parameters["b"].as_ref().map(|p| p.data.clone()), Some(json!("two")));
    assert_eq!(batch.parameters["missing"], None);
    assert_eq!(batch.errors.len(), 1);
    assert_eq!(batch.errors[0].parameter_name, "missing");
    assert_eq!(batch.errors[0].error, "not_found");

    let stats = service.get_cache_stats();
    assert_eq!(stats.batch_stats.total_batch_operations, 1);
    assert_eq!(stats.batch_stats.cache_hits_in_batches, 1);
}

#[tokio::test]
async fn test_batch_create_and_delete() {
    let (_, service) = service(false);
    let created = service
        .create_parameters_batch(vec![
            ParameterCreateRequest::new("one", ParameterFormat::Json),
            ParameterCreateRequest::new("two", ParameterFormat::Yaml),
            ParameterCreateRequest::new("one", ParameterFormat::Json),
        ])
        .await;
    assert_eq!(created.successful, vec!["one", "two"]);
    assert_eq!(created.failed, vec!["one"]);
    assert_eq!(created.errors[0].error, "generic");
    assert!(created.errors[0].message.contains("already exists"));

    let listed = assert_ok!(service.list_parameters(ParameterListRequest::default()).await);
    assert_eq!(listed.parameters.len(), 2);

    let deleted = service
        .delete_parameters_batch(&["one".to_string(), "ghost".to_string()])
        .await;
    assert_eq!(deleted.successful, vec!["one"]);
    assert_eq!(deleted.failed, vec!["ghost"]);
    assert!(!assert_ok!(service.parameter_exists("one").await));
    assert!(assert_ok!(service.parameter_exists("two").await));
}

#[tokio::test]
async fn test_render_resolves_secret_references() {
    let secrets = Arc::new(MemorySecretBackend::new());
    let secret_parent = format!("projects/{}", PROJECT);
    assert_ok!(
        secrets
            .create_secret(&secret_parent, "db-password", &Replication::Automatic, &HashMap::new())
            .await
    );
    assert_ok!(
        secrets
            .add_secret_version(&format!("{}/secrets/db-password", secret_parent), b"s3cret")
            .await
    );

    let backend = Arc::new(MemoryParameterBackend::new().with_secrets(secrets));
    let service = service_with(backend, true);
    let reference = format!("${{secret.projects/{}/secrets/db-password/versions/1}}", PROJECT);
    let data = json!({ "database": { "password": reference } });

    let validation = service.validate_secret_references(&data);
    assert!(validation.valid);
    assert_eq!(validation.reference_count, 1);
    assert_eq!(
        service.parse_secret_references(&data),
        vec![format!("projects/{}/secrets/db-password/versions/1", PROJECT)]
    );

    seed(&service, "db", ParameterFormat::Json, data).await;
    let rendered = assert_ok!(service.render_parameter("db", None).await);
    assert_eq!(rendered.rendered_data, json!({ "database": { "password": "s3cret" } }));

    // Plain reads keep the reference unresolved
    let raw = assert_ok!(service.get_parameter("db", None).await);
    assert_eq!(raw.data["database"]["password"], json!(reference));
}

#[tokio::test]
async fn test_malformed_reference_is_reported() {
    let (_, service) = service(false);
    let validation = service.validate_secret_references(&json!({"key": "${secret.not-a-resource}"}));
    assert!(!validation.valid);
    assert!(!validation.errors.is_empty());
}
