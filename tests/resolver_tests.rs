/// Project and credential resolution, and resolver-driven facade construction
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use spartan_gcp::config::ResolverConfig;
use spartan_gcp::resolver::{Credentials, CredentialsInput, ResolverOptions};
use spartan_gcp::{
    ErrorKind, MapEnv, ParameterManagerOptions, ParameterManagerService, ResolveError, Resolver,
    SecretManagerOptions, SecretManagerService,
};
use tokio_test::{assert_err, assert_ok};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Probes that shell out or hit the network fail fast
fn offline_config() -> ResolverConfig {
    ResolverConfig {
        gcloud_binary: "/nonexistent/gcloud".to_string(),
        gcloud_timeout: Duration::from_millis(200),
        metadata_url: "http://127.0.0.1:9/computeMetadata/v1/project/project-id".to_string(),
        metadata_timeout: Duration::from_millis(200),
    }
}

fn resolver(env: &Arc<MapEnv>) -> Resolver {
    Resolver::new(env.clone(), offline_config())
}

#[tokio::test]
async fn test_explicit_project_skips_environment() {
    let env = Arc::new(MapEnv::new().with("GOOGLE_CLOUD_PROJECT", "from-env"));
    let (project, source) = assert_ok!(resolver(&env).resolve_project(Some("explicit-project")).await);

    assert_eq!(project, "explicit-project");
    assert_eq!(source, "explicit");
    assert!(env.lookups().is_empty());
}

#[tokio::test]
async fn test_environment_priority() {
    let env = Arc::new(
        MapEnv::new()
            .with("PROJECT_ID", "last")
            .with("GCLOUD_PROJECT", "third")
            .with("GCP_PROJECT", "second"),
    );
    let (project, source) = assert_ok!(resolver(&env).resolve_project(None).await);
    assert_eq!(project, "second");
    assert_eq!(source, "standard_env");
    assert!(!env.was_read("GCLOUD_PROJECT"));

    let env = Arc::new(MapEnv::new().with("GOOGLE_CLOUD_PROJECT", "framework").with("GCP_PROJECT", "other"));
    let (project, source) = assert_ok!(resolver(&env).resolve_project(None).await);
    assert_eq!(project, "framework");
    assert_eq!(source, "framework_env");
}

#[tokio::test]
async fn test_exhausted_chain_names_every_source() {
    let env = Arc::new(MapEnv::new());
    let err = assert_err!(resolver(&env).resolve_project(None).await);
    match &err {
        ResolveError::NoProject { attempted } => {
            assert_eq!(attempted.first().map(String::as_str), Some("explicit"));
            assert_eq!(attempted.len(), 5);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.to_string().contains("GOOGLE_CLOUD_PROJECT"));
}

#[tokio::test]
async fn test_credentials_from_explicit_path() {
    let env = Arc::new(MapEnv::new());
    let options = ResolverOptions {
        credentials_path: Some(fixture("service_account.json")),
        ..Default::default()
    };
    let (credentials, source) = assert_ok!(resolver(&env).resolve_credentials(&options).await).unwrap();
    assert_eq!(source, "credentials_path");
    assert!(matches!(credentials, Credentials::ServiceAccount(_)));
    assert!(!env.was_read("GOOGLE_APPLICATION_CREDENTIALS"));
}

#[tokio::test]
async fn test_malformed_explicit_credentials_fail_fast() {
    let env = Arc::new(MapEnv::new().with("GOOGLE_APPLICATION_CREDENTIALS", "/also/missing.json"));

    let options = ResolverOptions {
        credentials_path: Some(PathBuf::from("/definitely/missing.json")),
        ..Default::default()
    };
    let err = assert_err!(resolver(&env).resolve_credentials(&options).await);
    assert!(matches!(err, ResolveError::Credentials { .. }));
    assert!(!env.was_read("GOOGLE_APPLICATION_CREDENTIALS"));

    let options = ResolverOptions {
        credentials: Some(CredentialsInput::Json("{not json".to_string())),
        ..Default::default()
    };
    let err = assert_err!(resolver(&env).resolve_credentials(&options).await);
    assert!(matches!(err, ResolveError::Credentials { .. }));
}

#[tokio::test]
async fn test_no_credentials_means_ambient_auth() {
    let env = Arc::new(MapEnv::new());
    let resolved = assert_ok!(resolver(&env).resolve_credentials(&ResolverOptions::default()).await);
    assert!(resolved.is_none());
}

#[tokio::test]
async fn test_facades_built_from_resolver() {
    let env = Arc::new(MapEnv::new().with("GOOGLE_CLOUD_PROJECT", "env-project"));
    let resolver = resolver(&env);

    let secrets = assert_ok!(SecretManagerService::with_resolver(&resolver, SecretManagerOptions::default()).await);
    assert_eq!(secrets.project_id(), "env-project");
    assert!(!secrets.cache().is_enabled());

    let options = ParameterManagerOptions {
        credentials_path: Some(fixture("authorized_user.json")),
        ..ParameterManagerOptions::for_project("explicit-project").with_cache(60)
    };
    let parameters = assert_ok!(ParameterManagerService::with_resolver(&resolver, options).await);
    assert_eq!(parameters.project_id(), "explicit-project");
    assert_eq!(parameters.location(), "global");
    assert_eq!(parameters.cache().ttl_seconds(), 60);
}

#[tokio::test]
async fn test_facade_construction_reports_bad_credentials() {
    let env = Arc::new(MapEnv::new());
    let options = SecretManagerOptions {
        credentials_path: Some(PathBuf::from("/definitely/missing.json")),
        ..SecretManagerOptions::for_project("p")
    };
    match SecretManagerService::with_resolver(&resolver(&env), options).await {
        Err(err) => assert_eq!(err.kind(), ErrorKind::InvalidValue),
        Ok(_) => panic!("service built from a missing credentials file"),
    }
}
