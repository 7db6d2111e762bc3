/// Secret Manager facade against the in-memory backend
use std::sync::Arc;

use spartan_gcp::backend::memory::MemorySecretBackend;
use spartan_gcp::config::CacheConfig;
use spartan_gcp::secret_manager::{SecretCreateRequest, SecretVersionCreateRequest};
use spartan_gcp::{ErrorKind, SecretManagerService};
use tokio_test::{assert_err, assert_ok};

fn service(cache: bool) -> (Arc<MemorySecretBackend>, SecretManagerService) {
    let backend = Arc::new(MemorySecretBackend::new());
    let service = SecretManagerService::with_backend(
        backend.clone(),
        "test-project",
        &CacheConfig {
            enabled: cache,
            ttl_seconds: 300,
        },
    );
    (backend, service)
}

#[tokio::test]
async fn test_db_password_lifecycle() {
    let (_, service) = service(false);

    let created = assert_ok!(service.create_secret(SecretCreateRequest::new("db-password", "p@ss1")).await);
    assert_eq!(created.version, "1");

    let added = assert_ok!(
        service
            .add_secret_version(SecretVersionCreateRequest::new("db-password", "p@ss2"))
            .await
    );
    assert_eq!(added.version, "2");

    let latest = assert_ok!(service.get_secret("db-password", None).await);
    assert_eq!(latest.secret_value, "p@ss2");
    assert_eq!(latest.version, "2");

    let first = assert_ok!(service.get_secret("db-password", Some("1")).await);
    assert_eq!(first.secret_value, "p@ss1");

    assert_ok!(service.disable_secret_version("db-password", "1").await);
    let err = assert_err!(service.get_secret("db-password", Some("1")).await);
    assert_eq!(err.kind(), ErrorKind::VersionNotFound);

    // Disabling an older version leaves latest readable
    let latest = assert_ok!(service.get_secret("db-password", None).await);
    assert_eq!(latest.secret_value, "p@ss2");
}

#[tokio::test]
async fn test_cached_reads_hit_backend_once_per_ttl_window() {
    let (backend, service) = service(true);
    assert_ok!(service.create_secret(SecretCreateRequest::new("x", "value")).await);

    assert_ok!(service.get_secret("x", None).await);
    assert_ok!(service.get_secret("x", None).await);
    assert_eq!(backend.calls("access_secret_version"), 1);

    assert!(service.cache().expire("x:latest"));
    assert_ok!(service.get_secret("x", None).await);
    assert_eq!(backend.calls("access_secret_version"), 2);
}

#[tokio::test]
async fn test_disabling_a_version_keeps_other_pinned_entries() {
    let (backend, service) = service(true);
    assert_ok!(service.create_secret(SecretCreateRequest::new("x", "v1")).await);
    assert_ok!(
        service
            .add_secret_version(SecretVersionCreateRequest::new("x", "v2"))
            .await
    );

    assert_ok!(service.get_secret("x", Some("1")).await);
    assert_ok!(service.get_secret("x", Some("2")).await);
    assert_ok!(service.get_secret("x", None).await);
    assert_eq!(backend.calls("access_secret_version"), 3);

    assert_ok!(service.disable_secret_version("x", "1").await);
    assert!(!service.cache().contains_key("x:1"));
    assert!(!service.cache().contains_key("x:latest"));
    assert!(service.cache().contains_key("x:2"));

    assert_eq!(assert_ok!(service.get_secret("x", Some("2")).await).secret_value, "v2");
    assert_eq!(backend.calls("access_secret_version"), 3);
}

#[tokio::test]
async fn test_new_version_invalidates_cached_latest() {
    let (backend, service) = service(true);
    assert_ok!(service.create_secret(SecretCreateRequest::new("api-key", "old")).await);
    assert_eq!(assert_ok!(service.get_secret("api-key", None).await).secret_value, "old");

    assert_ok!(
        service
            .add_secret_version(SecretVersionCreateRequest::new("api-key", "new"))
            .await
    );
    assert_eq!(assert_ok!(service.get_secret("api-key", None).await).secret_value, "new");
    assert_eq!(backend.calls("access_secret_version"), 2);
}

#[tokio::test]
async fn test_duplicate_and_missing_secrets() {
    let (_, service) = service(false);
    assert_ok!(service.create_secret(SecretCreateRequest::new("dup", "a")).await);

    let err = assert_err!(service.create_secret(SecretCreateRequest::new("dup", "b")).await);
    assert_eq!(err.kind(), ErrorKind::Generic);
    assert!(err.message().contains("already exists"));

    let err = assert_err!(service.get_secret("missing", None).await);
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert!(!assert_ok!(service.secret_exists("missing").await));
    assert!(assert_ok!(service.secret_exists("dup").await));
}

#[tokio::test]
async fn test_listing_and_metadata() {
    let (_, service) = service(false);
    for name in ["alpha", "beta", "gamma"] {
        assert_ok!(service.create_secret(SecretCreateRequest::new(name, "v")).await);
    }
    assert_ok!(
        service
            .add_secret_version(SecretVersionCreateRequest::new("beta", "v2"))
            .await
    );

    let page = assert_ok!(service.list_secrets(2, None).await);
    assert_eq!(page.secrets.len(), 2);
    let next = page.next_page_token.clone();
    assert!(next.is_some());
    let rest = assert_ok!(service.list_secrets(2, next.as_deref()).await);
    assert_eq!(rest.secrets.len(), 1);
    assert!(rest.next_page_token.is_none());

    let metadata = assert_ok!(service.get_secret_metadata("beta").await);
    assert_eq!(metadata.secret_name, "beta");
    assert_eq!(metadata.version_count, Some(2));
    assert_eq!(metadata.replication_policy, "automatic");
}

#[tokio::test]
async fn test_destroyed_version_is_unreadable() {
    let (_, service) = service(false);
    assert_ok!(service.create_secret(SecretCreateRequest::new("token", "t1")).await);
    assert_ok!(service.destroy_secret_version("token", "1").await);

    let err = assert_err!(service.get_secret("token", Some("1")).await);
    assert_eq!(err.kind(), ErrorKind::VersionNotFound);

    let err = assert_err!(service.enable_secret_version("token", "1").await);
    assert_ne!(err.kind(), ErrorKind::Generic);
}

#[tokio::test]
async fn test_blank_name_is_rejected_before_any_call() {
    let (backend, service) = service(false);
    let err = assert_err!(service.get_secret("   ", None).await);
    assert_eq!(err.kind(), ErrorKind::InvalidName);
    assert_eq!(backend.log().total(), 0);
}
