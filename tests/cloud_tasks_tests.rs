/// Cloud Tasks facade against the in-memory backend
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use spartan_gcp::backend::memory::MemoryTasksBackend;
use spartan_gcp::cloud_tasks::{QueueCreateRequest, TaskCreateRequest};
use spartan_gcp::{CloudTasksOptions, CloudTasksService, MapEnv, TaskSettings, TasksError};
use tokio_test::{assert_err, assert_ok};

async fn service_with_queue(queue: &str) -> (Arc<MemoryTasksBackend>, CloudTasksService) {
    let backend = Arc::new(MemoryTasksBackend::new());
    let settings = TaskSettings::new("test-project", "us-central1").with_base_url("https://worker.example.com/");
    let service = CloudTasksService::with_backend(backend.clone(), settings);
    assert_ok!(service.create_queue(QueueCreateRequest::new(queue)).await);
    (backend, service)
}

#[tokio::test]
async fn test_task_lifecycle() {
    let (backend, service) = service_with_queue("emails").await;

    let request = TaskCreateRequest::new("emails", "send", json!({"to": "user@example.com"}))
        .with_task_name("welcome-1")
        .with_headers(HashMap::from([("X-Trace".to_string(), "abc".to_string())]));
    let created = assert_ok!(service.create_task(request).await);
    assert!(created.task_name.ends_with("/queues/emails/tasks/welcome-1"));
    assert_eq!(created.relative_uri, "/send");

    let task = assert_ok!(service.get_task("emails", "welcome-1").await);
    assert_eq!(task.payload, json!({"to": "user@example.com"}));
    assert_eq!(task.relative_uri, "/send");
    assert_eq!(task.http_method, "POST");
    let headers = task.headers.unwrap_or_default();
    assert_eq!(headers.get("X-Trace").map(String::as_str), Some("abc"));
    assert_eq!(
        headers.get("Content-Type").map(String::as_str),
        Some("application/json")
    );

    let ran = assert_ok!(service.run_task("emails", "welcome-1").await);
    assert!(ran.success);
    assert_eq!(assert_ok!(service.get_task("emails", "welcome-1").await).dispatch_count, 1);

    let listed = assert_ok!(service.list_tasks("emails", 100, None).await);
    assert_eq!(listed.tasks.len(), 1);

    assert_ok!(service.delete_task("emails", "welcome-1").await);
    let err = assert_err!(service.get_task("emails", "welcome-1").await);
    assert!(matches!(err, TasksError::TaskNotFound(_)));
    assert_eq!(backend.calls("delete_task"), 1);
}

#[tokio::test]
async fn test_schedule_window() {
    let (backend, service) = service_with_queue("reports").await;

    let soon = Utc::now() + Duration::days(2);
    let created = assert_ok!(
        service
            .create_task(TaskCreateRequest::new("reports", "/build", json!({"id": 1})).with_schedule_time(soon))
            .await
    );
    assert_eq!(created.schedule_time, Some(soon));

    let too_far = Utc::now() + Duration::days(31);
    let err = assert_err!(
        service
            .create_task(TaskCreateRequest::new("reports", "/build", json!({"id": 2})).with_schedule_time(too_far))
            .await
    );
    assert!(matches!(err, TasksError::SchedulingFailed(_)));
    assert_eq!(backend.calls("create_task"), 1);
}

#[tokio::test]
async fn test_invalid_requests_never_reach_backend() {
    let (backend, service) = service_with_queue("jobs").await;

    let err = assert_err!(
        service
            .create_task(TaskCreateRequest::new("jobs", "/run", json!(["not", "an", "object"])))
            .await
    );
    assert!(matches!(err, TasksError::InvalidPayload(_)));

    let err = assert_err!(
        service
            .create_task(TaskCreateRequest::new("jobs", "/run", json!({})).with_http_method("TRACE"))
            .await
    );
    assert!(matches!(err, TasksError::InvalidPayload(_)));

    let err = assert_err!(
        service
            .create_queue(QueueCreateRequest {
                max_attempts: Some(0),
                ..QueueCreateRequest::new("bad")
            })
            .await
    );
    assert!(matches!(err, TasksError::InvalidPayload(_)));

    assert_eq!(backend.calls("create_task"), 0);
    assert_eq!(backend.calls("create_queue"), 1);
}

#[tokio::test]
async fn test_missing_queue_is_reported() {
    let (_, service) = service_with_queue("jobs").await;
    let err = assert_err!(
        service
            .create_task(TaskCreateRequest::new("nope", "/run", json!({})))
            .await
    );
    assert!(matches!(err, TasksError::QueueNotFound(_)));

    let err = assert_err!(service.get_queue("nope").await);
    assert!(matches!(err, TasksError::QueueNotFound(_)));
}

#[tokio::test]
async fn test_queue_management() {
    let (_, service) = service_with_queue("alpha").await;
    assert_ok!(
        service
            .create_queue(QueueCreateRequest {
                max_dispatches_per_second: Some(5.0),
                max_attempts: Some(3),
                ..QueueCreateRequest::new("beta")
            })
            .await
    );

    let beta = assert_ok!(service.get_queue("beta").await);
    assert_eq!(beta.queue_name, "beta");
    assert_eq!(beta.state, "RUNNING");
    assert_eq!(beta.max_attempts, Some(3));

    let queues = assert_ok!(service.list_queues(1, None).await);
    assert_eq!(queues.queues.len(), 1);
    assert!(queues.next_page_token.is_some());

    assert_ok!(
        service
            .create_task(TaskCreateRequest::new("beta", "/x", json!({})))
            .await
    );
    assert_ok!(service.purge_queue("beta").await);
    let beta = assert_ok!(service.get_queue("beta").await);
    assert_eq!(beta.stats_approximate_tasks, 0);
    assert!(beta.purge_time.is_some());

    assert_ok!(service.delete_queue("beta").await);
    assert!(matches!(
        assert_err!(service.delete_queue("beta").await),
        TasksError::QueueNotFound(_)
    ));
}

#[tokio::test]
async fn test_project_is_required() {
    let result = CloudTasksService::with_env(Arc::new(MapEnv::new()), CloudTasksOptions::default()).await;
    match result {
        Err(TasksError::Operation(message)) => assert_eq!(message, "GCP_PROJECT_ID is required"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("service built without a project"),
    }
}
