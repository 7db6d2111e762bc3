/// Logger and tracer factories wired together
use serde_json::json;
use std::fs;
use std::sync::Arc;

use spartan_gcp::tracer::SegmentRecord;
use spartan_gcp::{LoggerFactory, LoggerType, MapEnv, Tracer, TracerFactory, TracerKind, TracingError};

#[test]
fn test_cloud_tracer_segments_land_in_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("app.log");
    let env = Arc::new(
        MapEnv::new()
            .with("LOG_FILE", log_path.to_str().unwrap())
            .with("LOG_LEVEL", "INFO")
            .with("TRACER_TYPE", "cloud")
            .with("APP_NAME", "checkout"),
    );

    let logger = LoggerFactory::new(env.clone());
    assert_eq!(logger.resolve_type(None).unwrap(), LoggerType::File);
    let subscriber = logger.build("checkout", None, None).unwrap();

    let tracer = TracerFactory::new(env).create(None, None).unwrap();
    assert_eq!(tracer.kind(), TracerKind::Cloud);
    assert_eq!(tracer.service_name(), "checkout");

    tracing::subscriber::with_default(subscriber, || {
        let total: Result<u32, String> = tracer.capture_method("compute_total", || Ok(42));
        assert_eq!(total, Ok(42));
    });

    let contents = fs::read_to_string(&log_path).unwrap();
    assert!(contents.contains("Trace segment"));
    assert!(contents.contains("compute_total"));
}

#[tokio::test]
async fn test_local_tracer_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let env = Arc::new(MapEnv::new().with("TRACE_DIR", dir.path().to_str().unwrap()));

    let tracer: Arc<dyn Tracer> = TracerFactory::new(env).create(Some("worker"), None).unwrap();
    assert_eq!(tracer.kind(), TracerKind::Local);

    let event = json!({"job": 9});
    let handled: Result<&str, String> = tracer
        .capture_lambda_handler_async(&event, async { Ok("ok") })
        .await;
    assert_eq!(handled, Ok("ok"));

    let segments: Vec<SegmentRecord> = fs::read_to_string(dir.path().join("worker.trace"))
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let names: Vec<&str> = segments.iter().map(|s| s.segment.as_str()).collect();
    assert_eq!(names, vec!["lambda_handler", "lambda_handler_response"]);
    assert_eq!(segments[0].metadata, Some(json!({"event": {"job": 9}})));
    assert!(segments.iter().all(|s| s.service == "worker"));
}

#[test]
fn test_unknown_tracer_type_is_rejected() {
    let env = Arc::new(MapEnv::new().with("TRACER_TYPE", "jaeger"));
    match TracerFactory::new(env).create(None, None) {
        Err(TracingError::UnknownType(requested)) => assert_eq!(requested, "jaeger"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("tracer built for an unknown type"),
    }
}

#[test]
fn test_cloud_context_and_redaction() {
    let env = Arc::new(MapEnv::new().with("APP_ENVIRONMENT", "staging"));
    let context = LoggerFactory::new(env).cloud_context("api");
    assert_eq!(context.environment, "staging");

    let mut fields = json!({"password": "x", "nested": {"token": "y"}});
    spartan_gcp::logging::sanitize(&mut fields);
    assert_eq!(fields, json!({"password": "[REDACTED]", "nested": {"token": "[REDACTED]"}}));
}
