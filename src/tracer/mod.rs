/// Tracing factory and segment helpers
///
/// A tracer records named segments with their processing time. The local
/// tracer appends JSON lines to a file; the cloud tracer emits each segment
/// as a structured event for the logging layer to ship.
pub mod cloud;
pub mod local;

pub use cloud::{CloudTracer, TRACE_TARGET};
pub use local::LocalTracer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::SpartanConfig;
use crate::env::{EnvSource, ProcessEnv};
use crate::error::TracingError;

pub const DEFAULT_SERVICE_NAME: &str = "default-service";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracerKind {
    Local,
    Cloud,
}

/// One finished segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub service: String,
    pub segment: String,
    pub metadata: Option<Value>,
    /// Seconds
    pub processing_time: f64,
    pub timestamp: DateTime<Utc>,
}

impl SegmentRecord {
    pub fn new(service: &str, segment: &str, metadata: Option<Value>, elapsed: Duration) -> Self {
        Self {
            service: service.to_string(),
            segment: segment.to_string(),
            metadata,
            processing_time: elapsed.as_secs_f64(),
            timestamp: Utc::now(),
        }
    }
}

pub trait Tracer: Send + Sync {
    fn service_name(&self) -> &str;

    fn kind(&self) -> TracerKind;

    fn record(&self, record: &SegmentRecord) -> Result<(), TracingError>;
}

fn with_error(metadata: Option<Value>, error: &dyn Display) -> Value {
    let mut value = metadata.unwrap_or_else(|| json!({}));
    match value.as_object_mut() {
        Some(map) => {
            map.insert("error".to_string(), json!(error.to_string()));
            value
        }
        None => json!({ "metadata": value, "error": error.to_string() }),
    }
}

impl dyn Tracer {
    /// Record a segment; a tracer failure never fails the traced work
    pub fn emit(&self, segment: &str, metadata: Option<Value>, elapsed: Duration) {
        let record = SegmentRecord::new(self.service_name(), segment, metadata, elapsed);
        if let Err(err) = self.record(&record) {
            warn!(segment, error = %err, "Failed to record trace segment");
        }
    }

    fn finish<T, E: Display>(&self, name: &str, metadata: Option<Value>, started: Instant, result: &Result<T, E>) {
        match result {
            Ok(_) => self.emit(name, metadata, started.elapsed()),
            Err(err) => self.emit(
                &format!("{}_error", name),
                Some(with_error(metadata, err)),
                started.elapsed(),
            ),
        }
    }

    /// Run `f` inside a named segment
    pub fn create_segment<T, E, F>(&self, name: &str, metadata: Option<Value>, f: F) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        let started = Instant::now();
        let result = f();
        self.finish(name, metadata, started, &result);
        result
    }

    pub async fn create_segment_async<T, E, Fut>(&self, name: &str, metadata: Option<Value>, fut: Fut) -> Result<T, E>
    where
        E: Display,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let result = fut.await;
        self.finish(name, metadata, started, &result);
        result
    }

    pub fn capture_method<T, E, F>(&self, name: &str, f: F) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        self.create_segment(name, None, f)
    }

    pub async fn capture_method_async<T, E, Fut>(&self, name: &str, fut: Fut) -> Result<T, E>
    where
        E: Display,
        Fut: Future<Output = Result<T, E>>,
    {
        self.create_segment_async(name, None, fut).await
    }

    /// Trace a handler invocation: `lambda_handler` on entry, then
    /// `lambda_handler_response` or `lambda_handler_error`
    pub fn capture_lambda_handler<T, E, F>(&self, event: &Value, handler: F) -> Result<T, E>
    where
        E: Display,
        F: FnOnce(&Value) -> Result<T, E>,
    {
        self.emit("lambda_handler", Some(json!({ "event": event })), Duration::ZERO);
        let started = Instant::now();
        let result = handler(event);
        self.finish_handler(started, &result);
        result
    }

    pub async fn capture_lambda_handler_async<T, E, Fut>(&self, event: &Value, fut: Fut) -> Result<T, E>
    where
        E: Display,
        Fut: Future<Output = Result<T, E>>,
    {
        self.emit("lambda_handler", Some(json!({ "event": event })), Duration::ZERO);
        let started = Instant::now();
        let result = fut.await;
        self.finish_handler(started, &result);
        result
    }

    fn finish_handler<T, E: Display>(&self, started: Instant, result: &Result<T, E>) {
        match result {
            Ok(_) => self.emit("lambda_handler_response", None, started.elapsed()),
            Err(err) => self.emit(
                "lambda_handler_error",
                Some(json!({ "error": err.to_string() })),
                started.elapsed(),
            ),
        }
    }
}

/// Chooses and builds a tracer
pub struct TracerFactory {
    env: Arc<dyn EnvSource>,
    tracer_type: Option<String>,
    trace_dir: PathBuf,
    environment: String,
}

impl TracerFactory {
    pub fn new(env: Arc<dyn EnvSource>) -> Self {
        let config = SpartanConfig::from_env(env.as_ref());
        Self {
            env,
            tracer_type: config.tracing.tracer_type,
            trace_dir: config.tracing.trace_dir,
            environment: config.app.environment.to_lowercase(),
        }
    }

    pub fn from_process_env() -> Self {
        Self::new(Arc::new(ProcessEnv::new()))
    }

    /// Explicit name, else `APP_NAME`, else `default-service`; trimmed
    pub fn service_name(&self, explicit: Option<&str>) -> Result<String, TracingError> {
        let name = explicit
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.env.get_or("APP_NAME", DEFAULT_SERVICE_NAME));
        let name = name.trim();
        if name.is_empty() {
            return Err(TracingError::InvalidServiceName);
        }
        Ok(name.to_string())
    }

    /// Explicit type, else `TRACER_TYPE`, else local only when
    /// `APP_ENVIRONMENT` is `local`
    pub fn resolve_kind(&self, explicit: Option<&str>) -> Result<TracerKind, TracingError> {
        let chosen = explicit
            .map(str::to_lowercase)
            .filter(|t| !t.is_empty())
            .or_else(|| self.tracer_type.clone());

        match chosen.as_deref() {
            Some("local") => Ok(TracerKind::Local),
            Some("cloud") | Some("aws") | Some("xray") => Ok(TracerKind::Cloud),
            Some(other) => Err(TracingError::UnknownType(other.to_string())),
            None if self.environment == "local" => Ok(TracerKind::Local),
            None => Ok(TracerKind::Cloud),
        }
    }

    pub fn create(&self, service_name: Option<&str>, tracer_type: Option<&str>) -> Result<Arc<dyn Tracer>, TracingError> {
        let service = self.service_name(service_name)?;
        let kind = self.resolve_kind(tracer_type)?;
        debug!(service = %service, kind = ?kind, "Creating tracer");

        Ok(match kind {
            TracerKind::Local => Arc::new(LocalTracer::new(&service, &self.trace_dir)?),
            TracerKind::Cloud => Arc::new(CloudTracer::new(&service)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        segments: Mutex<Vec<SegmentRecord>>,
    }

    impl Tracer for Recording {
        fn service_name(&self) -> &str {
            "svc"
        }

        fn kind(&self) -> TracerKind {
            TracerKind::Local
        }

        fn record(&self, record: &SegmentRecord) -> Result<(), TracingError> {
            self.segments.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn names(tracer: &Recording) -> Vec<String> {
        tracer
            .segments
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.segment.clone())
            .collect()
    }

    fn factory(env: MapEnv) -> TracerFactory {
        TracerFactory::new(Arc::new(env))
    }

    #[test]
    fn test_explicit_type_wins() {
        let env = MapEnv::new()
            .with("TRACER_TYPE", "cloud")
            .with("APP_ENVIRONMENT", "production");
        assert_eq!(factory(env).resolve_kind(Some("LOCAL")).unwrap(), TracerKind::Local);
    }

    #[test]
    fn test_environment_fallback() {
        assert_eq!(factory(MapEnv::new()).resolve_kind(None).unwrap(), TracerKind::Local);

        let env = MapEnv::new().with("APP_ENVIRONMENT", "production");
        assert_eq!(factory(env).resolve_kind(None).unwrap(), TracerKind::Cloud);

        let env = MapEnv::new().with("TRACER_TYPE", "xray");
        assert_eq!(factory(env).resolve_kind(None).unwrap(), TracerKind::Cloud);
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let err = factory(MapEnv::new()).resolve_kind(Some("zipkin")).unwrap_err();
        assert!(matches!(err, TracingError::UnknownType(t) if t == "zipkin"));
    }

    #[test]
    fn test_service_name_resolution() {
        let factory = factory(MapEnv::new().with("APP_NAME", " orders "));
        assert_eq!(factory.service_name(None).unwrap(), "orders");
        assert_eq!(factory.service_name(Some("billing")).unwrap(), "billing");
        assert!(matches!(factory.service_name(Some("   ")), Err(TracingError::InvalidServiceName)));
    }

    #[test]
    fn test_segment_success_and_error() {
        let recording = Arc::new(Recording::default());
        let tracer: Arc<dyn Tracer> = recording.clone();

        let ok: Result<u32, String> = tracer.create_segment("load", Some(json!({"id": 1})), || Ok(7));
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> = tracer.capture_method("save", || Err("disk full".to_string()));
        assert_eq!(err, Err("disk full".to_string()));

        assert_eq!(names(&recording), vec!["load", "save_error"]);
        let segments = recording.segments.lock().unwrap();
        assert_eq!(segments[0].metadata, Some(json!({"id": 1})));
        assert_eq!(segments[1].metadata, Some(json!({"error": "disk full"})));
    }

    #[test]
    fn test_lambda_handler_segments() {
        let recording = Arc::new(Recording::default());
        let tracer: Arc<dyn Tracer> = recording.clone();
        let event = json!({"path": "/orders"});

        let response: Result<&str, String> = tracer.capture_lambda_handler(&event, |_| Ok("done"));
        assert_eq!(response, Ok("done"));
        let failed: Result<(), String> = tracer.capture_lambda_handler(&event, |_| Err("bad".into()));
        assert!(failed.is_err());

        assert_eq!(
            names(&recording),
            vec![
                "lambda_handler",
                "lambda_handler_response",
                "lambda_handler",
                "lambda_handler_error"
            ]
        );
    }

    #[tokio::test]
    async fn test_async_segment() {
        let recording = Arc::new(Recording::default());
        let tracer: Arc<dyn Tracer> = recording.clone();

        let result: Result<u32, String> = tracer
            .create_segment_async("fetch", None, async { Ok(3) })
            .await;
        assert_eq!(result, Ok(3));
        assert_eq!(names(&recording), vec!["fetch"]);
    }
}
