/// Google Cloud structured logging
///
/// One JSON object per event on stdout, using the field names Cloud Logging
/// recognizes (`severity`, `message`, `logging.googleapis.com/trace`,
/// `logging.googleapis.com/sourceLocation`).
use serde_json::{json, Map, Value};
use std::fmt;
use std::io::{self, Write};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};

pub const REDACTED: &str = "[REDACTED]";

/// Keys whose values never reach the log, compared case-insensitively
pub const SENSITIVE_KEYS: [&str; 13] = [
    "password",
    "token",
    "secret",
    "key",
    "auth",
    "credentials",
    "api_key",
    "access_token",
    "refresh_token",
    "private_key",
    "authorization",
    "cookie",
    "session",
];

const TRACE_FIELD: &str = "logging.googleapis.com/trace";
const SOURCE_LOCATION_FIELD: &str = "logging.googleapis.com/sourceLocation";

/// Redact sensitive keys, recursing into objects and arrays of objects
pub fn sanitize(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if SENSITIVE_KEYS.contains(&key.to_lowercase().as_str()) {
                    *entry = Value::String(REDACTED.to_string());
                } else {
                    sanitize(entry);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut().filter(|item| item.is_object()) {
                sanitize(item);
            }
        }
        _ => {}
    }
}

pub fn severity(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        _ => "DEBUG",
    }
}

/// `projects/{project}/traces/{trace_id}` from an
/// `X-Cloud-Trace-Context: TRACE_ID/SPAN_ID;o=1` header
pub fn trace_resource(header: Option<&str>, project_id: Option<&str>) -> Option<String> {
    let (header, project_id) = (header?, project_id?);
    let trace_id = header.split('/').next()?.split(';').next()?.trim();
    if trace_id.is_empty() {
        return None;
    }
    Some(format!("projects/{}/traces/{}", project_id, trace_id))
}

/// Fields stamped on every entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudLogContext {
    pub service: String,
    pub environment: String,
    pub version: String,
    pub trace: Option<String>,
}

impl CloudLogContext {
    fn include_source_location(&self) -> bool {
        self.environment != "production"
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let text = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.fields.insert(field.name().to_string(), Value::String(text));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), json!(value));
    }
}

/// Layer writing Cloud Logging JSON lines
pub struct GcloudLayer<W> {
    context: CloudLogContext,
    make_writer: W,
}

impl GcloudLayer<fn() -> io::Stdout> {
    pub fn stdout(context: CloudLogContext) -> Self {
        Self::new(context, io::stdout)
    }
}

impl<W> GcloudLayer<W>
where
    W: for<'a> MakeWriter<'a> + 'static,
{
    pub fn new(context: CloudLogContext, make_writer: W) -> Self {
        Self { context, make_writer }
    }

    /// The JSON entry for one event
    pub fn entry(&self, event: &Event<'_>) -> Value {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut fields = Value::Object(visitor.fields);
        sanitize(&mut fields);

        let mut entry = Map::new();
        entry.insert("severity".into(), json!(severity(metadata.level())));
        entry.insert("message".into(), json!(visitor.message.unwrap_or_default()));
        entry.insert("service".into(), json!(self.context.service));
        entry.insert("environment".into(), json!(self.context.environment));
        entry.insert("version".into(), json!(self.context.version));
        entry.insert("target".into(), json!(metadata.target()));
        if let Value::Object(fields) = fields {
            for (key, value) in fields {
                entry.entry(key).or_insert(value);
            }
        }

        if let Some(trace) = &self.context.trace {
            entry.insert(TRACE_FIELD.into(), json!(trace));
        }
        if self.context.include_source_location() {
            if let (Some(file), Some(line)) = (metadata.file(), metadata.line()) {
                entry.insert(
                    SOURCE_LOCATION_FIELD.into(),
                    json!({
                        "file": file,
                        "line": line.to_string(),
                        "function": metadata.module_path().unwrap_or("unknown"),
                    }),
                );
            }
        }

        Value::Object(entry)
    }
}

impl<S, W> Layer<S> for GcloudLayer<W>
where
    S: Subscriber,
    W: for<'a> MakeWriter<'a> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let entry = self.entry(event);
        let mut writer = self.make_writer.make_writer();
        if let Err(err) = writeln!(writer, "{}", entry) {
            eprintln!(
                "[{}] {} | error: {}",
                severity(event.metadata().level()),
                entry.get("message").and_then(Value::as_str).unwrap_or_default(),
                err
            );
        }
    }
}
