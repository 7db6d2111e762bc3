/// Logger factory
///
/// Builds a `tracing` subscriber for one of the supported logger types:
///
/// - `stream`: human-readable lines on stderr
/// - `file`: human-readable lines appended to `LOG_FILE`
/// - `cloud`: Google Cloud structured JSON on stdout
/// - `both`: stream and file together
///
/// `LOG_SAMPLE_RATE` thins out every type except `stream`.
pub mod gcloud;

pub use gcloud::{sanitize, CloudLogContext, GcloudLayer};

use std::fs::{self, File, OpenOptions};
use std::io;
use std::sync::{Arc, Mutex};
use tracing::level_filters::LevelFilter;
use tracing::{info, Metadata, Subscriber};
use tracing_subscriber::filter::{filter_fn, EnvFilter, FilterFn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, Layer, Registry};

use crate::config::{LoggingConfig, SpartanConfig};
use crate::env::{EnvSource, ProcessEnv};
use crate::error::LoggingError;

pub type BoxedSubscriber = Box<dyn Subscriber + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerType {
    Stream,
    File,
    Cloud,
    Both,
}

impl LoggerType {
    pub const SUPPORTED: [&'static str; 4] = ["stream", "file", "cloud", "both"];

    pub fn parse(value: &str) -> Result<Self, LoggingError> {
        match value.trim().to_lowercase().as_str() {
            "stream" => Ok(LoggerType::Stream),
            "file" => Ok(LoggerType::File),
            "cloud" => Ok(LoggerType::Cloud),
            "both" => Ok(LoggerType::Both),
            other => Err(LoggingError::UnknownType {
                requested: other.to_string(),
                supported: Self::SUPPORTED
                    .iter()
                    .map(|t| format!("'{}'", t))
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoggerType::Stream => "stream",
            LoggerType::File => "file",
            LoggerType::Cloud => "cloud",
            LoggerType::Both => "both",
        }
    }

    /// Whether `LOG_SAMPLE_RATE` applies
    pub fn is_sampled(&self) -> bool {
        !matches!(self, LoggerType::Stream)
    }
}

/// Map a level name (`DEBUG`, `INFO`, `WARNING`, `ERROR`, `CRITICAL`, ...)
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    match level.trim().to_uppercase().as_str() {
        "TRACE" => Ok(LevelFilter::TRACE),
        "DEBUG" => Ok(LevelFilter::DEBUG),
        "INFO" => Ok(LevelFilter::INFO),
        "WARN" | "WARNING" => Ok(LevelFilter::WARN),
        "ERROR" | "CRITICAL" => Ok(LevelFilter::ERROR),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}

fn sampler(rate: f64) -> FilterFn<impl Fn(&Metadata<'_>) -> bool> {
    filter_fn(move |_| rate >= 1.0 || rand::random::<f64>() < rate)
}

/// Creates subscribers from environment configuration
pub struct LoggerFactory {
    env: Arc<dyn EnvSource>,
    config: LoggingConfig,
}

impl LoggerFactory {
    pub fn new(env: Arc<dyn EnvSource>) -> Self {
        let config = SpartanConfig::from_env(env.as_ref()).logging;
        Self { env, config }
    }

    pub fn from_process_env() -> Self {
        Self::new(Arc::new(ProcessEnv::new()))
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// Explicit type, else `LOGGER_TYPE`, else `LOG_CHANNEL`, else `file`
    pub fn resolve_type(&self, explicit: Option<&str>) -> Result<LoggerType, LoggingError> {
        LoggerType::parse(explicit.unwrap_or(&self.config.logger_type))
    }

    /// `RUST_LOG` directives win over the level
    fn filter(&self, level: Option<&str>) -> Result<EnvFilter, LoggingError> {
        let level = parse_level(level.unwrap_or(&self.config.level))?;
        match self.env.get("RUST_LOG") {
            Some(directives) => EnvFilter::try_new(&directives)
                .map_err(|e| LoggingError::InvalidLevel(format!("{} ({})", directives, e))),
            None => Ok(EnvFilter::default().add_directive(level.into())),
        }
    }

    pub fn cloud_context(&self, service_name: &str) -> CloudLogContext {
        let project_id = self
            .env
            .get("GCP_PROJECT")
            .or_else(|| self.env.get("GOOGLE_CLOUD_PROJECT"));
        CloudLogContext {
            service: service_name.to_string(),
            environment: self.env.get_or("APP_ENVIRONMENT", "production"),
            version: self.env.get_or("APP_VERSION", "unknown"),
            trace: gcloud::trace_resource(
                self.env.get("HTTP_X_CLOUD_TRACE_CONTEXT").as_deref(),
                project_id.as_deref(),
            ),
        }
    }

    fn open_log_file(&self) -> Result<File, LoggingError> {
        let path = &self.config.file_path;
        let file_error = |source: io::Error| LoggingError::File {
            path: path.display().to_string(),
            source,
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(&file_error)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(&file_error)
    }

    /// Build a subscriber without installing it
    pub fn build(
        &self,
        service_name: &str,
        level: Option<&str>,
        logger_type: Option<&str>,
    ) -> Result<BoxedSubscriber, LoggingError> {
        let kind = self.resolve_type(logger_type)?;
        let filter = self.filter(level)?;
        let rate = if kind.is_sampled() {
            self.config.sample_rate
        } else {
            1.0
        };

        let stream = matches!(kind, LoggerType::Stream | LoggerType::Both).then(|| {
            fmt::layer()
                .with_writer(io::stderr)
                .with_filter(sampler(rate))
        });
        let file = match kind {
            LoggerType::File | LoggerType::Both => Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(self.open_log_file()?))
                    .with_filter(sampler(rate)),
            ),
            _ => None,
        };
        let cloud = (kind == LoggerType::Cloud)
            .then(|| GcloudLayer::stdout(self.cloud_context(service_name)).with_filter(sampler(rate)));

        Ok(Box::new(
            Registry::default()
                .with(filter)
                .with(stream)
                .with(file)
                .with(cloud),
        ))
    }

    /// Build and install as the global default subscriber
    pub fn install(
        &self,
        service_name: &str,
        level: Option<&str>,
        logger_type: Option<&str>,
    ) -> Result<LoggerType, LoggingError> {
        let kind = self.resolve_type(logger_type)?;
        let subscriber = self.build(service_name, level, Some(kind.as_str()))?;
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))?;

        info!(
            service = service_name,
            logger_type = kind.as_str(),
            sample_rate = self.config.sample_rate,
            "Logger initialized"
        );
        Ok(kind)
    }
}
