/// Configuration management for the Spartan GCP services
use crate::env::{flag_or, parse_or, EnvSource, ProcessEnv};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
/// One year
pub const MAX_CACHE_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;
pub const DEFAULT_TASKS_LOCATION: &str = "us-central1";
pub const DEFAULT_PARAMETER_LOCATION: &str = "global";
pub const METADATA_PROJECT_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/project/project-id";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpartanConfig {
    pub app: AppConfig,
    pub logging: LoggingConfig,
    pub tracing: TracingConfig,
    pub cache: CacheConfig,
    pub tasks: TasksConfig,
    pub resolver: ResolverConfig,
}

/// Application identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub environment: String,
    pub version: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// stream, file, cloud or both
    pub logger_type: String,
    pub level: String,
    pub sample_rate: f64,
    pub file_path: PathBuf,
}

/// Tracing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    pub tracer_type: Option<String>,
    pub trace_dir: PathBuf,
}

/// Read-cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable caching (default: false)
    pub enabled: bool,
    /// Entry lifetime in seconds (default: 300 = 5 minutes)
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
        }
    }
}

/// Cloud Tasks configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    pub project_id: Option<String>,
    pub location: String,
    /// Overrides the Cloud Functions URL built from location/project/service
    pub base_url: Option<String>,
    pub service_name: String,
}

/// Settings for the best-effort project probes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub gcloud_binary: String,
    pub gcloud_timeout: Duration,
    pub metadata_url: String,
    pub metadata_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            gcloud_binary: "gcloud".to_string(),
            gcloud_timeout: Duration::from_secs(5),
            metadata_url: METADATA_PROJECT_URL.to_string(),
            metadata_timeout: Duration::from_secs(2),
        }
    }
}

impl ResolverConfig {
    pub fn from_env(env: &dyn EnvSource) -> Self {
        let defaults = Self::default();
        Self {
            gcloud_binary: env.get_or("SPARTAN_GCLOUD_BIN", &defaults.gcloud_binary),
            gcloud_timeout: Duration::from_secs(parse_or(env, "SPARTAN_GCLOUD_TIMEOUT_SECS", 5)),
            metadata_url: env.get_or("SPARTAN_METADATA_PROJECT_URL", &defaults.metadata_url),
            metadata_timeout: Duration::from_secs(parse_or(
                env,
                "SPARTAN_METADATA_TIMEOUT_SECS",
                2,
            )),
        }
    }
}

impl SpartanConfig {
    /// Load configuration from the process environment (and `.env`)
    pub fn from_process_env() -> Self {
        Self::from_env(&ProcessEnv::new())
    }

    /// Load configuration from an environment source
    pub fn from_env(env: &dyn EnvSource) -> Self {
        let logger_type = env
            .get("LOGGER_TYPE")
            .or_else(|| env.get("LOG_CHANNEL"))
            .unwrap_or_else(|| "file".to_string())
            .to_lowercase();

        let tasks_location = env.get_or("GCP_LOCATION", DEFAULT_TASKS_LOCATION);

        SpartanConfig {
            app: AppConfig {
                name: env.get_or("APP_NAME", "spartan"),
                environment: env.get_or("APP_ENVIRONMENT", "local"),
                version: env.get_or("APP_VERSION", "0.1.0"),
            },
            logging: LoggingConfig {
                logger_type,
                level: env.get_or("LOG_LEVEL", "INFO"),
                sample_rate: parse_or(env, "LOG_SAMPLE_RATE", 1.0),
                file_path: env
                    .get_or("LOG_FILE", "storage/logs/spartan.log")
                    .into(),
            },
            tracing: TracingConfig {
                tracer_type: env.get("TRACER_TYPE").map(|t| t.to_lowercase()),
                trace_dir: env.get_or("TRACE_DIR", "storage/traces").into(),
            },
            cache: CacheConfig {
                enabled: flag_or(env, "SPARTAN_CACHE_ENABLED", false),
                ttl_seconds: parse_or(env, "SPARTAN_CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL_SECONDS),
            },
            tasks: TasksConfig {
                project_id: env.get("GCP_PROJECT_ID"),
                location: tasks_location,
                base_url: env.get("CLOUD_TASKS_BASE_URL"),
                service_name: env.get_or("SERVICE_NAME", "spartan-function"),
            },
            resolver: ResolverConfig::from_env(env),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.logging.sample_rate) {
            return Err(ConfigError::Invalid {
                key: "LOG_SAMPLE_RATE".to_string(),
                message: "must be between 0.0 and 1.0".to_string(),
            });
        }

        if self.cache.enabled && self.cache.ttl_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "SPARTAN_CACHE_TTL_SECONDS".to_string(),
                message: "must be positive when caching is enabled".to_string(),
            });
        }

        if self.cache.ttl_seconds > MAX_CACHE_TTL_SECONDS {
            return Err(ConfigError::Invalid {
                key: "SPARTAN_CACHE_TTL_SECONDS".to_string(),
                message: format!("must be at most {}", MAX_CACHE_TTL_SECONDS),
            });
        }

        if self.tasks.location.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "GCP_LOCATION".to_string(),
                message: "cannot be blank".to_string(),
            });
        }

        if self.app.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "APP_NAME".to_string(),
                message: "cannot be blank".to_string(),
            });
        }

        Ok(())
    }
}
