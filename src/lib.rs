/// Spartan GCP - service wrappers for Google Cloud
///
/// Typed facades over Secret Manager, Parameter Manager and Cloud Tasks,
/// with shared project and credential resolution, a TTL cache for reads,
/// uniform error mapping, and logger/tracer factories.

pub mod backend;
pub mod cache;
pub mod cloud_tasks;
pub mod config;
pub mod env;
pub mod error;
pub mod error_mapper;
pub mod logging;
pub mod metrics;
mod operation;
pub mod parameter_manager;
pub mod resolver;
pub mod secret_manager;
pub mod token;
pub mod tracer;
pub mod validation;

pub use cache::{CacheStats, TtlCache};
pub use cloud_tasks::{CloudTasksOptions, CloudTasksService, TaskSettings};
pub use config::SpartanConfig;
pub use env::{EnvSource, MapEnv, ProcessEnv};
pub use error::{
    DomainError, DomainResult, ErrorKind, LoggingError, ResolveError, ServiceKind, TasksError, TasksResult,
    TracingError,
};
pub use logging::{LoggerFactory, LoggerType};
pub use parameter_manager::{ParameterManagerOptions, ParameterManagerService};
pub use resolver::Resolver;
pub use secret_manager::{SecretManagerOptions, SecretManagerService};
pub use tracer::{Tracer, TracerFactory, TracerKind};
