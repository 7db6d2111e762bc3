/// Error types for the Spartan GCP services
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Which facade produced a [`DomainError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ServiceKind {
    SecretManager,
    ParameterManager,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::SecretManager => "secret_manager",
            ServiceKind::ParameterManager => "parameter_manager",
        }
    }

    /// Human label for the managed resource ("Secret", "Parameter")
    pub fn resource_label(&self) -> &'static str {
        match self {
            ServiceKind::SecretManager => "Secret",
            ServiceKind::ParameterManager => "Parameter",
        }
    }

    /// Context key carrying the resource name
    pub fn name_key(&self) -> &'static str {
        match self {
            ServiceKind::SecretManager => "secret_name",
            ServiceKind::ParameterManager => "parameter_name",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceKind::SecretManager => "Secret Manager",
            ServiceKind::ParameterManager => "Parameter Manager",
        }
    }
}

/// Domain error kinds shared by Secret Manager and Parameter Manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    NotFound,
    /// Never produced by the error mapper, which reports a conflicting
    /// create as `Generic` with an "already exists" message
    AlreadyExists,
    AccessDenied,
    VersionNotFound,
    InvalidName,
    InvalidValue,
    Connection,
    QuotaExceeded,
    InternalError,
    Unavailable,
    Timeout,
    Generic,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::VersionNotFound => "version_not_found",
            ErrorKind::InvalidName => "invalid_name",
            ErrorKind::InvalidValue => "invalid_value",
            ErrorKind::Connection => "connection",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::InternalError => "internal_error",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Generic => "generic",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context keys that must never be logged or carried on an error
pub const CONFIDENTIAL_KEYS: [&str; 3] = ["secret_value", "payload", "data"];

/// Key/value context attached to a failed operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorContext(BTreeMap<String, String>);

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Copy of the context with confidential keys dropped
    pub fn redacted(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| !CONFIDENTIAL_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", k, v)?;
            first = false;
        }
        Ok(())
    }
}

/// Error raised by the Secret Manager and Parameter Manager facades
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DomainError {
    service: ServiceKind,
    kind: ErrorKind,
    message: String,
    context: ErrorContext,
}

impl DomainError {
    pub fn new(service: ServiceKind, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            service,
            kind,
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Attach context; confidential keys are dropped on the way in
    pub fn with_context(mut self, context: &ErrorContext) -> Self {
        self.context = context.redacted();
        self
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound | ErrorKind::VersionNotFound)
    }

    pub fn generic(service: ServiceKind, message: impl Into<String>) -> Self {
        Self::new(service, ErrorKind::Generic, message)
    }

    pub fn invalid_value(service: ServiceKind, message: impl Into<String>) -> Self {
        Self::new(service, ErrorKind::InvalidValue, message)
    }
}

/// Result type alias for Secret Manager and Parameter Manager operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Errors raised by the Cloud Tasks facade
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TasksError {
    /// Base error for queue and listing failures
    #[error("{0}")]
    Operation(String),

    #[error("{0}")]
    CreationFailed(String),

    #[error("{0}")]
    TaskNotFound(String),

    #[error("{0}")]
    QueueNotFound(String),

    #[error("{0}")]
    InvalidPayload(String),

    #[error("{0}")]
    SchedulingFailed(String),
}

impl TasksError {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TasksError::Operation(_) => "operation",
            TasksError::CreationFailed(_) => "creation_failed",
            TasksError::TaskNotFound(_) => "task_not_found",
            TasksError::QueueNotFound(_) => "queue_not_found",
            TasksError::InvalidPayload(_) => "invalid_payload",
            TasksError::SchedulingFailed(_) => "scheduling_failed",
        }
    }
}

pub type TasksResult<T> = Result<T, TasksError>;

/// Classification of a failed backend call.
///
/// The first block mirrors the canonical RPC status codes; the rest are
/// client-side failures raised before or around the call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BackendCode {
    NotFound,
    PermissionDenied,
    Unauthenticated,
    AlreadyExists,
    FailedPrecondition,
    InvalidArgument,
    ResourceExhausted,
    DeadlineExceeded,
    Unavailable,
    Internal,
    Aborted,
    OutOfRange,
    Unimplemented,
    DataLoss,
    Cancelled,
    Unknown,
    RetryExhausted,
    TooManyRequests,
    Connection,
    Io,
    Timeout,
    /// Anything else, labelled with the originating error type
    Other(String),
}

impl BackendCode {
    /// Parse a canonical status string such as `NOT_FOUND`
    pub fn from_status(status: &str) -> Option<Self> {
        let code = match status {
            "NOT_FOUND" => BackendCode::NotFound,
            "PERMISSION_DENIED" => BackendCode::PermissionDenied,
            "UNAUTHENTICATED" => BackendCode::Unauthenticated,
            "ALREADY_EXISTS" => BackendCode::AlreadyExists,
            "FAILED_PRECONDITION" => BackendCode::FailedPrecondition,
            "INVALID_ARGUMENT" => BackendCode::InvalidArgument,
            "RESOURCE_EXHAUSTED" => BackendCode::ResourceExhausted,
            "DEADLINE_EXCEEDED" => BackendCode::DeadlineExceeded,
            "UNAVAILABLE" => BackendCode::Unavailable,
            "INTERNAL" => BackendCode::Internal,
            "ABORTED" => BackendCode::Aborted,
            "OUT_OF_RANGE" => BackendCode::OutOfRange,
            "UNIMPLEMENTED" => BackendCode::Unimplemented,
            "DATA_LOSS" => BackendCode::DataLoss,
            "CANCELLED" => BackendCode::Cancelled,
            "UNKNOWN" => BackendCode::Unknown,
            _ => return None,
        };
        Some(code)
    }

    /// Name used in logs as the original error type
    pub fn type_name(&self) -> &str {
        match self {
            BackendCode::NotFound => "NotFound",
            BackendCode::PermissionDenied => "PermissionDenied",
            BackendCode::Unauthenticated => "Unauthenticated",
            BackendCode::AlreadyExists => "AlreadyExists",
            BackendCode::FailedPrecondition => "FailedPrecondition",
            BackendCode::InvalidArgument => "InvalidArgument",
            BackendCode::ResourceExhausted => "ResourceExhausted",
            BackendCode::DeadlineExceeded => "DeadlineExceeded",
            BackendCode::Unavailable => "ServiceUnavailable",
            BackendCode::Internal => "InternalServerError",
            BackendCode::Aborted => "Aborted",
            BackendCode::OutOfRange => "OutOfRange",
            BackendCode::Unimplemented => "MethodNotImplemented",
            BackendCode::DataLoss => "DataLoss",
            BackendCode::Cancelled => "Cancelled",
            BackendCode::Unknown => "Unknown",
            BackendCode::RetryExhausted => "RetryError",
            BackendCode::TooManyRequests => "TooManyRequests",
            BackendCode::Connection => "ConnectionError",
            BackendCode::Io => "OSError",
            BackendCode::Timeout => "TimeoutError",
            BackendCode::Other(name) => name.as_str(),
        }
    }
}

impl fmt::Display for BackendCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Error returned by every backend call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BackendError {
    pub code: BackendCode,
    pub message: String,
}

impl BackendError {
    pub fn new(code: BackendCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendCode::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(BackendCode::AlreadyExists, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(BackendCode::FailedPrecondition, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(BackendCode::InvalidArgument, message)
    }

    /// Wrap an arbitrary error, keeping its short type name
    pub fn other<E: std::error::Error>(err: &E) -> Self {
        let full = std::any::type_name::<E>();
        let short = full.rsplit("::").next().unwrap_or(full);
        Self::new(BackendCode::Other(short.to_string()), err.to_string())
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::TimedOut => BackendCode::Timeout,
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected => BackendCode::Connection,
            _ => BackendCode::Io,
        };
        Self::new(code, err.to_string())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            BackendCode::Timeout
        } else if err.is_connect() {
            BackendCode::Connection
        } else if err.is_decode() {
            BackendCode::Internal
        } else {
            BackendCode::Other("reqwest::Error".to_string())
        };
        Self::new(code, err.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Credential material that could not be loaded
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Failed to read credentials file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid credentials JSON: {0}")]
    Parse(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),
}

/// Failures of the project/credential resolver
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(
        "Could not determine Google Cloud project ID (tried: {}). Set GOOGLE_CLOUD_PROJECT, \
         configure gcloud with 'gcloud config set project PROJECT_ID', or pass project_id explicitly",
        .attempted.join(", ")
    )]
    NoProject { attempted: Vec<String> },

    #[error("Failed to load credentials from {probe}: {source}")]
    Credentials {
        probe: String,
        #[source]
        source: CredentialsError,
    },

    #[error("{probe} failed: {message}")]
    Probe { probe: String, message: String },
}

impl ResolveError {
    /// Surface a resolver failure as a facade construction error
    pub fn into_domain(self, service: ServiceKind) -> DomainError {
        let kind = match &self {
            ResolveError::Credentials { .. } => ErrorKind::InvalidValue,
            _ => ErrorKind::Generic,
        };
        DomainError::new(service, kind, self.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Logger factory errors
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Unknown logger_type: '{requested}'. Must be one of: {supported}.")]
    UnknownType { requested: String, supported: String },

    #[error("Invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("Failed to open log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInstalled(String),
}

/// Tracer factory errors
#[derive(Error, Debug)]
pub enum TracingError {
    #[error("Unknown tracer_type override: '{0}'")]
    UnknownType(String),

    #[error("Invalid service name")]
    InvalidServiceName,

    #[error("Trace IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_redaction_drops_confidential_keys() {
        let ctx = ErrorContext::new()
            .with("secret_name", "db")
            .with("secret_value", "hunter2")
            .with("payload", "raw")
            .with("data", "{}");

        let safe = ctx.redacted();
        assert_eq!(safe.get("secret_name"), Some("db"));
        assert!(safe.get("secret_value").is_none());
        assert!(safe.get("payload").is_none());
        assert!(safe.get("data").is_none());
    }

    #[test]
    fn test_domain_error_context_is_redacted() {
        let ctx = ErrorContext::new().with("secret_value", "hunter2");
        let err = DomainError::generic(ServiceKind::SecretManager, "boom").with_context(&ctx);
        assert!(err.context().is_empty());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_backend_code_from_status() {
        assert_eq!(BackendCode::from_status("NOT_FOUND"), Some(BackendCode::NotFound));
        assert_eq!(
            BackendCode::from_status("RESOURCE_EXHAUSTED"),
            Some(BackendCode::ResourceExhausted)
        );
        assert_eq!(BackendCode::from_status("SOMETHING_ELSE"), None);
    }

    #[test]
    fn test_io_error_classification() {
        let timeout: BackendError =
            std::io::Error::new(std::io::ErrorKind::TimedOut, "slow").into();
        assert_eq!(timeout.code, BackendCode::Timeout);

        let refused: BackendError =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "nope").into();
        assert_eq!(refused.code, BackendCode::Connection);

        let other: BackendError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert_eq!(other.code, BackendCode::Io);
    }

    #[test]
    fn test_other_keeps_short_type_name() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let backend = BackendError::other(&err);
        assert_eq!(backend.code, BackendCode::Other("Error".to_string()));
    }
}
