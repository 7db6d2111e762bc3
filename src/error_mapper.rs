/// Translation of backend errors into domain errors
///
/// The mapping is a pure function of (error, operation, context): mapping the
/// same input twice yields equal errors. The only side effects are logging
/// and metrics.
use tracing::{debug, error};

use crate::error::{BackendCode, BackendError, DomainError, ErrorContext, ErrorKind, ServiceKind};
use crate::metrics;

/// Maps backend failures for one service and project
#[derive(Debug, Clone)]
pub struct ErrorMapper {
    service: ServiceKind,
    project_id: String,
}

impl ErrorMapper {
    pub fn new(service: ServiceKind, project_id: impl Into<String>) -> Self {
        Self {
            service,
            project_id: project_id.into(),
        }
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }

    /// Map a backend error and log the decision
    pub fn map(&self, err: &BackendError, operation: &str, context: &ErrorContext) -> DomainError {
        let mut safe = context.redacted();
        safe.insert("operation", operation);

        error!(
            service = self.service.as_str(),
            operation,
            gcp_error_type = err.code.type_name(),
            gcp_error_message = %err.message,
            project_id = %self.project_id,
            error_mapping = "gcp_to_custom",
            context = %safe,
            "Google Cloud API error during {}",
            operation
        );

        let mapped = self.classify(err, operation, context).with_context(&safe);

        debug!(
            service = self.service.as_str(),
            operation,
            original_exception = err.code.type_name(),
            mapped_exception = mapped.kind().as_str(),
            project_id = %self.project_id,
            context = %safe,
            "Mapped GCP exception to domain error"
        );
        metrics::record_error(self.service.as_str(), mapped.kind().as_str());

        mapped
    }

    fn classify(&self, err: &BackendError, operation: &str, context: &ErrorContext) -> DomainError {
        let label = self.service.resource_label();
        let name = context.get(self.service.name_key()).unwrap_or("unknown");
        let version = context.get("version").filter(|v| !v.is_empty());
        let msg = err.message.as_str();
        let project = self.project_id.as_str();

        let (kind, message) = match &err.code {
            BackendCode::NotFound => match version {
                Some(version) => (
                    ErrorKind::VersionNotFound,
                    format!(
                        "{} '{}' version '{}' not found in project '{}'",
                        label, name, version, project
                    ),
                ),
                None => (
                    ErrorKind::NotFound,
                    format!("{} '{}' not found in project '{}'", label, name, project),
                ),
            },
            BackendCode::PermissionDenied => (
                ErrorKind::AccessDenied,
                format!(
                    "Permission denied for {} on {} '{}'. Check that the caller has the required IAM roles: {}",
                    operation,
                    label.to_lowercase(),
                    name,
                    msg
                ),
            ),
            BackendCode::Unauthenticated => (
                ErrorKind::AccessDenied,
                format!(
                    "Authentication failed for {}. Check your Google Cloud credentials: {}",
                    operation, msg
                ),
            ),
            BackendCode::AlreadyExists => (
                ErrorKind::Generic,
                match version {
                    Some(version) => {
                        format!("{} '{}' version '{}' already exists", label, name, version)
                    }
                    None => format!("{} '{}' already exists", label, name),
                },
            ),
            BackendCode::FailedPrecondition => {
                let lowered = msg.to_lowercase();
                if lowered.contains("disabled") || lowered.contains("destroyed") {
                    (
                        ErrorKind::VersionNotFound,
                        format!(
                            "{} '{}' version '{}' is not accessible (disabled or destroyed): {}",
                            label,
                            name,
                            version.unwrap_or("latest"),
                            msg
                        ),
                    )
                } else {
                    (
                        ErrorKind::Generic,
                        format!(
                            "Operation failed due to precondition during {}: {}",
                            operation, msg
                        ),
                    )
                }
            }
            BackendCode::InvalidArgument => (
                ErrorKind::InvalidValue,
                format!("Invalid argument for {}: {}", operation, msg),
            ),
            BackendCode::ResourceExhausted => (
                ErrorKind::QuotaExceeded,
                format!(
                    "Quota exceeded for {}. Consider requesting a quota increase: {}",
                    operation, msg
                ),
            ),
            BackendCode::DeadlineExceeded => (
                ErrorKind::Timeout,
                format!("Operation timed out during {}: {}", operation, msg),
            ),
            BackendCode::Unavailable => (
                ErrorKind::Unavailable,
                format!(
                    "{} service temporarily unavailable during {}. Please retry: {}",
                    self.service.display_name(),
                    operation,
                    msg
                ),
            ),
            BackendCode::Internal => (
                ErrorKind::InternalError,
                format!(
                    "Internal server error during {}. This is a Google Cloud issue: {}",
                    operation, msg
                ),
            ),
            BackendCode::RetryExhausted => (
                ErrorKind::Connection,
                format!("Retry limit exceeded during {}: {}", operation, msg),
            ),
            BackendCode::TooManyRequests => (
                ErrorKind::QuotaExceeded,
                format!(
                    "Rate limit exceeded for {}. Please slow down requests: {}",
                    operation, msg
                ),
            ),
            BackendCode::Aborted => (
                ErrorKind::Generic,
                format!(
                    "Operation aborted during {} due to a concurrent modification. Please retry: {}",
                    operation, msg
                ),
            ),
            BackendCode::OutOfRange => (
                ErrorKind::InvalidValue,
                format!("Value out of range for {}: {}", operation, msg),
            ),
            BackendCode::Unimplemented => (
                ErrorKind::Generic,
                format!("Operation not implemented: {}: {}", operation, msg),
            ),
            BackendCode::DataLoss => (
                ErrorKind::InternalError,
                format!("Data loss detected during {}: {}", operation, msg),
            ),
            BackendCode::Cancelled => (
                ErrorKind::Generic,
                format!("Operation cancelled during {}: {}", operation, msg),
            ),
            BackendCode::Unknown => (
                ErrorKind::Generic,
                format!("Unknown error during {}: {}", operation, msg),
            ),
            BackendCode::Connection | BackendCode::Io => (
                ErrorKind::Connection,
                format!("Network connectivity issue during {}: {}", operation, msg),
            ),
            BackendCode::Timeout => (
                ErrorKind::Timeout,
                format!("Network timeout during {}: {}", operation, msg),
            ),
            BackendCode::Other(type_name) => (
                ErrorKind::Generic,
                format!(
                    "Unexpected error during {}: {}: {}",
                    operation, type_name, msg
                ),
            ),
        };

        DomainError::new(self.service, kind, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pm() -> ErrorMapper {
        ErrorMapper::new(ServiceKind::ParameterManager, "test-project")
    }

    fn sm() -> ErrorMapper {
        ErrorMapper::new(ServiceKind::SecretManager, "test-project")
    }

    fn param(name: &str) -> ErrorContext {
        ErrorContext::new().with("parameter_name", name)
    }

    fn err(code: BackendCode, msg: &str) -> BackendError {
        BackendError::new(code, msg)
    }

    #[test]
    fn test_not_found_without_version() {
        let mapped = pm().map(
            &err(BackendCode::NotFound, "Parameter not found"),
            "parameter retrieval",
            &param("test-param"),
        );
        assert_eq!(mapped.kind(), ErrorKind::NotFound);
        assert!(mapped.to_string().contains("test-param"));
        assert!(mapped.to_string().contains("test-project"));
    }

    #[test]
    fn test_not_found_with_version() {
        let mapped = pm().map(
            &err(BackendCode::NotFound, "Version not found"),
            "version retrieval",
            &param("test-param").with("version", "v1"),
        );
        assert_eq!(mapped.kind(), ErrorKind::VersionNotFound);
        assert!(mapped.to_string().contains("test-param"));
        assert!(mapped.to_string().contains("v1"));
    }

    #[test]
    fn test_empty_version_counts_as_absent() {
        let mapped = sm().map(
            &err(BackendCode::NotFound, "gone"),
            "secret retrieval",
            &ErrorContext::new().with("secret_name", "db").with("version", ""),
        );
        assert_eq!(mapped.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_permission_denied() {
        let mapped = pm().map(
            &err(BackendCode::PermissionDenied, "Access denied"),
            "parameter access",
            &param("secure-param"),
        );
        assert_eq!(mapped.kind(), ErrorKind::AccessDenied);
        assert!(mapped.to_string().contains("secure-param"));
        assert!(mapped.to_string().contains("Permission denied"));
        assert!(mapped.to_string().contains("IAM roles"));
    }

    #[test]
    fn test_unauthenticated() {
        let mapped = pm().map(
            &err(BackendCode::Unauthenticated, "Invalid credentials"),
            "authentication",
            &param("p"),
        );
        assert_eq!(mapped.kind(), ErrorKind::AccessDenied);
        assert!(mapped.to_string().contains("Authentication failed"));
        assert!(mapped.to_string().contains("credentials"));
    }

    #[test]
    fn test_already_exists_is_generic() {
        let mapped = pm().map(
            &err(BackendCode::AlreadyExists, "exists"),
            "parameter creation",
            &param("existing-param"),
        );
        assert_eq!(mapped.kind(), ErrorKind::Generic);
        assert!(mapped.to_string().contains("existing-param"));
        assert!(mapped.to_string().contains("already exists"));

        let mapped = pm().map(
            &err(BackendCode::AlreadyExists, "exists"),
            "version creation",
            &param("test-param").with("version", "v1"),
        );
        assert!(mapped.to_string().contains("v1"));
        assert!(mapped.to_string().contains("already exists"));
    }

    #[test]
    fn test_failed_precondition_disabled_or_destroyed() {
        for text in [
            "Secret Version is in DISABLED state",
            "version has been Destroyed",
        ] {
            let mapped = sm().map(
                &err(BackendCode::FailedPrecondition, text),
                "secret retrieval",
                &ErrorContext::new().with("secret_name", "db").with("version", "1"),
            );
            assert_eq!(mapped.kind(), ErrorKind::VersionNotFound, "{}", text);
            assert!(mapped.to_string().to_lowercase().contains("disabled"));
        }
    }

    #[test]
    fn test_failed_precondition_generic() {
        let mapped = pm().map(
            &err(BackendCode::FailedPrecondition, "Etag mismatch"),
            "parameter update",
            &param("p"),
        );
        assert_eq!(mapped.kind(), ErrorKind::Generic);
        assert!(mapped.to_string().to_lowercase().contains("precondition"));
    }

    #[test]
    fn test_table_kinds() {
        let cases = [
            (BackendCode::InvalidArgument, ErrorKind::InvalidValue, "Invalid argument"),
            (BackendCode::ResourceExhausted, ErrorKind::QuotaExceeded, "quota increase"),
            (BackendCode::DeadlineExceeded, ErrorKind::Timeout, "timed out"),
            (BackendCode::Unavailable, ErrorKind::Unavailable, "retry"),
            (BackendCode::Internal, ErrorKind::InternalError, "Google Cloud"),
            (BackendCode::RetryExhausted, ErrorKind::Connection, "Retry limit exceeded"),
            (BackendCode::TooManyRequests, ErrorKind::QuotaExceeded, "slow down"),
            (BackendCode::Aborted, ErrorKind::Generic, "aborted"),
            (BackendCode::OutOfRange, ErrorKind::InvalidValue, "out of range"),
            (BackendCode::Unimplemented, ErrorKind::Generic, "not implemented"),
            (BackendCode::DataLoss, ErrorKind::InternalError, "Data loss"),
            (BackendCode::Unknown, ErrorKind::Generic, "Unknown error"),
            (BackendCode::Connection, ErrorKind::Connection, "connectivity"),
            (BackendCode::Io, ErrorKind::Connection, "connectivity"),
            (BackendCode::Timeout, ErrorKind::Timeout, "timeout"),
        ];

        for (code, kind, needle) in cases {
            let mapped = pm().map(&err(code.clone(), "boom"), "parameter operation", &param("p"));
            assert_eq!(mapped.kind(), kind, "{:?}", code);
            assert!(
                mapped.to_string().to_lowercase().contains(&needle.to_lowercase()),
                "{:?}: {}",
                code,
                mapped
            );
        }
    }

    #[test]
    fn test_other_includes_type_name_and_text() {
        let mapped = pm().map(
            &err(BackendCode::Other("ValueError".to_string()), "Something went wrong"),
            "parameter operation",
            &param("p"),
        );
        assert_eq!(mapped.kind(), ErrorKind::Generic);
        assert!(mapped.to_string().contains("Unexpected error"));
        assert!(mapped.to_string().contains("ValueError"));
        assert!(mapped.to_string().contains("Something went wrong"));
    }

    #[test]
    fn test_confidential_context_never_leaks() {
        let ctx = ErrorContext::new()
            .with("secret_name", "db")
            .with("secret_value", "hunter2-secret")
            .with("payload", "raw-payload-bytes")
            .with("data", "{\"password\":\"x\"}");

        for code in [
            BackendCode::NotFound,
            BackendCode::PermissionDenied,
            BackendCode::InvalidArgument,
            BackendCode::Other("RuntimeError".to_string()),
        ] {
            let mapped = sm().map(&err(code, "failure"), "secret creation", &ctx);
            let text = mapped.to_string();
            assert!(!text.contains("hunter2-secret"));
            assert!(!text.contains("raw-payload-bytes"));
            assert!(!text.contains("password"));
            assert!(mapped.context().get("secret_value").is_none());
            assert_eq!(mapped.context().get("operation"), Some("secret creation"));
        }
    }

    #[test]
    fn test_mapping_is_idempotent() {
        let e = err(BackendCode::NotFound, "gone");
        let ctx = param("p").with("version", "3");
        let first = pm().map(&e, "version retrieval", &ctx);
        let second = pm().map(&e, "version retrieval", &ctx);
        assert_eq!(first, second);
    }

    #[test]
    fn test_original_message_is_preserved() {
        let original = "Field 'format' must be one of JSON, YAML";
        let mapped = pm().map(
            &err(BackendCode::InvalidArgument, original),
            "validation",
            &param("p"),
        );
        assert!(mapped.to_string().contains(original));
    }
}
