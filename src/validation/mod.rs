/// Request validation helpers
///
/// Request types derive `validator::Validate`; the helpers here supply the
/// custom rules they share and fold a `ValidationErrors` tree into the single
/// aggregated error each facade raises.
use serde_json::Value;
use std::borrow::Cow;
use tracing::warn;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{DomainError, ErrorKind, ServiceKind, TasksError};

/// Largest accepted parameter/secret payload, in bytes (1 MiB)
pub const MAX_PAYLOAD_BYTES: usize = 1_048_576;

pub const FORMAT_TYPES: [&str; 3] = ["UNFORMATTED", "JSON", "YAML"];

pub const HTTP_METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "PATCH"];

/// Fields whose failures classify as an invalid name
const NAME_FIELDS: [&str; 5] = [
    "secret_name",
    "parameter_name",
    "version_name",
    "queue_name",
    "task_name",
];

/// Key used by the validator crate for struct-level errors
const STRUCT_LEVEL: &str = "__all__";

/// One failing field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

pub(crate) fn error_with_message(code: &'static str, message: impl Into<String>) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(message.into()));
    err
}

/// Reject empty or whitespace-only strings
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error_with_message(
            "blank",
            "cannot be empty or whitespace",
        ));
    }
    Ok(())
}

pub fn format_type(value: &str) -> Result<(), ValidationError> {
    if !FORMAT_TYPES.contains(&value) {
        return Err(error_with_message(
            "format_type",
            format!("Format type must be one of {:?}", FORMAT_TYPES),
        ));
    }
    Ok(())
}

/// Accepts any casing; callers upper-case after validation
pub fn http_method(value: &str) -> Result<(), ValidationError> {
    if !HTTP_METHODS.contains(&value.to_uppercase().as_str()) {
        return Err(error_with_message(
            "http_method",
            format!("HTTP method must be one of {:?}", HTTP_METHODS),
        ));
    }
    Ok(())
}

/// String form of a payload as it will be stored
pub fn payload_text(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Check the 1 MiB bound on the encoded payload
pub fn payload_size(data: &Value) -> Result<(), ValidationError> {
    let size = payload_text(data).len();
    if size > MAX_PAYLOAD_BYTES {
        return Err(error_with_message(
            "data",
            format!(
                "Parameter data cannot exceed 1 MiB ({} bytes given, limit {})",
                size, MAX_PAYLOAD_BYTES
            ),
        ));
    }
    Ok(())
}

/// Structural check of `data` against its declared format
pub fn payload_format(data: &Value, format_type: &str) -> Result<(), ValidationError> {
    match format_type {
        "JSON" => match data {
            Value::String(s) => serde_json::from_str::<Value>(s)
                .map(|_| ())
                .map_err(|e| error_with_message("data", format!("Invalid JSON format: {}", e))),
            Value::Object(_) | Value::Array(_) => Ok(()),
            _ => Err(error_with_message(
                "data",
                "JSON format requires string or structured data",
            )),
        },
        "YAML" => match data {
            Value::String(s) => serde_yaml_ng::from_str::<serde_yaml_ng::Value>(s)
                .map(|_| ())
                .map_err(|e| error_with_message("data", format!("Invalid YAML format: {}", e))),
            Value::Object(_) | Value::Array(_) => Ok(()),
            _ => Err(error_with_message(
                "data",
                "YAML format requires string or structured data",
            )),
        },
        _ => Ok(()),
    }
}

fn describe(err: &ValidationError) -> String {
    if let Some(message) = &err.message {
        return message.to_string();
    }

    match err.code.as_ref() {
        "length" => {
            let min = err.params.get("min").map(|v| v.to_string());
            let max = err.params.get("max").map(|v| v.to_string());
            match (min, max) {
                (Some(min), Some(max)) => {
                    format!("length must be between {} and {} characters", min, max)
                }
                (None, Some(max)) => format!("length must be at most {} characters", max),
                (Some(min), None) => format!("length must be at least {} characters", min),
                (None, None) => "invalid length".to_string(),
            }
        }
        "range" => {
            let min = err.params.get("min").map(|v| v.to_string());
            let max = err.params.get("max").map(|v| v.to_string());
            match (min, max) {
                (Some(min), Some(max)) => format!("must be between {} and {}", min, max),
                (Some(min), None) => format!("must be at least {}", min),
                (None, Some(max)) => format!("must be at most {}", max),
                (None, None) => "out of range".to_string(),
            }
        }
        code => format!("failed '{}' check", code),
    }
}

/// Flatten validation errors into field/message pairs, sorted by field.
///
/// Struct-level errors name their field through the error code.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let field = field.to_string();
            errs.iter().map(move |err| FieldError {
                field: if field == STRUCT_LEVEL {
                    err.code.to_string()
                } else {
                    field.clone()
                },
                message: describe(err),
            })
        })
        .collect();
    out.sort_by(|a, b| a.field.cmp(&b.field).then(a.message.cmp(&b.message)));
    out
}

fn summary(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Aggregate into one domain error
pub fn to_domain_error(service: ServiceKind, errors: &ValidationErrors) -> DomainError {
    let fields = field_errors(errors);
    let only_names = !fields.is_empty()
        && fields
            .iter()
            .all(|f| NAME_FIELDS.contains(&f.field.as_str()));
    let kind = if only_names {
        ErrorKind::InvalidName
    } else {
        ErrorKind::InvalidValue
    };

    DomainError::new(
        service,
        kind,
        format!("Validation failed: {}", summary(&fields)),
    )
}

/// Validate a request, surfacing failures as one domain error
pub fn validate_request<R: Validate>(service: ServiceKind, request: &R) -> Result<(), DomainError> {
    request.validate().map_err(|errors| {
        let err = to_domain_error(service, &errors);
        warn!(service = service.as_str(), error = %err, "Request validation failed");
        err
    })
}

/// Aggregate a Cloud Tasks request failure
pub fn to_tasks_error(errors: &ValidationErrors) -> TasksError {
    TasksError::InvalidPayload(format!(
        "Invalid task request: {}",
        summary(&field_errors(errors))
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, max = 10), custom(function = "not_blank"))]
        parameter_name: String,
        #[validate(custom(function = "format_type"))]
        format_type: String,
    }

    #[test]
    fn test_not_blank() {
        assert!(not_blank("ok").is_ok());
        assert!(not_blank("   ").is_err());
        assert!(not_blank("").is_err());
    }

    #[test]
    fn test_http_method_is_case_insensitive() {
        assert!(http_method("post").is_ok());
        assert!(http_method("Patch").is_ok());
        assert!(http_method("TRACE").is_err());
    }

    #[test]
    fn test_payload_size_boundary() {
        let exact = Value::String("a".repeat(MAX_PAYLOAD_BYTES));
        let over = Value::String("a".repeat(MAX_PAYLOAD_BYTES + 1));
        assert!(payload_size(&exact).is_ok());
        assert!(payload_size(&over).is_err());
    }

    #[test]
    fn test_payload_size_counts_bytes_not_chars() {
        // 'é' is two bytes in UTF-8
        let text = "é".repeat(MAX_PAYLOAD_BYTES / 2 + 1);
        assert!(payload_size(&Value::String(text)).is_err());
    }

    #[test]
    fn test_payload_format() {
        assert!(payload_format(&json!("{\"a\": 1}"), "JSON").is_ok());
        assert!(payload_format(&json!("{not valid"), "JSON").is_err());
        assert!(payload_format(&json!({"a": 1}), "JSON").is_ok());
        assert!(payload_format(&json!(42), "JSON").is_err());
        assert!(payload_format(&json!("key: value"), "YAML").is_ok());
        assert!(payload_format(&json!("key: [unclosed"), "YAML").is_err());
        assert!(payload_format(&json!("{not valid"), "UNFORMATTED").is_ok());
    }

    #[test]
    fn test_name_only_failures_are_invalid_name() {
        let sample = Sample {
            parameter_name: "   ".to_string(),
            format_type: "JSON".to_string(),
        };
        let errors = sample.validate().unwrap_err();
        let err = to_domain_error(ServiceKind::ParameterManager, &errors);
        assert_eq!(err.kind(), ErrorKind::InvalidName);
        assert!(err.to_string().contains("parameter_name"));
    }

    #[test]
    fn test_mixed_failures_list_every_field() {
        let sample = Sample {
            parameter_name: "x".repeat(11),
            format_type: "XML".to_string(),
        };
        let errors = sample.validate().unwrap_err();
        let fields = field_errors(&errors);
        assert!(fields.iter().any(|f| f.field == "parameter_name"));
        assert!(fields.iter().any(|f| f.field == "format_type"));

        let err = to_domain_error(ServiceKind::ParameterManager, &errors);
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert!(err.to_string().contains("format_type"));
        assert!(err.to_string().contains("at most 10") || err.to_string().contains("between 1 and 10"));
    }

    #[test]
    fn test_tasks_error_is_invalid_payload() {
        let sample = Sample {
            parameter_name: String::new(),
            format_type: "JSON".to_string(),
        };
        let errors = sample.validate().unwrap_err();
        assert!(matches!(to_tasks_error(&errors), TasksError::InvalidPayload(_)));
    }
}
