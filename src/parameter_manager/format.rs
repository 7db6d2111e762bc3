/// Conversions between parameter payloads and structured values
use serde_json::Value;

use crate::backend::ParameterFormat;
use crate::error::{DomainError, DomainResult, ServiceKind};

const SERVICE: ServiceKind = ServiceKind::ParameterManager;

/// Serialize a value as pretty JSON
pub fn convert_to_json(data: &Value) -> DomainResult<String> {
    serde_json::to_string_pretty(data)
        .map_err(|e| DomainError::invalid_value(SERVICE, format!("Failed to convert data to JSON: {}", e)))
}

/// Serialize a value as a YAML document
pub fn convert_to_yaml(data: &Value) -> DomainResult<String> {
    serde_yaml_ng::to_string(data)
        .map_err(|e| DomainError::invalid_value(SERVICE, format!("Failed to convert data to YAML: {}", e)))
}

pub fn parse_json(text: &str) -> DomainResult<Value> {
    serde_json::from_str(text)
        .map_err(|e| DomainError::invalid_value(SERVICE, format!("Invalid JSON format: {}", e)))
}

pub fn parse_yaml(text: &str) -> DomainResult<Value> {
    serde_yaml_ng::from_str(text)
        .map_err(|e| DomainError::invalid_value(SERVICE, format!("Invalid YAML format: {}", e)))
}

/// Bytes to store for `data` under `format`.
///
/// Strings are stored as given; structured data is serialized in the
/// declared format (JSON for UNFORMATTED).
pub fn encode(data: &Value, format: ParameterFormat) -> DomainResult<Vec<u8>> {
    let text = match (data, format) {
        (Value::String(s), _) => s.clone(),
        (other, ParameterFormat::Yaml) => convert_to_yaml(other)?,
        (other, _) => other.to_string(),
    };
    Ok(text.into_bytes())
}

/// Interpret a stored payload according to the parameter's format.
///
/// Payloads that do not parse in their declared format come back as a
/// plain string rather than failing the read.
pub fn decode(payload: &[u8], format: ParameterFormat) -> Value {
    let text = String::from_utf8_lossy(payload);
    let parsed = match format {
        ParameterFormat::Json => serde_json::from_str(&text).ok(),
        ParameterFormat::Yaml => serde_yaml_ng::from_str(&text).ok(),
        ParameterFormat::Unformatted => None,
    };
    parsed.unwrap_or_else(|| Value::String(text.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_and_yaml_conversions() {
        let value = json!({"host": "db.internal", "port": 5432});
        let yaml = convert_to_yaml(&value).unwrap();
        assert!(yaml.contains("port: 5432"));
        assert_eq!(parse_yaml(&yaml).unwrap(), value);

        let text = convert_to_json(&value).unwrap();
        assert_eq!(parse_json(&text).unwrap(), value);
    }

    #[test]
    fn test_parse_errors_are_invalid_value() {
        let err = parse_json("{not valid").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidValue);
        assert!(parse_yaml("key: [unclosed").is_err());
    }

    #[test]
    fn test_decode_by_format() {
        assert_eq!(decode(br#"{"a": 1}"#, ParameterFormat::Json), json!({"a": 1}));
        assert_eq!(decode(b"a: 1", ParameterFormat::Yaml), json!({"a": 1}));
        assert_eq!(decode(br#"{"a": 1}"#, ParameterFormat::Unformatted), json!(r#"{"a": 1}"#));
        assert_eq!(decode(b"{broken", ParameterFormat::Json), json!("{broken"));
    }

    #[test]
    fn test_encode_keeps_strings_verbatim() {
        assert_eq!(encode(&json!("raw text"), ParameterFormat::Json).unwrap(), b"raw text");
        assert_eq!(encode(&json!({"a": 1}), ParameterFormat::Json).unwrap(), br#"{"a":1}"#);
        let yaml = String::from_utf8(encode(&json!({"a": 1}), ParameterFormat::Yaml).unwrap()).unwrap();
        assert_eq!(yaml.trim(), "a: 1");
    }
}
