/// Secret Manager request models
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use validator::{Validate, ValidationError};

use crate::backend::Replication;
use crate::cache::LATEST;
use crate::validation::{error_with_message, not_blank};

pub const REPLICATION_POLICIES: [&str; 2] = ["automatic", "user_managed"];

fn default_replication() -> String {
    "automatic".to_string()
}

fn replication_policy(value: &str) -> Result<(), ValidationError> {
    if !REPLICATION_POLICIES.contains(&value) {
        return Err(error_with_message(
            "replication_policy",
            format!("Replication policy must be one of {:?}", REPLICATION_POLICIES),
        ));
    }
    Ok(())
}

/// Create a secret together with its first version
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct SecretCreateRequest {
    #[validate(length(min = 1, max = 255), custom(function = "not_blank"))]
    pub secret_name: String,

    #[validate(length(min = 1), custom(function = "not_blank"))]
    pub secret_value: String,

    #[serde(default = "default_replication")]
    #[validate(custom(function = "replication_policy"))]
    pub replication_policy: String,

    /// Replica locations for `user_managed` replication
    #[serde(default)]
    pub replica_locations: Vec<String>,

    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
}

impl SecretCreateRequest {
    pub fn new(secret_name: impl Into<String>, secret_value: impl Into<String>) -> Self {
        Self {
            secret_name: secret_name.into(),
            secret_value: secret_value.into(),
            replication_policy: default_replication(),
            replica_locations: Vec::new(),
            labels: None,
        }
    }

    pub fn with_labels(mut self, labels: HashMap<String, String>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn user_managed(mut self, locations: Vec<String>) -> Self {
        self.replication_policy = "user_managed".to_string();
        self.replica_locations = locations;
        self
    }

    pub fn replication(&self) -> Replication {
        match self.replication_policy.as_str() {
            "user_managed" => Replication::UserManaged {
                locations: self.replica_locations.clone(),
            },
            _ => Replication::Automatic,
        }
    }
}

impl fmt::Debug for SecretCreateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCreateRequest")
            .field("secret_name", &self.secret_name)
            .field("secret_value", &"[REDACTED]")
            .field("replication_policy", &self.replication_policy)
            .field("replica_locations", &self.replica_locations)
            .field("labels", &self.labels)
            .finish()
    }
}

/// Add a version to an existing secret
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct SecretVersionCreateRequest {
    #[validate(length(min = 1, max = 255), custom(function = "not_blank"))]
    pub secret_name: String,

    #[validate(length(min = 1), custom(function = "not_blank"))]
    pub secret_value: String,
}

impl SecretVersionCreateRequest {
    pub fn new(secret_name: impl Into<String>, secret_value: impl Into<String>) -> Self {
        Self {
            secret_name: secret_name.into(),
            secret_value: secret_value.into(),
        }
    }
}

impl fmt::Debug for SecretVersionCreateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretVersionCreateRequest")
            .field("secret_name", &self.secret_name)
            .field("secret_value", &"[REDACTED]")
            .finish()
    }
}

/// Name and version addressed by reads and version state changes
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SecretAccessRequest {
    #[validate(length(min = 1, max = 255), custom(function = "not_blank"))]
    pub secret_name: String,

    #[validate(length(min = 1, max = 255), custom(function = "not_blank"))]
    pub version: String,
}

impl SecretAccessRequest {
    pub fn new(secret_name: &str, version: Option<&str>) -> Self {
        Self {
            secret_name: secret_name.to_string(),
            version: version.unwrap_or(LATEST).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SecretListRequest {
    #[validate(range(min = 1, max = 1000))]
    pub page_size: u32,
    pub page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults_to_automatic() {
        let request: SecretCreateRequest =
            serde_json::from_str(r#"{"secret_name": "db", "secret_value": "x"}"#).unwrap();
        assert_eq!(request.replication_policy, "automatic");
        assert_eq!(request.replication(), Replication::Automatic);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_create_request_rejects_blank_value_and_unknown_policy() {
        let mut request = SecretCreateRequest::new("db", "   ");
        request.replication_policy = "regional".to_string();
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("secret_value"));
        assert!(fields.contains_key("replication_policy"));
    }

    #[test]
    fn test_name_length_bound() {
        assert!(SecretCreateRequest::new("a".repeat(255), "v").validate().is_ok());
        assert!(SecretCreateRequest::new("a".repeat(256), "v").validate().is_err());
    }

    #[test]
    fn test_debug_never_shows_value() {
        let request = SecretCreateRequest::new("db", "hunter2");
        assert!(!format!("{:?}", request).contains("hunter2"));
        let request = SecretVersionCreateRequest::new("db", "hunter2");
        assert!(!format!("{:?}", request).contains("hunter2"));
    }

    #[test]
    fn test_access_request_defaults_to_latest() {
        assert_eq!(SecretAccessRequest::new("db", None).version, "latest");
        assert!(SecretAccessRequest::new("db", Some("")).validate().is_err());
    }
}
