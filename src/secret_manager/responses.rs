/// Secret Manager response models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretCreateResponse {
    pub secret_name: String,
    pub version: String,
    pub created_time: DateTime<Utc>,
    pub replication_policy: String,
}

/// A secret value read from a version
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretResponse {
    pub secret_name: String,
    pub secret_value: String,
    /// Resolved version number, even when `latest` was requested
    pub version: String,
    /// Time of the read; the access RPC does not report the version's creation time
    pub created_time: DateTime<Utc>,
    pub state: String,
}

impl fmt::Debug for SecretResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretResponse")
            .field("secret_name", &self.secret_name)
            .field("secret_value", &"[REDACTED]")
            .field("version", &self.version)
            .field("created_time", &self.created_time)
            .field("state", &self.state)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadataResponse {
    pub secret_name: String,
    pub created_time: DateTime<Utc>,
    pub labels: Option<HashMap<String, String>>,
    pub replication_policy: String,
    /// Counted only by `get_secret_metadata`
    pub version_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretListResponse {
    pub secrets: Vec<SecretMetadataResponse>,
    pub next_page_token: Option<String>,
    pub total_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretVersionResponse {
    pub secret_name: String,
    pub version: String,
    pub created_time: DateTime<Utc>,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretVersionListResponse {
    pub versions: Vec<SecretVersionResponse>,
    pub next_page_token: Option<String>,
    pub total_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretOperationResponse {
    pub success: bool,
    pub message: String,
    pub operation_time: DateTime<Utc>,
}

impl SecretOperationResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            operation_time: Utc::now(),
        }
    }
}
