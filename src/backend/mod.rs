/// Backend seam for the Google Cloud APIs
///
/// Each facade talks to its service through one of the traits below. Two
/// implementations exist: in-memory emulators (`memory`) and HTTPS clients
/// for the public REST APIs (`rest`). Every method maps to exactly one RPC
/// and reports failures as [`BackendError`](crate::error::BackendError).
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::BackendResult;

/// Last path segment of a resource name
pub fn resource_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// One page of a list RPC
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
    pub total_size: Option<usize>,
}

impl<T> Page<T> {
    pub fn single(items: Vec<T>) -> Self {
        let total = items.len();
        Self {
            items,
            next_page_token: None,
            total_size: Some(total),
        }
    }
}

/// Secret version lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionState {
    Enabled,
    Disabled,
    Destroyed,
}

impl VersionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionState::Enabled => "ENABLED",
            VersionState::Disabled => "DISABLED",
            VersionState::Destroyed => "DESTROYED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ENABLED" => Some(VersionState::Enabled),
            "DISABLED" => Some(VersionState::Disabled),
            "DESTROYED" => Some(VersionState::Destroyed),
            _ => None,
        }
    }
}

/// Secret replication policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replication {
    Automatic,
    UserManaged { locations: Vec<String> },
}

impl Replication {
    pub fn policy_name(&self) -> &'static str {
        match self {
            Replication::Automatic => "automatic",
            Replication::UserManaged { .. } => "user_managed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    /// `projects/{p}/secrets/{id}`
    pub name: String,
    pub create_time: DateTime<Utc>,
    pub labels: HashMap<String, String>,
    pub replication: Replication,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretVersionRecord {
    /// `projects/{p}/secrets/{id}/versions/{n}`
    pub name: String,
    pub create_time: DateTime<Utc>,
    pub state: VersionState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessedSecretVersion {
    /// Resolved version name; `latest` is replaced by the number
    pub name: String,
    pub data: Vec<u8>,
}

/// Secret Manager v1 RPCs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretBackend: Send + Sync {
    async fn create_secret(
        &self,
        parent: &str,
        secret_id: &str,
        replication: &Replication,
        labels: &HashMap<String, String>,
    ) -> BackendResult<SecretRecord>;

    async fn get_secret(&self, name: &str) -> BackendResult<SecretRecord>;

    async fn list_secrets(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<SecretRecord>>;

    async fn delete_secret(&self, name: &str) -> BackendResult<()>;

    async fn add_secret_version(&self, parent: &str, data: &[u8]) -> BackendResult<SecretVersionRecord>;

    async fn access_secret_version(&self, name: &str) -> BackendResult<AccessedSecretVersion>;

    async fn list_secret_versions(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<SecretVersionRecord>>;

    async fn disable_secret_version(&self, name: &str) -> BackendResult<SecretVersionRecord>;

    async fn enable_secret_version(&self, name: &str) -> BackendResult<SecretVersionRecord>;

    async fn destroy_secret_version(&self, name: &str) -> BackendResult<SecretVersionRecord>;
}

/// Declared payload format of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterFormat {
    Unformatted,
    Json,
    Yaml,
}

impl ParameterFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterFormat::Unformatted => "UNFORMATTED",
            ParameterFormat::Json => "JSON",
            ParameterFormat::Yaml => "YAML",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "UNFORMATTED" => Some(ParameterFormat::Unformatted),
            "JSON" => Some(ParameterFormat::Json),
            "YAML" => Some(ParameterFormat::Yaml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRecord {
    /// `projects/{p}/locations/{l}/parameters/{id}`
    pub name: String,
    pub format: ParameterFormat,
    pub labels: HashMap<String, String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterVersionRecord {
    /// `.../parameters/{id}/versions/{version}`
    pub name: String,
    pub disabled: bool,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    /// Present on get, omitted by list
    pub payload: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedParameterVersion {
    pub parameter_version: String,
    pub payload: Vec<u8>,
    pub rendered_payload: Vec<u8>,
}

/// Parameter Manager v1 RPCs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParameterBackend: Send + Sync {
    async fn create_parameter(
        &self,
        parent: &str,
        parameter_id: &str,
        format: ParameterFormat,
        labels: &HashMap<String, String>,
    ) -> BackendResult<ParameterRecord>;

    async fn get_parameter(&self, name: &str) -> BackendResult<ParameterRecord>;

    async fn list_parameters(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
        filter: Option<String>,
    ) -> BackendResult<Page<ParameterRecord>>;

    async fn update_parameter_labels(
        &self,
        name: &str,
        labels: &HashMap<String, String>,
    ) -> BackendResult<ParameterRecord>;

    async fn delete_parameter(&self, name: &str) -> BackendResult<()>;

    async fn create_parameter_version(
        &self,
        parent: &str,
        version_id: &str,
        data: &[u8],
    ) -> BackendResult<ParameterVersionRecord>;

    async fn get_parameter_version(&self, name: &str) -> BackendResult<ParameterVersionRecord>;

    async fn list_parameter_versions(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<ParameterVersionRecord>>;

    async fn delete_parameter_version(&self, name: &str) -> BackendResult<()>;

    async fn render_parameter_version(&self, name: &str) -> BackendResult<RenderedParameterVersion>;
}

/// HTTP target of a task
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpTarget {
    pub url: String,
    pub http_method: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Task to enqueue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Full task name; `None` lets the service pick one
    pub name: Option<String>,
    pub http_request: HttpTarget,
    pub schedule_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    /// `projects/{p}/locations/{l}/queues/{q}/tasks/{t}`
    pub name: String,
    pub http_request: HttpTarget,
    pub schedule_time: Option<DateTime<Utc>>,
    pub create_time: Option<DateTime<Utc>>,
    pub dispatch_count: i32,
    pub response_count: i32,
    pub first_attempt_time: Option<DateTime<Utc>>,
    pub last_attempt_time: Option<DateTime<Utc>>,
}

/// Rate and retry limits of a queue
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueueLimits {
    pub max_concurrent_dispatches: Option<i32>,
    pub max_dispatches_per_second: Option<f64>,
    pub max_retry_duration_secs: Option<i64>,
    pub max_attempts: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueRecord {
    /// `projects/{p}/locations/{l}/queues/{q}`
    pub name: String,
    pub state: String,
    pub limits: QueueLimits,
    pub purge_time: Option<DateTime<Utc>>,
    pub approximate_tasks: i64,
}

/// Cloud Tasks v2 RPCs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TasksBackend: Send + Sync {
    async fn create_task(&self, parent: &str, task: NewTask) -> BackendResult<TaskRecord>;

    async fn get_task(&self, name: &str) -> BackendResult<TaskRecord>;

    async fn list_tasks(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<TaskRecord>>;

    async fn delete_task(&self, name: &str) -> BackendResult<()>;

    async fn run_task(&self, name: &str) -> BackendResult<TaskRecord>;

    async fn create_queue(&self, parent: &str, name: &str, limits: QueueLimits) -> BackendResult<QueueRecord>;

    async fn get_queue(&self, name: &str) -> BackendResult<QueueRecord>;

    async fn list_queues(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<QueueRecord>>;

    async fn delete_queue(&self, name: &str) -> BackendResult<()>;

    async fn purge_queue(&self, name: &str) -> BackendResult<QueueRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id() {
        assert_eq!(resource_id("projects/p/secrets/db/versions/3"), "3");
        assert_eq!(resource_id("plain"), "plain");
    }

    #[test]
    fn test_enum_round_trip_names() {
        assert_eq!(VersionState::parse("DISABLED"), Some(VersionState::Disabled));
        assert_eq!(ParameterFormat::parse("YAML"), Some(ParameterFormat::Yaml));
        assert_eq!(ParameterFormat::parse("yaml"), None);
    }
}
