/// Cloud Tasks response models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::backend::{resource_id, QueueRecord, TaskRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_name: String,
    pub queue_name: String,
    /// JSON body, or `{"raw_body": ...}` when the body is not JSON
    pub payload: Value,
    pub schedule_time: Option<DateTime<Utc>>,
    pub created_time: DateTime<Utc>,
    pub http_method: String,
    pub relative_uri: String,
    pub headers: Option<HashMap<String, String>>,
    pub dispatch_count: i32,
    pub response_count: i32,
    pub first_attempt_time: Option<DateTime<Utc>>,
    pub last_attempt_time: Option<DateTime<Utc>>,
}

/// Path after the host, `/` when there is none
fn relative_uri(url: &str) -> String {
    match url.splitn(4, '/').nth(3) {
        Some(path) => format!("/{}", path),
        None => "/".to_string(),
    }
}

fn decode_payload(body: &[u8]) -> Value {
    if body.is_empty() {
        return json!({});
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| json!({ "raw_body": String::from_utf8_lossy(body) }))
}

impl TaskResponse {
    pub fn from_record(record: TaskRecord, queue_name: &str) -> Self {
        let request = record.http_request;
        Self {
            task_name: resource_id(&record.name).to_string(),
            queue_name: queue_name.to_string(),
            payload: decode_payload(&request.body),
            schedule_time: record.schedule_time,
            created_time: record.create_time.unwrap_or_else(Utc::now),
            http_method: if request.http_method.is_empty() {
                "POST".to_string()
            } else {
                request.http_method
            },
            relative_uri: relative_uri(&request.url),
            headers: (!request.headers.is_empty()).then_some(request.headers),
            dispatch_count: record.dispatch_count,
            response_count: record.response_count,
            first_attempt_time: record.first_attempt_time,
            last_attempt_time: record.last_attempt_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCreateResponse {
    /// Full resource name of the created task
    pub task_name: String,
    pub queue_name: String,
    pub schedule_time: Option<DateTime<Utc>>,
    pub created_time: DateTime<Utc>,
    pub relative_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueResponse {
    pub queue_name: String,
    pub state: String,
    pub max_concurrent_dispatches: Option<i32>,
    pub max_dispatches_per_second: Option<f64>,
    /// Seconds
    pub max_retry_duration: Option<i64>,
    pub max_attempts: Option<i32>,
    pub purge_time: Option<DateTime<Utc>>,
    pub stats_approximate_tasks: i64,
}

impl From<QueueRecord> for QueueResponse {
    fn from(record: QueueRecord) -> Self {
        Self {
            queue_name: resource_id(&record.name).to_string(),
            state: record.state,
            max_concurrent_dispatches: record.limits.max_concurrent_dispatches,
            max_dispatches_per_second: record.limits.max_dispatches_per_second,
            max_retry_duration: record.limits.max_retry_duration_secs,
            max_attempts: record.limits.max_attempts,
            purge_time: record.purge_time,
            stats_approximate_tasks: record.approximate_tasks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCreateResponse {
    pub queue_name: String,
    pub state: String,
    pub created_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskResponse>,
    pub next_page_token: Option<String>,
    pub total_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueListResponse {
    pub queues: Vec<QueueResponse>,
    pub next_page_token: Option<String>,
}

/// Outcome of delete/run/purge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOperationResponse {
    pub success: bool,
    pub message: String,
    pub task_name: Option<String>,
}

impl TaskOperationResponse {
    pub fn ok(message: impl Into<String>, task_name: Option<&str>) -> Self {
        Self {
            success: true,
            message: message.into(),
            task_name: task_name.map(str::to_string),
        }
    }
}
