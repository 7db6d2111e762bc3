/// Cloud Tasks request models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use validator::{Validate, ValidationError};

use crate::validation::{error_with_message, http_method, not_blank};

fn default_http_method() -> String {
    "POST".to_string()
}

fn json_object(value: &Value) -> Result<(), ValidationError> {
    if !value.is_object() {
        return Err(error_with_message("payload", "Task payload must be a JSON object"));
    }
    Ok(())
}

fn positive_rate(value: f64) -> Result<(), ValidationError> {
    if value <= 0.0 {
        return Err(error_with_message(
            "max_dispatches_per_second",
            "Max dispatches per second must be positive",
        ));
    }
    Ok(())
}

/// An HTTP task to enqueue.
///
/// Call [`TaskCreateRequest::normalized`] after validation: it trims the
/// queue name, drops a blank task name, upper-cases the method and prefixes
/// the relative URI with `/`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TaskCreateRequest {
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub queue_name: String,

    /// Generated by the backend when absent
    #[serde(default)]
    #[validate(length(max = 500))]
    pub task_name: Option<String>,

    #[validate(custom(function = "json_object"))]
    pub payload: Value,

    #[serde(default)]
    pub schedule_time: Option<DateTime<Utc>>,

    #[serde(default = "default_http_method")]
    #[validate(custom(function = "http_method"))]
    pub http_method: String,

    #[validate(length(min = 1), custom(function = "not_blank"))]
    pub relative_uri: String,

    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

impl TaskCreateRequest {
    pub fn new(queue_name: impl Into<String>, relative_uri: impl Into<String>, payload: Value) -> Self {
        Self {
            queue_name: queue_name.into(),
            task_name: None,
            payload,
            schedule_time: None,
            http_method: default_http_method(),
            relative_uri: relative_uri.into(),
            headers: None,
        }
    }

    pub fn with_task_name(mut self, task_name: impl Into<String>) -> Self {
        self.task_name = Some(task_name.into());
        self
    }

    pub fn with_http_method(mut self, method: impl Into<String>) -> Self {
        self.http_method = method.into();
        self
    }

    pub fn with_schedule_time(mut self, schedule_time: DateTime<Utc>) -> Self {
        self.schedule_time = Some(schedule_time);
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn normalized(mut self) -> Self {
        self.queue_name = self.queue_name.trim().to_string();
        self.task_name = self
            .task_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        self.http_method = self.http_method.to_uppercase();
        let uri = self.relative_uri.trim();
        self.relative_uri = if uri.starts_with('/') {
            uri.to_string()
        } else {
            format!("/{}", uri)
        };
        self
    }
}

/// Queue with optional rate and retry limits; every limit must be positive
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct QueueCreateRequest {
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub queue_name: String,

    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_concurrent_dispatches: Option<i32>,

    #[serde(default)]
    #[validate(custom(function = "positive_rate"))]
    pub max_dispatches_per_second: Option<f64>,

    /// Seconds
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_retry_duration: Option<i64>,

    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_attempts: Option<i32>,
}

impl QueueCreateRequest {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            ..Self::default()
        }
    }
}
