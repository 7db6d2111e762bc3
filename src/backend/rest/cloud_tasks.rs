use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::{decode_payload, encode_payload, page_query, parse_time, HttpOptions, RestClient};
use crate::backend::{HttpTarget, NewTask, Page, QueueLimits, QueueRecord, TaskRecord, TasksBackend};
use crate::error::BackendResult;
use crate::token::TokenProvider;

pub const CLOUD_TASKS_ENDPOINT: &str = "https://cloudtasks.googleapis.com/v2";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHttpRequest {
    #[serde(default)]
    url: String,
    #[serde(default)]
    http_method: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTask {
    name: String,
    #[serde(default)]
    http_request: Option<WireHttpRequest>,
    #[serde(default)]
    schedule_time: Option<String>,
    #[serde(default)]
    create_time: Option<String>,
    #[serde(default)]
    dispatch_count: i32,
    #[serde(default)]
    response_count: i32,
    #[serde(default)]
    first_attempt: Option<WireAttempt>,
    #[serde(default)]
    last_attempt: Option<WireAttempt>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAttempt {
    #[serde(default)]
    dispatch_time: Option<String>,
}

impl WireTask {
    fn into_record(self) -> BackendResult<TaskRecord> {
        let request = self.http_request.unwrap_or_default();
        Ok(TaskRecord {
            name: self.name,
            http_request: HttpTarget {
                url: request.url,
                http_method: request.http_method.unwrap_or_else(|| "POST".to_string()),
                headers: request.headers,
                body: decode_payload(request.body.as_deref())?,
            },
            schedule_time: parse_time(self.schedule_time.as_deref()),
            create_time: parse_time(self.create_time.as_deref()),
            dispatch_count: self.dispatch_count,
            response_count: self.response_count,
            first_attempt_time: self
                .first_attempt
                .and_then(|a| parse_time(a.dispatch_time.as_deref())),
            last_attempt_time: self
                .last_attempt
                .and_then(|a| parse_time(a.dispatch_time.as_deref())),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRateLimits {
    #[serde(default)]
    max_dispatches_per_second: Option<f64>,
    #[serde(default)]
    max_concurrent_dispatches: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRetryConfig {
    #[serde(default)]
    max_attempts: Option<i32>,
    #[serde(default)]
    max_retry_duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireQueueStats {
    /// int64 fields travel as strings
    #[serde(default)]
    tasks_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireQueue {
    name: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    rate_limits: Option<WireRateLimits>,
    #[serde(default)]
    retry_config: Option<WireRetryConfig>,
    #[serde(default)]
    purge_time: Option<String>,
    #[serde(default)]
    stats: Option<WireQueueStats>,
}

impl From<WireQueue> for QueueRecord {
    fn from(wire: WireQueue) -> Self {
        let rate = wire.rate_limits.unwrap_or_default();
        let retry = wire.retry_config.unwrap_or_default();
        QueueRecord {
            name: wire.name,
            state: wire.state.unwrap_or_else(|| "STATE_UNSPECIFIED".to_string()),
            limits: QueueLimits {
                max_concurrent_dispatches: rate.max_concurrent_dispatches,
                max_dispatches_per_second: rate.max_dispatches_per_second,
                max_retry_duration_secs: retry.max_retry_duration.as_deref().and_then(parse_duration),
                max_attempts: retry.max_attempts,
            },
            purge_time: parse_time(wire.purge_time.as_deref()),
            approximate_tasks: wire
                .stats
                .and_then(|s| s.tasks_count)
                .and_then(|c| c.parse().ok())
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTaskList {
    #[serde(default)]
    tasks: Vec<WireTask>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireQueueList {
    #[serde(default)]
    queues: Vec<WireQueue>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Protobuf JSON duration ("3600s", "1.5s") in whole seconds
fn parse_duration(value: &str) -> Option<i64> {
    value
        .strip_suffix('s')
        .and_then(|secs| secs.parse::<f64>().ok())
        .map(|secs| secs as i64)
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn task_body(task: &NewTask) -> Value {
    let mut http_request = Map::new();
    http_request.insert("url".into(), json!(task.http_request.url));
    http_request.insert("httpMethod".into(), json!(task.http_request.http_method));
    if !task.http_request.headers.is_empty() {
        http_request.insert("headers".into(), json!(task.http_request.headers));
    }
    if !task.http_request.body.is_empty() {
        http_request.insert("body".into(), json!(encode_payload(&task.http_request.body)));
    }

    let mut body = Map::new();
    if let Some(name) = &task.name {
        body.insert("name".into(), json!(name));
    }
    body.insert("httpRequest".into(), Value::Object(http_request));
    if let Some(schedule_time) = &task.schedule_time {
        body.insert("scheduleTime".into(), json!(format_time(schedule_time)));
    }
    json!({ "task": body })
}

fn queue_body(name: &str, limits: &QueueLimits) -> Value {
    let mut body = Map::new();
    body.insert("name".into(), json!(name));

    let mut rate = Map::new();
    if let Some(n) = limits.max_concurrent_dispatches {
        rate.insert("maxConcurrentDispatches".into(), json!(n));
    }
    if let Some(n) = limits.max_dispatches_per_second {
        rate.insert("maxDispatchesPerSecond".into(), json!(n));
    }
    if !rate.is_empty() {
        body.insert("rateLimits".into(), Value::Object(rate));
    }

    let mut retry = Map::new();
    if let Some(secs) = limits.max_retry_duration_secs {
        retry.insert("maxRetryDuration".into(), json!(format!("{}s", secs)));
    }
    if let Some(n) = limits.max_attempts {
        retry.insert("maxAttempts".into(), json!(n));
    }
    if !retry.is_empty() {
        body.insert("retryConfig".into(), Value::Object(retry));
    }

    Value::Object(body)
}

/// Cloud Tasks v2 over HTTPS
pub struct RestTasksBackend {
    client: RestClient,
}

impl RestTasksBackend {
    pub fn new(tokens: Arc<TokenProvider>, options: &HttpOptions) -> BackendResult<Self> {
        Self::with_endpoint(tokens, options, CLOUD_TASKS_ENDPOINT)
    }

    pub fn with_endpoint(tokens: Arc<TokenProvider>, options: &HttpOptions, endpoint: &str) -> BackendResult<Self> {
        Ok(Self {
            client: RestClient::new(options.build_client()?, tokens, endpoint),
        })
    }
}

#[async_trait]
impl TasksBackend for RestTasksBackend {
    async fn create_task(&self, parent: &str, task: NewTask) -> BackendResult<TaskRecord> {
        let wire: WireTask = self
            .client
            .call(
                Method::POST,
                &format!("{}/tasks", parent),
                &[],
                Some(&task_body(&task)),
            )
            .await?;
        wire.into_record()
    }

    async fn get_task(&self, name: &str) -> BackendResult<TaskRecord> {
        let wire: WireTask = self
            .client
            .call(Method::GET, name, &[("responseView", "FULL".to_string())], None)
            .await?;
        wire.into_record()
    }

    async fn list_tasks(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<TaskRecord>> {
        let mut query = page_query(page_size, page_token);
        query.push(("responseView", "FULL".to_string()));
        let wire: WireTaskList = self
            .client
            .call(Method::GET, &format!("{}/tasks", parent), &query, None)
            .await?;
        let items = wire
            .tasks
            .into_iter()
            .map(WireTask::into_record)
            .collect::<BackendResult<Vec<_>>>()?;
        Ok(Page {
            items,
            next_page_token: wire.next_page_token.filter(|t| !t.is_empty()),
            total_size: None,
        })
    }

    async fn delete_task(&self, name: &str) -> BackendResult<()> {
        self.client.call_empty(Method::DELETE, name, None).await
    }

    async fn run_task(&self, name: &str) -> BackendResult<TaskRecord> {
        let wire: WireTask = self
            .client
            .call(
                Method::POST,
                &format!("{}:run", name),
                &[],
                Some(&json!({ "responseView": "FULL" })),
            )
            .await?;
        wire.into_record()
    }

    async fn create_queue(&self, parent: &str, name: &str, limits: QueueLimits) -> BackendResult<QueueRecord> {
        let full = format!("{}/queues/{}", parent, name);
        let wire: WireQueue = self
            .client
            .call(
                Method::POST,
                &format!("{}/queues", parent),
                &[],
                Some(&queue_body(&full, &limits)),
            )
            .await?;
        Ok(wire.into())
    }

    async fn get_queue(&self, name: &str) -> BackendResult<QueueRecord> {
        let wire: WireQueue = self
            .client
            .call(Method::GET, name, &[("readMask", "*".to_string())], None)
            .await?;
        Ok(wire.into())
    }

    async fn list_queues(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<QueueRecord>> {
        let wire: WireQueueList = self
            .client
            .call(
                Method::GET,
                &format!("{}/queues", parent),
                &page_query(page_size, page_token),
                None,
            )
            .await?;
        Ok(Page {
            items: wire.queues.into_iter().map(Into::into).collect(),
            next_page_token: wire.next_page_token.filter(|t| !t.is_empty()),
            total_size: None,
        })
    }

    async fn delete_queue(&self, name: &str) -> BackendResult<()> {
        self.client.call_empty(Method::DELETE, name, None).await
    }

    async fn purge_queue(&self, name: &str) -> BackendResult<QueueRecord> {
        let wire: WireQueue = self
            .client
            .call(Method::POST, &format!("{}:purge", name), &[], Some(&json!({})))
            .await?;
        Ok(wire.into())
    }
}
