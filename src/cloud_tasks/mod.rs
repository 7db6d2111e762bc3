/// Cloud Tasks facade
///
/// HTTP tasks carrying a JSON body, plus queue management. Failures surface
/// as [`TasksError`]; there is no caching.
pub mod requests;
pub mod responses;

pub use requests::{QueueCreateRequest, TaskCreateRequest};
pub use responses::{
    QueueCreateResponse, QueueListResponse, QueueResponse, TaskCreateResponse, TaskListResponse,
    TaskOperationResponse, TaskResponse,
};

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use validator::Validate;

use crate::backend::rest::{HttpOptions, RestTasksBackend};
use crate::backend::{HttpTarget, NewTask, QueueLimits, TasksBackend};
use crate::config::{SpartanConfig, TasksConfig};
use crate::env::{EnvSource, ProcessEnv};
use crate::error::{BackendCode, BackendError, TasksError, TasksResult};
use crate::metrics;
use crate::resolver::{CredentialsInput, Resolver, ResolverOptions};
use crate::token::TokenProvider;
use crate::validation::to_tasks_error;

const SERVICE_LABEL: &str = "cloud_tasks";

/// Furthest ahead a task may be scheduled
pub const MAX_SCHEDULE_DAYS: i64 = 30;

pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Where tasks are created and what URL they call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSettings {
    pub project_id: String,
    pub location: String,
    /// Overrides the Cloud Functions URL pattern
    pub base_url: Option<String>,
    pub service_name: String,
}

impl TaskSettings {
    pub fn new(project_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            base_url: None,
            service_name: "spartan-function".to_string(),
        }
    }

    /// Explicit values win over `GCP_PROJECT_ID` / `GCP_LOCATION`
    pub fn from_config(config: &TasksConfig, project_id: Option<&str>, location: Option<&str>) -> TasksResult<Self> {
        let project_id = project_id
            .map(str::to_string)
            .filter(|p| !p.trim().is_empty())
            .or_else(|| config.project_id.clone())
            .ok_or_else(|| TasksError::Operation("GCP_PROJECT_ID is required".to_string()))?;
        let location = location
            .map(str::to_string)
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| config.location.clone());

        Ok(Self {
            project_id,
            location,
            base_url: config.base_url.clone(),
            service_name: config.service_name.clone(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.location)
    }

    /// Absolute URL a task posts to
    pub fn task_url(&self, relative_uri: &str) -> String {
        let base = match &self.base_url {
            Some(url) => url.clone(),
            None => format!(
                "https://{}-{}.cloudfunctions.net/{}",
                self.location, self.project_id, self.service_name
            ),
        };
        format!("{}{}", base.trim_end_matches('/'), relative_uri)
    }
}

/// Construction options
#[derive(Debug, Clone, Default)]
pub struct CloudTasksOptions {
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub credentials: Option<CredentialsInput>,
    pub credentials_path: Option<PathBuf>,
    pub http: HttpOptions,
}

/// Cloud Tasks service
pub struct CloudTasksService {
    backend: Arc<dyn TasksBackend>,
    settings: TaskSettings,
    parent: String,
}

impl CloudTasksService {
    pub async fn new(options: CloudTasksOptions) -> TasksResult<Self> {
        Self::with_env(Arc::new(ProcessEnv::new()), options).await
    }

    pub async fn with_env(env: Arc<dyn EnvSource>, options: CloudTasksOptions) -> TasksResult<Self> {
        let config = SpartanConfig::from_env(env.as_ref());
        let settings = TaskSettings::from_config(
            &config.tasks,
            options.project_id.as_deref(),
            options.location.as_deref(),
        )?;

        let init_failed = |message: String| {
            error!(
                project_id = %settings.project_id,
                location = %settings.location,
                error = %message,
                "Failed to initialize Cloud Tasks client"
            );
            TasksError::Operation(format!("Failed to initialize Cloud Tasks client: {}", message))
        };

        let resolver = Resolver::new(env.clone(), config.resolver);
        let credentials = resolver
            .resolve_credentials(&ResolverOptions {
                project_id: None,
                credentials: options.credentials.clone(),
                credentials_path: options.credentials_path.clone(),
            })
            .await
            .map_err(|e| init_failed(e.to_string()))?
            .map(|(credentials, _)| credentials);

        let http = options
            .http
            .build_client()
            .map_err(|e| init_failed(e.to_string()))?;
        let tokens = Arc::new(TokenProvider::new(credentials, env, http));
        let backend = RestTasksBackend::new(tokens, &options.http).map_err(|e| init_failed(e.to_string()))?;

        Ok(Self::with_backend(Arc::new(backend), settings))
    }

    pub fn with_backend(backend: Arc<dyn TasksBackend>, settings: TaskSettings) -> Self {
        info!(
            project_id = %settings.project_id,
            location = %settings.location,
            "CloudTasksService initialized"
        );
        Self {
            parent: settings.parent(),
            backend,
            settings,
        }
    }

    pub fn settings(&self) -> &TaskSettings {
        &self.settings
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    fn queue_path(&self, queue_name: &str) -> String {
        format!("{}/queues/{}", self.parent, queue_name)
    }

    fn task_path(&self, queue_name: &str, task_name: &str) -> String {
        format!("{}/tasks/{}", self.queue_path(queue_name), task_name)
    }

    fn succeed(operation: &'static str, started: Instant) {
        metrics::record_operation(SERVICE_LABEL, operation, true, started.elapsed().as_secs_f64());
    }

    fn fail(operation: &'static str, started: Instant, resource: &str, cause: &BackendError, mapped: TasksError) -> TasksError {
        error!(
            operation,
            resource,
            error = %cause,
            error_type = cause.code.type_name(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Failed to {}",
            operation.replace('_', " ")
        );
        metrics::record_operation(SERVICE_LABEL, operation, false, started.elapsed().as_secs_f64());
        metrics::record_error(SERVICE_LABEL, mapped.kind_name());
        mapped
    }

    fn task_not_found(queue_name: &str, task_name: &str) -> TasksError {
        TasksError::TaskNotFound(format!("Task '{}' not found in queue '{}'", task_name, queue_name))
    }

    fn queue_not_found(queue_name: &str) -> TasksError {
        TasksError::QueueNotFound(format!("Queue '{}' not found", queue_name))
    }

    /// Enqueue an HTTP task whose body is the JSON payload
    pub async fn create_task(&self, request: TaskCreateRequest) -> TasksResult<TaskCreateResponse> {
        let started = Instant::now();
        if let Err(errors) = request.validate() {
            let err = to_tasks_error(&errors);
            warn!(queue_name = %request.queue_name, error = %err, "Task request validation failed");
            metrics::record_error(SERVICE_LABEL, err.kind_name());
            return Err(err);
        }
        let request = request.normalized();

        if let Some(at) = request.schedule_time {
            let limit = Utc::now() + ChronoDuration::days(MAX_SCHEDULE_DAYS);
            if at > limit {
                let err = TasksError::SchedulingFailed(format!(
                    "Schedule time {} is more than {} days in the future",
                    at.to_rfc3339(),
                    MAX_SCHEDULE_DAYS
                ));
                warn!(queue_name = %request.queue_name, error = %err, "Task scheduling rejected");
                metrics::record_error(SERVICE_LABEL, err.kind_name());
                return Err(err);
            }
        }

        let queue_path = self.queue_path(&request.queue_name);
        let body = serde_json::to_vec(&request.payload)
            .map_err(|e| TasksError::InvalidPayload(format!("Task payload is not serializable: {}", e)))?;

        let mut headers = HashMap::from([("Content-Type".to_string(), "application/json".to_string())]);
        if let Some(user_headers) = &request.headers {
            headers.extend(user_headers.clone());
        }

        let task = NewTask {
            name: request
                .task_name
                .as_ref()
                .map(|name| format!("{}/tasks/{}", queue_path, name)),
            http_request: HttpTarget {
                url: self.settings.task_url(&request.relative_uri),
                http_method: request.http_method.clone(),
                headers,
                body,
            },
            schedule_time: request.schedule_time,
        };

        let record = self.backend.create_task(&queue_path, task).await.map_err(|e| {
            let mapped = match e.code {
                BackendCode::NotFound => Self::queue_not_found(&request.queue_name),
                BackendCode::InvalidArgument => {
                    TasksError::InvalidPayload(format!("Invalid task configuration: {}", e))
                }
                _ => TasksError::CreationFailed(format!("Failed to create task: {}", e)),
            };
            Self::fail("create_task", started, &queue_path, &e, mapped)
        })?;

        info!(
            task_name = %record.name,
            queue_name = %request.queue_name,
            relative_uri = %request.relative_uri,
            "Task created successfully"
        );
        Self::succeed("create_task", started);
        Ok(TaskCreateResponse {
            task_name: record.name,
            queue_name: request.queue_name,
            schedule_time: record.schedule_time,
            created_time: Utc::now(),
            relative_uri: request.relative_uri,
        })
    }

    pub async fn get_task(&self, queue_name: &str, task_name: &str) -> TasksResult<TaskResponse> {
        let started = Instant::now();
        let task_path = self.task_path(queue_name, task_name);
        let record = self.backend.get_task(&task_path).await.map_err(|e| {
            let mapped = match e.code {
                BackendCode::NotFound => Self::task_not_found(queue_name, task_name),
                _ => TasksError::Operation(format!("Failed to get task: {}", e)),
            };
            Self::fail("get_task", started, &task_path, &e, mapped)
        })?;

        Self::succeed("get_task", started);
        Ok(TaskResponse::from_record(record, queue_name))
    }

    pub async fn list_tasks(&self, queue_name: &str, page_size: u32, page_token: Option<&str>) -> TasksResult<TaskListResponse> {
        let started = Instant::now();
        let queue_path = self.queue_path(queue_name);
        let page = self
            .backend
            .list_tasks(&queue_path, page_size, page_token.map(str::to_string))
            .await
            .map_err(|e| {
                let mapped = match e.code {
                    BackendCode::NotFound => Self::queue_not_found(queue_name),
                    _ => TasksError::Operation(format!("Failed to list tasks: {}", e)),
                };
                Self::fail("list_tasks", started, &queue_path, &e, mapped)
            })?;

        Self::succeed("list_tasks", started);
        Ok(TaskListResponse {
            tasks: page
                .items
                .into_iter()
                .map(|task| TaskResponse::from_record(task, queue_name))
                .collect(),
            next_page_token: page.next_page_token,
            total_size: page.total_size,
        })
    }

    pub async fn delete_task(&self, queue_name: &str, task_name: &str) -> TasksResult<TaskOperationResponse> {
        let started = Instant::now();
        let task_path = self.task_path(queue_name, task_name);
        self.backend.delete_task(&task_path).await.map_err(|e| {
            let mapped = match e.code {
                BackendCode::NotFound => Self::task_not_found(queue_name, task_name),
                _ => TasksError::Operation(format!("Failed to delete task: {}", e)),
            };
            Self::fail("delete_task", started, &task_path, &e, mapped)
        })?;

        info!(task_name, queue_name, "Task deleted successfully");
        Self::succeed("delete_task", started);
        Ok(TaskOperationResponse::ok(
            format!("Task '{}' deleted successfully", task_name),
            Some(task_name),
        ))
    }

    /// Dispatch a task now, ignoring its schedule
    pub async fn run_task(&self, queue_name: &str, task_name: &str) -> TasksResult<TaskOperationResponse> {
        let started = Instant::now();
        let task_path = self.task_path(queue_name, task_name);
        self.backend.run_task(&task_path).await.map_err(|e| {
            let mapped = match e.code {
                BackendCode::NotFound => Self::task_not_found(queue_name, task_name),
                _ => TasksError::Operation(format!("Failed to run task: {}", e)),
            };
            Self::fail("run_task", started, &task_path, &e, mapped)
        })?;

        info!(task_name, queue_name, "Task executed successfully");
        Self::succeed("run_task", started);
        Ok(TaskOperationResponse::ok(
            format!("Task '{}' executed successfully", task_name),
            Some(task_name),
        ))
    }

    pub async fn create_queue(&self, request: QueueCreateRequest) -> TasksResult<QueueCreateResponse> {
        let started = Instant::now();
        if let Err(errors) = request.validate() {
            let err = to_tasks_error(&errors);
            warn!(queue_name = %request.queue_name, error = %err, "Queue request validation failed");
            metrics::record_error(SERVICE_LABEL, err.kind_name());
            return Err(err);
        }
        let queue_name = request.queue_name.trim();

        let limits = QueueLimits {
            max_concurrent_dispatches: request.max_concurrent_dispatches,
            max_dispatches_per_second: request.max_dispatches_per_second,
            max_retry_duration_secs: request.max_retry_duration,
            max_attempts: request.max_attempts,
        };
        let record = self
            .backend
            .create_queue(&self.parent, queue_name, limits)
            .await
            .map_err(|e| {
                let mapped = TasksError::Operation(format!("Failed to create queue: {}", e));
                Self::fail("create_queue", started, queue_name, &e, mapped)
            })?;

        info!(queue_name, "Queue created successfully");
        Self::succeed("create_queue", started);
        Ok(QueueCreateResponse {
            queue_name: queue_name.to_string(),
            state: record.state,
            created_time: Utc::now(),
        })
    }

    pub async fn get_queue(&self, queue_name: &str) -> TasksResult<QueueResponse> {
        let started = Instant::now();
        let queue_path = self.queue_path(queue_name);
        let record = self.backend.get_queue(&queue_path).await.map_err(|e| {
            let mapped = match e.code {
                BackendCode::NotFound => Self::queue_not_found(queue_name),
                _ => TasksError::Operation(format!("Failed to get queue: {}", e)),
            };
            Self::fail("get_queue", started, &queue_path, &e, mapped)
        })?;

        Self::succeed("get_queue", started);
        Ok(record.into())
    }

    pub async fn list_queues(&self, page_size: u32, page_token: Option<&str>) -> TasksResult<QueueListResponse> {
        let started = Instant::now();
        let page = self
            .backend
            .list_queues(&self.parent, page_size, page_token.map(str::to_string))
            .await
            .map_err(|e| {
                let mapped = TasksError::Operation(format!("Failed to list queues: {}", e));
                Self::fail("list_queues", started, &self.parent, &e, mapped)
            })?;

        Self::succeed("list_queues", started);
        Ok(QueueListResponse {
            queues: page.items.into_iter().map(QueueResponse::from).collect(),
            next_page_token: page.next_page_token,
        })
    }

    pub async fn delete_queue(&self, queue_name: &str) -> TasksResult<TaskOperationResponse> {
        let started = Instant::now();
        let queue_path = self.queue_path(queue_name);
        self.backend.delete_queue(&queue_path).await.map_err(|e| {
            let mapped = match e.code {
                BackendCode::NotFound => Self::queue_not_found(queue_name),
                _ => TasksError::Operation(format!("Failed to delete queue: {}", e)),
            };
            Self::fail("delete_queue", started, &queue_path, &e, mapped)
        })?;

        info!(queue_name, "Queue deleted successfully");
        Self::succeed("delete_queue", started);
        Ok(TaskOperationResponse::ok(
            format!("Queue '{}' deleted successfully", queue_name),
            None,
        ))
    }

    /// Drop every task in the queue
    pub async fn purge_queue(&self, queue_name: &str) -> TasksResult<TaskOperationResponse> {
        let started = Instant::now();
        let queue_path = self.queue_path(queue_name);
        self.backend.purge_queue(&queue_path).await.map_err(|e| {
            let mapped = match e.code {
                BackendCode::NotFound => Self::queue_not_found(queue_name),
                _ => TasksError::Operation(format!("Failed to purge queue: {}", e)),
            };
            Self::fail("purge_queue", started, &queue_path, &e, mapped)
        })?;

        info!(queue_name, "Queue purged successfully");
        Self::succeed("purge_queue", started);
        Ok(TaskOperationResponse::ok(
            format!("Queue '{}' purged successfully", queue_name),
            None,
        ))
    }
}
