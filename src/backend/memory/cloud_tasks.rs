use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{lock, paginate, CallLog};
use crate::backend::{NewTask, Page, QueueLimits, QueueRecord, TaskRecord, TasksBackend};
use crate::error::{BackendError, BackendResult};
use crate::validation::HTTP_METHODS;

struct StoredQueue {
    record: QueueRecord,
    tasks: BTreeMap<String, TaskRecord>,
}

impl StoredQueue {
    fn snapshot(&self) -> QueueRecord {
        let mut record = self.record.clone();
        record.approximate_tasks = self.tasks.len() as i64;
        record
    }
}

/// Cloud Tasks emulator. Tasks are stored, never dispatched; `run_task`
/// only records an attempt.
#[derive(Default)]
pub struct MemoryTasksBackend {
    queues: Mutex<BTreeMap<String, StoredQueue>>,
    log: CallLog,
}

fn split_task(name: &str) -> BackendResult<(&str, &str)> {
    name.rsplit_once("/tasks/")
        .ok_or_else(|| BackendError::invalid_argument(format!("Malformed task name '{}'", name)))
}

fn queue_not_found(name: &str) -> BackendError {
    BackendError::not_found(format!("Queue [{}] does not exist.", name))
}

fn task_not_found(name: &str) -> BackendError {
    BackendError::not_found(format!("Task [{}] does not exist.", name))
}

impl MemoryTasksBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn calls(&self, method: &str) -> usize {
        self.log.calls(method)
    }
}

#[async_trait]
impl TasksBackend for MemoryTasksBackend {
    async fn create_task(&self, parent: &str, task: NewTask) -> BackendResult<TaskRecord> {
        self.log.record("create_task")?;
        if !HTTP_METHODS.contains(&task.http_request.http_method.as_str()) {
            return Err(BackendError::invalid_argument(format!(
                "Invalid http_method '{}'",
                task.http_request.http_method
            )));
        }
        if !task.http_request.url.starts_with("http://") && !task.http_request.url.starts_with("https://") {
            return Err(BackendError::invalid_argument(format!(
                "Invalid url '{}': must be an absolute http(s) URL",
                task.http_request.url
            )));
        }

        let mut queues = lock(&self.queues);
        let queue = queues.get_mut(parent).ok_or_else(|| queue_not_found(parent))?;

        let name = task
            .name
            .unwrap_or_else(|| format!("{}/tasks/{}", parent, Uuid::new_v4().simple()));
        if queue.tasks.contains_key(&name) {
            return Err(BackendError::already_exists(format!("Task [{}] already exists.", name)));
        }

        let now = Utc::now();
        let record = TaskRecord {
            name: name.clone(),
            http_request: task.http_request,
            schedule_time: Some(task.schedule_time.unwrap_or(now)),
            create_time: Some(now),
            dispatch_count: 0,
            response_count: 0,
            first_attempt_time: None,
            last_attempt_time: None,
        };
        queue.tasks.insert(name, record.clone());
        Ok(record)
    }

    async fn get_task(&self, name: &str) -> BackendResult<TaskRecord> {
        self.log.record("get_task")?;
        let (parent, _) = split_task(name)?;
        lock(&self.queues)
            .get(parent)
            .and_then(|q| q.tasks.get(name))
            .cloned()
            .ok_or_else(|| task_not_found(name))
    }

    async fn list_tasks(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<TaskRecord>> {
        self.log.record("list_tasks")?;
        let tasks: Vec<TaskRecord> = lock(&self.queues)
            .get(parent)
            .ok_or_else(|| queue_not_found(parent))?
            .tasks
            .values()
            .cloned()
            .collect();
        paginate(tasks, page_size, page_token)
    }

    async fn delete_task(&self, name: &str) -> BackendResult<()> {
        self.log.record("delete_task")?;
        let (parent, _) = split_task(name)?;
        lock(&self.queues)
            .get_mut(parent)
            .and_then(|q| q.tasks.remove(name))
            .map(|_| ())
            .ok_or_else(|| task_not_found(name))
    }

    async fn run_task(&self, name: &str) -> BackendResult<TaskRecord> {
        self.log.record("run_task")?;
        let (parent, _) = split_task(name)?;
        let mut queues = lock(&self.queues);
        let task = queues
            .get_mut(parent)
            .and_then(|q| q.tasks.get_mut(name))
            .ok_or_else(|| task_not_found(name))?;

        let now = Utc::now();
        task.dispatch_count += 1;
        task.response_count += 1;
        task.first_attempt_time.get_or_insert(now);
        task.last_attempt_time = Some(now);
        Ok(task.clone())
    }

    async fn create_queue(&self, parent: &str, name: &str, limits: QueueLimits) -> BackendResult<QueueRecord> {
        self.log.record("create_queue")?;
        let full = format!("{}/queues/{}", parent, name);
        let mut queues = lock(&self.queues);
        if queues.contains_key(&full) {
            return Err(BackendError::already_exists(format!("Queue [{}] already exists.", full)));
        }

        let record = QueueRecord {
            name: full.clone(),
            state: "RUNNING".to_string(),
            limits,
            purge_time: None,
            approximate_tasks: 0,
        };
        queues.insert(
            full,
            StoredQueue {
                record: record.clone(),
                tasks: BTreeMap::new(),
            },
        );
        Ok(record)
    }

    async fn get_queue(&self, name: &str) -> BackendResult<QueueRecord> {
        self.log.record("get_queue")?;
        lock(&self.queues)
            .get(name)
            .map(StoredQueue::snapshot)
            .ok_or_else(|| queue_not_found(name))
    }

    async fn list_queues(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<QueueRecord>> {
        self.log.record("list_queues")?;
        let prefix = format!("{}/queues/", parent);
        let queues: Vec<QueueRecord> = lock(&self.queues)
            .iter()
            .filter(|(name, _)| name.starts_with(&prefix))
            .map(|(_, q)| q.snapshot())
            .collect();
        paginate(queues, page_size, page_token)
    }

    async fn delete_queue(&self, name: &str) -> BackendResult<()> {
        self.log.record("delete_queue")?;
        lock(&self.queues)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| queue_not_found(name))
    }

    async fn purge_queue(&self, name: &str) -> BackendResult<QueueRecord> {
        self.log.record("purge_queue")?;
        let mut queues = lock(&self.queues);
        let queue = queues.get_mut(name).ok_or_else(|| queue_not_found(name))?;
        queue.tasks.clear();
        queue.record.purge_time = Some(Utc::now());
        Ok(queue.snapshot())
    }
}
