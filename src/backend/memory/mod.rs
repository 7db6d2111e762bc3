/// In-memory emulators of the backend RPCs
///
/// They follow the service semantics closely enough for end-to-end tests:
/// resource naming, NotFound/AlreadyExists, the version state machine and
/// offset-based page tokens. Every RPC is counted, and a single failure can
/// be queued per RPC.
mod cloud_tasks;
mod parameter_manager;
mod secret_manager;

pub use cloud_tasks::MemoryTasksBackend;
pub use parameter_manager::MemoryParameterBackend;
pub use secret_manager::MemorySecretBackend;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::Page;
use crate::error::{BackendError, BackendResult};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Per-RPC call counter with one-shot fault injection
#[derive(Debug, Default)]
pub struct CallLog {
    counts: Mutex<HashMap<String, usize>>,
    faults: Mutex<HashMap<String, BackendError>>,
}

impl CallLog {
    /// Count a call and return the queued failure, if any
    pub fn record(&self, method: &str) -> BackendResult<()> {
        *lock(&self.counts).entry(method.to_string()).or_insert(0) += 1;
        match lock(&self.faults).remove(method) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn calls(&self, method: &str) -> usize {
        lock(&self.counts).get(method).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        lock(&self.counts).values().sum()
    }

    /// Make the next call of `method` fail with `err`
    pub fn fail_next(&self, method: &str, err: BackendError) {
        lock(&self.faults).insert(method.to_string(), err);
    }

    pub fn reset(&self) {
        lock(&self.counts).clear();
    }
}

/// Slice a full listing using a decimal offset as the page token
pub(crate) fn paginate<T>(items: Vec<T>, page_size: u32, page_token: Option<String>) -> BackendResult<Page<T>> {
    let total = items.len();
    let start = match page_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => token
            .parse::<usize>()
            .map_err(|_| BackendError::invalid_argument(format!("Invalid page token '{}'", token)))?,
        None => 0,
    };
    let size = if page_size == 0 { total.max(1) } else { page_size as usize };
    let end = start.saturating_add(size).min(total);

    let items: Vec<T> = items.into_iter().skip(start).take(end.saturating_sub(start)).collect();
    let next_page_token = (end < total).then(|| end.to_string());

    Ok(Page {
        items,
        next_page_token,
        total_size: Some(total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendCode;

    #[test]
    fn test_call_log_counts_and_faults() {
        let log = CallLog::default();
        log.fail_next("get", BackendError::not_found("gone"));

        let err = log.record("get").unwrap_err();
        assert_eq!(err.code, BackendCode::NotFound);
        assert!(log.record("get").is_ok());
        assert_eq!(log.calls("get"), 2);
        assert_eq!(log.total(), 2);
    }

    #[test]
    fn test_paginate() {
        let page = paginate((1..=5).collect(), 2, None).unwrap();
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.next_page_token.as_deref(), Some("2"));

        let last = paginate((1..=5).collect(), 2, Some("4".into())).unwrap();
        assert_eq!(last.items, vec![5]);
        assert_eq!(last.next_page_token, None);
        assert_eq!(last.total_size, Some(5));

        assert!(paginate::<i32>(vec![], 2, Some("abc".into())).is_err());
    }

    #[test]
    fn test_paginate_past_the_end() {
        let page = paginate((1..=5).collect(), 2, Some(usize::MAX.to_string())).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.next_page_token, None);
        assert_eq!(page.total_size, Some(5));
    }
}
