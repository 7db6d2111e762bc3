/// Batch reads and writes over many parameters
///
/// Items run one after another; a failing item is recorded and the batch
/// carries on.
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

use super::{
    BatchGetResponse, BatchItemError, BatchOperationResponse, ParameterCreateRequest,
    ParameterManagerService,
};
use crate::cache::cache_key;
use crate::error::DomainError;

fn item_error(parameter_name: &str, err: &DomainError) -> BatchItemError {
    BatchItemError {
        parameter_name: parameter_name.to_string(),
        error: if err.is_not_found() {
            "not_found".to_string()
        } else {
            err.kind().as_str().to_string()
        },
        message: err.to_string(),
    }
}

impl ParameterManagerService {
    /// Read several parameters, serving what the cache holds
    pub async fn get_parameters_batch(&self, parameter_names: &[String], version: Option<&str>) -> BatchGetResponse {
        let started = Instant::now();
        let mut parameters = BTreeMap::new();
        let mut errors = Vec::new();
        let mut cache_hits = 0;
        let mut api_calls = 0;

        for name in parameter_names {
            if let Some(cached) = self.cache.get(&cache_key(name.trim(), version)) {
                cache_hits += 1;
                parameters.insert(name.clone(), Some(cached));
                continue;
            }

            api_calls += 1;
            match self.read_parameter(name, version, false).await {
                Ok(response) => {
                    parameters.insert(name.clone(), Some(response));
                }
                Err(err) => {
                    errors.push(item_error(name, &err));
                    parameters.insert(name.clone(), None);
                }
            }
        }

        {
            let mut stats = self.stats();
            stats.total_batch_operations += 1;
            stats.total_parameters_in_batches += parameter_names.len() as u64;
            stats.cache_hits_in_batches += cache_hits as u64;
        }

        let total_time_ms = started.elapsed().as_millis() as u64;
        info!(
            total_requested = parameter_names.len(),
            cache_hits,
            api_calls,
            errors = errors.len(),
            total_time_ms,
            "Batch get completed"
        );

        BatchGetResponse {
            total_requested: parameter_names.len(),
            cache_hits,
            api_calls,
            parameters,
            errors,
            total_time_ms,
        }
    }

    pub async fn create_parameters_batch(&self, requests: Vec<ParameterCreateRequest>) -> BatchOperationResponse {
        let started = Instant::now();
        let total_requested = requests.len();
        let mut successful = Vec::new();
        let mut failed = Vec::new();
        let mut errors = Vec::new();

        for request in requests {
            let name = request.parameter_name.clone();
            match self.create_parameter(request).await {
                Ok(_) => successful.push(name),
                Err(err) => {
                    errors.push(item_error(&name, &err));
                    failed.push(name);
                }
            }
        }

        self.finish_batch(total_requested, successful, failed, errors, started, "Batch create completed")
    }

    pub async fn delete_parameters_batch(&self, parameter_names: &[String]) -> BatchOperationResponse {
        let started = Instant::now();
        let mut successful = Vec::new();
        let mut failed = Vec::new();
        let mut errors = Vec::new();

        for name in parameter_names {
            match self.delete_parameter(name).await {
                Ok(_) => successful.push(name.clone()),
                Err(err) => {
                    errors.push(item_error(name, &err));
                    failed.push(name.clone());
                }
            }
        }

        self.finish_batch(parameter_names.len(), successful, failed, errors, started, "Batch delete completed")
    }

    fn finish_batch(
        &self,
        total_requested: usize,
        successful: Vec<String>,
        failed: Vec<String>,
        errors: Vec<BatchItemError>,
        started: Instant,
        message: &'static str,
    ) -> BatchOperationResponse {
        {
            let mut stats = self.stats();
            stats.total_batch_operations += 1;
            stats.total_parameters_in_batches += total_requested as u64;
        }

        let total_time_ms = started.elapsed().as_millis() as u64;
        info!(
            total_requested,
            successful = successful.len(),
            failed = failed.len(),
            total_time_ms,
            "{}",
            message
        );

        BatchOperationResponse {
            total_requested,
            successful,
            failed,
            errors,
            total_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryParameterBackend;
    use crate::backend::ParameterFormat;
    use crate::config::CacheConfig;
    use crate::parameter_manager::ParameterVersionCreateRequest;
    use serde_json::json;
    use std::sync::Arc;

    fn service(backend: Arc<MemoryParameterBackend>) -> ParameterManagerService {
        ParameterManagerService::with_backend(
            backend,
            "test-project",
            "global",
            &CacheConfig {
                enabled: true,
                ttl_seconds: 300,
            },
        )
    }

    #[tokio::test]
    async fn test_batch_get_mixes_hits_misses_and_failures() {
        let backend = Arc::new(MemoryParameterBackend::new());
        let service = service(backend.clone());
        service
            .create_parameter(ParameterCreateRequest::new("a", ParameterFormat::Json))
            .await
            .unwrap();
        service
            .create_parameter_version(ParameterVersionCreateRequest::new(
                "a",
                "v1",
                json!({"k": 1}),
                ParameterFormat::Json,
            ))
            .await
            .unwrap();
        service.get_parameter("a", None).await.unwrap();

        let names = vec!["a".to_string(), "missing".to_string()];
        let batch = service.get_parameters_batch(&names, None).await;
        assert_eq!(batch.total_requested, 2);
        assert_eq!(batch.cache_hits, 1);
        assert_eq!(batch.api_calls, 1);
        // one miss from the warm-up read, one from "missing"
        assert_eq!(service.get_cache_stats().cache.misses, 2);
        assert_eq!(service.get_cache_stats().cache.hits, 1);
        assert_eq!(batch.parameters["a"].as_ref().unwrap().data, json!({"k": 1}));
        assert!(batch.parameters["missing"].is_none());
        assert_eq!(batch.errors.len(), 1);
        assert_eq!(batch.errors[0].error, "not_found");

        let stats = service.get_cache_stats();
        assert_eq!(stats.batch_stats.total_batch_operations, 1);
        assert_eq!(stats.batch_stats.total_parameters_in_batches, 2);
        assert_eq!(stats.batch_stats.cache_hits_in_batches, 1);
    }

    #[tokio::test]
    async fn test_batch_create_and_delete_continue_past_failures() {
        let backend = Arc::new(MemoryParameterBackend::new());
        let service = service(backend);

        let created = service
            .create_parameters_batch(vec![
                ParameterCreateRequest::new("one", ParameterFormat::Unformatted),
                ParameterCreateRequest::new("one", ParameterFormat::Unformatted),
                ParameterCreateRequest::new("two", ParameterFormat::Yaml),
            ])
            .await;
        assert_eq!(created.successful, vec!["one", "two"]);
        assert_eq!(created.failed, vec!["one"]);
        assert_eq!(created.errors[0].error, "generic");
        assert!(created.errors[0].message.contains("already exists"));

        let names = vec!["one".to_string(), "ghost".to_string()];
        let deleted = service.delete_parameters_batch(&names).await;
        assert_eq!(deleted.successful, vec!["one"]);
        assert_eq!(deleted.failed, vec!["ghost"]);
        assert_eq!(service.get_cache_stats().batch_stats.total_batch_operations, 2);
    }
}
