/// Parameter Manager facade
///
/// Parameters carry a declared format (UNFORMATTED, JSON or YAML) and a list
/// of immutable versions. Reads without a version resolve to the newest
/// enabled version and are cached under `{name}:latest`.
mod batch;
pub mod format;
pub mod references;
pub mod requests;
pub mod responses;

pub use format::{convert_to_json, convert_to_yaml, parse_json, parse_yaml};
pub use references::{
    find_references, parse_secret_references, validate_secret_references, ReferenceValidation,
    SecretReference,
};
pub use requests::{
    ParameterAccessRequest, ParameterCreateRequest, ParameterListRequest, ParameterUpdateRequest,
    ParameterVersionCreateRequest, ParameterVersionListRequest,
};
pub use responses::{
    BatchGetResponse, BatchItemError, BatchOperationResponse, BatchStats, ParameterCacheStats,
    ParameterCreateResponse, ParameterListResponse, ParameterMetadataResponse,
    ParameterOperationResponse, ParameterResponse, ParameterUpdateResponse,
    ParameterVersionListResponse, ParameterVersionResponse, RenderedParameterResponse,
};

use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backend::rest::{HttpOptions, RestParameterBackend, DEFAULT_TIMEOUT_SECS};
use crate::backend::{resource_id, ParameterBackend, ParameterRecord, ParameterVersionRecord};
use crate::cache::{cache_key, TtlCache, LATEST};
use crate::config::{CacheConfig, DEFAULT_CACHE_TTL_SECONDS, DEFAULT_PARAMETER_LOCATION};
use crate::error::{BackendCode, BackendError, BackendResult, DomainError, DomainResult, ErrorContext, ServiceKind};
use crate::error_mapper::ErrorMapper;
use crate::operation::Operation;
use crate::resolver::{CredentialsInput, Resolver, ResolverOptions};
use crate::token::TokenProvider;
use crate::validation::{payload_text, validate_request};

const SERVICE: ServiceKind = ServiceKind::ParameterManager;

/// Construction options
#[derive(Debug, Clone)]
pub struct ParameterManagerOptions {
    pub project_id: Option<String>,
    pub credentials: Option<CredentialsInput>,
    pub credentials_path: Option<PathBuf>,
    pub location: String,
    pub enable_cache: bool,
    pub cache_ttl_seconds: u64,
    /// Keep idle connections for reuse
    pub enable_connection_pooling: bool,
    /// Idle connections kept per host when pooling is enabled
    pub max_pool_size: usize,
    pub timeout: Duration,
}

impl Default for ParameterManagerOptions {
    fn default() -> Self {
        Self {
            project_id: None,
            credentials: None,
            credentials_path: None,
            location: DEFAULT_PARAMETER_LOCATION.to_string(),
            enable_cache: false,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            enable_connection_pooling: true,
            max_pool_size: 10,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ParameterManagerOptions {
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Self::default()
        }
    }

    pub fn with_cache(mut self, ttl_seconds: u64) -> Self {
        self.enable_cache = true;
        self.cache_ttl_seconds = ttl_seconds;
        self
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: self.timeout,
            pool_max_idle_per_host: if self.enable_connection_pooling {
                self.max_pool_size
            } else {
                0
            },
        }
    }

    fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            project_id: self.project_id.clone(),
            credentials: self.credentials.clone(),
            credentials_path: self.credentials_path.clone(),
        }
    }

    fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            enabled: self.enable_cache,
            ttl_seconds: self.cache_ttl_seconds,
        }
    }
}

/// Parameter Manager service
pub struct ParameterManagerService {
    backend: Arc<dyn ParameterBackend>,
    project_id: String,
    location: String,
    mapper: ErrorMapper,
    cache: TtlCache<ParameterResponse>,
    batch_stats: Mutex<BatchStats>,
}

impl ParameterManagerService {
    pub async fn new(options: ParameterManagerOptions) -> DomainResult<Self> {
        Self::with_resolver(&Resolver::from_process_env(), options).await
    }

    pub async fn with_resolver(resolver: &Resolver, options: ParameterManagerOptions) -> DomainResult<Self> {
        let identity = resolver
            .resolve(&options.resolver_options())
            .await
            .map_err(|e| e.into_domain(SERVICE))?;

        let mapper = ErrorMapper::new(SERVICE, identity.project_id.clone());
        let init_context = ErrorContext::new()
            .with("project_id", identity.project_id.clone())
            .with("location", options.location.clone());
        let http_options = options.http_options();
        let http = http_options
            .build_client()
            .map_err(|e| mapper.map(&e, "client initialization", &init_context))?;
        let tokens = Arc::new(TokenProvider::new(
            identity.credentials.clone(),
            resolver.env().clone(),
            http,
        ));
        let backend = RestParameterBackend::new(tokens, &http_options, &options.location)
            .map_err(|e| mapper.map(&e, "client initialization", &init_context))?;

        info!(
            project_id = %identity.project_id,
            project_source = %identity.project_source,
            credentials_source = identity.credentials_source.as_deref().unwrap_or("default"),
            location = %options.location,
            cache_enabled = options.enable_cache,
            connection_pooling = options.enable_connection_pooling,
            max_pool_size = options.max_pool_size,
            "Parameter Manager service initialized"
        );

        let cache = options.cache_config();
        Ok(Self::with_backend(
            Arc::new(backend),
            identity.project_id,
            options.location,
            &cache,
        ))
    }

    /// Build over an existing backend
    pub fn with_backend(
        backend: Arc<dyn ParameterBackend>,
        project_id: impl Into<String>,
        location: impl Into<String>,
        cache: &CacheConfig,
    ) -> Self {
        let project_id = project_id.into();
        Self {
            backend,
            mapper: ErrorMapper::new(SERVICE, project_id.clone()),
            project_id,
            location: location.into(),
            cache: TtlCache::from_config("parameter_manager", cache),
            batch_stats: Mutex::new(BatchStats::default()),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn cache(&self) -> &TtlCache<ParameterResponse> {
        &self.cache
    }

    fn parent_path(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.location)
    }

    fn parameter_path(&self, parameter_name: &str) -> String {
        format!("{}/parameters/{}", self.parent_path(), parameter_name)
    }

    fn version_path(&self, parameter_name: &str, version: &str) -> String {
        format!("{}/versions/{}", self.parameter_path(parameter_name), version)
    }

    fn context(parameter_name: &str, version: Option<&str>) -> ErrorContext {
        let mut context = ErrorContext::new().with("parameter_name", parameter_name);
        if let Some(version) = version {
            context.insert("version", version);
        }
        context
    }

    fn fail(&self, op: &Operation<'_>, err: &BackendError, context: &ErrorContext) -> DomainError {
        let mapped = self.mapper.map(err, op.name(), context);
        op.fail(&mapped);
        mapped
    }

    fn stats(&self) -> MutexGuard<'_, BatchStats> {
        self.batch_stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn metadata(record: ParameterRecord, version_count: Option<usize>) -> ParameterMetadataResponse {
        ParameterMetadataResponse {
            parameter_name: resource_id(&record.name).to_string(),
            format_type: record.format.as_str().to_string(),
            created_time: record.create_time,
            updated_time: record.update_time,
            labels: (!record.labels.is_empty()).then_some(record.labels),
            version_count,
        }
    }

    fn disabled_error(version_name: &str) -> BackendError {
        BackendError::failed_precondition(format!("Parameter version [{}] is disabled.", version_name))
    }

    /// Newest version that is not disabled, scanning every page
    async fn latest_enabled_version(&self, parameter_path: &str) -> BackendResult<Option<ParameterVersionRecord>> {
        let mut newest: Option<ParameterVersionRecord> = None;
        let mut page_token = None;
        loop {
            let page = self
                .backend
                .list_parameter_versions(parameter_path, 1000, page_token)
                .await?;
            for version in page.items.into_iter().filter(|v| !v.disabled) {
                // Listings come newest first; only a strictly newer timestamp replaces
                let newer = newest
                    .as_ref()
                    .map_or(true, |current| version.create_time > current.create_time);
                if newer {
                    newest = Some(version);
                }
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(newest),
            }
        }
    }

    async fn count_versions(&self, parameter_path: &str) -> Option<usize> {
        let mut counted = 0;
        let mut page_token = None;
        loop {
            let page = match self
                .backend
                .list_parameter_versions(parameter_path, 1000, page_token)
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    warn!(
                        parameter_path,
                        error = %err,
                        step = "get_version_count",
                        "Failed to get version count for parameter"
                    );
                    return None;
                }
            };
            if let Some(total) = page.total_size {
                return Some(total);
            }
            counted += page.items.len();
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Some(counted),
            }
        }
    }

    pub async fn create_parameter(&self, request: ParameterCreateRequest) -> DomainResult<ParameterCreateResponse> {
        validate_request(SERVICE, &request)?;
        let parameter_name = request.parameter_name.trim();
        let context = Self::context(parameter_name, None);
        let op = Operation::start(
            SERVICE,
            "parameter creation",
            &self.project_id,
            context
                .clone()
                .with("format_type", request.format_type.clone())
                .with("label_count", request.labels.as_ref().map_or(0, |l| l.len()).to_string()),
        );

        let labels = request.labels.clone().unwrap_or_default();
        let record = self
            .backend
            .create_parameter(&self.parent_path(), parameter_name, request.format(), &labels)
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        op.succeed();
        Ok(ParameterCreateResponse {
            parameter_name: parameter_name.to_string(),
            created_time: record.create_time,
            format_type: record.format.as_str().to_string(),
        })
    }

    /// Read a parameter; `None` reads the newest enabled version
    pub async fn get_parameter(&self, parameter_name: &str, version: Option<&str>) -> DomainResult<ParameterResponse> {
        self.read_parameter(parameter_name, version, true).await
    }

    /// Backend read that still fills the cache; `check_cache` skips the
    /// lookup for callers that already missed
    pub(super) async fn read_parameter(
        &self,
        parameter_name: &str,
        version: Option<&str>,
        check_cache: bool,
    ) -> DomainResult<ParameterResponse> {
        let request = ParameterAccessRequest::new(parameter_name, version);
        validate_request(SERVICE, &request)?;
        let parameter_name = request.parameter_name.trim();
        let version = request.version.as_deref().map(str::trim);

        let context = Self::context(parameter_name, version);
        let op = Operation::start(
            SERVICE,
            "parameter retrieval",
            &self.project_id,
            context
                .clone()
                .with("cache_enabled", self.cache.is_enabled().to_string()),
        );

        let key = cache_key(parameter_name, version);
        if check_cache {
            if let Some(cached) = self.cache.get(&key) {
                op.succeed_with(&ErrorContext::new().with("cache_hit", "true"));
                return Ok(cached);
            }
        }

        let parameter_path = self.parameter_path(parameter_name);
        let parameter = self
            .backend
            .get_parameter(&parameter_path)
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        let version_id = match version {
            Some(version) => version.to_string(),
            None => {
                let latest = self
                    .latest_enabled_version(&parameter_path)
                    .await
                    .map_err(|e| self.fail(&op, &e, &context))?;
                match latest {
                    Some(record) => resource_id(&record.name).to_string(),
                    None => {
                        let err = BackendError::not_found(format!(
                            "Parameter [{}] has no enabled versions.",
                            parameter_path
                        ));
                        return Err(self.fail(&op, &err, &Self::context(parameter_name, Some(LATEST))));
                    }
                }
            }
        };

        let version_context = Self::context(parameter_name, Some(&version_id));
        let record = self
            .backend
            .get_parameter_version(&self.version_path(parameter_name, &version_id))
            .await
            .map_err(|e| self.fail(&op, &e, &version_context))?;
        if record.disabled {
            return Err(self.fail(&op, &Self::disabled_error(&record.name), &version_context));
        }

        let payload = record.payload.unwrap_or_default();
        let response = ParameterResponse {
            parameter_name: parameter_name.to_string(),
            data: format::decode(&payload, parameter.format),
            format_type: parameter.format.as_str().to_string(),
            version: version_id,
            created_time: record.create_time,
            updated_time: record.update_time,
            labels: (!parameter.labels.is_empty()).then_some(parameter.labels),
        };
        self.cache.put(&key, response.clone());

        op.succeed_with(
            &ErrorContext::new()
                .with("version", response.version.clone())
                .with("data_size", payload.len().to_string())
                .with("cache_hit", "false"),
        );
        Ok(response)
    }

    /// One specific version with its payload; never cached
    pub async fn get_parameter_version(&self, parameter_name: &str, version: &str) -> DomainResult<ParameterVersionResponse> {
        let request = ParameterAccessRequest::new(parameter_name, Some(version));
        validate_request(SERVICE, &request)?;
        let parameter_name = request.parameter_name.trim();
        let version = version.trim();
        let context = Self::context(parameter_name, Some(version));
        let op = Operation::start(SERVICE, "parameter version retrieval", &self.project_id, context.clone());

        let parameter = self
            .backend
            .get_parameter(&self.parameter_path(parameter_name))
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;
        let record = self
            .backend
            .get_parameter_version(&self.version_path(parameter_name, version))
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;
        if record.disabled {
            return Err(self.fail(&op, &Self::disabled_error(&record.name), &context));
        }

        op.succeed();
        Ok(ParameterVersionResponse {
            parameter_name: parameter_name.to_string(),
            version: version.to_string(),
            data: Some(format::decode(
                record.payload.as_deref().unwrap_or_default(),
                parameter.format,
            )),
            format_type: parameter.format.as_str().to_string(),
            created_time: record.create_time,
            disabled: record.disabled,
        })
    }

    pub async fn list_parameters(&self, request: ParameterListRequest) -> DomainResult<ParameterListResponse> {
        validate_request(SERVICE, &request)?;
        let context = ErrorContext::new().with("page_size", request.page_size.to_string());
        let op = Operation::start(
            SERVICE,
            "parameter listing",
            &self.project_id,
            context
                .clone()
                .with("has_filter", request.filter_expression.is_some().to_string()),
        );

        let page = self
            .backend
            .list_parameters(
                &self.parent_path(),
                request.page_size,
                request.page_token.clone(),
                request.filter_expression.clone(),
            )
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        let response = ParameterListResponse {
            parameters: page.items.into_iter().map(|p| Self::metadata(p, None)).collect(),
            next_page_token: page.next_page_token,
            total_size: page.total_size,
        };
        op.succeed_with(&ErrorContext::new().with("parameter_count", response.parameters.len().to_string()));
        Ok(response)
    }

    pub async fn list_parameter_versions(
        &self,
        request: ParameterVersionListRequest,
    ) -> DomainResult<ParameterVersionListResponse> {
        validate_request(SERVICE, &request)?;
        let parameter_name = request.parameter_name.trim();
        let context = Self::context(parameter_name, None);
        let op = Operation::start(
            SERVICE,
            "parameter version listing",
            &self.project_id,
            context.clone().with("page_size", request.page_size.to_string()),
        );

        let parameter_path = self.parameter_path(parameter_name);
        let parameter = self
            .backend
            .get_parameter(&parameter_path)
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;
        let page = self
            .backend
            .list_parameter_versions(&parameter_path, request.page_size, request.page_token.clone())
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        let format_type = parameter.format.as_str().to_string();
        let response = ParameterVersionListResponse {
            versions: page
                .items
                .into_iter()
                .map(|v| ParameterVersionResponse {
                    parameter_name: parameter_name.to_string(),
                    version: resource_id(&v.name).to_string(),
                    data: v.payload.as_deref().map(|p| format::decode(p, parameter.format)),
                    format_type: format_type.clone(),
                    created_time: v.create_time,
                    disabled: v.disabled,
                })
                .collect(),
            next_page_token: page.next_page_token,
            total_size: page.total_size,
        };
        op.succeed_with(&ErrorContext::new().with("version_count", response.versions.len().to_string()));
        Ok(response)
    }

    /// Delete a parameter; every cached version is dropped
    pub async fn delete_parameter(&self, parameter_name: &str) -> DomainResult<ParameterOperationResponse> {
        let request = ParameterAccessRequest::new(parameter_name, None);
        validate_request(SERVICE, &request)?;
        let parameter_name = request.parameter_name.trim();
        let context = Self::context(parameter_name, None);
        let op = Operation::start(SERVICE, "parameter deletion", &self.project_id, context.clone());

        self.backend
            .delete_parameter(&self.parameter_path(parameter_name))
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        self.cache.invalidate(parameter_name, None);
        op.succeed();
        Ok(ParameterOperationResponse::ok(format!(
            "Parameter '{}' deleted successfully",
            parameter_name
        )))
    }

    /// Store a new version; data is validated against its declared
    /// format before any backend call
    pub async fn create_parameter_version(
        &self,
        request: ParameterVersionCreateRequest,
    ) -> DomainResult<ParameterUpdateResponse> {
        validate_request(SERVICE, &request)?;
        let parameter_name = request.parameter_name.trim();
        let version_name = request.version_name.trim();
        let context = Self::context(parameter_name, Some(version_name));
        let op = Operation::start(
            SERVICE,
            "parameter version creation",
            &self.project_id,
            context.clone().with("format_type", request.format_type.clone()),
        );

        let payload = format::encode(&request.data, request.format()).map_err(|e| {
            op.fail(&e);
            e
        })?;
        let record = self
            .backend
            .create_parameter_version(&self.parameter_path(parameter_name), version_name, &payload)
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        self.cache.invalidate(parameter_name, Some(LATEST));
        op.succeed_with(&ErrorContext::new().with("data_size", payload.len().to_string()));
        Ok(ParameterUpdateResponse {
            parameter_name: parameter_name.to_string(),
            version: resource_id(&record.name).to_string(),
            updated_time: record.create_time,
        })
    }

    /// Add a version and, when given, replace the labels
    pub async fn update_parameter(&self, request: ParameterUpdateRequest) -> DomainResult<ParameterUpdateResponse> {
        validate_request(SERVICE, &request)?;
        let parameter_name = request.parameter_name.trim();
        let version_name = request.version_name.trim();
        let context = Self::context(parameter_name, Some(version_name));
        let op = Operation::start(
            SERVICE,
            "parameter update",
            &self.project_id,
            context
                .clone()
                .with("updates_labels", request.labels.is_some().to_string()),
        );

        let parameter_path = self.parameter_path(parameter_name);
        let payload = payload_text(&request.data).into_bytes();
        let record = self
            .backend
            .create_parameter_version(&parameter_path, version_name, &payload)
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;
        self.cache.invalidate(parameter_name, Some(LATEST));

        let mut updated_time = record.create_time;
        if let Some(labels) = &request.labels {
            let parameter = self
                .backend
                .update_parameter_labels(&parameter_path, labels)
                .await
                .map_err(|e| self.fail(&op, &e, &Self::context(parameter_name, None)))?;
            updated_time = parameter.update_time;
            // Cached reads carry labels
            self.cache.invalidate(parameter_name, None);
        }

        op.succeed();
        Ok(ParameterUpdateResponse {
            parameter_name: parameter_name.to_string(),
            version: resource_id(&record.name).to_string(),
            updated_time,
        })
    }

    pub async fn delete_parameter_version(&self, parameter_name: &str, version: &str) -> DomainResult<ParameterOperationResponse> {
        let request = ParameterAccessRequest::new(parameter_name, Some(version));
        validate_request(SERVICE, &request)?;
        let parameter_name = request.parameter_name.trim();
        let version = version.trim();
        let context = Self::context(parameter_name, Some(version));
        let op = Operation::start(SERVICE, "parameter version deletion", &self.project_id, context.clone());

        self.backend
            .delete_parameter_version(&self.version_path(parameter_name, version))
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        self.cache.invalidate(parameter_name, Some(version));
        self.cache.invalidate(parameter_name, Some(LATEST));
        op.succeed();
        Ok(ParameterOperationResponse::ok(format!(
            "Parameter '{}' version '{}' deleted successfully",
            parameter_name, version
        )))
    }

    pub async fn get_parameter_metadata(&self, parameter_name: &str) -> DomainResult<ParameterMetadataResponse> {
        let request = ParameterAccessRequest::new(parameter_name, None);
        validate_request(SERVICE, &request)?;
        let parameter_name = request.parameter_name.trim();
        let context = Self::context(parameter_name, None);
        let op = Operation::start(SERVICE, "parameter metadata retrieval", &self.project_id, context.clone());

        let record = self
            .backend
            .get_parameter(&self.parameter_path(parameter_name))
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;
        let version_count = self.count_versions(&record.name).await;

        op.succeed();
        Ok(Self::metadata(record, version_count))
    }

    /// Whether the parameter exists; errors other than NotFound propagate
    pub async fn parameter_exists(&self, parameter_name: &str) -> DomainResult<bool> {
        let request = ParameterAccessRequest::new(parameter_name, None);
        validate_request(SERVICE, &request)?;
        let parameter_name = request.parameter_name.trim();

        match self.backend.get_parameter(&self.parameter_path(parameter_name)).await {
            Ok(_) => Ok(true),
            Err(err) if err.code == BackendCode::NotFound => Ok(false),
            Err(err) => Err(self.mapper.map(
                &err,
                "parameter existence check",
                &Self::context(parameter_name, None),
            )),
        }
    }

    /// Resolve `${secret...}` references server side
    pub async fn render_parameter(&self, parameter_name: &str, version: Option<&str>) -> DomainResult<RenderedParameterResponse> {
        let request = ParameterAccessRequest::new(parameter_name, version);
        validate_request(SERVICE, &request)?;
        let parameter_name = request.parameter_name.trim();
        let version = request.version.as_deref().map(str::trim);
        let context = Self::context(parameter_name, version);
        let op = Operation::start(SERVICE, "parameter rendering", &self.project_id, context.clone());

        let parameter_path = self.parameter_path(parameter_name);
        let parameter = self
            .backend
            .get_parameter(&parameter_path)
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        let version_id = match version {
            Some(version) => version.to_string(),
            None => match self
                .latest_enabled_version(&parameter_path)
                .await
                .map_err(|e| self.fail(&op, &e, &context))?
            {
                Some(record) => resource_id(&record.name).to_string(),
                None => {
                    let err = BackendError::not_found(format!(
                        "Parameter [{}] has no enabled versions.",
                        parameter_path
                    ));
                    return Err(self.fail(&op, &err, &Self::context(parameter_name, Some(LATEST))));
                }
            },
        };

        let version_context = Self::context(parameter_name, Some(&version_id));
        let rendered = self
            .backend
            .render_parameter_version(&self.version_path(parameter_name, &version_id))
            .await
            .map_err(|e| self.fail(&op, &e, &version_context))?;

        debug!(
            parameter_name,
            version = %version_id,
            references = references::find_references(&String::from_utf8_lossy(&rendered.payload)).len(),
            "Rendered parameter version"
        );
        op.succeed_with(&ErrorContext::new().with("version", version_id.clone()));
        Ok(RenderedParameterResponse {
            parameter_name: parameter_name.to_string(),
            version: version_id,
            format_type: parameter.format.as_str().to_string(),
            rendered_data: format::decode(&rendered.rendered_payload, parameter.format),
            rendered_time: chrono::Utc::now(),
        })
    }

    /// Check the secret references embedded in `data`
    pub fn validate_secret_references(&self, data: &Value) -> ReferenceValidation {
        references::validate_secret_references(&payload_text(data))
    }

    pub fn parse_secret_references(&self, data: &Value) -> Vec<String> {
        references::parse_secret_references(&payload_text(data))
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn get_cache_stats(&self) -> ParameterCacheStats {
        ParameterCacheStats {
            cache: self.cache.stats(),
            batch_stats: self.stats().clone(),
        }
    }
}
