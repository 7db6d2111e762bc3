/// Secret Manager facade
///
/// Validates requests, issues the backend RPCs, maps failures through the
/// [`ErrorMapper`] and optionally caches secret reads. Writes that change
/// what a cached key resolves to invalidate it before returning.
pub mod requests;
pub mod responses;

pub use requests::{SecretAccessRequest, SecretCreateRequest, SecretListRequest, SecretVersionCreateRequest};
pub use responses::{
    SecretCreateResponse, SecretListResponse, SecretMetadataResponse, SecretOperationResponse,
    SecretResponse, SecretVersionListResponse, SecretVersionResponse,
};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::rest::{HttpOptions, RestSecretBackend};
use crate::backend::{resource_id, SecretBackend, SecretRecord};
use crate::cache::{cache_key, CacheStats, TtlCache, LATEST};
use crate::config::{CacheConfig, DEFAULT_CACHE_TTL_SECONDS};
use crate::error::{BackendCode, BackendError, DomainError, DomainResult, ErrorContext, ServiceKind};
use crate::error_mapper::ErrorMapper;
use crate::operation::Operation;
use crate::resolver::{CredentialsInput, Resolver, ResolverOptions};
use crate::token::TokenProvider;
use crate::validation::validate_request;

const SERVICE: ServiceKind = ServiceKind::SecretManager;

pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Construction options
#[derive(Debug, Clone)]
pub struct SecretManagerOptions {
    pub project_id: Option<String>,
    pub credentials: Option<CredentialsInput>,
    pub credentials_path: Option<PathBuf>,
    pub enable_cache: bool,
    pub cache_ttl_seconds: u64,
    pub http: HttpOptions,
}

impl Default for SecretManagerOptions {
    fn default() -> Self {
        Self {
            project_id: None,
            credentials: None,
            credentials_path: None,
            enable_cache: false,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            http: HttpOptions::default(),
        }
    }
}

impl SecretManagerOptions {
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

#[derive(Debug, Clone, Copy)]
enum Transition {
    Disable,
    Enable,
    Destroy,
}

impl Transition {
    fn operation(&self) -> &'static str {
        match self {
            Transition::Disable => "secret version disable",
            Transition::Enable => "secret version enable",
            Transition::Destroy => "secret version destroy",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            Transition::Disable => "disabled",
            Transition::Enable => "enabled",
            Transition::Destroy => "destroyed",
        }
    }
}

/// Secret Manager service
pub struct SecretManagerService {
    backend: Arc<dyn SecretBackend>,
    project_id: String,
    mapper: ErrorMapper,
    cache: TtlCache<SecretResponse>,
}

impl SecretManagerService {
    /// Resolve project and credentials from the process environment and
    /// connect to the public API
    pub async fn new(options: SecretManagerOptions) -> DomainResult<Self> {
        Self::with_resolver(&Resolver::from_process_env(), options).await
    }

    pub async fn with_resolver(resolver: &Resolver, options: SecretManagerOptions) -> DomainResult<Self> {
        let identity = resolver
            .resolve(&options.resolver_options())
            .await
            .map_err(|e| e.into_domain(SERVICE))?;

        let mapper = ErrorMapper::new(SERVICE, identity.project_id.clone());
        let init_context = ErrorContext::new().with("project_id", identity.project_id.clone());
        let http = options
            .http
            .build_client()
            .map_err(|e| mapper.map(&e, "client initialization", &init_context))?;
        let tokens = Arc::new(TokenProvider::new(
            identity.credentials.clone(),
            resolver.env().clone(),
            http,
        ));
        let backend = RestSecretBackend::new(tokens, &options.http)
            .map_err(|e| mapper.map(&e, "client initialization", &init_context))?;

        info!(
            project_id = %identity.project_id,
            project_source = %identity.project_source,
            credentials_source = identity.credentials_source.as_deref().unwrap_or("default"),
            cache_enabled = options.enable_cache,
            "Secret Manager service initialized"
        );

        Ok(Self::with_backend(
            Arc::new(backend),
            identity.project_id,
            &options.cache_config(),
        ))
    }

    /// Build over an existing backend
    pub fn with_backend(backend: Arc<dyn SecretBackend>, project_id: impl Into<String>, cache: &CacheConfig) -> Self {
        let project_id = project_id.into();
        Self {
            backend,
            mapper: ErrorMapper::new(SERVICE, project_id.clone()),
            project_id,
            cache: TtlCache::from_config("secret_manager", cache),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// The read cache, for inspection and manual expiry
    pub fn cache(&self) -> &TtlCache<SecretResponse> {
        &self.cache
    }

    fn project_path(&self) -> String {
        format!("projects/{}", self.project_id)
    }

    fn secret_path(&self, secret_name: &str) -> String {
        format!("projects/{}/secrets/{}", self.project_id, secret_name)
    }

    fn version_path(&self, secret_name: &str, version: &str) -> String {
        format!("{}/versions/{}", self.secret_path(secret_name), version)
    }

    fn context(secret_name: &str, version: Option<&str>) -> ErrorContext {
        let mut context = ErrorContext::new().with("secret_name", secret_name);
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

    fn metadata(record: SecretRecord, version_count: Option<usize>) -> SecretMetadataResponse {
        SecretMetadataResponse {
            secret_name: resource_id(&record.name).to_string(),
            created_time: record.create_time,
            labels: (!record.labels.is_empty()).then_some(record.labels),
            replication_policy: record.replication.policy_name().to_string(),
            version_count,
        }
    }

    /// Create a secret and store `secret_value` as version 1
    pub async fn create_secret(&self, request: SecretCreateRequest) -> DomainResult<SecretCreateResponse> {
        validate_request(SERVICE, &request)?;
        let secret_name = request.secret_name.trim();
        let context = Self::context(secret_name, None);
        let op = Operation::start(
            SERVICE,
            "secret creation",
            &self.project_id,
            context
                .clone()
                .with("replication_policy", request.replication_policy.clone())
                .with("label_count", request.labels.as_ref().map_or(0, |l| l.len()).to_string())
                .with("secret_value_length", request.secret_value.len().to_string()),
        );

        debug!(secret_name, step = "create_secret_resource", "Creating secret resource");
        let labels = request.labels.clone().unwrap_or_default();
        let secret = self
            .backend
            .create_secret(&self.project_path(), secret_name, &request.replication(), &labels)
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        debug!(secret_name, step = "add_secret_version", "Adding initial secret version");
        let version = self
            .backend
            .add_secret_version(&secret.name, request.secret_value.as_bytes())
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        self.cache.invalidate(secret_name, Some(LATEST));
        let version_number = resource_id(&version.name).to_string();
        op.succeed_with(&ErrorContext::new().with("version", version_number.clone()));

        Ok(SecretCreateResponse {
            secret_name: secret_name.to_string(),
            version: version_number,
            created_time: secret.create_time,
            replication_policy: request.replication_policy.clone(),
        })
    }

    /// Read a secret value; `None` reads the newest enabled version
    pub async fn get_secret(&self, secret_name: &str, version: Option<&str>) -> DomainResult<SecretResponse> {
        let request = SecretAccessRequest::new(secret_name, version);
        validate_request(SERVICE, &request)?;
        let secret_name = request.secret_name.trim();
        let version = request.version.trim();

        // Only a pinned version is a meaningful "version not found" target
        let context = Self::context(secret_name, (version != LATEST).then_some(version));
        let op = Operation::start(
            SERVICE,
            "secret retrieval",
            &self.project_id,
            context
                .clone()
                .with("requested_version", version)
                .with("cache_enabled", self.cache.is_enabled().to_string()),
        );

        let key = cache_key(secret_name, Some(version));
        if let Some(cached) = self.cache.get(&key) {
            op.succeed_with(&ErrorContext::new().with("cache_hit", "true"));
            return Ok(cached);
        }

        let accessed = self
            .backend
            .access_secret_version(&self.version_path(secret_name, version))
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        let secret_value = String::from_utf8(accessed.data).map_err(|e| {
            let err = BackendError::new(
                BackendCode::DataLoss,
                format!("Secret payload is not valid UTF-8: {}", e.utf8_error()),
            );
            self.fail(&op, &err, &context)
        })?;

        let response = SecretResponse {
            secret_name: secret_name.to_string(),
            secret_value,
            version: resource_id(&accessed.name).to_string(),
            created_time: chrono::Utc::now(),
            state: "ENABLED".to_string(),
        };
        self.cache.put(&key, response.clone());

        op.succeed_with(
            &ErrorContext::new()
                .with("version", response.version.clone())
                .with("cache_hit", "false"),
        );
        Ok(response)
    }

    pub async fn list_secrets(&self, page_size: u32, page_token: Option<&str>) -> DomainResult<SecretListResponse> {
        let request = SecretListRequest {
            page_size,
            page_token: page_token.map(str::to_string),
        };
        validate_request(SERVICE, &request)?;
        let context = ErrorContext::new().with("page_size", page_size.to_string());
        let op = Operation::start(SERVICE, "secret listing", &self.project_id, context.clone());

        let page = self
            .backend
            .list_secrets(&self.project_path(), request.page_size, request.page_token)
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        let response = SecretListResponse {
            secrets: page.items.into_iter().map(|s| Self::metadata(s, None)).collect(),
            next_page_token: page.next_page_token,
            total_size: page.total_size,
        };
        op.succeed_with(&ErrorContext::new().with("secret_count", response.secrets.len().to_string()));
        Ok(response)
    }

    /// Delete a secret and every version; all cached versions are dropped
    pub async fn delete_secret(&self, secret_name: &str) -> DomainResult<SecretOperationResponse> {
        let request = SecretAccessRequest::new(secret_name, None);
        validate_request(SERVICE, &request)?;
        let secret_name = request.secret_name.trim();
        let context = Self::context(secret_name, None);
        let op = Operation::start(SERVICE, "secret deletion", &self.project_id, context.clone());

        self.backend
            .delete_secret(&self.secret_path(secret_name))
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        self.cache.invalidate(secret_name, None);
        op.succeed();
        Ok(SecretOperationResponse::ok(format!(
            "Secret '{}' deleted successfully",
            secret_name
        )))
    }

    /// Add a version; only the `latest` cache entry is dropped
    pub async fn add_secret_version(&self, request: SecretVersionCreateRequest) -> DomainResult<SecretVersionResponse> {
        validate_request(SERVICE, &request)?;
        let secret_name = request.secret_name.trim();
        let context = Self::context(secret_name, None);
        let op = Operation::start(
            SERVICE,
            "secret version creation",
            &self.project_id,
            context
                .clone()
                .with("secret_value_length", request.secret_value.len().to_string()),
        );

        let version = self
            .backend
            .add_secret_version(&self.secret_path(secret_name), request.secret_value.as_bytes())
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        self.cache.invalidate(secret_name, Some(LATEST));
        let response = SecretVersionResponse {
            secret_name: secret_name.to_string(),
            version: resource_id(&version.name).to_string(),
            created_time: version.create_time,
            state: version.state.as_str().to_string(),
        };
        op.succeed_with(&ErrorContext::new().with("version", response.version.clone()));
        Ok(response)
    }

    pub async fn list_secret_versions(
        &self,
        secret_name: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> DomainResult<SecretVersionListResponse> {
        let request = SecretAccessRequest::new(secret_name, None);
        validate_request(SERVICE, &request)?;
        let paging = SecretListRequest {
            page_size,
            page_token: page_token.map(str::to_string),
        };
        validate_request(SERVICE, &paging)?;

        let secret_name = request.secret_name.trim();
        let context = Self::context(secret_name, None);
        let op = Operation::start(
            SERVICE,
            "secret version listing",
            &self.project_id,
            context.clone().with("page_size", page_size.to_string()),
        );

        let page = self
            .backend
            .list_secret_versions(&self.secret_path(secret_name), paging.page_size, paging.page_token)
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;

        let response = SecretVersionListResponse {
            versions: page
                .items
                .into_iter()
                .map(|v| SecretVersionResponse {
                    secret_name: secret_name.to_string(),
                    version: resource_id(&v.name).to_string(),
                    created_time: v.create_time,
                    state: v.state.as_str().to_string(),
                })
                .collect(),
            next_page_token: page.next_page_token,
            total_size: page.total_size,
        };
        op.succeed_with(&ErrorContext::new().with("version_count", response.versions.len().to_string()));
        Ok(response)
    }

    pub async fn disable_secret_version(&self, secret_name: &str, version: &str) -> DomainResult<SecretOperationResponse> {
        self.transition(secret_name, version, Transition::Disable).await
    }

    pub async fn enable_secret_version(&self, secret_name: &str, version: &str) -> DomainResult<SecretOperationResponse> {
        self.transition(secret_name, version, Transition::Enable).await
    }

    /// Irreversibly destroy a version's payload
    pub async fn destroy_secret_version(&self, secret_name: &str, version: &str) -> DomainResult<SecretOperationResponse> {
        self.transition(secret_name, version, Transition::Destroy).await
    }

    async fn transition(
        &self,
        secret_name: &str,
        version: &str,
        transition: Transition,
    ) -> DomainResult<SecretOperationResponse> {
        let request = SecretAccessRequest::new(secret_name, Some(version));
        validate_request(SERVICE, &request)?;
        let secret_name = request.secret_name.trim();
        let version = request.version.trim();
        let context = Self::context(secret_name, Some(version));
        let op = Operation::start(SERVICE, transition.operation(), &self.project_id, context.clone());

        let path = self.version_path(secret_name, version);
        let result = match transition {
            Transition::Disable => self.backend.disable_secret_version(&path).await,
            Transition::Enable => self.backend.enable_secret_version(&path).await,
            Transition::Destroy => self.backend.destroy_secret_version(&path).await,
        };
        result.map_err(|e| self.fail(&op, &e, &context))?;

        // The version's own entry and whatever `latest` resolved to
        self.cache.invalidate(secret_name, Some(version));
        self.cache.invalidate(secret_name, Some(LATEST));
        op.succeed();

        Ok(SecretOperationResponse::ok(format!(
            "Secret '{}' version '{}' {} successfully",
            secret_name,
            version,
            transition.past_tense()
        )))
    }

    /// Secret metadata without the value
    pub async fn get_secret_metadata(&self, secret_name: &str) -> DomainResult<SecretMetadataResponse> {
        let request = SecretAccessRequest::new(secret_name, None);
        validate_request(SERVICE, &request)?;
        let secret_name = request.secret_name.trim();
        let context = Self::context(secret_name, None);
        let op = Operation::start(SERVICE, "secret metadata retrieval", &self.project_id, context.clone());

        let record = self
            .backend
            .get_secret(&self.secret_path(secret_name))
            .await
            .map_err(|e| self.fail(&op, &e, &context))?;
        let version_count = self.count_versions(&record.name).await;

        let response = Self::metadata(record, version_count);
        op.succeed_with(
            &ErrorContext::new().with(
                "version_count",
                version_count.map_or_else(|| "unknown".to_string(), |c| c.to_string()),
            ),
        );
        Ok(response)
    }

    /// Best effort; a listing failure is logged and reported as unknown
    async fn count_versions(&self, secret_path: &str) -> Option<usize> {
        let mut counted = 0;
        let mut page_token = None;
        loop {
            let page = match self.backend.list_secret_versions(secret_path, 1000, page_token).await {
                Ok(page) => page,
                Err(err) => {
                    warn!(
                        secret_path,
                        error = %err,
                        step = "get_version_count",
                        "Failed to get version count for secret"
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

    /// Whether the secret exists; errors other than NotFound propagate
    pub async fn secret_exists(&self, secret_name: &str) -> DomainResult<bool> {
        let request = SecretAccessRequest::new(secret_name, None);
        validate_request(SERVICE, &request)?;
        let secret_name = request.secret_name.trim();

        match self.backend.get_secret(&self.secret_path(secret_name)).await {
            Ok(_) => Ok(true),
            Err(err) if err.code == BackendCode::NotFound => Ok(false),
            Err(err) => Err(self.mapper.map(
                &err,
                "secret existence check",
                &Self::context(secret_name, None),
            )),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
