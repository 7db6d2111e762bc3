/// Project and credential resolution
///
/// Both lookups are ordered chains of probes driven by [`first_success`]:
/// the first probe yielding a value wins and later probes are never run.
/// Probes flagged fatal abort the chain on error; the rest are logged and
/// skipped.
pub mod credentials;
pub mod project;

pub use credentials::{
    AuthorizedUserKey, Credentials, CredentialsInput, ServiceAccountKey, DEFAULT_TOKEN_URI,
};

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::env::{EnvSource, ProcessEnv};
use crate::error::ResolveError;

/// A probe failure
#[derive(Error, Debug)]
#[error("{probe}: {message}")]
pub struct ProbeError {
    pub probe: String,
    pub message: String,
    /// Original cause when the failure came from credential parsing
    pub credentials: Option<crate::error::CredentialsError>,
}

impl ProbeError {
    pub fn new(probe: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            probe: probe.into(),
            message: message.into(),
            credentials: None,
        }
    }

    pub fn credentials(probe: impl Into<String>, err: crate::error::CredentialsError) -> Self {
        Self {
            probe: probe.into(),
            message: err.to_string(),
            credentials: Some(err),
        }
    }

    fn into_resolve_error(self) -> ResolveError {
        match self.credentials {
            Some(source) => ResolveError::Credentials {
                probe: self.probe,
                source,
            },
            None => ResolveError::Probe {
                probe: self.probe,
                message: self.message,
            },
        }
    }
}

/// One step of a fallback chain
#[async_trait]
pub trait Probe<T: Send>: Send + Sync {
    /// Name reported in logs and exhaustion errors
    fn source(&self) -> &str;

    /// Whether an error from this probe aborts the chain
    fn fatal(&self) -> bool {
        false
    }

    async fn probe(&self) -> Result<Option<T>, ProbeError>;
}

/// Result of running a chain to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Found { source: String, value: T },
    Exhausted { attempted: Vec<String> },
}

/// Run probes in order until one yields a value
pub async fn first_success<T: Send>(probes: &[Box<dyn Probe<T>>]) -> Result<Outcome<T>, ProbeError> {
    let mut attempted = Vec::with_capacity(probes.len());

    for probe in probes {
        attempted.push(probe.source().to_string());
        match probe.probe().await {
            Ok(Some(value)) => {
                debug!(source = probe.source(), "Probe matched");
                return Ok(Outcome::Found {
                    source: probe.source().to_string(),
                    value,
                });
            }
            Ok(None) => {
                debug!(source = probe.source(), "Probe found nothing");
            }
            Err(err) if probe.fatal() => return Err(err),
            Err(err) => {
                warn!(source = probe.source(), error = %err.message, "Probe failed, continuing");
            }
        }
    }

    Ok(Outcome::Exhausted { attempted })
}

/// What a facade resolved at construction time
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub project_id: String,
    pub project_source: String,
    /// `None` means the backend client's own default authentication
    pub credentials: Option<Credentials>,
    pub credentials_source: Option<String>,
}

/// Explicit inputs handed to a facade constructor
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    pub project_id: Option<String>,
    pub credentials: Option<CredentialsInput>,
    pub credentials_path: Option<PathBuf>,
}

/// Builds and runs the project and credential chains
pub struct Resolver {
    env: Arc<dyn EnvSource>,
    config: ResolverConfig,
    http: reqwest::Client,
}

impl Resolver {
    pub fn new(env: Arc<dyn EnvSource>, config: ResolverConfig) -> Self {
        Self {
            env,
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Resolver over the process environment
    pub fn from_process_env() -> Self {
        let env: Arc<dyn EnvSource> = Arc::new(ProcessEnv::new());
        let config = ResolverConfig::from_env(env.as_ref());
        Self::new(env, config)
    }

    pub fn env(&self) -> &Arc<dyn EnvSource> {
        &self.env
    }

    pub fn project_probes(&self, explicit: Option<&str>) -> Vec<Box<dyn Probe<String>>> {
        project::probes(&self.env, &self.config, &self.http, explicit)
    }

    pub fn credential_probes(&self, options: &ResolverOptions) -> Vec<Box<dyn Probe<Credentials>>> {
        credentials::probes(&self.env, options)
    }

    /// Resolve the project, failing when every source comes up empty
    pub async fn resolve_project(&self, explicit: Option<&str>) -> Result<(String, String), ResolveError> {
        let probes = self.project_probes(explicit);
        match first_success(&probes)
            .await
            .map_err(ProbeError::into_resolve_error)?
        {
            Outcome::Found { source, value } => {
                info!(project_id = %value, source = %source, "Project ID resolved");
                Ok((value, source))
            }
            Outcome::Exhausted { attempted } => {
                warn!(attempted = ?attempted, "Could not determine project ID from any source");
                Err(ResolveError::NoProject { attempted })
            }
        }
    }

    /// Resolve credentials; exhaustion means ambient authentication
    pub async fn resolve_credentials(
        &self,
        options: &ResolverOptions,
    ) -> Result<Option<(Credentials, String)>, ResolveError> {
        let probes = self.credential_probes(options);
        match first_success(&probes)
            .await
            .map_err(ProbeError::into_resolve_error)?
        {
            Outcome::Found { source, value } => {
                info!(
                    source = %source,
                    credential_type = value.kind(),
                    principal = value.principal(),
                    "Credentials resolved"
                );
                Ok(Some((value, source)))
            }
            Outcome::Exhausted { .. } => {
                info!("No explicit credentials found, using backend default authentication");
                Ok(None)
            }
        }
    }

    pub async fn resolve(&self, options: &ResolverOptions) -> Result<ResolvedIdentity, ResolveError> {
        let (project_id, project_source) = self.resolve_project(options.project_id.as_deref()).await?;
        let credentials = self.resolve_credentials(options).await?;
        let (credentials, credentials_source) = match credentials {
            Some((creds, source)) => (Some(creds), Some(source)),
            None => (None, None),
        };

        Ok(ResolvedIdentity {
            project_id,
            project_source,
            credentials,
            credentials_source,
        })
    }
}
