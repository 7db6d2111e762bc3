/// Project ID probes, in priority order
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{Probe, ProbeError};
use crate::config::ResolverConfig;
use crate::env::EnvSource;

/// Variable read by the framework-level lookup
pub const FRAMEWORK_PROJECT_VAR: &str = "GOOGLE_CLOUD_PROJECT";

/// Conventional variables, highest priority first
pub const STANDARD_PROJECT_VARS: [&str; 4] = [
    "GOOGLE_CLOUD_PROJECT",
    "GCP_PROJECT",
    "GCLOUD_PROJECT",
    "PROJECT_ID",
];

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Build the project chain
pub fn probes(
    env: &Arc<dyn EnvSource>,
    config: &ResolverConfig,
    http: &reqwest::Client,
    explicit: Option<&str>,
) -> Vec<Box<dyn Probe<String>>> {
    vec![
        Box::new(ExplicitProject(explicit.map(str::to_string))),
        Box::new(EnvProject {
            source: "framework_env",
            env: env.clone(),
            keys: vec![FRAMEWORK_PROJECT_VAR],
        }),
        Box::new(EnvProject {
            source: "standard_env",
            env: env.clone(),
            keys: STANDARD_PROJECT_VARS.to_vec(),
        }),
        Box::new(GcloudConfig {
            binary: config.gcloud_binary.clone(),
            timeout: config.gcloud_timeout,
        }),
        Box::new(MetadataServer {
            url: config.metadata_url.clone(),
            timeout: config.metadata_timeout,
            client: http.clone(),
        }),
    ]
}

/// Value passed to the constructor
pub struct ExplicitProject(pub Option<String>);

#[async_trait]
impl Probe<String> for ExplicitProject {
    fn source(&self) -> &str {
        "explicit"
    }

    async fn probe(&self) -> Result<Option<String>, ProbeError> {
        Ok(self.0.as_deref().and_then(non_blank))
    }
}

/// First non-blank variable among `keys`
pub struct EnvProject {
    pub source: &'static str,
    pub env: Arc<dyn EnvSource>,
    pub keys: Vec<&'static str>,
}

#[async_trait]
impl Probe<String> for EnvProject {
    fn source(&self) -> &str {
        self.source
    }

    async fn probe(&self) -> Result<Option<String>, ProbeError> {
        for key in &self.keys {
            if let Some(value) = self.env.get(key).as_deref().and_then(non_blank) {
                debug!(source = self.source, env_var = key, "Project ID found in environment");
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

/// `gcloud config get-value project`
pub struct GcloudConfig {
    pub binary: String,
    pub timeout: Duration,
}

#[async_trait]
impl Probe<String> for GcloudConfig {
    fn source(&self) -> &str {
        "gcloud_config"
    }

    async fn probe(&self) -> Result<Option<String>, ProbeError> {
        let child = Command::new(&self.binary)
            .args(["config", "get-value", "project"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ProbeError::new(self.source(), format!("could not run {}: {}", self.binary, e))),
            Err(_) => {
                return Err(ProbeError::new(
                    self.source(),
                    format!("timed out after {}s", self.timeout.as_secs()),
                ))
            }
        };

        if !output.status.success() {
            return Err(ProbeError::new(
                self.source(),
                format!("exited with {}", output.status),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(non_blank(&stdout).filter(|value| value != "(unset)"))
    }
}

/// Compute metadata server project endpoint
pub struct MetadataServer {
    pub url: String,
    pub timeout: Duration,
    pub client: reqwest::Client,
}

#[async_trait]
impl Probe<String> for MetadataServer {
    fn source(&self) -> &str {
        "metadata_server"
    }

    async fn probe(&self) -> Result<Option<String>, ProbeError> {
        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProbeError::new(self.source(), e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProbeError::new(
                self.source(),
                format!("metadata server returned {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::new(self.source(), e.to_string()))?;
        Ok(non_blank(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;

    #[tokio::test]
    async fn test_explicit_blank_is_absent() {
        assert_eq!(ExplicitProject(Some("  ".into())).probe().await.unwrap(), None);
        assert_eq!(
            ExplicitProject(Some(" my-project ".into())).probe().await.unwrap(),
            Some("my-project".to_string())
        );
    }

    #[tokio::test]
    async fn test_standard_env_priority() {
        let env: Arc<dyn EnvSource> = Arc::new(
            MapEnv::new()
                .with("GCLOUD_PROJECT", "third")
                .with("GCP_PROJECT", "second")
                .with("PROJECT_ID", "fourth"),
        );
        let probe = EnvProject {
            source: "standard_env",
            env,
            keys: STANDARD_PROJECT_VARS.to_vec(),
        };
        assert_eq!(probe.probe().await.unwrap(), Some("second".to_string()));
    }

    #[tokio::test]
    async fn test_missing_gcloud_binary_is_an_error() {
        let probe = GcloudConfig {
            binary: "/nonexistent/spartan-gcloud".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(probe.probe().await.is_err());
        assert!(!probe.fatal());
    }

    #[tokio::test]
    async fn test_unreachable_metadata_server_is_an_error() {
        let probe = MetadataServer {
            url: "http://127.0.0.1:9/computeMetadata/v1/project/project-id".to_string(),
            timeout: Duration::from_millis(200),
            client: reqwest::Client::new(),
        };
        assert!(probe.probe().await.is_err());
    }
}
