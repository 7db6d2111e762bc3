/// Credential material and the probes that find it
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::{Probe, ProbeError, ResolverOptions};
use crate::env::EnvSource;
use crate::error::CredentialsError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const ADC_FILE: &str = "application_default_credentials.json";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Service account key file
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// User credentials written by `gcloud auth application-default login`
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthorizedUserKey {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub quota_project_id: Option<String>,
}

/// Parsed credential file
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ServiceAccount(key) => f
                .debug_struct("ServiceAccount")
                .field("client_email", &key.client_email)
                .field("private_key_id", &key.private_key_id)
                .field("private_key", &"[REDACTED]")
                .finish(),
            Credentials::AuthorizedUser(key) => f
                .debug_struct("AuthorizedUser")
                .field("client_id", &key.client_id)
                .field("client_secret", &"[REDACTED]")
                .field("refresh_token", &"[REDACTED]")
                .finish(),
        }
    }
}

impl Credentials {
    /// Parse and check a credential JSON document
    pub fn from_json(text: &str) -> Result<Self, CredentialsError> {
        let creds: Credentials =
            serde_json::from_str(text).map_err(|e| CredentialsError::Parse(e.to_string()))?;
        creds.check()?;
        Ok(creds)
    }

    pub fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        let text = std::fs::read_to_string(path).map_err(|source| CredentialsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    fn check(&self) -> Result<(), CredentialsError> {
        match self {
            Credentials::ServiceAccount(key) => {
                if key.client_email.trim().is_empty() {
                    return Err(CredentialsError::Parse("client_email is empty".to_string()));
                }
                jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
                    .map_err(|e| CredentialsError::InvalidKey(e.to_string()))?;
            }
            Credentials::AuthorizedUser(key) => {
                if key.refresh_token.trim().is_empty() {
                    return Err(CredentialsError::Parse("refresh_token is empty".to_string()));
                }
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::ServiceAccount(_) => "service_account",
            Credentials::AuthorizedUser(_) => "authorized_user",
        }
    }

    /// Identity safe to log
    pub fn principal(&self) -> &str {
        match self {
            Credentials::ServiceAccount(key) => &key.client_email,
            Credentials::AuthorizedUser(key) => &key.client_id,
        }
    }
}

/// Credentials passed to a constructor
#[derive(Debug, Clone)]
pub enum CredentialsInput {
    Json(String),
    Parsed(Credentials),
}

/// Build the credential chain
pub fn probes(env: &Arc<dyn EnvSource>, options: &ResolverOptions) -> Vec<Box<dyn Probe<Credentials>>> {
    vec![
        Box::new(ExplicitPath(options.credentials_path.clone())),
        Box::new(ExplicitValue(options.credentials.clone())),
        Box::new(EnvPath { env: env.clone() }),
        Box::new(AmbientDefault { env: env.clone() }),
    ]
}

/// File path passed to the constructor; errors are fatal
pub struct ExplicitPath(pub Option<PathBuf>);

#[async_trait]
impl Probe<Credentials> for ExplicitPath {
    fn source(&self) -> &str {
        "credentials_path"
    }

    fn fatal(&self) -> bool {
        true
    }

    async fn probe(&self) -> Result<Option<Credentials>, ProbeError> {
        match &self.0 {
            Some(path) => Credentials::from_file(path)
                .map(Some)
                .map_err(|e| ProbeError::credentials(self.source(), e)),
            None => Ok(None),
        }
    }
}

/// Credential object or JSON passed to the constructor; errors are fatal
pub struct ExplicitValue(pub Option<CredentialsInput>);

#[async_trait]
impl Probe<Credentials> for ExplicitValue {
    fn source(&self) -> &str {
        "credentials"
    }

    fn fatal(&self) -> bool {
        true
    }

    async fn probe(&self) -> Result<Option<Credentials>, ProbeError> {
        match &self.0 {
            Some(CredentialsInput::Parsed(creds)) => Ok(Some(creds.clone())),
            Some(CredentialsInput::Json(text)) => Credentials::from_json(text)
                .map(Some)
                .map_err(|e| ProbeError::credentials(self.source(), e)),
            None => Ok(None),
        }
    }
}

/// `GOOGLE_APPLICATION_CREDENTIALS`
pub struct EnvPath {
    pub env: Arc<dyn EnvSource>,
}

#[async_trait]
impl Probe<Credentials> for EnvPath {
    fn source(&self) -> &str {
        "GOOGLE_APPLICATION_CREDENTIALS"
    }

    async fn probe(&self) -> Result<Option<Credentials>, ProbeError> {
        match self.env.get("GOOGLE_APPLICATION_CREDENTIALS") {
            Some(path) => Credentials::from_file(Path::new(path.trim()))
                .map(Some)
                .map_err(|e| ProbeError::credentials(self.source(), e)),
            None => Ok(None),
        }
    }
}

/// Well-known application default credentials file
pub struct AmbientDefault {
    pub env: Arc<dyn EnvSource>,
}

impl AmbientDefault {
    pub fn well_known_path(&self) -> Option<PathBuf> {
        if let Some(dir) = self.env.get("CLOUDSDK_CONFIG") {
            return Some(PathBuf::from(dir).join(ADC_FILE));
        }
        self.env
            .get("HOME")
            .map(|home| PathBuf::from(home).join(".config").join("gcloud").join(ADC_FILE))
    }
}

#[async_trait]
impl Probe<Credentials> for AmbientDefault {
    fn source(&self) -> &str {
        "application_default"
    }

    async fn probe(&self) -> Result<Option<Credentials>, ProbeError> {
        let path = match self.well_known_path() {
            Some(path) if path.is_file() => path,
            other => {
                debug!(path = ?other, "No application default credentials file");
                return Ok(None);
            }
        };

        Credentials::from_file(&path)
            .map(Some)
            .map_err(|e| ProbeError::credentials(self.source(), e))
    }
}
