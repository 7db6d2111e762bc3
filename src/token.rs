/// OAuth access tokens for the REST backends
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::env::EnvSource;
use crate::error::{BackendCode, BackendError, BackendResult};
use crate::resolver::{AuthorizedUserKey, Credentials, ServiceAccountKey};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the reported expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

enum Source {
    Credentials(Credentials),
    Static(String),
    Ambient(Arc<dyn EnvSource>),
}

/// Turns resolved credentials into bearer tokens
pub struct TokenProvider {
    source: Source,
    http: reqwest::Client,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn new(credentials: Option<Credentials>, env: Arc<dyn EnvSource>, http: reqwest::Client) -> Self {
        let source = match credentials {
            Some(creds) => Source::Credentials(creds),
            None => Source::Ambient(env),
        };
        Self {
            source,
            http,
            cached: Mutex::new(None),
        }
    }

    /// Provider that always returns the same token
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: Source::Static(token.into()),
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Current bearer token, fetching a new one when the cached token is stale
    pub async fn token(&self) -> BackendResult<String> {
        if let Source::Static(token) = &self.source {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.token.clone());
        }

        let fresh = self.fetch(now).await?;
        debug!(expires_at = %fresh.expires_at.to_rfc3339(), "Access token refreshed");
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn fetch(&self, now: DateTime<Utc>) -> BackendResult<AccessToken> {
        match &self.source {
            Source::Static(token) => Ok(AccessToken {
                token: token.clone(),
                expires_at: now + Duration::days(365),
            }),
            Source::Credentials(Credentials::ServiceAccount(key)) => {
                let assertion = sign_assertion(key, now)?;
                let form = [
                    ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                    ("assertion", assertion.as_str()),
                ];
                let response = self.http.post(&key.token_uri).form(&form).send().await?;
                read_token(response, now).await
            }
            Source::Credentials(Credentials::AuthorizedUser(key)) => {
                self.refresh_user_token(key, now).await
            }
            Source::Ambient(env) => {
                if let Some(token) = env.get("GOOGLE_OAUTH_ACCESS_TOKEN") {
                    return Ok(AccessToken {
                        token,
                        expires_at: now + Duration::seconds(default_expires_in()),
                    });
                }
                let response = self
                    .http
                    .get(METADATA_TOKEN_URL)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?;
                read_token(response, now).await
            }
        }
    }

    async fn refresh_user_token(&self, key: &AuthorizedUserKey, now: DateTime<Utc>) -> BackendResult<AccessToken> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", key.client_id.as_str()),
            ("client_secret", key.client_secret.as_str()),
            ("refresh_token", key.refresh_token.as_str()),
        ];
        let response = self
            .http
            .post(crate::resolver::DEFAULT_TOKEN_URI)
            .form(&form)
            .send()
            .await?;
        read_token(response, now).await
    }
}

/// RS256 JWT assertion for the service-account grant
pub fn sign_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> BackendResult<String> {
    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: CLOUD_PLATFORM_SCOPE,
        aud: &key.token_uri,
        iat,
        exp: iat + 3600,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| BackendError::new(BackendCode::Unauthenticated, format!("Invalid private key: {}", e)))?;

    encode(&header, &claims, &signing_key)
        .map_err(|e| BackendError::new(BackendCode::Unauthenticated, format!("Failed to sign assertion: {}", e)))
}

async fn read_token(response: reqwest::Response, now: DateTime<Utc>) -> BackendResult<AccessToken> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::new(
            BackendCode::Unauthenticated,
            format!("Token request failed with {}: {}", status, body),
        ));
    }

    let body: TokenResponse = response.json().await?;
    Ok(AccessToken {
        token: body.access_token,
        expires_at: now + Duration::seconds(body.expires_in),
    })
}
