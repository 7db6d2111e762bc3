use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::{decode_payload, encode_payload, page_query, parse_time, HttpOptions, RestClient};
use crate::backend::{
    AccessedSecretVersion, Page, Replication, SecretBackend, SecretRecord, SecretVersionRecord,
    VersionState,
};
use crate::error::BackendResult;
use crate::token::TokenProvider;

pub const SECRET_MANAGER_ENDPOINT: &str = "https://secretmanager.googleapis.com/v1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSecret {
    name: String,
    #[serde(default)]
    create_time: Option<String>,
    #[serde(default)]
    labels: HashMap<String, String>,
    #[serde(default)]
    replication: Option<Value>,
}

impl From<WireSecret> for SecretRecord {
    fn from(wire: WireSecret) -> Self {
        let replication = match wire.replication.as_ref().and_then(|r| r.get("userManaged")) {
            Some(managed) => Replication::UserManaged {
                locations: managed
                    .get("replicas")
                    .and_then(Value::as_array)
                    .map(|replicas| {
                        replicas
                            .iter()
                            .filter_map(|r| r.get("location").and_then(Value::as_str))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            None => Replication::Automatic,
        };

        SecretRecord {
            name: wire.name,
            create_time: parse_time(wire.create_time.as_deref()).unwrap_or_else(Utc::now),
            labels: wire.labels,
            replication,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVersion {
    name: String,
    #[serde(default)]
    create_time: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

impl From<WireVersion> for SecretVersionRecord {
    fn from(wire: WireVersion) -> Self {
        SecretVersionRecord {
            name: wire.name,
            create_time: parse_time(wire.create_time.as_deref()).unwrap_or_else(Utc::now),
            state: wire
                .state
                .as_deref()
                .and_then(VersionState::parse)
                .unwrap_or(VersionState::Enabled),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAccess {
    name: String,
    #[serde(default)]
    payload: Option<WirePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSecretList {
    #[serde(default)]
    secrets: Vec<WireSecret>,
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    total_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVersionList {
    #[serde(default)]
    versions: Vec<WireVersion>,
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    total_size: Option<usize>,
}

fn replication_body(replication: &Replication) -> Value {
    match replication {
        Replication::Automatic => json!({ "automatic": {} }),
        Replication::UserManaged { locations } => json!({
            "userManaged": {
                "replicas": locations.iter().map(|l| json!({ "location": l })).collect::<Vec<_>>()
            }
        }),
    }
}

/// Secret Manager v1 over HTTPS
pub struct RestSecretBackend {
    client: RestClient,
}

impl RestSecretBackend {
    pub fn new(tokens: Arc<TokenProvider>, options: &HttpOptions) -> BackendResult<Self> {
        Self::with_endpoint(tokens, options, SECRET_MANAGER_ENDPOINT)
    }

    pub fn with_endpoint(tokens: Arc<TokenProvider>, options: &HttpOptions, endpoint: &str) -> BackendResult<Self> {
        Ok(Self {
            client: RestClient::new(options.build_client()?, tokens, endpoint),
        })
    }
}

#[async_trait]
impl SecretBackend for RestSecretBackend {
    async fn create_secret(
        &self,
        parent: &str,
        secret_id: &str,
        replication: &Replication,
        labels: &HashMap<String, String>,
    ) -> BackendResult<SecretRecord> {
        let body = json!({
            "replication": replication_body(replication),
            "labels": labels,
        });
        let wire: WireSecret = self
            .client
            .call(
                Method::POST,
                &format!("{}/secrets", parent),
                &[("secretId", secret_id.to_string())],
                Some(&body),
            )
            .await?;
        Ok(wire.into())
    }

    async fn get_secret(&self, name: &str) -> BackendResult<SecretRecord> {
        let wire: WireSecret = self.client.call(Method::GET, name, &[], None).await?;
        Ok(wire.into())
    }

    async fn list_secrets(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<SecretRecord>> {
        let wire: WireSecretList = self
            .client
            .call(
                Method::GET,
                &format!("{}/secrets", parent),
                &page_query(page_size, page_token),
                None,
            )
            .await?;
        Ok(Page {
            items: wire.secrets.into_iter().map(Into::into).collect(),
            next_page_token: wire.next_page_token.filter(|t| !t.is_empty()),
            total_size: wire.total_size,
        })
    }

    async fn delete_secret(&self, name: &str) -> BackendResult<()> {
        self.client.call_empty(Method::DELETE, name, None).await
    }

    async fn add_secret_version(&self, parent: &str, data: &[u8]) -> BackendResult<SecretVersionRecord> {
        let body = json!({ "payload": { "data": encode_payload(data) } });
        let wire: WireVersion = self
            .client
            .call(Method::POST, &format!("{}:addVersion", parent), &[], Some(&body))
            .await?;
        Ok(wire.into())
    }

    async fn access_secret_version(&self, name: &str) -> BackendResult<AccessedSecretVersion> {
        let wire: WireAccess = self
            .client
            .call(Method::GET, &format!("{}:access", name), &[], None)
            .await?;
        let data = decode_payload(wire.payload.as_ref().and_then(|p| p.data.as_deref()))?;
        Ok(AccessedSecretVersion {
            name: wire.name,
            data,
        })
    }

    async fn list_secret_versions(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<SecretVersionRecord>> {
        let wire: WireVersionList = self
            .client
            .call(
                Method::GET,
                &format!("{}/versions", parent),
                &page_query(page_size, page_token),
                None,
            )
            .await?;
        Ok(Page {
            items: wire.versions.into_iter().map(Into::into).collect(),
            next_page_token: wire.next_page_token.filter(|t| !t.is_empty()),
            total_size: wire.total_size,
        })
    }

    async fn disable_secret_version(&self, name: &str) -> BackendResult<SecretVersionRecord> {
        let wire: WireVersion = self
            .client
            .call(Method::POST, &format!("{}:disable", name), &[], Some(&json!({})))
            .await?;
        Ok(wire.into())
    }

    async fn enable_secret_version(&self, name: &str) -> BackendResult<SecretVersionRecord> {
        let wire: WireVersion = self
            .client
            .call(Method::POST, &format!("{}:enable", name), &[], Some(&json!({})))
            .await?;
        Ok(wire.into())
    }

    async fn destroy_secret_version(&self, name: &str) -> BackendResult<SecretVersionRecord> {
        let wire: WireVersion = self
            .client
            .call(Method::POST, &format!("{}:destroy", name), &[], Some(&json!({})))
            .await?;
        Ok(wire.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_secret_user_managed_replication() {
        let wire: WireSecret = serde_json::from_value(json!({
            "name": "projects/p/secrets/db",
            "createTime": "2024-01-02T03:04:05Z",
            "labels": {"env": "prod"},
            "replication": {"userManaged": {"replicas": [{"location": "us-east1"}]}}
        }))
        .unwrap();
        let record: SecretRecord = wire.into();
        assert_eq!(
            record.replication,
            Replication::UserManaged {
                locations: vec!["us-east1".to_string()]
            }
        );
        assert_eq!(record.create_time.to_rfc3339(), "2024-01-02T03:04:05+00:00");
    }

    #[test]
    fn test_wire_version_state() {
        let wire: WireVersion = serde_json::from_value(json!({
            "name": "projects/p/secrets/db/versions/2",
            "state": "DESTROYED"
        }))
        .unwrap();
        let record: SecretVersionRecord = wire.into();
        assert_eq!(record.state, VersionState::Destroyed);
    }

    #[test]
    fn test_replication_body() {
        assert_eq!(replication_body(&Replication::Automatic), json!({"automatic": {}}));
        let managed = replication_body(&Replication::UserManaged {
            locations: vec!["europe-west1".to_string()],
        });
        assert_eq!(managed["userManaged"]["replicas"][0]["location"], "europe-west1");
    }
}
