use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::{lock, paginate, CallLog};
use crate::backend::{
    AccessedSecretVersion, Page, Replication, SecretBackend, SecretRecord, SecretVersionRecord,
    VersionState,
};
use crate::error::{BackendError, BackendResult};

struct StoredVersion {
    record: SecretVersionRecord,
    data: Option<Vec<u8>>,
}

struct StoredSecret {
    record: SecretRecord,
    versions: Vec<StoredVersion>,
}

/// Secret Manager emulator
#[derive(Default)]
pub struct MemorySecretBackend {
    secrets: Mutex<BTreeMap<String, StoredSecret>>,
    log: CallLog,
}

fn split_version(name: &str) -> BackendResult<(&str, &str)> {
    name.rsplit_once("/versions/")
        .ok_or_else(|| BackendError::invalid_argument(format!("Malformed version name '{}'", name)))
}

impl MemorySecretBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn calls(&self, method: &str) -> usize {
        self.log.calls(method)
    }

    /// Payload of a secret version, for rendering parameter references
    pub fn payload_of(&self, name: &str) -> BackendResult<Vec<u8>> {
        let secrets = lock(&self.secrets);
        Self::access_locked(&secrets, name).map(|(_, data)| data)
    }

    fn access_locked(
        secrets: &BTreeMap<String, StoredSecret>,
        name: &str,
    ) -> BackendResult<(String, Vec<u8>)> {
        let (secret_name, version) = split_version(name)?;
        let secret = secrets
            .get(secret_name)
            .ok_or_else(|| BackendError::not_found(format!("Secret [{}] not found.", secret_name)))?;

        let stored = if version == "latest" {
            if secret.versions.is_empty() {
                return Err(BackendError::not_found(format!(
                    "Secret [{}] has no versions.",
                    secret_name
                )));
            }
            secret
                .versions
                .iter()
                .rev()
                .find(|v| v.record.state == VersionState::Enabled)
                .ok_or_else(|| {
                    BackendError::failed_precondition(format!(
                        "Secret [{}] has no ENABLED versions; every version is DISABLED or DESTROYED.",
                        secret_name
                    ))
                })?
        } else {
            secret
                .versions
                .iter()
                .find(|v| v.record.name == name)
                .ok_or_else(|| BackendError::not_found(format!("Secret Version [{}] not found.", name)))?
        };

        match (stored.record.state, &stored.data) {
            (VersionState::Enabled, Some(data)) => Ok((stored.record.name.clone(), data.clone())),
            (state, _) => Err(BackendError::failed_precondition(format!(
                "Secret Version [{}] is in {} state.",
                stored.record.name,
                state.as_str()
            ))),
        }
    }

    fn transition(&self, name: &str, target: VersionState) -> BackendResult<SecretVersionRecord> {
        let mut secrets = lock(&self.secrets);
        let (secret_name, _) = split_version(name)?;
        let secret = secrets
            .get_mut(secret_name)
            .ok_or_else(|| BackendError::not_found(format!("Secret [{}] not found.", secret_name)))?;
        let stored = secret
            .versions
            .iter_mut()
            .find(|v| v.record.name == name)
            .ok_or_else(|| BackendError::not_found(format!("Secret Version [{}] not found.", name)))?;

        if stored.record.state == VersionState::Destroyed && target != VersionState::Destroyed {
            return Err(BackendError::failed_precondition(format!(
                "Secret Version [{}] is in DESTROYED state and cannot be {}.",
                name,
                if target == VersionState::Enabled { "enabled" } else { "disabled" }
            )));
        }

        stored.record.state = target;
        if target == VersionState::Destroyed {
            stored.data = None;
        }
        Ok(stored.record.clone())
    }
}

#[async_trait]
impl SecretBackend for MemorySecretBackend {
    async fn create_secret(
        &self,
        parent: &str,
        secret_id: &str,
        replication: &Replication,
        labels: &HashMap<String, String>,
    ) -> BackendResult<SecretRecord> {
        self.log.record("create_secret")?;
        let name = format!("{}/secrets/{}", parent, secret_id);
        let mut secrets = lock(&self.secrets);
        if secrets.contains_key(&name) {
            return Err(BackendError::already_exists(format!("Secret [{}] already exists.", name)));
        }

        let record = SecretRecord {
            name: name.clone(),
            create_time: Utc::now(),
            labels: labels.clone(),
            replication: replication.clone(),
        };
        secrets.insert(
            name,
            StoredSecret {
                record: record.clone(),
                versions: Vec::new(),
            },
        );
        Ok(record)
    }

    async fn get_secret(&self, name: &str) -> BackendResult<SecretRecord> {
        self.log.record("get_secret")?;
        lock(&self.secrets)
            .get(name)
            .map(|s| s.record.clone())
            .ok_or_else(|| BackendError::not_found(format!("Secret [{}] not found.", name)))
    }

    async fn list_secrets(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<SecretRecord>> {
        self.log.record("list_secrets")?;
        let prefix = format!("{}/secrets/", parent);
        let all: Vec<SecretRecord> = lock(&self.secrets)
            .iter()
            .filter(|(name, _)| name.starts_with(&prefix))
            .map(|(_, s)| s.record.clone())
            .collect();
        paginate(all, page_size, page_token)
    }

    async fn delete_secret(&self, name: &str) -> BackendResult<()> {
        self.log.record("delete_secret")?;
        lock(&self.secrets)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| BackendError::not_found(format!("Secret [{}] not found.", name)))
    }

    async fn add_secret_version(&self, parent: &str, data: &[u8]) -> BackendResult<SecretVersionRecord> {
        self.log.record("add_secret_version")?;
        let mut secrets = lock(&self.secrets);
        let secret = secrets
            .get_mut(parent)
            .ok_or_else(|| BackendError::not_found(format!("Secret [{}] not found.", parent)))?;

        let number = secret.versions.len() + 1;
        let record = SecretVersionRecord {
            name: format!("{}/versions/{}", parent, number),
            create_time: Utc::now(),
            state: VersionState::Enabled,
        };
        secret.versions.push(StoredVersion {
            record: record.clone(),
            data: Some(data.to_vec()),
        });
        Ok(record)
    }

    async fn access_secret_version(&self, name: &str) -> BackendResult<AccessedSecretVersion> {
        self.log.record("access_secret_version")?;
        let secrets = lock(&self.secrets);
        let (resolved, data) = Self::access_locked(&secrets, name)?;
        Ok(AccessedSecretVersion { name: resolved, data })
    }

    async fn list_secret_versions(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<SecretVersionRecord>> {
        self.log.record("list_secret_versions")?;
        let versions: Vec<SecretVersionRecord> = lock(&self.secrets)
            .get(parent)
            .ok_or_else(|| BackendError::not_found(format!("Secret [{}] not found.", parent)))?
            .versions
            .iter()
            .rev()
            .map(|v| v.record.clone())
            .collect();
        paginate(versions, page_size, page_token)
    }

    async fn disable_secret_version(&self, name: &str) -> BackendResult<SecretVersionRecord> {
        self.log.record("disable_secret_version")?;
        self.transition(name, VersionState::Disabled)
    }

    async fn enable_secret_version(&self, name: &str) -> BackendResult<SecretVersionRecord> {
        self.log.record("enable_secret_version")?;
        self.transition(name, VersionState::Enabled)
    }

    async fn destroy_secret_version(&self, name: &str) -> BackendResult<SecretVersionRecord> {
        self.log.record("destroy_secret_version")?;
        self.transition(name, VersionState::Destroyed)
    }
}
