use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use super::{lock, paginate, CallLog, MemorySecretBackend};
use crate::backend::{
    Page, ParameterBackend, ParameterFormat, ParameterRecord, ParameterVersionRecord,
    RenderedParameterVersion,
};
use crate::error::{BackendError, BackendResult};
use crate::parameter_manager::references::find_references;
use crate::validation::MAX_PAYLOAD_BYTES;

struct StoredVersion {
    record: ParameterVersionRecord,
    data: Vec<u8>,
}

struct StoredParameter {
    record: ParameterRecord,
    versions: Vec<StoredVersion>,
}

/// Parameter Manager emulator
#[derive(Default)]
pub struct MemoryParameterBackend {
    parameters: Mutex<BTreeMap<String, StoredParameter>>,
    secrets: Option<Arc<MemorySecretBackend>>,
    log: CallLog,
}

fn split_version(name: &str) -> BackendResult<(&str, &str)> {
    name.rsplit_once("/versions/")
        .ok_or_else(|| BackendError::invalid_argument(format!("Malformed version name '{}'", name)))
}

fn matches_filter(record: &ParameterRecord, filter: &str) -> BackendResult<bool> {
    if let Some(rest) = filter.strip_prefix("labels.") {
        let (key, value) = rest
            .split_once('=')
            .ok_or_else(|| BackendError::invalid_argument(format!("Unsupported filter '{}'", filter)))?;
        return Ok(record.labels.get(key.trim()).map(String::as_str) == Some(value.trim()));
    }
    if let Some(needle) = filter.strip_prefix("name:") {
        return Ok(record.name.contains(needle.trim()));
    }
    Err(BackendError::invalid_argument(format!("Unsupported filter '{}'", filter)))
}

impl MemoryParameterBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `${secret...}` references against this secret store when rendering
    pub fn with_secrets(mut self, secrets: Arc<MemorySecretBackend>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn calls(&self, method: &str) -> usize {
        self.log.calls(method)
    }

    /// Flip a version's disabled flag
    pub fn set_version_disabled(&self, name: &str, disabled: bool) -> BackendResult<()> {
        let (parent, _) = split_version(name)?;
        let mut parameters = lock(&self.parameters);
        let version = parameters
            .get_mut(parent)
            .and_then(|p| p.versions.iter_mut().find(|v| v.record.name == name))
            .ok_or_else(|| BackendError::not_found(format!("Parameter version [{}] not found.", name)))?;
        version.record.disabled = disabled;
        version.record.update_time = Utc::now();
        Ok(())
    }

    fn render(&self, text: &str) -> BackendResult<String> {
        let mut rendered = text.to_string();
        for reference in find_references(text) {
            let secrets = self.secrets.as_ref().ok_or_else(|| {
                BackendError::failed_precondition(format!(
                    "Cannot resolve secret reference '{}': no secret store attached",
                    reference.resource
                ))
            })?;
            let value = secrets.payload_of(&reference.resource)?;
            rendered = rendered.replace(&reference.placeholder, &String::from_utf8_lossy(&value));
        }
        Ok(rendered)
    }
}

#[async_trait]
impl ParameterBackend for MemoryParameterBackend {
    async fn create_parameter(
        &self,
        parent: &str,
        parameter_id: &str,
        format: ParameterFormat,
        labels: &HashMap<String, String>,
    ) -> BackendResult<ParameterRecord> {
        self.log.record("create_parameter")?;
        let name = format!("{}/parameters/{}", parent, parameter_id);
        let mut parameters = lock(&self.parameters);
        if parameters.contains_key(&name) {
            return Err(BackendError::already_exists(format!("Parameter [{}] already exists.", name)));
        }

        let now = Utc::now();
        let record = ParameterRecord {
            name: name.clone(),
            format,
            labels: labels.clone(),
            create_time: now,
            update_time: now,
        };
        parameters.insert(
            name,
            StoredParameter {
                record: record.clone(),
                versions: Vec::new(),
            },
        );
        Ok(record)
    }

    async fn get_parameter(&self, name: &str) -> BackendResult<ParameterRecord> {
        self.log.record("get_parameter")?;
        lock(&self.parameters)
            .get(name)
            .map(|p| p.record.clone())
            .ok_or_else(|| BackendError::not_found(format!("Parameter [{}] not found.", name)))
    }

    async fn list_parameters(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
        filter: Option<String>,
    ) -> BackendResult<Page<ParameterRecord>> {
        self.log.record("list_parameters")?;
        let prefix = format!("{}/parameters/", parent);
        let mut all = Vec::new();
        for (name, parameter) in lock(&self.parameters).iter() {
            if !name.starts_with(&prefix) {
                continue;
            }
            if let Some(filter) = filter.as_deref().filter(|f| !f.trim().is_empty()) {
                if !matches_filter(&parameter.record, filter)? {
                    continue;
                }
            }
            all.push(parameter.record.clone());
        }
        paginate(all, page_size, page_token)
    }

    async fn update_parameter_labels(
        &self,
        name: &str,
        labels: &HashMap<String, String>,
    ) -> BackendResult<ParameterRecord> {
        self.log.record("update_parameter_labels")?;
        let mut parameters = lock(&self.parameters);
        let parameter = parameters
            .get_mut(name)
            .ok_or_else(|| BackendError::not_found(format!("Parameter [{}] not found.", name)))?;
        parameter.record.labels = labels.clone();
        parameter.record.update_time = Utc::now();
        Ok(parameter.record.clone())
    }

    async fn delete_parameter(&self, name: &str) -> BackendResult<()> {
        self.log.record("delete_parameter")?;
        let mut parameters = lock(&self.parameters);
        match parameters.get(name) {
            None => Err(BackendError::not_found(format!("Parameter [{}] not found.", name))),
            Some(p) if !p.versions.is_empty() => Err(BackendError::failed_precondition(format!(
                "Parameter [{}] still has {} version(s); delete them first.",
                name,
                p.versions.len()
            ))),
            Some(_) => {
                parameters.remove(name);
                Ok(())
            }
        }
    }

    async fn create_parameter_version(
        &self,
        parent: &str,
        version_id: &str,
        data: &[u8],
    ) -> BackendResult<ParameterVersionRecord> {
        self.log.record("create_parameter_version")?;
        if data.len() > MAX_PAYLOAD_BYTES {
            return Err(BackendError::invalid_argument(format!(
                "Payload of {} bytes exceeds the {} byte limit",
                data.len(),
                MAX_PAYLOAD_BYTES
            )));
        }

        let mut parameters = lock(&self.parameters);
        let parameter = parameters
            .get_mut(parent)
            .ok_or_else(|| BackendError::not_found(format!("Parameter [{}] not found.", parent)))?;

        let name = format!("{}/versions/{}", parent, version_id);
        if parameter.versions.iter().any(|v| v.record.name == name) {
            return Err(BackendError::already_exists(format!(
                "Parameter version [{}] already exists.",
                name
            )));
        }

        let now = Utc::now();
        let record = ParameterVersionRecord {
            name,
            disabled: false,
            create_time: now,
            update_time: now,
            payload: None,
        };
        parameter.versions.push(StoredVersion {
            record: record.clone(),
            data: data.to_vec(),
        });
        parameter.record.update_time = now;
        Ok(record)
    }

    async fn get_parameter_version(&self, name: &str) -> BackendResult<ParameterVersionRecord> {
        self.log.record("get_parameter_version")?;
        let (parent, _) = split_version(name)?;
        let parameters = lock(&self.parameters);
        let parameter = parameters
            .get(parent)
            .ok_or_else(|| BackendError::not_found(format!("Parameter [{}] not found.", parent)))?;
        let version = parameter
            .versions
            .iter()
            .find(|v| v.record.name == name)
            .ok_or_else(|| BackendError::not_found(format!("Parameter version [{}] not found.", name)))?;

        if version.record.disabled {
            return Err(BackendError::failed_precondition(format!(
                "Parameter version [{}] is disabled.",
                name
            )));
        }

        let mut record = version.record.clone();
        record.payload = Some(version.data.clone());
        Ok(record)
    }

    async fn list_parameter_versions(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<ParameterVersionRecord>> {
        self.log.record("list_parameter_versions")?;
        let versions: Vec<ParameterVersionRecord> = lock(&self.parameters)
            .get(parent)
            .ok_or_else(|| BackendError::not_found(format!("Parameter [{}] not found.", parent)))?
            .versions
            .iter()
            .rev()
            .map(|v| v.record.clone())
            .collect();
        paginate(versions, page_size, page_token)
    }

    async fn delete_parameter_version(&self, name: &str) -> BackendResult<()> {
        self.log.record("delete_parameter_version")?;
        let (parent, _) = split_version(name)?;
        let mut parameters = lock(&self.parameters);
        let parameter = parameters
            .get_mut(parent)
            .ok_or_else(|| BackendError::not_found(format!("Parameter [{}] not found.", parent)))?;
        let before = parameter.versions.len();
        parameter.versions.retain(|v| v.record.name != name);
        if parameter.versions.len() == before {
            return Err(BackendError::not_found(format!(
                "Parameter version [{}] not found.",
                name
            )));
        }
        Ok(())
    }

    async fn render_parameter_version(&self, name: &str) -> BackendResult<RenderedParameterVersion> {
        self.log.record("render_parameter_version")?;
        let data = {
            let (parent, _) = split_version(name)?;
            let parameters = lock(&self.parameters);
            let version = parameters
                .get(parent)
                .and_then(|p| p.versions.iter().find(|v| v.record.name == name))
                .ok_or_else(|| {
                    BackendError::not_found(format!("Parameter version [{}] not found.", name))
                })?;
            if version.record.disabled {
                return Err(BackendError::failed_precondition(format!(
                    "Parameter version [{}] is disabled.",
                    name
                )));
            }
            version.data.clone()
        };

        let rendered = self.render(&String::from_utf8_lossy(&data))?;
        Ok(RenderedParameterVersion {
            parameter_version: name.to_string(),
            payload: data,
            rendered_payload: rendered.into_bytes(),
        })
    }
}
