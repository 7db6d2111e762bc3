use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use super::{decode_payload, encode_payload, page_query, parse_time, HttpOptions, RestClient};
use crate::backend::{
    Page, ParameterBackend, ParameterFormat, ParameterRecord, ParameterVersionRecord,
    RenderedParameterVersion,
};
use crate::error::BackendResult;
use crate::token::TokenProvider;

pub const PARAMETER_MANAGER_ENDPOINT: &str = "https://parametermanager.googleapis.com/v1";

/// Endpoint for a location; regional locations use their own host
pub fn endpoint_for_location(location: &str) -> String {
    if location == "global" {
        PARAMETER_MANAGER_ENDPOINT.to_string()
    } else {
        format!("https://parametermanager.{}.rep.googleapis.com/v1", location)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireParameter {
    name: String,
    #[serde(default)]
    create_time: Option<String>,
    #[serde(default)]
    update_time: Option<String>,
    #[serde(default)]
    labels: HashMap<String, String>,
    #[serde(default)]
    format: Option<String>,
}

impl From<WireParameter> for ParameterRecord {
    fn from(wire: WireParameter) -> Self {
        let create_time = parse_time(wire.create_time.as_deref()).unwrap_or_else(Utc::now);
        ParameterRecord {
            name: wire.name,
            format: wire
                .format
                .as_deref()
                .and_then(ParameterFormat::parse)
                .unwrap_or(ParameterFormat::Unformatted),
            labels: wire.labels,
            create_time,
            update_time: parse_time(wire.update_time.as_deref()).unwrap_or(create_time),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVersion {
    name: String,
    #[serde(default)]
    create_time: Option<String>,
    #[serde(default)]
    update_time: Option<String>,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    payload: Option<WirePayload>,
}

impl WireVersion {
    fn into_record(self) -> BackendResult<ParameterVersionRecord> {
        let create_time = parse_time(self.create_time.as_deref()).unwrap_or_else(Utc::now);
        let payload = match self.payload {
            Some(payload) => Some(decode_payload(payload.data.as_deref())?),
            None => None,
        };
        Ok(ParameterVersionRecord {
            name: self.name,
            disabled: self.disabled,
            create_time,
            update_time: parse_time(self.update_time.as_deref()).unwrap_or(create_time),
            payload,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireParameterList {
    #[serde(default)]
    parameters: Vec<WireParameter>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVersionList {
    #[serde(default)]
    parameter_versions: Vec<WireVersion>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRendered {
    #[serde(default)]
    parameter_version: String,
    #[serde(default)]
    payload: Option<WirePayload>,
    #[serde(default)]
    rendered_payload: Option<String>,
}

/// Parameter Manager v1 over HTTPS
pub struct RestParameterBackend {
    client: RestClient,
}

impl RestParameterBackend {
    pub fn new(tokens: Arc<TokenProvider>, options: &HttpOptions, location: &str) -> BackendResult<Self> {
        Self::with_endpoint(tokens, options, &endpoint_for_location(location))
    }

    pub fn with_endpoint(tokens: Arc<TokenProvider>, options: &HttpOptions, endpoint: &str) -> BackendResult<Self> {
        Ok(Self {
            client: RestClient::new(options.build_client()?, tokens, endpoint),
        })
    }
}

#[async_trait]
impl ParameterBackend for RestParameterBackend {
    async fn create_parameter(
        &self,
        parent: &str,
        parameter_id: &str,
        format: ParameterFormat,
        labels: &HashMap<String, String>,
    ) -> BackendResult<ParameterRecord> {
        let body = json!({ "format": format.as_str(), "labels": labels });
        let wire: WireParameter = self
            .client
            .call(
                Method::POST,
                &format!("{}/parameters", parent),
                &[("parameterId", parameter_id.to_string())],
                Some(&body),
            )
            .await?;
        Ok(wire.into())
    }

    async fn get_parameter(&self, name: &str) -> BackendResult<ParameterRecord> {
        let wire: WireParameter = self.client.call(Method::GET, name, &[], None).await?;
        Ok(wire.into())
    }

    async fn list_parameters(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
        filter: Option<String>,
    ) -> BackendResult<Page<ParameterRecord>> {
        let mut query = page_query(page_size, page_token);
        if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
            query.push(("filter", filter));
        }
        let wire: WireParameterList = self
            .client
            .call(Method::GET, &format!("{}/parameters", parent), &query, None)
            .await?;
        Ok(Page {
            items: wire.parameters.into_iter().map(Into::into).collect(),
            next_page_token: wire.next_page_token.filter(|t| !t.is_empty()),
            total_size: None,
        })
    }

    async fn update_parameter_labels(
        &self,
        name: &str,
        labels: &HashMap<String, String>,
    ) -> BackendResult<ParameterRecord> {
        let wire: WireParameter = self
            .client
            .call(
                Method::PATCH,
                name,
                &[("updateMask", "labels".to_string())],
                Some(&json!({ "labels": labels })),
            )
            .await?;
        Ok(wire.into())
    }

    async fn delete_parameter(&self, name: &str) -> BackendResult<()> {
        self.client.call_empty(Method::DELETE, name, None).await
    }

    async fn create_parameter_version(
        &self,
        parent: &str,
        version_id: &str,
        data: &[u8],
    ) -> BackendResult<ParameterVersionRecord> {
        let body = json!({ "payload": { "data": encode_payload(data) } });
        let wire: WireVersion = self
            .client
            .call(
                Method::POST,
                &format!("{}/versions", parent),
                &[("parameterVersionId", version_id.to_string())],
                Some(&body),
            )
            .await?;
        wire.into_record()
    }

    async fn get_parameter_version(&self, name: &str) -> BackendResult<ParameterVersionRecord> {
        let wire: WireVersion = self
            .client
            .call(Method::GET, name, &[("view", "FULL".to_string())], None)
            .await?;
        wire.into_record()
    }

    async fn list_parameter_versions(
        &self,
        parent: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> BackendResult<Page<ParameterVersionRecord>> {
        let wire: WireVersionList = self
            .client
            .call(
                Method::GET,
                &format!("{}/versions", parent),
                &page_query(page_size, page_token),
                None,
            )
            .await?;
        let items = wire
            .parameter_versions
            .into_iter()
            .map(WireVersion::into_record)
            .collect::<BackendResult<Vec<_>>>()?;
        Ok(Page {
            items,
            next_page_token: wire.next_page_token.filter(|t| !t.is_empty()),
            total_size: None,
        })
    }

    async fn delete_parameter_version(&self, name: &str) -> BackendResult<()> {
        self.client.call_empty(Method::DELETE, name, None).await
    }

    async fn render_parameter_version(&self, name: &str) -> BackendResult<RenderedParameterVersion> {
        let wire: WireRendered = self
            .client
            .call(Method::GET, &format!("{}:render", name), &[], None)
            .await?;
        Ok(RenderedParameterVersion {
            parameter_version: if wire.parameter_version.is_empty() {
                name.to_string()
            } else {
                wire.parameter_version
            },
            payload: decode_payload(wire.payload.as_ref().and_then(|p| p.data.as_deref()))?,
            rendered_payload: decode_payload(wire.rendered_payload.as_deref())?,
        })
    }
}
