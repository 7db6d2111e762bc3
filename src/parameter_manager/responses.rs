/// Parameter Manager response models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::cache::CacheStats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterResponse {
    pub parameter_name: String,
    /// Decoded per `format_type`; strings for UNFORMATTED
    pub data: Value,
    pub format_type: String,
    pub version: String,
    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterCreateResponse {
    pub parameter_name: String,
    pub created_time: DateTime<Utc>,
    pub format_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterUpdateResponse {
    pub parameter_name: String,
    pub version: String,
    pub updated_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterMetadataResponse {
    pub parameter_name: String,
    pub format_type: String,
    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
    pub labels: Option<HashMap<String, String>>,
    /// Counted only by `get_parameter_metadata`
    pub version_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterListResponse {
    pub parameters: Vec<ParameterMetadataResponse>,
    pub next_page_token: Option<String>,
    pub total_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterVersionResponse {
    pub parameter_name: String,
    pub version: String,
    /// Absent in listings, which do not carry payloads
    pub data: Option<Value>,
    pub format_type: String,
    pub created_time: DateTime<Utc>,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterVersionListResponse {
    pub versions: Vec<ParameterVersionResponse>,
    pub next_page_token: Option<String>,
    pub total_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterOperationResponse {
    pub success: bool,
    pub message: String,
    pub operation_time: DateTime<Utc>,
}

impl ParameterOperationResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            operation_time: Utc::now(),
        }
    }
}

/// A version with its secret references resolved
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedParameterResponse {
    pub parameter_name: String,
    pub version: String,
    pub format_type: String,
    pub rendered_data: Value,
    pub rendered_time: DateTime<Utc>,
}

impl fmt::Debug for RenderedParameterResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedParameterResponse")
            .field("parameter_name", &self.parameter_name)
            .field("version", &self.version)
            .field("format_type", &self.format_type)
            .field("rendered_data", &"[REDACTED]")
            .field("rendered_time", &self.rendered_time)
            .finish()
    }
}

/// One failed item of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemError {
    pub parameter_name: String,
    /// `not_found` or the error kind name
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchGetResponse {
    pub total_requested: usize,
    pub cache_hits: usize,
    pub api_calls: usize,
    /// `None` for names that failed
    pub parameters: BTreeMap<String, Option<ParameterResponse>>,
    pub errors: Vec<BatchItemError>,
    pub total_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOperationResponse {
    pub total_requested: usize,
    pub successful: Vec<String>,
    pub failed: Vec<String>,
    pub errors: Vec<BatchItemError>,
    pub total_time_ms: u64,
}

/// Running totals across batch calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_batch_operations: u64,
    pub total_parameters_in_batches: u64,
    pub cache_hits_in_batches: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterCacheStats {
    #[serde(flatten)]
    pub cache: CacheStats,
    pub batch_stats: BatchStats,
}
