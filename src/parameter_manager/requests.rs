/// Parameter Manager request models
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use validator::{Validate, ValidationError};

use crate::backend::ParameterFormat;
use crate::validation::{format_type, not_blank, payload_format, payload_size};

fn default_format() -> String {
    "UNFORMATTED".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn declared_format(request: &ParameterVersionCreateRequest) -> Result<(), ValidationError> {
    payload_format(&request.data, &request.format_type)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ParameterCreateRequest {
    #[validate(length(min = 1, max = 255), custom(function = "not_blank"))]
    pub parameter_name: String,

    #[serde(default = "default_format")]
    #[validate(custom(function = "format_type"))]
    pub format_type: String,

    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
}

impl ParameterCreateRequest {
    pub fn new(parameter_name: impl Into<String>, format: ParameterFormat) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            format_type: format.as_str().to_string(),
            labels: None,
        }
    }

    pub fn with_labels(mut self, labels: HashMap<String, String>) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Declared format; only meaningful after validation
    pub fn format(&self) -> ParameterFormat {
        ParameterFormat::parse(&self.format_type).unwrap_or(ParameterFormat::Unformatted)
    }
}

/// New version; `data` is checked against `format_type` and the size limit
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "declared_format"))]
pub struct ParameterVersionCreateRequest {
    #[validate(length(min = 1, max = 255), custom(function = "not_blank"))]
    pub parameter_name: String,

    #[validate(length(min = 1, max = 255), custom(function = "not_blank"))]
    pub version_name: String,

    #[validate(custom(function = "payload_size"))]
    pub data: Value,

    #[serde(default = "default_format")]
    #[validate(custom(function = "format_type"))]
    pub format_type: String,
}

impl ParameterVersionCreateRequest {
    pub fn new(
        parameter_name: impl Into<String>,
        version_name: impl Into<String>,
        data: Value,
        format: ParameterFormat,
    ) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            version_name: version_name.into(),
            data,
            format_type: format.as_str().to_string(),
        }
    }

    pub fn format(&self) -> ParameterFormat {
        ParameterFormat::parse(&self.format_type).unwrap_or(ParameterFormat::Unformatted)
    }
}

/// New version plus optional label replacement
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ParameterUpdateRequest {
    #[validate(length(min = 1, max = 255), custom(function = "not_blank"))]
    pub parameter_name: String,

    #[validate(length(min = 1, max = 255), custom(function = "not_blank"))]
    pub version_name: String,

    #[validate(custom(function = "payload_size"))]
    pub data: Value,

    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ParameterAccessRequest {
    #[validate(length(min = 1, max = 255), custom(function = "not_blank"))]
    pub parameter_name: String,

    #[validate(length(min = 1, max = 255), custom(function = "not_blank"))]
    pub version: Option<String>,
}

impl ParameterAccessRequest {
    pub fn new(parameter_name: &str, version: Option<&str>) -> Self {
        Self {
            parameter_name: parameter_name.to_string(),
            version: version.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ParameterListRequest {
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub page_size: u32,

    #[serde(default)]
    pub page_token: Option<String>,

    /// Backend filter, e.g. `labels.env=prod`
    #[serde(default)]
    pub filter_expression: Option<String>,
}

impl Default for ParameterListRequest {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            page_token: None,
            filter_expression: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ParameterVersionListRequest {
    #[validate(length(min = 1, max = 255), custom(function = "not_blank"))]
    pub parameter_name: String,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub page_size: u32,

    #[serde(default)]
    pub page_token: Option<String>,
}

impl ParameterVersionListRequest {
    pub fn new(parameter_name: impl Into<String>) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            page_size: default_page_size(),
            page_token: None,
        }
    }
}
