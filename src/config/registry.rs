use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_json::Value;

/// HTTP verbs an endpoint descriptor may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// GET iterations never carry a body; every other verb sends the
    /// prepared body as-is.
    pub fn sends_body(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(value: HttpMethod) -> Self {
        match value {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyKind {
    FormData,
    XWwwFormUrlencoded,
    Raw,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyDescriptor {
    #[serde(rename = "type")]
    pub kind: BodyKind,
    /// Arbitrary nested structure; string values anywhere inside it may
    /// embed `${stored.KEY}` placeholders.
    pub content: Value,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Expected shape of one response field. `type` names a validator from the
/// closed registry; the remaining options apply only to specific validators.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Allowed values for the `enum` validator.
    pub values: Option<Vec<Value>>,
    /// Pattern for the `regex` validator, compiled at validation time.
    pub pattern: Option<String>,
    /// Named predicate for the `custom` validator.
    pub function: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThresholdConfig {
    /// p95 response-time bound in milliseconds, also the slow-request
    /// threshold for this endpoint.
    pub response_time: Option<u64>,
    /// Extra threshold expressions keyed by metric name.
    pub custom: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioConfig {
    pub vus: Option<u32>,
    pub duration: Option<String>,
    pub thresholds: ThresholdConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    #[serde(default)]
    pub base_url: Option<String>,
    pub path: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub scenario: ScenarioConfig,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<BodyDescriptor>,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    /// Response field name -> expected field shape.
    #[serde(default)]
    pub expected_content: Option<BTreeMap<String, FieldSpec>>,
    /// Stored-data key -> response field to capture after each response.
    #[serde(default)]
    pub store_response: Option<BTreeMap<String, String>>,
}

fn default_expected_status() -> u16 {
    200
}

/// Endpoint name -> descriptor, fixed for the lifetime of the run.
pub type EndpointRegistry = BTreeMap<String, EndpointDescriptor>;
