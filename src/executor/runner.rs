use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tracing::{error, warn};

use crate::config::{BodyDescriptor, BodyKind, EndpointDescriptor, GlobalConfig};
use crate::executor::context::SlowRequestRecord;
use crate::response::{validate_response, CheckSet};
use crate::template::substitute;

use super::models::{IterationOptions, IterationReport, PrepareError, PreparedBody};

const ITERATION_PACING: Duration = Duration::from_secs(1);

/// Runs one iteration for the endpoint named by `scenario`.
///
/// A missing or unknown selector is logged and skipped without touching the
/// metrics. A body-preparation failure records a failed request and aborts
/// before anything is sent. Transport errors propagate after the failure is
/// counted; every other outcome lands in the returned report's check set.
pub async fn run_iteration(
    client: &Client,
    scenario: Option<&str>,
    options: IterationOptions<'_>,
) -> Result<Option<IterationReport>> {
    let Some(name) = scenario else {
        error!("no scenario selector supplied; skipping iteration");
        return Ok(None);
    };
    let Some(endpoint) = options.config.endpoints.get(name) else {
        error!(scenario = name, "unknown scenario selector; skipping iteration");
        return Ok(None);
    };

    options.metrics.record_iteration();

    // Preparing
    let headers = merge_headers(&options.config.default_headers, &endpoint.headers);
    let body = match &endpoint.body {
        Some(descriptor) => {
            let stored = options.context.stored_snapshot();
            match prepare_body(descriptor, &stored, &options.config.raw_content_type()) {
                Ok(prepared) => Some(prepared),
                Err(error) => {
                    error!(endpoint = name, %error, "body preparation failed; request not sent");
                    options.metrics.record_failed_request();
                    return Ok(None);
                }
            }
        }
        None => None,
    };

    // Sending
    let url = endpoint_url(options.config, endpoint);
    let mut request = client.request(endpoint.method.into(), &url);
    for (header, value) in &headers {
        request = request.header(header, value);
    }
    if endpoint.method.sends_body() {
        request = match body {
            Some(PreparedBody::Raw { content_type, text }) => {
                match raw_content_type(&headers, content_type) {
                    Some(content_type) => request
                        .header(reqwest::header::CONTENT_TYPE, content_type)
                        .body(text),
                    None => request.body(text),
                }
            }
            Some(PreparedBody::UrlEncoded { pairs }) => request.form(&pairs),
            Some(PreparedBody::Multipart { fields }) => {
                let mut form = reqwest::multipart::Form::new();
                for (field, value) in fields {
                    form = form.text(field, value);
                }
                request.multipart(form)
            }
            None => request,
        };
    }

    let start = Instant::now();
    let response = match request.send().await {
        Ok(response) => response,
        Err(error) => {
            options.metrics.record_failed_request();
            return Err(error).with_context(|| format!("sending request for {name}"));
        }
    };
    let status = response.status().as_u16();
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(error) => {
            options.metrics.record_failed_request();
            return Err(error).with_context(|| format!("reading response body for {name}"));
        }
    };
    // The measured duration covers the full exchange, body download included.
    let duration_ms = start.elapsed().as_millis() as u64;

    // Received
    options.metrics.record_duration(name, duration_ms as f64);

    let threshold_ms = endpoint
        .scenario
        .thresholds
        .response_time
        .unwrap_or(options.config.slow_request_ms);
    let slow = is_slow(duration_ms, threshold_ms);
    if slow {
        options.metrics.record_slow_request();
        options.context.record_slow(SlowRequestRecord {
            endpoint: name.to_string(),
            duration_ms,
            timestamp: Utc::now().timestamp_millis(),
            method: endpoint.method.as_str().to_string(),
            url: url.clone(),
            status,
            threshold_ms,
        });
    }

    let payload: Option<Value> = serde_json::from_slice(&bytes).ok();

    // Store step
    if let Some(store_map) = &endpoint.store_response {
        match &payload {
            Some(parsed) => {
                for (local_key, response_field) in store_map {
                    match parsed.get(response_field) {
                        Some(value) => options.context.store(local_key.clone(), value.clone()),
                        None => warn!(
                            endpoint = name,
                            field = %response_field,
                            "response field to store is absent"
                        ),
                    }
                }
            }
            None => warn!(
                endpoint = name,
                "response body is not parseable; skipping store step"
            ),
        }
    }

    // Validating
    let mut checks = CheckSet::new();
    checks.record("status is as expected", status == endpoint.expected_status);
    checks.record("response time is within limits", !slow);
    if let Some(schema) = &endpoint.expected_content {
        checks.extend(validate_response(payload.as_ref(), schema, options.metrics));
    }

    // Reported
    let passed = checks.all_passed();
    if !passed {
        options.metrics.record_failed_request();
    }

    let report = IterationReport {
        endpoint: name.to_string(),
        method: endpoint.method.as_str().to_string(),
        url,
        status,
        duration_ms,
        slow,
        checks,
        passed,
    };

    tokio::time::sleep(ITERATION_PACING).await;

    Ok(Some(report))
}

/// Drives every named scenario for a fixed iteration count.
///
/// A transport failure is fatal to its own iteration only: it is logged and
/// the remaining iterations and scenarios still run, so one endpoint's
/// misbehavior never aborts the overall run.
pub async fn run_scenarios(
    client: &Client,
    names: &[String],
    iterations: u32,
    options: IterationOptions<'_>,
) -> Vec<IterationReport> {
    let mut reports = Vec::new();
    for name in names {
        for _ in 0..iterations {
            match run_iteration(client, Some(name.as_str()), options).await {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(error) => {
                    error!(scenario = %name, %error, "iteration failed");
                }
            }
        }
    }
    reports
}

/// Endpoint headers override global defaults on key collision.
pub(crate) fn merge_headers(
    defaults: &HashMap<String, String>,
    endpoint: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = defaults.clone();
    merged.extend(endpoint.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Slow classification is strictly greater-than; a duration exactly on the
/// threshold is not slow.
pub(crate) fn is_slow(duration_ms: u64, threshold_ms: u64) -> bool {
    duration_ms > threshold_ms
}

/// An endpoint that pins `Content-Type` through its headers wins over the
/// body-derived type; setting both would append a second header value.
pub(crate) fn raw_content_type(
    headers: &HashMap<String, String>,
    derived: String,
) -> Option<String> {
    if headers.keys().any(|h| h.eq_ignore_ascii_case("content-type")) {
        None
    } else {
        Some(derived)
    }
}

pub(crate) fn endpoint_url(config: &GlobalConfig, endpoint: &EndpointDescriptor) -> String {
    let base = endpoint.base_url.as_deref().unwrap_or(&config.base_url);
    format!("{}{}", base.trim_end_matches('/'), endpoint.path)
}

pub(crate) fn prepare_body(
    descriptor: &BodyDescriptor,
    stored: &HashMap<String, Value>,
    default_raw_type: &str,
) -> Result<PreparedBody, PrepareError> {
    let content = substitute(&descriptor.content, stored)?;

    match descriptor.kind {
        BodyKind::Raw => {
            let text = match &content {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            let content_type = descriptor
                .content_type
                .clone()
                .unwrap_or_else(|| default_raw_type.to_string());
            Ok(PreparedBody::Raw { content_type, text })
        }
        BodyKind::XWwwFormUrlencoded => Ok(PreparedBody::UrlEncoded {
            pairs: object_pairs(&content, "x-www-form-urlencoded")?,
        }),
        BodyKind::FormData => Ok(PreparedBody::Multipart {
            fields: object_pairs(&content, "form-data")?,
        }),
    }
}

fn object_pairs(content: &Value, kind: &'static str) -> Result<Vec<(String, String)>, PrepareError> {
    let Some(map) = content.as_object() else {
        return Err(PrepareError::InvalidContent { kind });
    };

    Ok(map
        .iter()
        .map(|(field, value)| {
            let rendered = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            (field.clone(), rendered)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn descriptor(kind: BodyKind, content: Value) -> BodyDescriptor {
        BodyDescriptor {
            kind,
            content,
            content_type: None,
        }
    }

    #[test]
    fn boundary_duration_is_not_slow() {
        assert!(!is_slow(500, 500));
        assert!(is_slow(501, 500));
        assert!(!is_slow(499, 500));
    }

    #[test]
    fn endpoint_headers_override_defaults() {
        let mut defaults = HashMap::new();
        defaults.insert("Accept".to_string(), "application/json".to_string());
        defaults.insert("X-Env".to_string(), "staging".to_string());
        let mut endpoint = HashMap::new();
        endpoint.insert("X-Env".to_string(), "load".to_string());

        let merged = merge_headers(&defaults, &endpoint);
        assert_eq!(merged["Accept"], "application/json");
        assert_eq!(merged["X-Env"], "load");
    }

    #[test]
    fn declared_content_type_header_suppresses_the_derived_one() {
        let mut headers = HashMap::new();
        headers.insert(
            "content-TYPE".to_string(),
            "application/vnd.api+json".to_string(),
        );

        assert_eq!(
            raw_content_type(&headers, "application/json".to_string()),
            None
        );
        assert_eq!(
            raw_content_type(&HashMap::new(), "application/json".to_string()),
            Some("application/json".to_string())
        );
    }

    #[test]
    fn raw_body_defaults_to_json_content_type() {
        let stored = HashMap::new();
        let prepared = prepare_body(
            &descriptor(BodyKind::Raw, json!({"name": "widget"})),
            &stored,
            "application/json",
        )
        .unwrap();

        assert_eq!(
            prepared,
            PreparedBody::Raw {
                content_type: "application/json".to_string(),
                text: r#"{"name":"widget"}"#.to_string(),
            }
        );
    }

    #[test]
    fn raw_body_keeps_declared_content_type() {
        let stored = HashMap::new();
        let mut raw = descriptor(BodyKind::Raw, json!("plain payload"));
        raw.content_type = Some("text/plain".to_string());

        let prepared = prepare_body(&raw, &stored, "application/json").unwrap();
        assert_eq!(
            prepared,
            PreparedBody::Raw {
                content_type: "text/plain".to_string(),
                text: "plain payload".to_string(),
            }
        );
    }

    #[test]
    fn urlencoded_body_flattens_object_fields() {
        let mut stored = HashMap::new();
        stored.insert("token".to_string(), json!("abc"));

        let prepared = prepare_body(
            &descriptor(
                BodyKind::XWwwFormUrlencoded,
                json!({"grant": "client", "token": "${stored.token}", "retries": 3}),
            ),
            &stored,
            "application/json",
        )
        .unwrap();

        let PreparedBody::UrlEncoded { pairs } = prepared else {
            panic!("expected url-encoded body");
        };
        assert!(pairs.contains(&("grant".to_string(), "client".to_string())));
        assert!(pairs.contains(&("token".to_string(), "abc".to_string())));
        assert!(pairs.contains(&("retries".to_string(), "3".to_string())));
    }

    #[test]
    fn urlencoded_body_rejects_non_object_content() {
        let stored = HashMap::new();
        let err = prepare_body(
            &descriptor(BodyKind::XWwwFormUrlencoded, json!("scalar")),
            &stored,
            "application/json",
        )
        .unwrap_err();

        assert!(err.to_string().contains("requires an object"));
    }

    #[test]
    fn missing_stored_key_aborts_preparation() {
        let stored = HashMap::new();
        let err = prepare_body(
            &descriptor(BodyKind::Raw, json!({"auth": "${stored.token}"})),
            &stored,
            "application/json",
        )
        .unwrap_err();

        assert!(err.to_string().contains("missing stored value"));
    }

    #[test]
    fn url_joins_base_and_path_without_double_slash() {
        let mut config = GlobalConfig::default();
        config.base_url = "https://api.example.com/".to_string();
        let endpoint: EndpointDescriptor =
            serde_json::from_str(r#"{"path": "/health", "method": "GET"}"#).unwrap();

        assert_eq!(
            endpoint_url(&config, &endpoint),
            "https://api.example.com/health"
        );
    }

    #[test]
    fn endpoint_base_url_overrides_global() {
        let mut config = GlobalConfig::default();
        config.base_url = "https://api.example.com".to_string();
        let endpoint: EndpointDescriptor = serde_json::from_str(
            r#"{"baseUrl": "https://auth.example.com", "path": "/token", "method": "POST"}"#,
        )
        .unwrap();

        assert_eq!(
            endpoint_url(&config, &endpoint),
            "https://auth.example.com/token"
        );
    }
}
