use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use url::Url;
use uuid::{Uuid, Variant};

use crate::config::FieldSpec;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap()
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?[0-9()\s\-]+$").unwrap()
});

/// Closed set of field validators a content schema may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Email,
    Number,
    Boolean,
    Date,
    Url,
    Array,
    Object,
    Phone,
    Uuid,
    Enum,
    Regex,
    Custom,
}

impl FieldType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "text" => Self::Text,
            "email" => Self::Email,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            "url" => Self::Url,
            "array" => Self::Array,
            "object" => Self::Object,
            "phone" => Self::Phone,
            "uuid" => Self::Uuid,
            "enum" => Self::Enum,
            "regex" => Self::Regex,
            "custom" => Self::Custom,
            _ => return None,
        })
    }
}

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("unknown validator type: {0}")]
    UnknownType(String),
    #[error("validator {validator} requires the {option} option")]
    MissingOption {
        validator: &'static str,
        option: &'static str,
    },
    #[error("unknown custom validator function: {0}")]
    UnknownFunction(String),
}

/// Named predicates a `custom` field may reference. Configuration is plain
/// data, so custom checks resolve against this fixed table instead of
/// carrying arbitrary code.
pub fn custom_fn(name: &str) -> Option<fn(&Value) -> bool> {
    match name {
        "nonEmpty" => Some(|value| match value {
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
            Value::Null | Value::Bool(_) | Value::Number(_) => false,
        }),
        "positiveNumber" => Some(|value| value.as_f64().is_some_and(|n| n > 0.0)),
        "nonNull" => Some(|value| !value.is_null()),
        _ => None,
    }
}

/// Runs the validator named by `spec.type` against `value`. Unknown type
/// names and missing type-specific options are errors for the caller to
/// record; every other outcome is a plain pass/fail.
pub fn validate(spec: &FieldSpec, value: &Value) -> Result<bool, ValidatorError> {
    let field_type = FieldType::from_name(&spec.type_name)
        .ok_or_else(|| ValidatorError::UnknownType(spec.type_name.clone()))?;

    let pass = match field_type {
        FieldType::Text => match value.as_str() {
            Some(text) => within_length(text, spec.min_length, spec.max_length),
            None => false,
        },
        FieldType::Email => value.as_str().is_some_and(|s| EMAIL_RE.is_match(s)),
        FieldType::Number => match value.as_f64() {
            Some(n) if n.is_nan() => false,
            Some(n) => spec.min.map_or(true, |min| n >= min) && spec.max.map_or(true, |max| n <= max),
            None => false,
        },
        FieldType::Boolean => value.is_boolean(),
        FieldType::Date => value.as_str().is_some_and(is_date_like),
        FieldType::Url => value
            .as_str()
            .is_some_and(|s| Url::parse(s).is_ok()),
        FieldType::Array => value.is_array(),
        FieldType::Object => value.is_object(),
        FieldType::Phone => value
            .as_str()
            .is_some_and(|s| s.chars().count() >= 8 && PHONE_RE.is_match(s)),
        FieldType::Uuid => value.as_str().is_some_and(is_uuid_v4),
        FieldType::Enum => {
            let allowed = spec.values.as_ref().ok_or(ValidatorError::MissingOption {
                validator: "enum",
                option: "values",
            })?;
            allowed.contains(value)
        }
        FieldType::Regex => {
            let pattern = spec.pattern.as_ref().ok_or(ValidatorError::MissingOption {
                validator: "regex",
                option: "pattern",
            })?;
            // Compiled per call; a pattern that does not compile fails the check.
            match (value.as_str(), Regex::new(pattern)) {
                (Some(text), Ok(re)) => re.is_match(text),
                _ => false,
            }
        }
        FieldType::Custom => {
            let name = spec.function.as_ref().ok_or(ValidatorError::MissingOption {
                validator: "custom",
                option: "function",
            })?;
            let predicate =
                custom_fn(name).ok_or_else(|| ValidatorError::UnknownFunction(name.clone()))?;
            predicate(value)
        }
    };

    Ok(pass)
}

fn within_length(text: &str, min: Option<usize>, max: Option<usize>) -> bool {
    let len = text.chars().count();
    min.map_or(true, |min| len >= min) && max.map_or(true, |max| len <= max)
}

fn is_date_like(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok()
        || NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").is_ok()
}

fn is_uuid_v4(text: &str) -> bool {
    match Uuid::parse_str(text) {
        Ok(uuid) => uuid.get_version_num() == 4 && uuid.get_variant() == Variant::RFC4122,
        Err(_) => false,
    }
}
