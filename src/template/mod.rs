use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use thiserror::Error;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{stored\.([A-Za-z0-9_.\-]+)\}").unwrap()
});

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("missing stored value: {0}")]
    MissingKey(String),
    #[error("substituted content is not valid JSON: {0}")]
    Reparse(#[from] serde_json::Error),
}

/// Deep-copies `content` with every `${stored.KEY}` occurrence replaced by
/// the string form of `stored[KEY]`.
///
/// Substitution is textual over the serialized JSON, so a placeholder may sit
/// anywhere inside any string value, including as a substring of a larger
/// one. A key absent from `stored` fails the whole operation; no partially
/// substituted structure is returned.
pub fn substitute(
    content: &Value,
    stored: &HashMap<String, Value>,
) -> Result<Value, TemplateError> {
    let serialized = content.to_string();

    for captures in PLACEHOLDER_RE.captures_iter(&serialized) {
        let key = &captures[1];
        if !stored.contains_key(key) {
            return Err(TemplateError::MissingKey(key.to_string()));
        }
    }

    let replaced = PLACEHOLDER_RE.replace_all(&serialized, |captures: &Captures<'_>| {
        render_stored(&stored[&captures[1]])
    });

    Ok(serde_json::from_str(&replaced)?)
}

/// String values inject their JSON-escaped text, minus the surrounding
/// quotes, so the fragment drops into the enclosing string literal and
/// quotes or backslashes in the stored value survive the reparse. Everything
/// else uses its JSON rendering.
fn render_stored(value: &Value) -> String {
    match value {
        Value::String(text) => {
            let quoted = Value::String(text.clone()).to_string();
            quoted[1..quoted.len() - 1].to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn stored(entries: &[(&str, Value)]) -> HashMap<String, Value> {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn substitutes_stored_string_values() {
        let data = stored(&[("token", json!("abc123"))]);
        let content = json!({"Authorization": "${stored.token}"});

        let result = substitute(&content, &data).unwrap();
        assert_eq!(result, json!({"Authorization": "abc123"}));
    }

    #[test]
    fn substitutes_inside_larger_strings_and_nested_values() {
        let data = stored(&[("userId", json!(42)), ("token", json!("abc"))]);
        let content = json!({
            "auth": {"header": "Bearer ${stored.token}"},
            "path": "/users/${stored.userId}/orders"
        });

        let result = substitute(&content, &data).unwrap();
        assert_eq!(
            result,
            json!({
                "auth": {"header": "Bearer abc"},
                "path": "/users/42/orders"
            })
        );
    }

    #[test]
    fn missing_key_fails_without_partial_output() {
        let data = stored(&[("token", json!("abc"))]);
        let content = json!({"a": "${stored.token}", "b": "${stored.missing}"});

        let err = substitute(&content, &data).unwrap_err();
        assert!(matches!(err, TemplateError::MissingKey(ref key) if key == "missing"));
    }

    #[test]
    fn stored_strings_with_quotes_and_backslashes_stay_intact() {
        let data = stored(&[("note", json!(r#"say "hi" and c:\temp"#))]);
        let content = json!({"message": "prefix ${stored.note} suffix"});

        let result = substitute(&content, &data).unwrap();
        assert_eq!(
            result,
            json!({"message": r#"prefix say "hi" and c:\temp suffix"#})
        );
    }

    #[test]
    fn content_without_placeholders_round_trips() {
        let data = stored(&[]);
        let content = json!({
            "name": "widget",
            "count": 3,
            "enabled": true,
            "ratio": 0.5,
            "tags": ["a", "b"],
            "nested": {"empty": null}
        });

        let result = substitute(&content, &data).unwrap();
        assert_eq!(result, content);
    }

    #[test]
    fn placeholders_work_in_array_elements() {
        let data = stored(&[("id", json!("abc-1"))]);
        let content = json!({"ids": ["${stored.id}", "static"]});

        let result = substitute(&content, &data).unwrap();
        assert_eq!(result, json!({"ids": ["abc-1", "static"]}));
    }
}
