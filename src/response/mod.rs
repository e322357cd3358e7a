use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::config::FieldSpec;
use crate::metrics::Metrics;
use crate::validator;

/// Ordered set of named pass/fail checks for one iteration. Built fresh per
/// request and discarded after reporting.
#[derive(Debug, Clone, Default)]
pub struct CheckSet {
    checks: Vec<(String, bool)>,
}

impl CheckSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, label: impl Into<String>, passed: bool) {
        self.checks.push((label.into(), passed));
    }

    pub fn extend(&mut self, other: CheckSet) {
        self.checks.extend(other.checks);
    }

    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|(_, passed)| *passed)
    }

    pub fn get(&self, label: &str) -> Option<bool> {
        self.checks
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, passed)| *passed)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.checks.iter().map(|(name, passed)| (name.as_str(), *passed))
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Validates a parsed response payload against a per-field schema.
///
/// An unparseable payload yields the single failing `response parsing` check.
/// Field lookup is by exact key; an absent key validates its field against
/// null. A field naming an unknown validator is recorded as failed and
/// logged, without stopping the remaining fields.
pub fn validate_response(
    payload: Option<&Value>,
    schema: &BTreeMap<String, FieldSpec>,
    metrics: &Metrics,
) -> CheckSet {
    let mut checks = CheckSet::new();

    let Some(payload) = payload else {
        checks.record("response parsing", false);
        return checks;
    };

    for (field, spec) in schema {
        let value = payload.get(field).unwrap_or(&Value::Null);
        let passed = match validator::validate(spec, value) {
            Ok(passed) => passed,
            Err(error) => {
                warn!(field = %field, %error, "field validation could not run");
                false
            }
        };
        if !passed {
            metrics.record_validation_failure(field, &spec.type_name);
        }
        checks.record(format!("{field} is valid"), passed);
    }

    checks
}
