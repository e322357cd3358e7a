use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::config::GlobalConfig;

/// One constant-VU scheduling entry in the shape an external load engine
/// consumes. The `env` selector tells a running iteration which endpoint
/// descriptor to execute; the tag scopes metrics back to the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub executor: String,
    pub vus: u32,
    pub duration: String,
    pub tags: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunOptions {
    pub scenarios: BTreeMap<String, Scenario>,
    pub thresholds: BTreeMap<String, Vec<String>>,
}

/// Pure translation of the endpoint registry into scheduling configuration.
///
/// With no filter every endpoint gets a scenario; a filter restricts the set
/// and unknown names in it are logged and ignored. Global default thresholds
/// are merged with each endpoint's response-time and custom overrides, every
/// override scoped to its endpoint tag.
pub fn build_options(config: &GlobalConfig, filter: Option<&[String]>) -> RunOptions {
    if let Some(names) = filter {
        for name in names {
            if !config.endpoints.contains_key(name) {
                warn!(endpoint = %name, "endpoint filter names an unknown endpoint");
            }
        }
    }

    let selected = config.endpoints.iter().filter(|(name, _)| {
        filter.map_or(true, |names| names.iter().any(|n| n == *name))
    });

    let mut scenarios = BTreeMap::new();
    let mut thresholds = config.defaults.thresholds.clone();

    for (name, endpoint) in selected {
        let mut tags = BTreeMap::new();
        tags.insert("endpoint".to_string(), name.clone());
        let mut env = BTreeMap::new();
        env.insert("SCENARIO".to_string(), name.clone());

        scenarios.insert(
            name.clone(),
            Scenario {
                executor: "constant-vus".to_string(),
                vus: endpoint.scenario.vus.unwrap_or(config.defaults.vus),
                duration: endpoint
                    .scenario
                    .duration
                    .clone()
                    .unwrap_or_else(|| config.defaults.duration.clone()),
                tags,
                env,
            },
        );

        if let Some(limit_ms) = endpoint.scenario.thresholds.response_time {
            thresholds.insert(
                format!("http_req_duration{{endpoint:{name}}}"),
                vec![format!("p(95)<{limit_ms}")],
            );
        }
        for (metric, expressions) in &endpoint.scenario.thresholds.custom {
            thresholds.insert(
                format!("{metric}{{endpoint:{name}}}"),
                expressions.clone(),
            );
        }
    }

    RunOptions {
        scenarios,
        thresholds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config_with(names: &[&str]) -> GlobalConfig {
        let endpoints = names
            .iter()
            .map(|name| {
                let endpoint = serde_json::from_str(
                    r#"{"path": "/x", "method": "GET"}"#,
                )
                .unwrap();
                (name.to_string(), endpoint)
            })
            .collect();

        GlobalConfig {
            endpoints,
            ..GlobalConfig::default()
        }
    }

    #[test]
    fn no_filter_selects_every_endpoint() {
        let options = build_options(&config_with(&["a", "b", "c"]), None);
        let names: Vec<&String> = options.scenarios.keys().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn filter_restricts_the_scenario_map() {
        let filter = vec!["b".to_string()];
        let options = build_options(&config_with(&["a", "b", "c"]), Some(&filter));

        assert_eq!(options.scenarios.len(), 1);
        assert!(options.scenarios.contains_key("b"));
    }

    #[test]
    fn unknown_filter_names_are_ignored() {
        let filter = vec!["b".to_string(), "nope".to_string()];
        let options = build_options(&config_with(&["a", "b"]), Some(&filter));

        assert_eq!(options.scenarios.len(), 1);
        assert!(options.scenarios.contains_key("b"));
    }

    #[test]
    fn scenarios_use_endpoint_overrides_then_global_defaults() {
        let mut config = config_with(&["tuned", "plain"]);
        config.defaults.vus = 2;
        config.defaults.duration = "45s".to_string();
        {
            let tuned = config.endpoints.get_mut("tuned").unwrap();
            tuned.scenario.vus = Some(10);
            tuned.scenario.duration = Some("2m".to_string());
        }

        let options = build_options(&config, None);
        let tuned = &options.scenarios["tuned"];
        assert_eq!(tuned.vus, 10);
        assert_eq!(tuned.duration, "2m");
        assert_eq!(tuned.executor, "constant-vus");
        assert_eq!(tuned.tags["endpoint"], "tuned");
        assert_eq!(tuned.env["SCENARIO"], "tuned");

        let plain = &options.scenarios["plain"];
        assert_eq!(plain.vus, 2);
        assert_eq!(plain.duration, "45s");
    }

    #[test]
    fn thresholds_merge_global_and_scoped_overrides() {
        let mut config = config_with(&["login"]);
        config
            .defaults
            .thresholds
            .insert("http_req_failed".to_string(), vec!["rate<0.01".to_string()]);
        {
            let login = config.endpoints.get_mut("login").unwrap();
            login.scenario.thresholds.response_time = Some(400);
            login
                .scenario
                .thresholds
                .custom
                .insert("checks".to_string(), vec!["rate>0.99".to_string()]);
        }

        let options = build_options(&config, None);
        assert_eq!(
            options.thresholds["http_req_failed"],
            vec!["rate<0.01".to_string()]
        );
        assert_eq!(
            options.thresholds["http_req_duration{endpoint:login}"],
            vec!["p(95)<400".to_string()]
        );
        assert_eq!(
            options.thresholds["checks{endpoint:login}"],
            vec!["rate>0.99".to_string()]
        );
    }
}
