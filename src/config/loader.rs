use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::warn;

use super::registry::EndpointRegistry;

/// Environment variable holding a comma-separated endpoint filter.
pub const ENDPOINTS_VAR: &str = "STAMPEDE_ENDPOINTS";
/// Environment variable interpolated into `${secret}` header placeholders.
pub const SECRET_VAR: &str = "STAMPEDE_SECRET";

const SECRET_PLACEHOLDER: &str = "${secret}";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunDefaults {
    pub vus: u32,
    pub duration: String,
    /// Run-wide threshold expressions keyed by metric name.
    pub thresholds: BTreeMap<String, Vec<String>>,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            vus: 1,
            duration: "30s".to_string(),
            thresholds: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalConfig {
    pub base_url: String,
    pub default_headers: HashMap<String, String>,
    pub defaults: RunDefaults,
    /// Fallback slow-request threshold in milliseconds for endpoints that
    /// declare no responseTime threshold of their own.
    pub slow_request_ms: u64,
    /// Short body-type names -> MIME types.
    pub content_types: HashMap<String, String>,
    pub endpoints: EndpointRegistry,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        let mut content_types = HashMap::new();
        content_types.insert("json".to_string(), "application/json".to_string());
        content_types.insert(
            "urlencoded".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        content_types.insert("text".to_string(), "text/plain".to_string());

        Self {
            base_url: String::new(),
            default_headers: HashMap::new(),
            defaults: RunDefaults::default(),
            slow_request_ms: 1000,
            content_types,
            endpoints: EndpointRegistry::new(),
        }
    }
}

impl GlobalConfig {
    /// MIME type for raw bodies that declare none.
    pub fn raw_content_type(&self) -> String {
        self.content_types
            .get("json")
            .cloned()
            .unwrap_or_else(|| "application/json".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: GlobalConfig,
    pub path: PathBuf,
    pub dir: PathBuf,
}

pub fn load_config(target: &Path) -> Result<Option<LoadedConfig>> {
    let resolved = if target.is_absolute() {
        target.to_path_buf()
    } else {
        std::env::current_dir()?.join(target)
    };

    let (file_path, dir) = if resolved.is_dir() {
        (resolved.join("stampede.json"), resolved)
    } else {
        (
            resolved.clone(),
            resolved
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::env::current_dir().unwrap()),
        )
    };

    if !file_path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&file_path)
        .with_context(|| format!("reading config {}", file_path.display()))?;

    let mut config: GlobalConfig = serde_json::from_str(&contents)
        .with_context(|| format!("parsing config {}", file_path.display()))?;

    validate_registry(&config)?;
    interpolate_secret(&mut config);

    Ok(Some(LoadedConfig {
        config,
        path: file_path,
        dir,
    }))
}

fn validate_registry(config: &GlobalConfig) -> Result<()> {
    for (name, endpoint) in &config.endpoints {
        if endpoint.path.is_empty() {
            bail!("endpoint {name} declares an empty path");
        }
    }
    Ok(())
}

/// Replaces `${secret}` in default and endpoint header values with the
/// credential from [`SECRET_VAR`], once, at registry-definition time.
fn interpolate_secret(config: &mut GlobalConfig) {
    let header_values = config
        .default_headers
        .values_mut()
        .chain(
            config
                .endpoints
                .values_mut()
                .flat_map(|endpoint| endpoint.headers.values_mut()),
        )
        .filter(|value| value.contains(SECRET_PLACEHOLDER));

    let mut secret: Option<String> = None;
    for value in header_values {
        if secret.is_none() {
            match std::env::var(SECRET_VAR) {
                Ok(s) => secret = Some(s),
                Err(_) => {
                    warn!("{SECRET_VAR} is unset; leaving ${{secret}} placeholders in headers");
                    return;
                }
            }
        }
        if let Some(ref s) = secret {
            *value = value.replace(SECRET_PLACEHOLDER, s);
        }
    }
}

/// Optional endpoint filter from [`ENDPOINTS_VAR`], e.g. `login,create-user`.
pub fn endpoint_filter_from_env() -> Option<Vec<String>> {
    let raw = std::env::var(ENDPOINTS_VAR).ok()?;
    let names: Vec<String> = raw
        .split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}
