//! YAML config loading with `${VAR}` expansion.
//!
//! Expansion runs on the parsed document, so only string values are touched.
//! Lookup order for a variable: the file's own top-level `env:` map, then the
//! process environment, then the inline `:-default`, then the empty string.

use std::{collections::HashMap, path::Path, sync::LazyLock};

use regex::{Captures, Regex};
use serde_yaml::Value;
use tracing::debug;
use url::Url;

use super::{error::ConfigError, GatewayConfig, UpstreamTransport};

pub const DEFAULT_CONFIG_PATH: &str = "mcp-proxy.config.yaml";

// SAFETY: .expect() on a compile-time literal pattern, checked by
// test_env_pattern_compiles().
static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]+?)(?::-([^}]*))?\}")
        .expect("BUG: ENV_VAR_PATTERN regex is invalid")
});

/// Load, expand and deserialize a gateway config file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut document: Value = serde_yaml::from_str(&contents)?;

    let overrides = env_overrides(&document);
    debug!(
        "Expanding config {} with {} env overrides",
        path.display(),
        overrides.len()
    );
    expand_value(&mut document, &overrides);

    let config: GatewayConfig =
        serde_yaml::from_value(document).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    validate(&config)?;
    Ok(config)
}

/// Checks serde cannot express on its own.
fn validate(config: &GatewayConfig) -> Result<(), ConfigError> {
    for upstream in &config.upstreams {
        if let UpstreamTransport::Http { url, .. } = &upstream.transport {
            Url::parse(url).map_err(|e| {
                ConfigError::Invalid(format!(
                    "upstream '{}' has an invalid url '{}': {}",
                    upstream.name, url, e
                ))
            })?;
        }
    }
    Ok(())
}

/// Expand `${VAR}` and `${VAR:-default}` occurrences in `value`.
pub fn expand_env_vars(value: &str, overrides: &HashMap<String, String>) -> String {
    ENV_VAR_PATTERN
        .replace_all(value, |caps: &Captures| {
            let name = &caps[1];
            overrides
                .get(name)
                .cloned()
                .or_else(|| std::env::var(name).ok())
                .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

/// The document's `env:` map, each value expanded against the process
/// environment only.
fn env_overrides(document: &Value) -> HashMap<String, String> {
    let no_overrides = HashMap::new();
    let Some(Value::Mapping(env)) = document.get("env") else {
        return no_overrides;
    };

    env.iter()
        .filter_map(|(key, value)| match (key, value) {
            (Value::String(k), Value::String(v)) => {
                Some((k.clone(), expand_env_vars(v, &no_overrides)))
            }
            _ => None,
        })
        .collect()
}

fn expand_value(value: &mut Value, overrides: &HashMap<String, String>) {
    match value {
        Value::String(s) => *s = expand_env_vars(s, overrides),
        Value::Sequence(items) => items
            .iter_mut()
            .for_each(|item| expand_value(item, overrides)),
        Value::Mapping(map) => map
            .iter_mut()
            .for_each(|(_, v)| expand_value(v, overrides)),
        Value::Tagged(tagged) => expand_value(&mut tagged.value, overrides),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
