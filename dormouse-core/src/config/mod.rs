mod loader;
pub mod value;

use std::collections::HashMap;
use std::path::Path;

pub use value::{ConfigValue, FromConfigValue};

/// Prefix shared by every configuration key and environment variable.
pub const ENV_PREFIX: &str = "DORMOUSE_";

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    #[error("config key not found: {0}")]
    NotFound(String),
    /// The value could not be converted to the requested type.
    #[error("config type mismatch for '{key}': expected {expected}")]
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O or YAML parsing error occurred while loading config files.
    #[error("config load error: {0}")]
    Load(String),
}

/// Layered configuration loaded from YAML files, `.env` files and environment variables.
///
/// Resolution order (lowest to highest priority):
/// 1. `dormouse.yaml`
/// 2. `dormouse-{profile}.yaml`
/// 3. `.env` and `.env.{profile}` (loaded into the process environment, never
///    overwriting variables that are already set)
/// 4. `DORMOUSE_*` environment variables (`DORMOUSE_DATASOURCE_ADDRESS`
///    overrides `dormouse.datasource.address`)
///
/// String values may reference `${VAR}`, `${env:VAR}` or `${file:/path}`.
///
/// The profile is `DORMOUSE_PROFILE` if set, otherwise the argument.
#[derive(Debug, Clone)]
pub struct DormouseConfig {
    values: HashMap<String, ConfigValue>,
    profile: String,
}

impl DormouseConfig {
    /// Load configuration for `profile` from the current working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from(Path::new("."), profile)
    }

    /// Load configuration for `profile` from the files found in `dir`.
    pub fn load_from(dir: &Path, profile: &str) -> Result<Self, ConfigError> {
        let active_profile = std::env::var("DORMOUSE_PROFILE").unwrap_or_else(|_| profile.to_string());

        let mut values = HashMap::new();
        loader::load_yaml_file(&dir.join("dormouse.yaml"), &mut values)?;
        loader::load_yaml_file(&dir.join(format!("dormouse-{active_profile}.yaml")), &mut values)?;

        let _ = dotenvy::from_path(dir.join(".env"));
        let _ = dotenvy::from_path(dir.join(format!(".env.{active_profile}")));

        loader::resolve_placeholders_in(&mut values)?;

        for (env_key, env_val) in std::env::vars() {
            if let Some(config_key) = loader::env_key_to_config_key(&env_key) {
                values.insert(config_key, ConfigValue::String(env_val));
            }
        }

        tracing::debug!(profile = %active_profile, keys = values.len(), "configuration loaded");
        Ok(DormouseConfig {
            values,
            profile: active_profile,
        })
    }

    /// Create a config from a YAML string (useful for testing).
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml_str(yaml, &mut values)?;
        Ok(DormouseConfig {
            values,
            profile: profile.to_string(),
        })
    }

    /// Create an empty config (useful for testing).
    pub fn empty() -> Self {
        DormouseConfig {
            values: HashMap::new(),
            profile: "test".to_string(),
        }
    }

    /// Set a value programmatically.
    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    /// Get a typed value for the given dot-separated key.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(value, key)
    }

    /// Get a typed value, or `None` when the key is missing.
    ///
    /// A present key with an unconvertible value is still an error.
    pub fn get_opt<V: FromConfigValue>(&self, key: &str) -> Result<Option<V>, ConfigError> {
        match self.get(key) {
            Ok(v) => Ok(Some(v)),
            Err(ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get a typed value, returning a default if the key is missing or invalid.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    /// Check whether a key exists in the config.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All `(key, value)` pairs whose key starts with `prefix.`, with the prefix stripped.
    pub fn section(&self, prefix: &str) -> Vec<(String, ConfigValue)> {
        let dotted = format!("{prefix}.");
        let mut entries: Vec<(String, ConfigValue)> = self
            .values
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&dotted).map(|rest| (rest.to_string(), v.clone())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// The active profile name.
    pub fn profile(&self) -> &str {
        &self.profile
    }
}
