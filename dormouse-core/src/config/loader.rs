use std::collections::HashMap;
use std::path::Path;

use super::value::ConfigValue;
use super::{ConfigError, ENV_PREFIX};

/// Load and parse a YAML file, flattening it into the values map.
///
/// A missing file is not an error: every layer is optional.
pub(crate) fn load_yaml_file(
    path: &Path,
    values: &mut HashMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        load_yaml_str(&content, values)?;
    }
    Ok(())
}

/// Parse a YAML string and flatten it into the values map.
pub(crate) fn load_yaml_str(
    content: &str,
    values: &mut HashMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;
    flatten_yaml("", &yaml, values);
    Ok(())
}

/// Flatten a YAML tree into dot-separated keys.
pub(crate) fn flatten_yaml(
    prefix: &str,
    value: &serde_yaml::Value,
    out: &mut HashMap<String, ConfigValue>,
) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => format!("{other:?}"),
                };
                let full_key = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_yaml(&full_key, v, out);
            }
        }
        serde_yaml::Value::Sequence(seq) if !prefix.is_empty() => {
            out.insert(
                prefix.to_string(),
                ConfigValue::List(seq.iter().map(ConfigValue::from_yaml).collect()),
            );
        }
        leaf => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), ConfigValue::from_yaml(leaf));
            }
        }
    }
}

/// `DORMOUSE_DATASOURCE_ADDRESS` -> `dormouse.datasource.address`.
pub(crate) fn env_key_to_config_key(env_key: &str) -> Option<String> {
    let rest = env_key.strip_prefix(ENV_PREFIX)?;
    if rest.is_empty() {
        return None;
    }
    Some(format!("dormouse.{}", rest.to_lowercase().replace('_', ".")))
}

/// Resolve `${...}` placeholders in every string value of the map.
pub(crate) fn resolve_placeholders_in(
    values: &mut HashMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    for value in values.values_mut() {
        if let ConfigValue::String(s) = value {
            if s.contains("${") {
                *s = resolve_placeholders(s)?;
            }
        }
    }
    Ok(())
}

fn resolve_placeholders(value: &str) -> Result<String, ConfigError> {
    let mut result = value.to_string();
    while let Some(start) = result.find("${") {
        let end = result[start..]
            .find('}')
            .ok_or_else(|| ConfigError::Load(format!("unclosed placeholder in: {value}")))?;
        let reference = result[start + 2..start + end].trim().to_string();
        let resolved = resolve_reference(&reference)?;
        result.replace_range(start..start + end + 1, &resolved);
    }
    Ok(result)
}

fn resolve_reference(reference: &str) -> Result<String, ConfigError> {
    if let Some(path) = reference.strip_prefix("file:") {
        std::fs::read_to_string(path.trim())
            .map(|s| s.trim().to_string())
            .map_err(|e| ConfigError::Load(format!("secret file '{}': {e}", path.trim())))
    } else {
        let var = reference.strip_prefix("env:").unwrap_or(reference).trim();
        std::env::var(var).map_err(|_| ConfigError::NotFound(var.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_dotted_keys() {
        assert_eq!(
            env_key_to_config_key("DORMOUSE_DATASOURCE_ADDRESS").as_deref(),
            Some("dormouse.datasource.address")
        );
        assert_eq!(env_key_to_config_key("DORMOUSE_"), None);
        assert_eq!(env_key_to_config_key("PATH"), None);
    }

    #[test]
    fn unclosed_placeholder_is_a_load_error() {
        let err = resolve_placeholders("pre ${OOPS").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn file_placeholder_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let secret = dir.path().join("secret");
        std::fs::write(&secret, "hunter2\n").unwrap();
        let resolved = resolve_placeholders(&format!("${{file:{}}}", secret.display())).unwrap();
        assert_eq!(resolved, "hunter2");
    }
}
