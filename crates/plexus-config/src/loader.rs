//! Configuration loading

use crate::error::{ConfigError, Result};
use crate::{ConfigFormat, HostConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use std::env;
use std::fs;
use std::path::Path;

static ENV_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}").expect("valid env var regex")
});

/// Load configuration from a file, choosing the format by extension
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<HostConfig> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    load_from_str(&content, format)
}

/// Expand `${VAR}` and `${VAR:-default}` references
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut last_match = 0;

    for cap in ENV_VAR.captures_iter(content) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let default_value = cap.get(3).map(|m| m.as_str());

        let value = match (env::var(var_name.as_str()), default_value) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => {
                return Err(ConfigError::MissingEnvVar(var_name.as_str().to_string()))
            }
        };

        result.push_str(&content[last_match..full_match.start()]);
        result.push_str(&value);
        last_match = full_match.end();
    }

    result.push_str(&content[last_match..]);
    Ok(result)
}

/// Load configuration from a string
pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<HostConfig> {
    let expanded = expand_env_vars(content)?;

    let config = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(&expanded).map_err(|e| ConfigError::Parse {
            format: "YAML",
            message: e.to_string(),
        })?,
        ConfigFormat::Toml => toml::from_str(&expanded).map_err(|e| ConfigError::Parse {
            format: "TOML",
            message: e.to_string(),
        })?,
        ConfigFormat::Json => serde_json::from_str(&expanded).map_err(|e| ConfigError::Parse {
            format: "JSON",
            message: e.to_string(),
        })?,
    };

    Ok(config)
}

/// Load a file and validate it
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<HostConfig> {
    let config = load_from_file(path)?;
    crate::validator::validate_config(&config)?;
    Ok(config)
}

/// Load and merge several files
///
/// Later files override earlier ones, so a shared base can be combined with
/// a site-specific overlay:
///
/// ```no_run
/// use plexus_config::load_and_merge;
///
/// let config = load_and_merge(vec!["host.yaml", "site.toml"])?;
/// # Ok::<(), plexus_config::ConfigError>(())
/// ```
pub fn load_and_merge<P: AsRef<Path>>(paths: Vec<P>) -> Result<HostConfig> {
    if paths.is_empty() {
        return Err(ConfigError::invalid("No configuration files provided"));
    }

    let configs = paths
        .into_iter()
        .map(load_from_file)
        .collect::<Result<Vec<_>>>()?;

    let merged = crate::merger::merge_configs(configs)?;
    crate::validator::validate_config(&merged)?;

    Ok(merged)
}
