//! Plugin configuration binding.
//!
//! Each plugin directory may ship a `default_config.yaml`. The effective
//! configuration of a plugin instance is that document with run-specific
//! overrides merged on top (right-biased, top-level keys only).

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_yaml::Value;
use tracing::trace;

use crate::error::ConfigError;

/// File name of the per-directory default configuration document.
pub const DEFAULT_CONFIG_NAME: &str = "default_config.yaml";

/// Effective plugin configuration: ordered string keys to arbitrary values.
pub type PluginConf = IndexMap<String, Value>;

/// Returns the path of the default configuration file in `plugin_dir`.
#[must_use]
pub fn default_config_path(plugin_dir: &Path) -> PathBuf {
    plugin_dir.join(DEFAULT_CONFIG_NAME)
}

/// Loads the default configuration of the plugin living in `plugin_dir`.
///
/// A missing file or an empty document yields an empty configuration.
///
/// # Errors
///
/// Returns `ConfigError::ParseError` if the document is not valid YAML and
/// `ConfigError::InvalidValue` if its top level is not a mapping.
pub fn load_default_config(plugin_dir: &Path) -> Result<PluginConf, ConfigError> {
    let path = default_config_path(plugin_dir);
    if !path.is_file() {
        trace!(path = %path.display(), "no default config");
        return Ok(PluginConf::new());
    }

    let text = std::fs::read_to_string(&path)
        .map_err(|_| ConfigError::MissingFile { path: path.clone() })?;
    trace!(path = %path.display(), "loading default config");
    parse_conf(&text, &path)
}

/// Parses a configuration document.
///
/// # Errors
///
/// See [`load_default_config`].
pub fn parse_conf(text: &str, path: &Path) -> Result<PluginConf, ConfigError> {
    if text.trim().is_empty() {
        return Ok(PluginConf::new());
    }

    let value: Value = serde_yaml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        line: e.location().map(|l| l.line()),
        message: e.to_string(),
    })?;

    match value {
        Value::Null => Ok(PluginConf::new()),
        Value::Mapping(_) => serde_yaml::from_value(value).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: None,
            message: e.to_string(),
        }),
        other => Err(ConfigError::InvalidValue {
            field: path.display().to_string(),
            value: value_kind(&other).to_string(),
            expected: "a mapping of configuration keys".to_string(),
        }),
    }
}

/// Merges `overrides` into `base`; keys present in both take the override.
pub fn merge_conf(base: &mut PluginConf, overrides: PluginConf) {
    for (key, value) in overrides {
        base.insert(key, value);
    }
}

/// Returns the raw default configuration text, usable as documentation.
///
/// Plugins without a default configuration get a one-line YAML comment.
///
/// # Errors
///
/// Returns `ConfigError::MissingFile` if the file exists but cannot be read.
pub fn raw_default_config(plugin_dir: &Path, plugin_name: &str) -> Result<String, ConfigError> {
    let path = default_config_path(plugin_dir);
    if path.is_file() {
        std::fs::read_to_string(&path).map_err(|_| ConfigError::MissingFile { path })
    } else {
        Ok(format!(
            "# The plugin {plugin_name} does not support configuration"
        ))
    }
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
