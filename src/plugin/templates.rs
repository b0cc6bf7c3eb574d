//! Template rendering.
//!
//! Performs single-pass `${...}` substitution from the plugin configuration.
//! Dotted paths descend into mappings (`${nmap.ports}`) and numeric segments
//! index sequences (`${hosts.0}`). Missing variables resolve to the empty
//! string; `$${` is a literal `${`. Substituted values are never
//! re-interpolated.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;
use tracing::debug;

use super::PluginDescriptor;
use crate::config::PluginConf;
use crate::error::PluginResult;

/// Regex for matching `${...}` template variables.
static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

/// Sentinel marker for escaped `$${` sequences.
const ESCAPE_SENTINEL: &str = "\x00ESC_DOLLAR\x00";

/// Resolves all `${...}` variables in `template`.
///
/// `extra` variables are looked up first and shadow configuration keys.
#[must_use]
pub fn resolve_template(template: &str, conf: &PluginConf, extra: &[(&str, String)]) -> String {
    let working = template.replace("$${", ESCAPE_SENTINEL);

    let result = TEMPLATE_RE
        .replace_all(&working, |caps: &regex::Captures<'_>| {
            let path = caps[1].trim();
            extra
                .iter()
                .find(|(name, _)| *name == path)
                .map(|(_, value)| value.clone())
                .or_else(|| lookup(conf, path).map(value_to_string))
                .unwrap_or_default()
        })
        .to_string();

    result.replace(ESCAPE_SENTINEL, "${")
}

/// Returns `true` if the string contains any `${...}` template variables.
#[must_use]
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_RE.is_match(s)
}

/// Renders a configuration value as text.
///
/// Scalars render bare, null renders empty, sequences of scalars are joined
/// with spaces and anything else is emitted as flow YAML.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) if items.iter().all(is_scalar) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Tagged(tagged) => value_to_string(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_owned())
            .unwrap_or_default(),
    }
}

const fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

fn lookup<'c>(conf: &'c PluginConf, path: &str) -> Option<&'c Value> {
    let mut segments = path.split('.');
    let mut current = conf.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Mapping(map) => map.get(segment)?,
            Value::Sequence(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Renders every template of `descriptor` into the plugin directory.
///
/// Returns the paths written.
///
/// # Errors
///
/// Returns `PluginError::Io` if a template cannot be read or written.
pub fn render_templates(
    descriptor: &PluginDescriptor,
    conf: &PluginConf,
) -> PluginResult<Vec<PathBuf>> {
    let dir = descriptor.plugin_dir();
    let mut written = Vec::with_capacity(descriptor.templates.len());
    for spec in &descriptor.templates {
        let source = dir.join(&spec.source);
        let target = dir.join(&spec.target);
        let text = std::fs::read_to_string(&source)?;
        std::fs::write(&target, resolve_template(&text, conf, &[]))?;
        debug!(
            plugin = descriptor.display_name(),
            source = %source.display(),
            target = %target.display(),
            "template rendered"
        );
        written.push(target);
    }
    Ok(written)
}
