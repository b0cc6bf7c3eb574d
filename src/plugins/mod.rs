//! Built-in configuration-driven plugins
//!
//! Generic attack, sensor and vulnerability implementations whose behavior
//! comes entirely from the plugin configuration: shell commands with
//! `${...}` placeholders run on the bound machines. Several manifest
//! entries can share one of these implementations.

mod command_attack;
mod command_sensor;
mod command_vulnerability;

pub use command_attack::CommandAttack;
pub use command_sensor::CommandSensor;
pub use command_vulnerability::CommandVulnerability;

use crate::error::{ConfigError, PluginResult};
use crate::plugin::PluginContext;
use crate::plugin::templates::resolve_template;

/// The configuration value `key` rendered with `extra` variables.
///
/// # Errors
///
/// Returns `ConfigError::MissingRequired` if `key` is not configured.
fn required_command(
    ctx: &PluginContext<'_>,
    key: &str,
    extra: &[(&str, String)],
) -> PluginResult<String> {
    optional_command(ctx, key, extra).ok_or_else(|| {
        ConfigError::MissingRequired {
            field: key.to_string(),
            location: ctx.name().to_string(),
        }
        .into()
    })
}

/// The configuration value `key` rendered with `extra` variables, if set
/// and not blank.
fn optional_command(
    ctx: &PluginContext<'_>,
    key: &str,
    extra: &[(&str, String)],
) -> Option<String> {
    ctx.conf_str(key)
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| resolve_template(&raw, ctx.conf(), extra))
}
