//! Plugin inspection commands
//!
//! Discovery and validation are blocking, so every command runs the plugin
//! manager on the blocking thread pool.

use std::sync::Arc;

use crate::cli::args::{CheckArgs, ConfigArgs, ListArgs, OutputFormat, PluginsCommand};
use crate::error::RangeForgeError;
use crate::observability::{AttackLog, AttackLogger, EventEmitter};
use crate::plugin::Capability;
use crate::registry::{PluginListing, PluginManager};

/// Builds the plugin manager for a `plugins` invocation.
fn manager(cmd: &PluginsCommand) -> Result<PluginManager, RangeForgeError> {
    let emitter = match &cmd.events {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };
    let logger: Arc<dyn AttackLogger> = Arc::new(AttackLog::new(emitter));
    Ok(PluginManager::new(logger).with_pattern(cmd.plugins.clone()))
}

async fn blocking<T, F>(work: F) -> Result<T, RangeForgeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, RangeForgeError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| RangeForgeError::Io(std::io::Error::other(e)))?
}

/// List installed plugins, grouped by capability.
///
/// # Errors
///
/// Returns a discovery error if the plugin tree cannot be loaded.
pub async fn list(cmd: &PluginsCommand, args: &ListArgs) -> Result<(), RangeForgeError> {
    let manager = manager(cmd)?;
    tracing::info!(pattern = manager.pattern(), "listing plugins");
    let listing = blocking(move || Ok(manager.list()?)).await?;

    match args.format {
        OutputFormat::Human => print!("{}", render_listing(&listing)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
    }
    Ok(())
}

/// Every section title followed by its plugins.
fn render_listing(listing: &[PluginListing]) -> String {
    let mut out = String::new();
    for capability in Capability::all() {
        let section = capability.section();
        out.push_str(&format!("\t\t{section}\n"));
        for entry in listing.iter().filter(|e| e.section == section) {
            out.push_str(&format!("Name: {}\n", entry.name.as_deref().unwrap_or("None")));
            out.push_str(&format!(
                "Description: {}\n",
                entry.description.as_deref().unwrap_or("None")
            ));
            out.push_str("\t\n");
        }
    }
    out
}

/// Validate every installed plugin.
///
/// # Errors
///
/// Returns a discovery error if the plugin tree cannot be loaded, or
/// `RangeForgeError::Validation` when `--strict` is set and issues were
/// found.
pub async fn check(cmd: &PluginsCommand, args: &CheckArgs) -> Result<(), RangeForgeError> {
    let manager = manager(cmd)?;
    tracing::info!(pattern = manager.pattern(), "checking plugins");
    let issues = blocking(move || Ok(manager.check_installed()?)).await?;

    match args.format {
        OutputFormat::Human => {
            for issue in &issues {
                println!("{issue}");
            }
            if issues.is_empty() {
                println!("No issues found");
            } else {
                println!("{} issue(s) found", issues.len());
            }
        }
        OutputFormat::Json => {
            let report: Vec<_> = issues
                .iter()
                .map(|issue| {
                    serde_json::json!({
                        "path": issue.path,
                        "message": issue.message,
                        "severity": format!("{:?}", issue.severity).to_lowercase(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if args.strict && !issues.is_empty() {
        return Err(RangeForgeError::Validation {
            count: issues.len(),
        });
    }
    Ok(())
}

/// Print the default configuration of the named plugin.
///
/// # Errors
///
/// Returns a discovery error, an I/O error for an unreadable configuration
/// file, or a usage error if no plugin answers to the name.
pub async fn config(cmd: &PluginsCommand, args: &ConfigArgs) -> Result<(), RangeForgeError> {
    let manager = manager(cmd)?;
    let capability = args.capability;
    let name = args.name.clone();
    let rendered =
        blocking(move || manager.render_default_config(capability, &name)).await?;

    if rendered.is_empty() {
        return Err(RangeForgeError::Usage(format!(
            "no {} plugin named '{}'",
            capability.section(),
            args.name
        )));
    }
    for text in rendered {
        println!("{}", text.trim_end());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_prints_every_section() {
        let listing = vec![PluginListing {
            section: "Machinery",
            name: Some("vagrant".to_owned()),
            description: None,
        }];
        let text = render_listing(&listing);
        assert_eq!(
            text,
            "\t\tVulnerabilities\n\t\tMachinery\nName: vagrant\nDescription: None\n\t\n\t\tAttack\n\t\tSensors\n"
        );
    }
}
