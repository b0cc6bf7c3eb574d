//! Vulnerability installed and removed by configured commands.
//!
//! Configuration:
//!
//! ```yaml
//! start_command: sudo usermod --password $(openssl passwd -1 test) test
//! stop_command: sudo passwd -l test
//! ```

use super::required_command;
use crate::error::PluginResult;
use crate::plugin::{PluginBase, PluginContext, VulnerabilityPlugin};

/// Generic vulnerability plugin.
#[derive(Debug, Default)]
pub struct CommandVulnerability;

impl PluginBase for CommandVulnerability {}

impl VulnerabilityPlugin for CommandVulnerability {
    fn start(&mut self, ctx: &mut PluginContext<'_>) -> PluginResult<()> {
        let command = required_command(ctx, "start_command", &[])?;
        ctx.run_cmd(&command, false)?;
        Ok(())
    }

    fn stop(&mut self, ctx: &mut PluginContext<'_>) -> PluginResult<()> {
        let command = required_command(ctx, "stop_command", &[])?;
        ctx.run_cmd(&command, false)?;
        Ok(())
    }
}
