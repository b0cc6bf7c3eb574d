//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod completions;
pub mod plugins;
pub mod version;

use crate::cli::args::{Cli, Commands, PluginsSubcommand};
use crate::error::RangeForgeError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli) -> Result<(), RangeForgeError> {
    match cli.command {
        Commands::Plugins(cmd) => match &cmd.subcommand {
            PluginsSubcommand::List(args) => plugins::list(&cmd, args).await,
            PluginsSubcommand::Check(args) => plugins::check(&cmd, args).await,
            PluginsSubcommand::Config(args) => plugins::config(&cmd, args).await,
        },
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
