//! CLI argument definitions
//!
//! All `clap` derive structs for the `rangeforge` command-line interface.

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::plugin::Capability;
use crate::registry::DEFAULT_PLUGIN_GLOB;

// ============================================================================
// Top-Level CLI
// ============================================================================

/// `RangeForge`: plugin framework for cyber-range experiments.
#[derive(Parser, Debug)]
#[command(name = "rangeforge", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "RANGEFORGE_COLOR")]
    pub color: ColorChoice,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect installed plugins.
    Plugins(PluginsCommand),

    /// Generate shell completions.
    Completions(CompletionsArgs),

    /// Display version and build information.
    Version(VersionArgs),
}

// ============================================================================
// Plugins Subcommands
// ============================================================================

/// Plugin inspection commands.
#[derive(Args, Debug)]
pub struct PluginsCommand {
    /// Glob selecting plugin manifests.
    #[arg(
        long,
        global = true,
        env = "RANGEFORGE_PLUGINS",
        default_value = DEFAULT_PLUGIN_GLOB
    )]
    pub plugins: String,

    /// Append attack log events (JSONL) to this file.
    #[arg(long, global = true, env = "RANGEFORGE_EVENTS")]
    pub events: Option<std::path::PathBuf>,

    /// Plugin subcommand.
    #[command(subcommand)]
    pub subcommand: PluginsSubcommand,
}

/// Plugin subcommands.
#[derive(Subcommand, Debug)]
pub enum PluginsSubcommand {
    /// List installed plugins by capability.
    List(ListArgs),

    /// Validate installed plugins.
    Check(CheckArgs),

    /// Print the default configuration of a plugin.
    Config(ConfigArgs),
}

/// Arguments for `plugins list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `plugins check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Exit non-zero if any issue is found.
    #[arg(long)]
    pub strict: bool,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `plugins config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Capability of the plugin.
    pub capability: Capability,

    /// Name (or alternative name) of the plugin.
    pub name: String,
}

// ============================================================================
// Completions / Version
// ============================================================================

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn plugins_command(args: &[&str]) -> PluginsCommand {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Plugins(cmd) => cmd,
            other => panic!("expected plugins command, got {other:?}"),
        }
    }

    #[test]
    fn test_plugins_list_defaults() {
        let cmd = plugins_command(&["rangeforge", "plugins", "list"]);
        assert!(matches!(
            cmd.subcommand,
            PluginsSubcommand::List(ListArgs { format: OutputFormat::Human })
        ));
    }

    #[test]
    fn test_plugins_glob_after_subcommand() {
        let cmd = plugins_command(&[
            "rangeforge",
            "plugins",
            "check",
            "--strict",
            "--plugins",
            "lab/**/plugin.yaml",
        ]);
        assert_eq!(cmd.plugins, "lab/**/plugin.yaml");
        let PluginsSubcommand::Check(args) = cmd.subcommand else {
            panic!("expected check");
        };
        assert!(args.strict);
    }

    #[test]
    fn test_config_takes_capability_and_name() {
        let cmd = plugins_command(&["rangeforge", "plugins", "config", "machinery", "vagrant"]);
        let PluginsSubcommand::Config(args) = cmd.subcommand else {
            panic!("expected config");
        };
        assert_eq!(args.capability, Capability::Machinery);
        assert_eq!(args.name, "vagrant");
    }

    #[test]
    fn test_unknown_capability_rejected() {
        let result = Cli::try_parse_from(["rangeforge", "plugins", "config", "exploit", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_help_output() {
        let err = Cli::try_parse_from(["rangeforge", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_output() {
        let err = Cli::try_parse_from(["rangeforge", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::try_parse_from(["rangeforge", "-vv", "version"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }
}
