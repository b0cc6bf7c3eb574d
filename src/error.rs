//! Error types for `RangeForge`
//!
//! Discovery failures abort a run, configuration defects are fatal, and
//! plugin errors carry enough context (plugin, machine, operation) to be
//! diagnosed from a single log line. Validation findings are not errors:
//! see [`ValidationIssue`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `RangeForge` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error (plugin execution failed)
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, missing required setting)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Plugin discovery failed
    pub const DISCOVERY_ERROR: i32 = 4;

    /// Plugin validation reported issues in strict mode
    pub const VALIDATION_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `RangeForge` operations.
#[derive(Debug, Error)]
pub enum RangeForgeError {
    /// Configuration loading error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Plugin discovery error
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Plugin execution error
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// Validation found issues and the caller asked for them to be fatal
    #[error("plugin validation reported {count} issue(s)")]
    Validation {
        /// Number of issues reported
        count: usize,
    },

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RangeForgeError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Discovery(_) => ExitCode::DISCOVERY_ERROR,
            Self::Plugin(PluginError::Config(_)) => ExitCode::CONFIG_ERROR,
            Self::Plugin(_) => ExitCode::ERROR,
            Self::Validation { .. } => ExitCode::VALIDATION_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and binding errors.
///
/// A configuration error means the experiment setup is wrong; retrying the
/// same operation will not help.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Required field is missing from configuration
    #[error("missing required field '{field}' at {location}")]
    MissingRequired {
        /// Name of the missing field
        field: String,
        /// Location in the configuration (e.g., "target1.vm_controller")
        location: String,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// A machine controller reported a state with no `MachineState` mapping
    #[error("controller '{controller}' reported unmapped machine state '{state}'")]
    UnmappedState {
        /// Controller (plugin) name
        controller: String,
        /// Native state value reported by the backend
        state: String,
    },
}

// ============================================================================
// Discovery Errors
// ============================================================================

/// Plugin discovery errors.
///
/// Every variant is fatal: a partially loaded plugin set would make the
/// uniqueness checks meaningless.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The plugin root glob is not a valid pattern
    #[error("invalid plugin glob '{pattern}': {message}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Parser message
        message: String,
    },

    /// A path matched by the glob could not be read
    #[error("cannot read plugin path {path}: {message}")]
    Walk {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O message
        message: String,
    },

    /// A plugin manifest exists but could not be read
    #[error("cannot read plugin manifest {path}: {source}")]
    ManifestRead {
        /// Manifest path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A plugin manifest is not valid YAML or does not match the schema
    #[error("malformed plugin manifest {path}: {message}")]
    ManifestParse {
        /// Manifest path
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// A manifest names an implementation that is not registered
    #[error("unknown plugin implementation '{implementation}' in {path}{}", suggestion_suffix(.suggestion.as_deref()))]
    UnknownImplementation {
        /// Manifest path
        path: PathBuf,
        /// The implementation identifier from the manifest
        implementation: String,
        /// Closest registered implementation, if any
        suggestion: Option<String>,
    },
}

fn suggestion_suffix(suggestion: Option<&str>) -> String {
    suggestion.map_or_else(String::new, |s| format!(" (did you mean '{s}'?)"))
}

// ============================================================================
// Plugin Errors
// ============================================================================

/// Machine role a plugin can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineRole {
    /// The default machine of a non-attack plugin
    Default,
    /// The attacker machine of an attack plugin
    Attacker,
    /// The target machine of an attack plugin
    Target,
}

impl fmt::Display for MachineRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Attacker => write!(f, "attacker"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// Errors raised while configuring or executing a plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A machine-dependent operation was attempted with no machine bound
    #[error("plugin '{plugin}' has no {role} machine bound")]
    Binding {
        /// Plugin name
        plugin: String,
        /// Role that was missing
        role: MachineRole,
    },

    /// A required operation was invoked but the implementation never provided it
    #[error("operation '{operation}' is not implemented by plugin '{plugin}'")]
    Unimplemented {
        /// Plugin name (or implementation id if the name is missing)
        plugin: String,
        /// Operation name
        operation: &'static str,
    },

    /// The VM controller or transport reported a failure
    #[error("{operation} failed on machine '{machine}': {message}")]
    ExternalTool {
        /// VM name
        machine: String,
        /// Attempted operation
        operation: String,
        /// Tool output or error description
        message: String,
    },

    /// Configuration defect discovered while binding or running a plugin
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A lifecycle step was requested in the wrong state
    #[error("plugin '{plugin}' cannot {requested} while {state}")]
    InvalidTransition {
        /// Plugin name
        plugin: String,
        /// Requested step
        requested: &'static str,
        /// Current lifecycle state
        state: String,
    },

    /// A machine handle does not refer to a live machine
    #[error("no machine registered for handle {0}")]
    UnknownMachine(usize),

    /// A plugin was used through the wrong capability
    #[error("plugin '{plugin}' is a {actual} plugin, expected {expected}")]
    WrongCapability {
        /// Plugin name
        plugin: String,
        /// Capability the caller expected
        expected: String,
        /// Capability the plugin has
        actual: String,
    },

    /// The run step failed and teardown failed afterwards
    #[error("{original} (teardown also failed: {teardown})")]
    TeardownAfterFailure {
        /// The failure of the run step; takes priority
        original: Box<PluginError>,
        /// The failure of the teardown step
        teardown: Box<PluginError>,
    },

    /// Local I/O error (template rendering, artefact collection)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginError {
    /// Fills in the plugin name of an `Unimplemented` error raised by a
    /// default trait body, which cannot know who it belongs to.
    #[must_use]
    pub fn for_plugin(self, name: &str) -> Self {
        match self {
            Self::Unimplemented { plugin, operation } if plugin.is_empty() => {
                Self::Unimplemented {
                    plugin: name.to_owned(),
                    operation,
                }
            }
            other => other,
        }
    }
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single finding produced by the plugin validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Location of the plugin the finding refers to
    pub path: String,
    /// Description of the issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{prefix}: {}", self.message)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The plugin is broken or ambiguous
    Error,
    /// Potential issue that does not prevent the plugin from running
    Warning,
}

// ============================================================================
// Result Type Aliases
// ============================================================================

/// Result type alias for `RangeForge` operations.
pub type Result<T> = std::result::Result<T, RangeForgeError>;

/// Result type alias for plugin operations.
pub type PluginResult<T> = std::result::Result<T, PluginError>;

// ============================================================================
// Tests
// ============================================================================
