//! Static plugin metadata.
//!
//! A descriptor is built once per manifest entry during discovery and shared
//! (behind an `Arc`) by the plugin instance and anything derived from it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Capability, Operation};
use crate::error::{ConfigError, PluginResult};

/// Technique identifier used when a plugin declares none.
pub const TTP_UNKNOWN: &str = "???";

/// Compile-time facts about the implementation behind a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImplementationInfo {
    /// Registered implementation identifier (its type identity).
    pub id: &'static str,
    /// Operations the implementation overrides.
    pub operations: &'static [Operation],
    /// Whether the implementation carries the SSH transport helper.
    pub ssh_mixin: bool,
    /// Whether several manifest entries may share the implementation. Such
    /// implementations are driven entirely by their configuration.
    pub reusable: bool,
}

impl ImplementationInfo {
    /// Whether the implementation provides `operation` itself.
    #[must_use]
    pub fn implements(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }
}

/// A template rendered into the plugin directory during setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateSpec {
    /// Template file, relative to the plugin directory.
    pub source: String,
    /// Rendered file, relative to the plugin directory.
    pub target: String,
}

/// Metadata of one discovered plugin.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    /// Primary name, unique across all plugins.
    pub name: Option<String>,
    /// Additional names the plugin can be selected by.
    pub alternative_names: Vec<String>,
    /// Human readable description.
    pub description: Option<String>,
    /// Capability of the implementation.
    pub capability: Capability,
    /// Implementation behind the plugin.
    pub implementation: ImplementationInfo,
    /// Manifest the plugin was declared in.
    pub plugin_path: PathBuf,
    /// Files copied to the default machine's playground during setup.
    pub required_files: Vec<String>,
    /// Files copied to the attacker machine (attack plugins only).
    pub required_files_attacker: Vec<String>,
    /// Files copied to the target machine (attack plugins only).
    pub required_files_target: Vec<String>,
    /// Templates rendered during setup.
    pub templates: Vec<TemplateSpec>,
    /// Technique identifier (attack and vulnerability plugins).
    pub ttp: Option<String>,
    /// Reference URLs.
    pub references: Vec<String>,
}

impl PluginDescriptor {
    /// Creates a descriptor with no metadata besides its identity.
    #[must_use]
    pub fn new(
        capability: Capability,
        implementation: ImplementationInfo,
        plugin_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: None,
            alternative_names: Vec::new(),
            description: None,
            capability,
            implementation,
            plugin_path: plugin_path.into(),
            required_files: Vec::new(),
            required_files_attacker: Vec::new(),
            required_files_target: Vec::new(),
            templates: Vec::new(),
            ttp: None,
            references: Vec::new(),
        }
    }

    /// Directory the plugin lives in: the manifest's parent.
    #[must_use]
    pub fn plugin_dir(&self) -> &Path {
        match self.plugin_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Primary name of the plugin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` if the manifest gave no name.
    pub fn get_name(&self) -> PluginResult<&str> {
        self.name.as_deref().ok_or_else(|| {
            ConfigError::MissingRequired {
                field: "name".to_string(),
                location: self.plugin_path.display().to_string(),
            }
            .into()
        })
    }

    /// Name for diagnostics: the primary name, else the implementation id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.implementation.id)
    }

    /// Primary name followed by the alternative names, without duplicates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` if the manifest gave no name.
    pub fn get_names(&self) -> PluginResult<Vec<String>> {
        let mut names = vec![self.get_name()?.to_owned()];
        for alt in &self.alternative_names {
            if !names.contains(alt) {
                names.push(alt.clone());
            }
        }
        Ok(names)
    }

    /// Whether `name` selects this plugin.
    #[must_use]
    pub fn answers_to(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name) || self.alternative_names.iter().any(|n| n == name)
    }

    /// Description of the plugin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` if the manifest gave none.
    pub fn get_description(&self) -> PluginResult<&str> {
        self.description.as_deref().ok_or_else(|| {
            ConfigError::MissingRequired {
                field: "description".to_string(),
                location: self.plugin_path.display().to_string(),
            }
            .into()
        })
    }

    /// Declared technique identifier, if any.
    #[must_use]
    pub fn get_ttp(&self) -> Option<&str> {
        self.ttp.as_deref()
    }

    /// Technique identifier for boundary events; `???` when undeclared.
    #[must_use]
    pub fn resolved_ttp(&self) -> &str {
        self.ttp.as_deref().unwrap_or(TTP_UNKNOWN)
    }

    /// Reference URLs.
    #[must_use]
    pub fn get_references(&self) -> &[String] {
        &self.references
    }
}
