//! The `plugin.yaml` manifest.
//!
//! A plugin directory declares the plugins it defines in a manifest:
//!
//! ```yaml
//! plugins:
//!   - implementation: vagrant
//!     name: vagrant
//!     description: Controls VMs through Vagrant
//! ```
//!
//! Each entry names a registered implementation and carries the metadata
//! the implementation cannot know by itself.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::catalog::PluginFactory;
use crate::error::DiscoveryError;
use crate::plugin::{PluginDescriptor, TemplateSpec};

/// File name of a plugin manifest.
pub const MANIFEST_NAME: &str = "plugin.yaml";

/// Contents of one manifest file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginManifest {
    /// Plugins defined in the directory, in declaration order.
    #[serde(default)]
    pub plugins: Vec<ManifestEntry>,
}

/// One plugin declaration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    /// Registered implementation identifier.
    pub implementation: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub alternative_names: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub required_files: Vec<String>,

    #[serde(default)]
    pub required_files_attacker: Vec<String>,

    #[serde(default)]
    pub required_files_target: Vec<String>,

    #[serde(default)]
    pub templates: Vec<TemplateSpec>,

    #[serde(default)]
    pub ttp: Option<String>,

    #[serde(default)]
    pub references: Vec<String>,
}

impl ManifestEntry {
    /// Builds the descriptor of this entry, implemented by `factory` and
    /// declared in the manifest at `plugin_path`.
    #[must_use]
    pub fn into_descriptor(self, factory: &PluginFactory, plugin_path: &Path) -> PluginDescriptor {
        let mut descriptor =
            PluginDescriptor::new(factory.capability(), factory.info(), plugin_path);
        descriptor.name = self.name;
        descriptor.alternative_names = self.alternative_names;
        descriptor.description = self.description;
        descriptor.required_files = self.required_files;
        descriptor.required_files_attacker = self.required_files_attacker;
        descriptor.required_files_target = self.required_files_target;
        descriptor.templates = self.templates;
        descriptor.ttp = self.ttp;
        descriptor.references = self.references;
        descriptor
    }
}

/// Reads and parses the manifest at `path`.
///
/// An empty document declares no plugins.
///
/// # Errors
///
/// Returns `DiscoveryError::ManifestRead` if the file cannot be read and
/// `DiscoveryError::ManifestParse` if it does not match the schema.
pub fn load_manifest(path: &Path) -> Result<PluginManifest, DiscoveryError> {
    let text = std::fs::read_to_string(path).map_err(|source| DiscoveryError::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&text, path)
}

/// Parses manifest text; `path` is only used in errors.
///
/// # Errors
///
/// Returns `DiscoveryError::ManifestParse` on malformed YAML or unknown fields.
pub fn parse_manifest(text: &str, path: &Path) -> Result<PluginManifest, DiscoveryError> {
    if text.trim().is_empty() {
        return Ok(PluginManifest::default());
    }
    serde_yaml::from_str::<Option<PluginManifest>>(text)
        .map(Option::unwrap_or_default)
        .map_err(|e| DiscoveryError::ManifestParse {
            path: PathBuf::from(path),
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })
}
