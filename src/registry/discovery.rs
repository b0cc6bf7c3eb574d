//! Plugin discovery.
//!
//! The [`PluginManager`] expands a glob over the plugin tree, loads the
//! manifest of every matched directory once, and instantiates the declared
//! plugins through its catalog.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::catalog::PluginCatalog;
use super::manifest::{MANIFEST_NAME, load_manifest};
use crate::config::MachineConfig;
use crate::error::{ConfigError, DiscoveryError, RangeForgeError, ValidationIssue};
use crate::machinery::Machine;
use crate::observability::AttackLogger;
use crate::plugin::{Capability, LoadedPlugin};
use crate::validation::Validator;

/// Default glob selecting plugin manifests.
pub const DEFAULT_PLUGIN_GLOB: &str = "plugins/**/plugin.yaml";

/// One line of the plugin listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginListing {
    /// Capability section title (e.g. "Machinery").
    pub section: &'static str,
    /// Plugin name, if the manifest gives one.
    pub name: Option<String>,
    /// Plugin description, if the manifest gives one.
    pub description: Option<String>,
}

/// Discovers and instantiates plugins.
pub struct PluginManager {
    pattern: String,
    catalog: PluginCatalog,
    logger: Arc<dyn AttackLogger>,
}

impl PluginManager {
    /// Creates a manager over [`DEFAULT_PLUGIN_GLOB`] with the built-in
    /// catalog.
    #[must_use]
    pub fn new(logger: Arc<dyn AttackLogger>) -> Self {
        Self {
            pattern: DEFAULT_PLUGIN_GLOB.to_string(),
            catalog: PluginCatalog::builtin(),
            logger,
        }
    }

    /// Uses `pattern` to find plugin directories. Every directory holding a
    /// match is searched for a manifest.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Resolves implementations through `catalog`.
    #[must_use]
    pub fn with_catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// The glob in use.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The catalog in use.
    #[must_use]
    pub const fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Directories containing a glob match, each once, sorted.
    fn plugin_dirs(&self) -> Result<BTreeSet<PathBuf>, DiscoveryError> {
        let entries =
            glob::glob(&self.pattern).map_err(|e| DiscoveryError::InvalidPattern {
                pattern: self.pattern.clone(),
                message: e.to_string(),
            })?;

        let mut dirs = BTreeSet::new();
        for entry in entries {
            let path = entry.map_err(|e| DiscoveryError::Walk {
                path: e.path().to_path_buf(),
                message: e.error().to_string(),
            })?;
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            dirs.insert(dir);
        }
        Ok(dirs)
    }

    /// Instantiates every plugin of `capability`.
    ///
    /// With a `name_filter`, only plugins answering to one of the names are
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns a `DiscoveryError` for an invalid glob, an unreadable path or
    /// manifest, a malformed manifest, or an implementation the catalog
    /// does not know. Manifests of every capability are checked.
    pub fn discover(
        &self,
        capability: Capability,
        name_filter: Option<&[String]>,
    ) -> Result<Vec<LoadedPlugin>, DiscoveryError> {
        let mut plugins = Vec::new();

        for dir in self.plugin_dirs()? {
            let manifest_path = dir.join(MANIFEST_NAME);
            if !manifest_path.is_file() {
                debug!(dir = %dir.display(), "no plugin manifest");
                continue;
            }
            let manifest = load_manifest(&manifest_path)?;

            for entry in manifest.plugins {
                let factory = self.catalog.get(&entry.implementation).ok_or_else(|| {
                    DiscoveryError::UnknownImplementation {
                        path: manifest_path.clone(),
                        suggestion: self.catalog.suggest(&entry.implementation),
                        implementation: entry.implementation.clone(),
                    }
                })?;
                if factory.capability() != capability {
                    continue;
                }

                let descriptor = Arc::new(entry.into_descriptor(factory, &manifest_path));
                if let Some(names) = name_filter
                    && !names.iter().any(|n| descriptor.answers_to(n))
                {
                    continue;
                }

                debug!(
                    plugin = descriptor.display_name(),
                    implementation = factory.implementation,
                    %capability,
                    "plugin discovered"
                );
                plugins.push(LoadedPlugin::instantiate(
                    descriptor,
                    factory.build(),
                    Arc::clone(&self.logger),
                ));
            }
        }

        Ok(plugins)
    }

    /// Instantiates every plugin, capability sections in listing order.
    ///
    /// # Errors
    ///
    /// See [`discover`](Self::discover).
    pub fn discover_all(&self) -> Result<Vec<LoadedPlugin>, DiscoveryError> {
        let mut all = Vec::new();
        for capability in Capability::all() {
            all.extend(self.discover(*capability, None)?);
        }
        Ok(all)
    }

    /// Name and description of every plugin, by section.
    ///
    /// # Errors
    ///
    /// See [`discover`](Self::discover).
    pub fn list(&self) -> Result<Vec<PluginListing>, DiscoveryError> {
        Ok(self
            .discover_all()?
            .iter()
            .map(|plugin| {
                let descriptor = plugin.descriptor();
                PluginListing {
                    section: descriptor.capability.section(),
                    name: descriptor.name.clone(),
                    description: descriptor.description.clone(),
                }
            })
            .collect())
    }

    /// Validates every installed plugin.
    ///
    /// Identity issues are logged at verbosity 0, per-plugin issues at 1.
    ///
    /// # Errors
    ///
    /// See [`discover`](Self::discover).
    pub fn check_installed(&self) -> Result<Vec<ValidationIssue>, DiscoveryError> {
        let plugins = self.discover_all()?;
        let mut validator = Validator::new();
        let mut issues = Vec::new();

        for plugin in &plugins {
            for issue in validator.check_identity(plugin.descriptor()) {
                self.logger.vprint(&issue.message, 0);
                issues.push(issue);
            }
            for issue in validator.check(plugin) {
                self.logger.vprint(&issue.message, 1);
                issues.push(issue);
            }
        }

        info!(
            plugins = plugins.len(),
            issues = issues.len(),
            "plugin check finished"
        );
        Ok(issues)
    }

    /// Raw default configuration of every `capability` plugin answering to
    /// `name`.
    ///
    /// # Errors
    ///
    /// Discovery errors, or an unreadable configuration file.
    pub fn render_default_config(
        &self,
        capability: Capability,
        name: &str,
    ) -> Result<Vec<String>, RangeForgeError> {
        let filter = [name.to_string()];
        self.discover(capability, Some(&filter))?
            .iter()
            .map(|plugin| plugin.raw_default_config().map_err(RangeForgeError::from))
            .collect()
    }

    /// Builds the machine described by `config`, controlled by the machinery
    /// plugin named after its `vm_type`.
    ///
    /// # Errors
    ///
    /// Discovery errors, `ConfigError::InvalidValue` if no machinery plugin
    /// has that name, or the plugin's configuration error.
    pub fn machine(&self, config: MachineConfig) -> Result<Machine, RangeForgeError> {
        let filter = [config.vmcontroller().to_string()];
        let Some(mut plugin) = self
            .discover(Capability::Machinery, Some(&filter))?
            .into_iter()
            .next()
        else {
            return Err(ConfigError::InvalidValue {
                field: format!("{}.vm_controller.vm_type", config.vmname()),
                value: config.vmcontroller().to_string(),
                expected: "the name of an installed machinery plugin".to_string(),
            }
            .into());
        };
        plugin.load_default_config()?;
        Ok(Machine::new(plugin, config)?)
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("pattern", &self.pattern)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}
