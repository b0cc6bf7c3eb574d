//! Plugin instances.
//!
//! A [`LoadedPlugin`] is one instantiation of a discovered descriptor with
//! its effective configuration, its machine bindings and the run-wide
//! logger. Configuration can only change before the lifecycle starts.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::lifecycle::LifecycleState;
use super::{Capability, MachineryPlugin, PluginDescriptor, PluginKind};
use crate::config::{self, PluginConf};
use crate::error::{MachineRole, PluginError, PluginResult};
use crate::machinery::MachineHandle;
use crate::observability::AttackLogger;

/// Machines a plugin is bound to, as handles into a `MachineRegistry`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Binding {
    /// Default machine (sensors, vulnerabilities, required files)
    pub machine: Option<MachineHandle>,
    /// Attacker machine (attacks)
    pub attacker: Option<MachineHandle>,
    /// Target machine (attacks)
    pub target: Option<MachineHandle>,
}

impl Binding {
    /// Handle bound in `role`.
    #[must_use]
    pub const fn slot(&self, role: MachineRole) -> Option<MachineHandle> {
        match role {
            MachineRole::Default => self.machine,
            MachineRole::Attacker => self.attacker,
            MachineRole::Target => self.target,
        }
    }
}

/// One plugin instance.
pub struct LoadedPlugin {
    pub(super) descriptor: Arc<PluginDescriptor>,
    pub(super) kind: PluginKind,
    pub(super) conf: PluginConf,
    pub(super) binding: Binding,
    pub(super) logger: Arc<dyn AttackLogger>,
    pub(super) state: LifecycleState,
    pub(super) installed: bool,
}

/// A machinery plugin taken apart to build a `Machine`.
pub(crate) struct MachineryParts {
    pub descriptor: Arc<PluginDescriptor>,
    pub plugin: Box<dyn MachineryPlugin>,
    pub conf: PluginConf,
    pub logger: Arc<dyn AttackLogger>,
}

impl LoadedPlugin {
    /// Instantiates `descriptor` with `kind`.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::WrongCapability` if the implementation does not
    /// have the descriptor's capability.
    pub fn new(
        descriptor: Arc<PluginDescriptor>,
        kind: PluginKind,
        logger: Arc<dyn AttackLogger>,
    ) -> PluginResult<Self> {
        if kind.capability() != descriptor.capability {
            return Err(PluginError::WrongCapability {
                plugin: descriptor.display_name().to_owned(),
                expected: descriptor.capability.to_string(),
                actual: kind.capability().to_string(),
            });
        }
        Ok(Self::instantiate(descriptor, kind, logger))
    }

    /// Instantiates without the capability check; the caller built `kind`
    /// from the factory the descriptor was derived from.
    pub(crate) fn instantiate(
        descriptor: Arc<PluginDescriptor>,
        kind: PluginKind,
        logger: Arc<dyn AttackLogger>,
    ) -> Self {
        Self {
            descriptor,
            kind,
            conf: PluginConf::new(),
            binding: Binding::default(),
            logger,
            state: LifecycleState::Uninitialized,
            installed: false,
        }
    }

    /// Static metadata.
    #[must_use]
    pub const fn descriptor(&self) -> &Arc<PluginDescriptor> {
        &self.descriptor
    }

    /// Capability of the plugin.
    #[must_use]
    pub fn capability(&self) -> Capability {
        self.descriptor.capability
    }

    /// Primary name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the manifest gave no name.
    pub fn get_name(&self) -> PluginResult<&str> {
        self.descriptor.get_name()
    }

    /// Primary and alternative names.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the manifest gave no name.
    pub fn get_names(&self) -> PluginResult<Vec<String>> {
        self.descriptor.get_names()
    }

    /// Description.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the manifest gave none.
    pub fn get_description(&self) -> PluginResult<&str> {
        self.descriptor.get_description()
    }

    /// Name for diagnostics.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.descriptor.display_name()
    }

    /// Manifest the plugin was declared in.
    #[must_use]
    pub fn plugin_path(&self) -> &Path {
        &self.descriptor.plugin_path
    }

    /// Effective configuration.
    #[must_use]
    pub const fn conf(&self) -> &PluginConf {
        &self.conf
    }

    /// Replaces the configuration with the plugin's `default_config.yaml`.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::InvalidTransition` once the lifecycle started,
    /// or a configuration error for a malformed document.
    pub fn load_default_config(&mut self) -> PluginResult<()> {
        self.ensure_configurable()?;
        self.conf = config::load_default_config(self.descriptor.plugin_dir())?;
        debug!(plugin = self.display_name(), keys = self.conf.len(), "default config loaded");
        Ok(())
    }

    /// Merges `overrides` over the current configuration.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::InvalidTransition` once the lifecycle started.
    pub fn process_config(&mut self, overrides: PluginConf) -> PluginResult<()> {
        self.ensure_configurable()?;
        config::merge_conf(&mut self.conf, overrides);
        Ok(())
    }

    /// Loads the defaults and merges `overrides` over them.
    ///
    /// # Errors
    ///
    /// See [`load_default_config`](Self::load_default_config).
    pub fn bind_config(&mut self, overrides: PluginConf) -> PluginResult<()> {
        self.load_default_config()?;
        self.process_config(overrides)
    }

    /// Raw default configuration text, or a comment saying there is none.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file exists but is unreadable.
    pub fn raw_default_config(&self) -> PluginResult<String> {
        Ok(config::raw_default_config(
            self.descriptor.plugin_dir(),
            self.display_name(),
        )?)
    }

    /// Binds the default machine.
    pub fn set_machine(&mut self, machine: MachineHandle) {
        self.binding.machine = Some(machine);
    }

    /// Binds the attacker machine.
    pub fn set_attacker_machine(&mut self, machine: MachineHandle) {
        self.binding.attacker = Some(machine);
    }

    /// Binds the target machine.
    pub fn set_target_machine(&mut self, machine: MachineHandle) {
        self.binding.target = Some(machine);
    }

    /// Current machine bindings.
    #[must_use]
    pub const fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn lifecycle_state(&self) -> LifecycleState {
        self.state
    }

    /// Run-wide logger.
    #[must_use]
    pub const fn logger(&self) -> &Arc<dyn AttackLogger> {
        &self.logger
    }

    /// Verbosity-leveled diagnostics.
    pub fn vprint(&self, text: &str, verbosity: u8) {
        self.logger.vprint(text, verbosity);
    }

    fn ensure_configurable(&self) -> PluginResult<()> {
        if self.state == LifecycleState::Uninitialized {
            Ok(())
        } else {
            Err(PluginError::InvalidTransition {
                plugin: self.display_name().to_owned(),
                requested: "configure",
                state: self.state.to_string(),
            })
        }
    }

    pub(crate) fn into_machinery(self) -> PluginResult<MachineryParts> {
        match self.kind {
            PluginKind::Machinery(plugin) => Ok(MachineryParts {
                descriptor: self.descriptor,
                plugin,
                conf: self.conf,
                logger: self.logger,
            }),
            other => Err(PluginError::WrongCapability {
                plugin: self.descriptor.display_name().to_owned(),
                expected: Capability::Machinery.to_string(),
                actual: other.capability().to_string(),
            }),
        }
    }
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("name", &self.display_name())
            .field("capability", &self.capability())
            .field("implementation", &self.descriptor.implementation.id)
            .field("state", &self.state)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machinery::MachineRegistry;
    use crate::machinery::fake::{CallLog, FakeMachinery, fake_machine, logger};
    use crate::plugin::{ImplementationInfo, Operation};
    use crate::plugins::{CommandAttack, CommandSensor};

    const SENSOR_INFO: ImplementationInfo = ImplementationInfo {
        id: "command_sensor",
        operations: &[Operation::Collect],
        ssh_mixin: false,
        reusable: true,
    };

    fn descriptor() -> Arc<PluginDescriptor> {
        let mut d = PluginDescriptor::new(Capability::Sensor, SENSOR_INFO, "auth/plugin.yaml");
        d.name = Some("auth".to_owned());
        Arc::new(d)
    }

    #[test]
    fn capability_comes_from_descriptor() {
        let plugin =
            LoadedPlugin::new(descriptor(), PluginKind::Sensor(Box::new(CommandSensor)), logger())
                .unwrap();
        assert_eq!(plugin.capability(), Capability::Sensor);
        assert_eq!(plugin.lifecycle_state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn mismatched_implementation_is_rejected() {
        let err =
            LoadedPlugin::new(descriptor(), PluginKind::Attack(Box::new(CommandAttack)), logger())
                .unwrap_err();
        assert!(matches!(
            err,
            PluginError::WrongCapability { ref expected, ref actual, .. }
                if expected == "sensor" && actual == "attack"
        ));
    }

    #[test]
    fn bindings_fill_their_slots() {
        let mut plugin =
            LoadedPlugin::new(descriptor(), PluginKind::Sensor(Box::new(CommandSensor)), logger())
                .unwrap();
        let mut machines = MachineRegistry::new();
        let handle = machines.add(fake_machine("target1", FakeMachinery::new("target1", CallLog::default())));
        plugin.set_machine(handle);

        assert_eq!(plugin.binding().slot(MachineRole::Default), Some(handle));
        assert_eq!(plugin.binding().slot(MachineRole::Attacker), None);
        assert_eq!(plugin.binding().slot(MachineRole::Target), None);
    }
}
