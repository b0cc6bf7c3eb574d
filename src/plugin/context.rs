//! Contexts handed to plugin implementations.
//!
//! [`PluginContext`] gives attack, sensor and vulnerability implementations
//! their configuration, the logger and the machines they are bound to.
//! [`MachineContext`] is the machinery counterpart: the configuration of
//! the one machine the controller drives.

use std::path::{Path, PathBuf};

use serde_yaml::Value;

use super::descriptor::PluginDescriptor;
use super::instance::Binding;
use crate::config::{MachineConfig, PluginConf};
use crate::error::{MachineRole, PluginError, PluginResult};
use crate::machinery::{Machine, MachineRegistry};
use crate::observability::AttackLogger;

// ============================================================================
// Machine context
// ============================================================================

/// Settings of the machine a machinery plugin controls.
#[derive(Clone, Copy)]
pub struct MachineContext<'a> {
    /// Machine configuration
    pub config: &'a MachineConfig,
    /// Effective plugin configuration
    pub conf: &'a PluginConf,
    /// Run-wide logger
    pub logger: &'a dyn AttackLogger,
}

impl MachineContext<'_> {
    /// Verbosity-leveled diagnostics.
    pub fn vprint(&self, text: &str, verbosity: u8) {
        self.logger.vprint(text, verbosity);
    }
}

// ============================================================================
// Plugin context
// ============================================================================

/// What a running plugin can reach.
pub struct PluginContext<'a> {
    descriptor: &'a PluginDescriptor,
    conf: &'a PluginConf,
    logger: &'a dyn AttackLogger,
    machines: &'a mut MachineRegistry,
    binding: &'a Binding,
}

impl<'a> PluginContext<'a> {
    pub(crate) fn new(
        descriptor: &'a PluginDescriptor,
        conf: &'a PluginConf,
        logger: &'a dyn AttackLogger,
        machines: &'a mut MachineRegistry,
        binding: &'a Binding,
    ) -> Self {
        Self {
            descriptor,
            conf,
            logger,
            machines,
            binding,
        }
    }

    /// Name of the running plugin.
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor.display_name()
    }

    /// Descriptor of the running plugin.
    #[must_use]
    pub const fn descriptor(&self) -> &'a PluginDescriptor {
        self.descriptor
    }

    /// Directory the plugin lives in.
    #[must_use]
    pub fn plugin_dir(&self) -> &'a Path {
        self.descriptor.plugin_dir()
    }

    /// Effective configuration.
    #[must_use]
    pub const fn conf(&self) -> &'a PluginConf {
        self.conf
    }

    /// A configuration value rendered as text; see
    /// [`templates::value_to_string`](super::templates::value_to_string).
    #[must_use]
    pub fn conf_str(&self, key: &str) -> Option<String> {
        self.conf.get(key).map(super::templates::value_to_string)
    }

    /// A boolean configuration value; absent or non-boolean is `false`.
    #[must_use]
    pub fn conf_flag(&self, key: &str) -> bool {
        self.conf.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Run-wide logger.
    #[must_use]
    pub const fn logger(&self) -> &'a dyn AttackLogger {
        self.logger
    }

    /// Verbosity-leveled diagnostics.
    pub fn vprint(&self, text: &str, verbosity: u8) {
        self.logger.vprint(text, verbosity);
    }

    /// The machine bound in `role`.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Binding` if nothing is bound in that role and
    /// `PluginError::UnknownMachine` if the bound handle is stale.
    pub fn machine(&mut self, role: MachineRole) -> PluginResult<&mut Machine> {
        let handle = self.binding.slot(role).ok_or_else(|| PluginError::Binding {
            plugin: self.descriptor.display_name().to_owned(),
            role,
        })?;
        self.machines.get_mut(handle)
    }

    /// Runs a command on the default machine.
    ///
    /// # Errors
    ///
    /// Binding errors, or the transport's failure.
    pub fn run_cmd(&mut self, command: &str, disown: bool) -> PluginResult<String> {
        self.run_on(MachineRole::Default, command, disown)
    }

    /// Runs a command on the attacker machine.
    ///
    /// # Errors
    ///
    /// Binding errors, or the transport's failure.
    pub fn attacker_run_cmd(&mut self, command: &str, disown: bool) -> PluginResult<String> {
        self.run_on(MachineRole::Attacker, command, disown)
    }

    /// Runs a command on the target machine.
    ///
    /// # Errors
    ///
    /// Binding errors, or the transport's failure.
    pub fn targets_run_cmd(&mut self, command: &str, disown: bool) -> PluginResult<String> {
        self.run_on(MachineRole::Target, command, disown)
    }

    fn run_on(&mut self, role: MachineRole, command: &str, disown: bool) -> PluginResult<String> {
        let logger = self.logger;
        let machine = self.machine(role)?;
        logger.vprint(&format!("      Plugin running command {command}"), 3);
        machine.remote_run(command, disown)
    }

    /// Copies a file to the playground of the default machine.
    ///
    /// # Errors
    ///
    /// Binding errors, a missing playground, or the transport's failure.
    pub fn copy_to_machine(&mut self, src: &Path) -> PluginResult<()> {
        self.copy_to(MachineRole::Default, src)
    }

    /// Copies a file to the playground of the attacker machine.
    ///
    /// # Errors
    ///
    /// Binding errors, a missing playground, or the transport's failure.
    pub fn copy_to_attacker(&mut self, src: &Path) -> PluginResult<()> {
        self.copy_to(MachineRole::Attacker, src)
    }

    /// Copies a file to the playground of the target machine.
    ///
    /// # Errors
    ///
    /// Binding errors, a missing playground, or the transport's failure.
    pub fn copy_to_target(&mut self, src: &Path) -> PluginResult<()> {
        self.copy_to(MachineRole::Target, src)
    }

    pub(crate) fn copy_to(&mut self, role: MachineRole, src: &Path) -> PluginResult<()> {
        let machine = self.machine(role)?;
        let playground = machine.playground()?.to_owned();
        machine.put(src, &playground)
    }

    /// Fetches a file from the default machine.
    ///
    /// # Errors
    ///
    /// Binding errors, or the transport's failure.
    pub fn get_from_machine(&mut self, src: &str, dst: &Path) -> PluginResult<()> {
        self.machine(MachineRole::Default)?.get(src, dst)
    }

    /// Playground of the default machine.
    ///
    /// # Errors
    ///
    /// Binding errors, or a configuration error if it has no playground.
    pub fn playground(&mut self) -> PluginResult<String> {
        Ok(self.machine(MachineRole::Default)?.playground()?.to_owned())
    }

    /// Playground of the attacker machine.
    ///
    /// # Errors
    ///
    /// Binding errors, or a configuration error if it has no playground.
    pub fn attacker_playground(&mut self) -> PluginResult<String> {
        Ok(self.machine(MachineRole::Attacker)?.playground()?.to_owned())
    }

    /// Address of the target machine.
    ///
    /// # Errors
    ///
    /// Binding errors, or the controller's failure.
    pub fn target_ip(&mut self) -> PluginResult<String> {
        self.machine(MachineRole::Target)?.get_ip()
    }

    /// Host path of a file shipped in the plugin directory.
    #[must_use]
    pub fn plugin_file(&self, name: &str) -> PathBuf {
        self.plugin_dir().join(name)
    }
}
