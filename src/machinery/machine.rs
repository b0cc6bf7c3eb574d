//! A controlled machine.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::MachineState;
use super::transport::Transport;
use crate::config::{MachineConfig, PluginConf};
use crate::error::{PluginError, PluginResult};
use crate::observability::AttackLogger;
use crate::plugin::{LoadedPlugin, MachineContext, MachineryPlugin, PluginDescriptor};

/// A machinery plugin bound to the configuration of the machine it drives.
pub struct Machine {
    descriptor: Arc<PluginDescriptor>,
    plugin: Box<dyn MachineryPlugin>,
    config: MachineConfig,
    conf: PluginConf,
    logger: Arc<dyn AttackLogger>,
}

impl Machine {
    /// Binds a loaded machinery plugin to `config` and lets the plugin
    /// process it.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::WrongCapability` if `plugin` is not a machinery
    /// plugin, or the plugin's configuration error.
    pub fn new(plugin: LoadedPlugin, config: MachineConfig) -> PluginResult<Self> {
        let parts = plugin.into_machinery()?;
        let mut machine = Self {
            descriptor: parts.descriptor,
            plugin: parts.plugin,
            config,
            conf: parts.conf,
            logger: parts.logger,
        };
        machine.call(|plugin, ctx| plugin.process_config(ctx))?;
        Ok(machine)
    }

    /// Name of the machinery plugin.
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor.display_name()
    }

    /// Name of the VM.
    #[must_use]
    pub fn vm_name(&self) -> &str {
        self.config.vmname()
    }

    /// Machine configuration.
    #[must_use]
    pub const fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Descriptor of the machinery plugin.
    #[must_use]
    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    /// Working directory on the machine.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if none is configured.
    pub fn playground(&self) -> PluginResult<&str> {
        Ok(self.config.playground()?)
    }

    fn call<T>(
        &mut self,
        f: impl FnOnce(&mut dyn MachineryPlugin, &MachineContext<'_>) -> PluginResult<T>,
    ) -> PluginResult<T> {
        let ctx = MachineContext {
            config: &self.config,
            conf: &self.conf,
            logger: self.logger.as_ref(),
        };
        let name = self.descriptor.display_name();
        f(self.plugin.as_mut(), &ctx).map_err(|e| e.for_plugin(name))
    }

    /// Current state, fresh from the controller.
    ///
    /// # Errors
    ///
    /// The controller's failure, or `ConfigError::UnmappedState`.
    pub fn get_state(&mut self) -> PluginResult<MachineState> {
        self.call(|plugin, ctx| plugin.get_state(ctx))
    }

    /// Whether the machine is running.
    ///
    /// # Errors
    ///
    /// See [`get_state`](Self::get_state).
    pub fn is_running(&mut self) -> PluginResult<bool> {
        Ok(self.get_state()? == MachineState::Running)
    }

    /// Address of the machine.
    ///
    /// # Errors
    ///
    /// The controller's failure.
    pub fn get_ip(&mut self) -> PluginResult<String> {
        self.call(|plugin, ctx| plugin.get_ip(ctx))
    }

    /// Starts the machine. Succeeds if it ends up running.
    ///
    /// # Errors
    ///
    /// The controller's failure not absorbed by its recovery policy.
    pub fn up(&mut self) -> PluginResult<()> {
        info!(machine = self.vm_name(), "Starting machine");
        self.call(|plugin, ctx| plugin.up(ctx))?;
        info!(machine = self.vm_name(), "Machine started");
        Ok(())
    }

    /// Halts the machine.
    ///
    /// # Errors
    ///
    /// The controller's failure not absorbed by its recovery policy.
    pub fn halt(&mut self) -> PluginResult<()> {
        info!(machine = self.vm_name(), "Stopping machine");
        self.call(|plugin, ctx| plugin.halt(ctx))?;
        info!(machine = self.vm_name(), "Machine stopped");
        Ok(())
    }

    /// Creates the machine, rebooting it afterwards when `reboot` is set.
    ///
    /// # Errors
    ///
    /// The first failing step.
    pub fn create(&mut self, reboot: bool) -> PluginResult<()> {
        info!(machine = self.vm_name(), reboot, "Creating machine");
        self.call(|plugin, ctx| plugin.create(ctx, reboot))
    }

    /// Destroys the machine.
    ///
    /// # Errors
    ///
    /// The controller's failure.
    pub fn destroy(&mut self) -> PluginResult<()> {
        info!(machine = self.vm_name(), "Destroying machine");
        self.call(|plugin, ctx| plugin.destroy(ctx))
    }

    fn transport(&mut self, operation: &'static str) -> PluginResult<&mut dyn Transport> {
        let name = self.descriptor.display_name();
        self.plugin
            .transport()
            .ok_or_else(|| PluginError::Unimplemented {
                plugin: name.to_owned(),
                operation,
            })
    }

    /// Connects to the machine.
    ///
    /// # Errors
    ///
    /// `PluginError::Unimplemented` without a transport, else its failure.
    pub fn connect(&mut self) -> PluginResult<()> {
        self.transport("connect")?.connect()
    }

    /// Releases the connection.
    ///
    /// # Errors
    ///
    /// `PluginError::Unimplemented` without a transport, else its failure.
    pub fn disconnect(&mut self) -> PluginResult<()> {
        self.transport("disconnect")?.disconnect()
    }

    /// Copies a local file to `dst` on the machine.
    ///
    /// # Errors
    ///
    /// `PluginError::Unimplemented` without a transport, else its failure.
    pub fn put(&mut self, src: &Path, dst: &str) -> PluginResult<()> {
        self.transport("put")?.put(src, dst)
    }

    /// Copies `src` from the machine to `dst`.
    ///
    /// # Errors
    ///
    /// `PluginError::Unimplemented` without a transport, else its failure.
    pub fn get(&mut self, src: &str, dst: &Path) -> PluginResult<()> {
        self.transport("get")?.get(src, dst)
    }

    /// Runs a command on the machine.
    ///
    /// # Errors
    ///
    /// `PluginError::Unimplemented` without a transport, else its failure.
    pub fn remote_run(&mut self, command: &str, disown: bool) -> PluginResult<String> {
        self.transport("remote_run")?.remote_run(command, disown)
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("vm_name", &self.vm_name())
            .field("controller", &self.name())
            .finish_non_exhaustive()
    }
}
