//! Machinery for machines that are already running.
//!
//! The machine is managed outside the range (a physical host, a VM started
//! by hand). Lifecycle operations do nothing; it is reachable over SSH at
//! its configured address.

use std::path::Path;

use super::MachineState;
use super::transport::{SshSession, SshTarget, Transport};
use crate::error::{PluginError, PluginResult};
use crate::plugin::{MachineContext, MachineryPlugin};

/// Machinery plugin for a machine that is always up.
#[derive(Debug)]
pub struct RunningVmMachinery {
    session: SshSession,
    target: Option<SshTarget>,
}

impl Default for RunningVmMachinery {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningVmMachinery {
    /// Creates an unconfigured plugin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: SshSession::new(""),
            target: None,
        }
    }
}

impl MachineryPlugin for RunningVmMachinery {
    fn process_config(&mut self, ctx: &MachineContext<'_>) -> PluginResult<()> {
        let config = ctx.config;
        self.session = SshSession::new(config.vmname());
        self.target = Some(SshTarget {
            host: config.vm_ip().to_owned(),
            port: 22,
            user: config.ssh_user().to_owned(),
            keyfile: config.ssh_keyfile().map(Path::to_path_buf),
            password: config.ssh_password().map(str::to_owned),
        });
        Ok(())
    }

    fn get_state(&mut self, _ctx: &MachineContext<'_>) -> PluginResult<MachineState> {
        Ok(MachineState::Running)
    }

    fn get_ip(&mut self, ctx: &MachineContext<'_>) -> PluginResult<String> {
        Ok(ctx.config.vm_ip().to_owned())
    }

    fn up(&mut self, ctx: &MachineContext<'_>) -> PluginResult<()> {
        ctx.vprint(&format!("{} is managed externally, not starting it", ctx.config.vmname()), 3);
        Ok(())
    }

    fn halt(&mut self, ctx: &MachineContext<'_>) -> PluginResult<()> {
        ctx.vprint(&format!("{} is managed externally, not halting it", ctx.config.vmname()), 3);
        Ok(())
    }

    fn create(&mut self, _ctx: &MachineContext<'_>, _reboot: bool) -> PluginResult<()> {
        Ok(())
    }

    fn destroy(&mut self, _ctx: &MachineContext<'_>) -> PluginResult<()> {
        Ok(())
    }

    fn transport(&mut self) -> Option<&mut dyn Transport> {
        Some(self)
    }
}

impl Transport for RunningVmMachinery {
    fn connect(&mut self) -> PluginResult<()> {
        if self.session.is_connected() {
            return Ok(());
        }
        let target = self.target.clone().ok_or_else(|| PluginError::ExternalTool {
            machine: self.session.machine().to_owned(),
            operation: "connect".to_owned(),
            message: "machine is not configured".to_owned(),
        })?;
        self.session.open(target)
    }

    fn put(&mut self, src: &Path, dst: &str) -> PluginResult<()> {
        self.connect()?;
        self.session.put(src, dst)
    }

    fn get(&mut self, src: &str, dst: &Path) -> PluginResult<()> {
        self.connect()?;
        self.session.get(src, dst)
    }

    fn remote_run(&mut self, command: &str, disown: bool) -> PluginResult<String> {
        self.connect()?;
        self.session.run(command, disown)
    }

    fn disconnect(&mut self) -> PluginResult<()> {
        self.session.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MachineConfig, PluginConf};
    use crate::observability::AttackLog;

    fn config() -> MachineConfig {
        MachineConfig::from_yaml(
            "vm_name: dc01\nos: windows\nvm_ip: 192.168.56.10\nvm_controller:\n  vm_type: running_vm\n",
        )
        .unwrap()
    }

    #[test]
    fn lifecycle_operations_are_no_ops() {
        let config = config();
        let conf = PluginConf::new();
        let logger = AttackLog::tracing_only();
        let ctx = MachineContext {
            config: &config,
            conf: &conf,
            logger: &logger,
        };
        let mut plugin = RunningVmMachinery::new();
        plugin.process_config(&ctx).unwrap();

        assert_eq!(plugin.get_state(&ctx).unwrap(), MachineState::Running);
        assert_eq!(plugin.get_ip(&ctx).unwrap(), "192.168.56.10");
        plugin.up(&ctx).unwrap();
        plugin.halt(&ctx).unwrap();
        plugin.create(&ctx, true).unwrap();
        plugin.destroy(&ctx).unwrap();
    }

    #[test]
    fn ssh_target_follows_config() {
        let config = config();
        let conf = PluginConf::new();
        let logger = AttackLog::tracing_only();
        let ctx = MachineContext {
            config: &config,
            conf: &conf,
            logger: &logger,
        };
        let mut plugin = RunningVmMachinery::new();
        plugin.process_config(&ctx).unwrap();

        let target = plugin.target.unwrap();
        assert_eq!(target.host, "192.168.56.10");
        assert_eq!(target.user, "vagrant");
        assert_eq!(target.port, 22);
    }

    #[test]
    fn unconfigured_connect_fails() {
        let err = RunningVmMachinery::new().connect().unwrap_err();
        assert!(matches!(err, PluginError::ExternalTool { .. }));
    }
}
