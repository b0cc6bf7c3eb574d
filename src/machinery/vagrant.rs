//! Vagrant-backed machinery.
//!
//! [`VmController`] is the narrow contract to the VM tool; [`VagrantCli`]
//! implements it by running the `vagrant` binary in the directory holding
//! the `Vagrantfile`. [`VagrantMachinery`] turns controller results into
//! machine states and applies the recovery policy.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use super::process;
use super::recovery::{RecoveryPolicy, StandardRecovery};
use super::transport::{SshSession, SshTarget, Transport};
use super::MachineState;
use crate::error::{ConfigError, PluginError, PluginResult};
use crate::plugin::{MachineContext, MachineryPlugin};

/// File in the machine directory holding its IPv4 address.
pub const IP_FILE: &str = "ip4.txt";

/// Operations of an external VM-control tool.
pub trait VmController: Send + std::fmt::Debug {
    /// Native state name of `vm`.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` if the tool fails.
    fn status(&mut self, vm: &str) -> PluginResult<String>;

    /// Boots `vm`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` if the tool fails.
    fn up(&mut self, vm: &str) -> PluginResult<()>;

    /// Shuts `vm` down.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` if the tool fails.
    fn halt(&mut self, vm: &str, force: bool) -> PluginResult<()>;

    /// Deletes `vm`.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` if the tool fails.
    fn destroy(&mut self, vm: &str) -> PluginResult<()>;

    /// SSH coordinates of `vm`.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` if the tool fails or gives no
    /// usable host.
    fn ssh_target(&mut self, vm: &str) -> PluginResult<SshTarget>;
}

// ============================================================================
// Vagrant CLI
// ============================================================================

/// Runs the `vagrant` binary.
#[derive(Debug, Clone)]
pub struct VagrantCli {
    root: PathBuf,
    program: String,
}

impl VagrantCli {
    /// Creates a controller for the `Vagrantfile` in `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            program: "vagrant".to_owned(),
        }
    }

    /// Uses another executable instead of `vagrant` from `PATH`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).current_dir(&self.root);
        cmd
    }
}

impl VmController for VagrantCli {
    fn status(&mut self, vm: &str) -> PluginResult<String> {
        let out = process::run_for(
            &mut self.command(&["status", vm, "--machine-readable"]),
            vm,
            "status",
        )?;
        parse_machine_readable_state(&out).ok_or_else(|| PluginError::ExternalTool {
            machine: vm.to_owned(),
            operation: "status".to_owned(),
            message: "no state line in vagrant output".to_owned(),
        })
    }

    fn up(&mut self, vm: &str) -> PluginResult<()> {
        process::run_for(&mut self.command(&["up", vm]), vm, "up").map(drop)
    }

    fn halt(&mut self, vm: &str, force: bool) -> PluginResult<()> {
        let args: &[&str] = if force {
            &["halt", "--force", vm]
        } else {
            &["halt", vm]
        };
        process::run_for(&mut self.command(args), vm, "halt").map(drop)
    }

    fn destroy(&mut self, vm: &str) -> PluginResult<()> {
        process::run_for(&mut self.command(&["destroy", "--force", vm]), vm, "destroy").map(drop)
    }

    fn ssh_target(&mut self, vm: &str) -> PluginResult<SshTarget> {
        let out = process::run_for(&mut self.command(&["ssh-config", vm]), vm, "ssh-config")?;
        parse_ssh_config(&out).ok_or_else(|| PluginError::ExternalTool {
            machine: vm.to_owned(),
            operation: "ssh-config".to_owned(),
            message: "no HostName in vagrant ssh-config output".to_owned(),
        })
    }
}

/// Extracts the state from `vagrant status --machine-readable` output
/// (`timestamp,target,state,value` lines).
#[must_use]
pub fn parse_machine_readable_state(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let mut fields = line.split(',');
        let _timestamp = fields.next()?;
        let _target = fields.next()?;
        if fields.next()? != "state" {
            return None;
        }
        fields.next().map(|v| v.trim().to_owned())
    })
}

/// Extracts connection settings from `vagrant ssh-config` output.
#[must_use]
pub fn parse_ssh_config(output: &str) -> Option<SshTarget> {
    let mut host = None;
    let mut port = 22;
    let mut user = "vagrant".to_owned();
    let mut keyfile = None;

    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once(char::is_whitespace) else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key {
            "HostName" => host = Some(value.to_owned()),
            "Port" => port = value.parse().unwrap_or(22),
            "User" => user = value.to_owned(),
            "IdentityFile" if keyfile.is_none() => keyfile = Some(PathBuf::from(value)),
            _ => {}
        }
    }

    Some(SshTarget {
        host: host?,
        port,
        user,
        keyfile,
        password: None,
    })
}

// ============================================================================
// Machinery plugin
// ============================================================================

/// Machinery plugin controlling one vagrant machine.
#[derive(Debug)]
pub struct VagrantMachinery {
    controller: Option<Box<dyn VmController>>,
    recovery: Box<dyn RecoveryPolicy>,
    session: SshSession,
}

impl Default for VagrantMachinery {
    fn default() -> Self {
        Self::new()
    }
}

impl VagrantMachinery {
    /// Creates a plugin that will drive `vagrant` once configured.
    #[must_use]
    pub fn new() -> Self {
        Self {
            controller: None,
            recovery: Box::new(StandardRecovery),
            session: SshSession::new(""),
        }
    }

    /// Creates a plugin driving `controller` instead of the vagrant binary.
    #[must_use]
    pub fn with_controller(controller: impl VmController + 'static) -> Self {
        Self {
            controller: Some(Box::new(controller)),
            ..Self::new()
        }
    }

    /// Replaces the recovery policy.
    #[must_use]
    pub fn with_recovery(mut self, recovery: impl RecoveryPolicy + 'static) -> Self {
        self.recovery = Box::new(recovery);
        self
    }

    fn controller(&mut self) -> PluginResult<&mut (dyn VmController + 'static)> {
        self.controller.as_deref_mut().ok_or_else(|| {
            ConfigError::MissingRequired {
                field: "vagrantfilepath".to_owned(),
                location: format!("{}.vm_controller", self.session.machine()),
            }
            .into()
        })
    }
}

impl MachineryPlugin for VagrantMachinery {
    fn process_config(&mut self, ctx: &MachineContext<'_>) -> PluginResult<()> {
        let root = ctx.config.vagrantfilepath()?;
        let vagrantfile = root.join("Vagrantfile");
        if !vagrantfile.is_file() {
            return Err(ConfigError::MissingFile { path: vagrantfile }.into());
        }
        if self.controller.is_none() {
            self.controller = Some(Box::new(VagrantCli::new(root)));
        }
        self.session = SshSession::new(ctx.config.vmname());
        debug!(machine = ctx.config.vmname(), root = %root.display(), "vagrant configured");
        Ok(())
    }

    fn get_state(&mut self, ctx: &MachineContext<'_>) -> PluginResult<MachineState> {
        let native = self.controller()?.status(ctx.config.vmname())?;
        MachineState::from_vagrant(&native).ok_or_else(|| {
            ConfigError::UnmappedState {
                controller: "vagrant".to_owned(),
                state: native,
            }
            .into()
        })
    }

    fn get_ip(&mut self, ctx: &MachineContext<'_>) -> PluginResult<String> {
        let path = ctx.config.machine_path_external()?.join(IP_FILE);
        let text = std::fs::read_to_string(&path)
            .map_err(|_| ConfigError::MissingFile { path: path.clone() })?;
        let ip = text.lines().next().map(str::trim).unwrap_or_default();
        if ip.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: path.display().to_string(),
                value: String::new(),
                expected: "an address on the first line".to_owned(),
            }
            .into());
        }
        Ok(ip.to_owned())
    }

    fn up(&mut self, ctx: &MachineContext<'_>) -> PluginResult<()> {
        let vm = ctx.config.vmname();
        let outcome = self.controller()?.up(vm);
        let Err(err) = outcome else {
            return Ok(());
        };

        match self.get_state(ctx) {
            Ok(state) if self.recovery.accept_failed_up(state) => {
                info!(machine = vm, %state, error = %err, "up failed but machine is usable");
                ctx.vprint(&format!("{vm}: up reported an error, machine is {state}"), 2);
                Ok(())
            }
            _ => Err(err),
        }
    }

    fn halt(&mut self, ctx: &MachineContext<'_>) -> PluginResult<()> {
        let vm = ctx.config.vmname();
        let force = ctx.config.halt_needs_force();
        let outcome = self.controller()?.halt(vm, force);
        match outcome {
            Err(err) if !force && self.recovery.retry_halt_forced() => {
                info!(machine = vm, error = %err, "halt failed, retrying with force");
                ctx.vprint(&format!("{vm}: halt failed, forcing it"), 2);
                self.controller()?.halt(vm, true)
            }
            other => other,
        }
    }

    fn create(&mut self, ctx: &MachineContext<'_>, reboot: bool) -> PluginResult<()> {
        self.up(ctx)?;
        if reboot {
            self.halt(ctx)?;
            self.up(ctx)?;
        }
        Ok(())
    }

    fn destroy(&mut self, ctx: &MachineContext<'_>) -> PluginResult<()> {
        self.controller()?.destroy(ctx.config.vmname())
    }

    fn transport(&mut self) -> Option<&mut dyn Transport> {
        Some(self)
    }
}

impl Transport for VagrantMachinery {
    fn connect(&mut self) -> PluginResult<()> {
        if self.session.is_connected() {
            return Ok(());
        }
        let vm = self.session.machine().to_owned();
        let target = self.controller()?.ssh_target(&vm)?;
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
