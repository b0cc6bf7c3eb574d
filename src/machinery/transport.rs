//! Remote execution and file transfer.
//!
//! [`Transport`] is the contract machine controllers expose to plugins.
//! [`SshSession`] is the shared helper behind the built-in controllers: it
//! drives the OpenSSH client binaries and keeps one multiplexed master
//! connection per controller, opened on first use and cached until
//! [`SshSession::close`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use super::process::{self, SSH_CONNECTION_FAILURE};
use crate::error::{PluginError, PluginResult};

/// Remote command execution and file transfer on one machine.
pub trait Transport: Send {
    /// Establishes the connection if it is not open yet.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` if the machine cannot be reached.
    fn connect(&mut self) -> PluginResult<()>;

    /// Copies a local file to `dst` on the machine.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` if the copy fails.
    fn put(&mut self, src: &Path, dst: &str) -> PluginResult<()>;

    /// Copies `src` from the machine to the local path `dst`.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` if the copy fails.
    fn get(&mut self, src: &str, dst: &Path) -> PluginResult<()>;

    /// Runs a shell command on the machine and returns its output. With
    /// `disown` the command is detached and the call returns immediately.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` if the command fails.
    fn remote_run(&mut self, command: &str, disown: bool) -> PluginResult<String>;

    /// Releases the connection. Harmless when not connected.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` if the connection cannot be
    /// closed cleanly.
    fn disconnect(&mut self) -> PluginResult<()>;
}

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    /// Host name or address
    pub host: String,
    /// SSH port
    pub port: u16,
    /// Login user
    pub user: String,
    /// Private key file
    pub keyfile: Option<PathBuf>,
    /// Password, used through `sshpass` when no key is given
    pub password: Option<String>,
}

impl SshTarget {
    /// `user@host`
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Cached SSH connection to one machine.
#[derive(Debug)]
pub struct SshSession {
    machine: String,
    control_path: PathBuf,
    target: Option<SshTarget>,
}

impl SshSession {
    /// Creates a session for `machine`; nothing is connected yet.
    #[must_use]
    pub fn new(machine: &str) -> Self {
        let safe: String = machine
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Self {
            machine: machine.to_owned(),
            control_path: std::env::temp_dir()
                .join(format!("rangeforge-{safe}-{}.ssh", std::process::id())),
            target: None,
        }
    }

    /// Machine this session belongs to.
    #[must_use]
    pub fn machine(&self) -> &str {
        &self.machine
    }

    /// Whether a master connection is cached.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.target.is_some()
    }

    /// The connected target, if any.
    #[must_use]
    pub const fn target(&self) -> Option<&SshTarget> {
        self.target.as_ref()
    }

    /// Opens the master connection to `target`.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` if `ssh` fails.
    pub fn open(&mut self, target: SshTarget) -> PluginResult<()> {
        let mut cmd = self.client("ssh", &target);
        cmd.args(self.options(&target, "-p"));
        cmd.args(["-M", "-N", "-f", "-o", "ControlPersist=yes"]);
        cmd.arg(target.destination());
        process::run_for(&mut cmd, &self.machine, "connect")?;

        info!(
            machine = %self.machine,
            host = %target.host,
            port = target.port,
            user = %target.user,
            "ssh connection established"
        );
        self.target = Some(target);
        Ok(())
    }

    /// Closes the master connection, if one is open.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` if the master refuses to exit.
    pub fn close(&mut self) -> PluginResult<()> {
        let Some(target) = self.target.take() else {
            return Ok(());
        };
        let mut cmd = Command::new("ssh");
        cmd.args(self.options(&target, "-p"));
        cmd.args(["-O", "exit"]);
        cmd.arg(target.destination());
        process::run_for(&mut cmd, &self.machine, "disconnect")?;
        debug!(machine = %self.machine, "ssh connection closed");
        Ok(())
    }

    /// Runs `command` over the open connection.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` when not connected or when the
    /// command fails. A connection-level failure also drops the cached
    /// connection so the next call reconnects.
    pub fn run(&mut self, command: &str, disown: bool) -> PluginResult<String> {
        let target = self.require_target("remote_run")?.clone();
        let remote = self.remote_command(command, disown)?;

        let mut cmd = Command::new("ssh");
        cmd.args(self.options(&target, "-p"));
        cmd.arg(target.destination());
        cmd.arg(remote);

        debug!(machine = %self.machine, command, disown, "remote run");
        self.finish(process::run(&mut cmd), "remote_run")
    }

    /// Copies a local file or directory to the machine.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` when not connected or when `scp`
    /// fails.
    pub fn put(&mut self, src: &Path, dst: &str) -> PluginResult<()> {
        let target = self.require_target("put")?.clone();
        let mut cmd = Command::new("scp");
        cmd.args(self.options(&target, "-P"));
        cmd.arg("-r").arg(src);
        cmd.arg(format!("{}:{dst}", target.destination()));

        debug!(machine = %self.machine, src = %src.display(), dst, "put");
        self.finish(process::run(&mut cmd), "put").map(drop)
    }

    /// Copies a file or directory from the machine.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::ExternalTool` when not connected or when `scp`
    /// fails.
    pub fn get(&mut self, src: &str, dst: &Path) -> PluginResult<()> {
        let target = self.require_target("get")?.clone();
        let mut cmd = Command::new("scp");
        cmd.args(self.options(&target, "-P"));
        cmd.arg("-r");
        cmd.arg(format!("{}:{src}", target.destination()));
        cmd.arg(dst);

        debug!(machine = %self.machine, src, dst = %dst.display(), "get");
        self.finish(process::run(&mut cmd), "get").map(drop)
    }

    fn require_target(&self, operation: &str) -> PluginResult<&SshTarget> {
        self.target.as_ref().ok_or_else(|| PluginError::ExternalTool {
            machine: self.machine.clone(),
            operation: operation.to_owned(),
            message: "not connected".to_owned(),
        })
    }

    fn finish(
        &mut self,
        result: Result<String, process::ToolFailure>,
        operation: &str,
    ) -> PluginResult<String> {
        result.map_err(|failure| {
            if failure.code == Some(SSH_CONNECTION_FAILURE) {
                warn!(machine = %self.machine, "ssh connection lost, dropping it");
                self.target = None;
            }
            failure.into_error(&self.machine, operation)
        })
    }

    /// Command line sent to the remote shell.
    fn remote_command(&self, command: &str, disown: bool) -> PluginResult<String> {
        if !disown {
            return Ok(command.to_owned());
        }
        let quoted = shlex::try_quote(command).map_err(|e| PluginError::ExternalTool {
            machine: self.machine.clone(),
            operation: "remote_run".to_owned(),
            message: format!("cannot quote command: {e}"),
        })?;
        Ok(format!("nohup sh -c {quoted} > /dev/null 2>&1 &"))
    }

    /// Client invocation, wrapped in `sshpass` for password logins.
    fn client(&self, program: &str, target: &SshTarget) -> Command {
        match (&target.password, &target.keyfile) {
            (Some(password), None) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg(program).env("SSHPASS", password);
                cmd
            }
            _ => Command::new(program),
        }
    }

    fn options(&self, target: &SshTarget, port_flag: &str) -> Vec<OsString> {
        let mut control = OsString::from("ControlPath=");
        control.push(&self.control_path);

        let mut args: Vec<OsString> = vec![
            "-o".into(),
            control,
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
            "-o".into(),
            "UserKnownHostsFile=/dev/null".into(),
            "-o".into(),
            "LogLevel=ERROR".into(),
            port_flag.into(),
            target.port.to_string().into(),
        ];
        if let Some(key) = &target.keyfile {
            args.push("-i".into());
            args.push(key.as_os_str().to_owned());
        }
        args
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if !self.is_connected() {
            return;
        }
        if let Err(err) = self.close() {
            warn!(machine = %self.machine, error = %err, "ssh master left running");
        }
    }
}
