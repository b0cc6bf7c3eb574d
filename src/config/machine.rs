//! Per-machine configuration.
//!
//! Describes one controlled machine of an experiment: its VM name, the
//! controller responsible for it, where its provisioning files live and
//! how to reach it over SSH.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Operating systems a machine can run.
const KNOWN_OS: &[&str] = &["linux", "windows"];

/// Controller settings of a machine (`vm_controller` section).
#[derive(Debug, Clone, Deserialize)]
pub struct VmControllerConfig {
    /// Machinery plugin name controlling the VM (e.g. "vagrant").
    pub vm_type: String,

    /// Directory containing the `Vagrantfile` (vagrant only).
    #[serde(default)]
    pub vagrantfilepath: Option<PathBuf>,

    /// Address or resolvable name of the machine.
    #[serde(default)]
    pub ip: Option<String>,
}

/// Configuration of one machine taking part in an experiment.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineConfig {
    /// Name of the VM as known to its controller.
    pub vm_name: String,

    /// Operating system of the machine.
    pub os: String,

    /// Controller settings.
    pub vm_controller: VmControllerConfig,

    /// Sub-directory of `vagrantfilepath` holding machine-specific files.
    #[serde(default)]
    pub machinepath: Option<String>,

    /// Working directory on the machine where staged files are placed.
    #[serde(default)]
    pub playground: Option<String>,

    /// Whether a plain halt is known to hang and must be forced.
    #[serde(default)]
    pub halt_needs_force: bool,

    /// SSH user name.
    #[serde(default)]
    pub ssh_user: Option<String>,

    /// SSH password, if key authentication is not available.
    #[serde(default)]
    pub ssh_password: Option<String>,

    /// SSH private key file.
    #[serde(default)]
    pub ssh_keyfile: Option<PathBuf>,

    /// Reuse a machine that already exists instead of creating it.
    #[serde(default)]
    pub use_existing_machine: bool,

    /// Sensor plugins to attach to this machine.
    #[serde(default)]
    pub sensors: Vec<String>,

    /// Vulnerability plugins to install on this machine.
    #[serde(default)]
    pub vulnerabilities: Vec<String>,
}

impl MachineConfig {
    /// Parses and validates a machine configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` for an empty document,
    /// `ConfigError::ParseError` for malformed YAML or missing fields and
    /// `ConfigError::InvalidValue` for an unsupported operating system.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| ConfigError::ParseError {
                path: PathBuf::from("<machine>"),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;
        Self::from_value(value)
    }

    /// Builds a machine configuration from an already parsed YAML value.
    ///
    /// # Errors
    ///
    /// See [`from_yaml`](Self::from_yaml).
    pub fn from_value(value: serde_yaml::Value) -> Result<Self, ConfigError> {
        if value.is_null() {
            return Err(ConfigError::MissingRequired {
                field: "machine".to_string(),
                location: "<root>".to_string(),
            });
        }

        let mut config: Self =
            serde_yaml::from_value(value).map_err(|e| ConfigError::ParseError {
                path: PathBuf::from("<machine>"),
                line: None,
                message: e.to_string(),
            })?;

        config.os = config.os.to_lowercase();
        config.vm_controller.vm_type = config.vm_controller.vm_type.to_lowercase();

        if !KNOWN_OS.contains(&config.os.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: format!("{}.os", config.vm_name),
                value: config.os,
                expected: KNOWN_OS.join(" or "),
            });
        }

        Ok(config)
    }

    /// Name of the VM.
    #[must_use]
    pub fn vmname(&self) -> &str {
        &self.vm_name
    }

    /// Lowercase operating system name.
    #[must_use]
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Lowercase name of the machinery plugin controlling this machine.
    #[must_use]
    pub fn vmcontroller(&self) -> &str {
        &self.vm_controller.vm_type
    }

    /// Address of the machine; falls back to the VM name.
    #[must_use]
    pub fn vm_ip(&self) -> &str {
        self.vm_controller.ip.as_deref().unwrap_or(&self.vm_name)
    }

    /// Machine-specific sub-directory; falls back to the VM name.
    #[must_use]
    pub fn machinepath(&self) -> &str {
        self.machinepath.as_deref().unwrap_or(&self.vm_name)
    }

    /// Directory containing the `Vagrantfile`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` if it is not configured.
    pub fn vagrantfilepath(&self) -> Result<&Path, ConfigError> {
        self.vm_controller
            .vagrantfilepath
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "vagrantfilepath".to_string(),
                location: format!("{}.vm_controller", self.vm_name),
            })
    }

    /// Host-side directory with files written during provisioning.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` if `vagrantfilepath` is unset.
    pub fn machine_path_external(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.vagrantfilepath()?.join(self.machinepath()))
    }

    /// Working directory on the machine.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` if no playground is configured.
    pub fn playground(&self) -> Result<&str, ConfigError> {
        self.playground
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "playground".to_string(),
                location: self.vm_name.clone(),
            })
    }

    /// Whether halting this machine must be forced.
    #[must_use]
    pub const fn halt_needs_force(&self) -> bool {
        self.halt_needs_force
    }

    /// SSH user; defaults to `vagrant`.
    #[must_use]
    pub fn ssh_user(&self) -> &str {
        self.ssh_user.as_deref().unwrap_or("vagrant")
    }

    /// SSH password, if any.
    #[must_use]
    pub fn ssh_password(&self) -> Option<&str> {
        self.ssh_password.as_deref()
    }

    /// SSH private key file, if any.
    #[must_use]
    pub fn ssh_keyfile(&self) -> Option<&Path> {
        self.ssh_keyfile.as_deref()
    }

    /// Whether an existing machine is reused.
    #[must_use]
    pub const fn use_existing_machine(&self) -> bool {
        self.use_existing_machine
    }

    /// Sensor plugin names for this machine.
    #[must_use]
    pub fn sensors(&self) -> &[String] {
        &self.sensors
    }

    /// Vulnerability plugin names for this machine.
    #[must_use]
    pub fn vulnerabilities(&self) -> &[String] {
        &self.vulnerabilities
    }
}
