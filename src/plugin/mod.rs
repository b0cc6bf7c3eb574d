//! Plugin capability model
//!
//! A plugin is one of four capabilities: Attack, Machinery, Sensor or
//! Vulnerability. Each capability is a trait whose required operations have
//! default bodies returning [`PluginError::Unimplemented`]. Since an
//! overridden default cannot be detected at runtime, every implementation
//! registers the operations it overrides; the validator lints against that
//! list before a plugin is first used.

pub mod context;
pub mod descriptor;
pub mod instance;
pub mod lifecycle;
pub mod templates;

use std::fmt;
use std::path::PathBuf;

use crate::error::{PluginError, PluginResult};
use crate::machinery::{MachineState, Transport};

pub use context::{MachineContext, PluginContext};
pub use descriptor::{ImplementationInfo, PluginDescriptor, TTP_UNKNOWN, TemplateSpec};
pub use instance::{Binding, LoadedPlugin};
pub use lifecycle::LifecycleState;

// ============================================================================
// Capabilities and operations
// ============================================================================

/// The four plugin capability families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum Capability {
    /// Vulnerabilities injected into a machine.
    Vulnerability,
    /// Controllers of one virtual machine.
    Machinery,
    /// Attacks run from an attacker machine against targets.
    Attack,
    /// Passive sensors collecting data from a machine.
    Sensor,
}

impl Capability {
    /// Returns every capability in listing order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Vulnerability,
            Self::Machinery,
            Self::Attack,
            Self::Sensor,
        ]
    }

    /// Section title used when listing plugins.
    #[must_use]
    pub const fn section(self) -> &'static str {
        match self {
            Self::Vulnerability => "Vulnerabilities",
            Self::Machinery => "Machinery",
            Self::Attack => "Attack",
            Self::Sensor => "Sensors",
        }
    }

    /// Operations an implementation of this capability must provide.
    #[must_use]
    pub const fn required_operations(self) -> &'static [Operation] {
        match self {
            Self::Vulnerability => &[Operation::Start, Operation::Stop],
            Self::Machinery => &[
                Operation::GetState,
                Operation::GetIp,
                Operation::Up,
                Operation::Halt,
                Operation::Create,
                Operation::Destroy,
            ],
            Self::Attack => &[Operation::Run],
            Self::Sensor => &[Operation::Collect],
        }
    }

    /// Whether plugins of this capability must carry a technique identifier.
    #[must_use]
    pub const fn requires_ttp(self) -> bool {
        matches!(self, Self::Attack | Self::Vulnerability)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vulnerability => write!(f, "vulnerability"),
            Self::Machinery => write!(f, "machinery"),
            Self::Attack => write!(f, "attack"),
            Self::Sensor => write!(f, "sensor"),
        }
    }
}

/// A capability operation an implementation may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `SensorPlugin::collect`
    Collect,
    /// `AttackPlugin::run`
    Run,
    /// `MachineryPlugin::get_state`
    GetState,
    /// `MachineryPlugin::get_ip`. A `get_ip` inherited from the SSH
    /// transport helper is not an override and must not be listed.
    GetIp,
    /// `MachineryPlugin::up`
    Up,
    /// `MachineryPlugin::halt`
    Halt,
    /// `MachineryPlugin::create`
    Create,
    /// `MachineryPlugin::destroy`
    Destroy,
    /// `VulnerabilityPlugin::start`
    Start,
    /// `VulnerabilityPlugin::stop`
    Stop,
}

impl Operation {
    /// Method name of the operation.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Collect => "collect",
            Self::Run => "run",
            Self::GetState => "get_state",
            Self::GetIp => "get_ip",
            Self::Up => "up",
            Self::Halt => "halt",
            Self::Create => "create",
            Self::Destroy => "destroy",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn unimplemented<T>(operation: Operation) -> PluginResult<T> {
    Err(PluginError::Unimplemented {
        plugin: String::new(),
        operation: operation.name(),
    })
}

// ============================================================================
// Capability traits
// ============================================================================

/// Hooks shared by the plugin kinds that go through the lifecycle envelope.
pub trait PluginBase: Send {
    /// Capability-specific staging, called at the end of setup after the
    /// required files have been copied.
    ///
    /// # Errors
    ///
    /// Implementation defined; a failing setup skips the run and teardown.
    fn setup_hook(&mut self, _ctx: &mut PluginContext<'_>) -> PluginResult<()> {
        Ok(())
    }

    /// Cleanup after the run step. Runs even when the run step failed.
    ///
    /// # Errors
    ///
    /// Implementation defined.
    fn teardown(&mut self, _ctx: &mut PluginContext<'_>) -> PluginResult<()> {
        Ok(())
    }
}

/// An attack executed from the attacker machine against targets.
pub trait AttackPlugin: PluginBase {
    /// Runs the attack.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Unimplemented` unless overridden.
    fn run(&mut self, _ctx: &mut PluginContext<'_>, _targets: &[String]) -> PluginResult<String> {
        unimplemented(Operation::Run)
    }
}

/// A passive sensor collecting data from its machine.
pub trait SensorPlugin: PluginBase {
    /// Collects sensor data and returns the host paths of the artefacts.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Unimplemented` unless overridden.
    fn collect(&mut self, _ctx: &mut PluginContext<'_>) -> PluginResult<Vec<PathBuf>> {
        unimplemented(Operation::Collect)
    }
}

/// A vulnerability injected into its machine.
pub trait VulnerabilityPlugin: PluginBase {
    /// Installs the vulnerability.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Unimplemented` unless overridden.
    fn start(&mut self, _ctx: &mut PluginContext<'_>) -> PluginResult<()> {
        unimplemented(Operation::Start)
    }

    /// Removes the vulnerability.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Unimplemented` unless overridden.
    fn stop(&mut self, _ctx: &mut PluginContext<'_>) -> PluginResult<()> {
        unimplemented(Operation::Stop)
    }
}

/// Controller of one virtual machine.
///
/// The controller never caches the machine state: every `get_state` call
/// asks the backing tool.
pub trait MachineryPlugin: Send {
    /// Machine specific processing of the configuration, called once when
    /// the controller is bound to a machine.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the machine cannot be controlled
    /// with the given settings.
    fn process_config(&mut self, _ctx: &MachineContext<'_>) -> PluginResult<()> {
        Ok(())
    }

    /// Detailed state of the machine.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Unimplemented` unless overridden.
    fn get_state(&mut self, _ctx: &MachineContext<'_>) -> PluginResult<MachineState> {
        unimplemented(Operation::GetState)
    }

    /// Address of the machine. If there are several it should be the one
    /// accepting SSH.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Unimplemented` unless overridden.
    fn get_ip(&mut self, _ctx: &MachineContext<'_>) -> PluginResult<String> {
        unimplemented(Operation::GetIp)
    }

    /// Starts the machine, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Unimplemented` unless overridden.
    fn up(&mut self, _ctx: &MachineContext<'_>) -> PluginResult<()> {
        unimplemented(Operation::Up)
    }

    /// Halts the machine.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Unimplemented` unless overridden.
    fn halt(&mut self, _ctx: &MachineContext<'_>) -> PluginResult<()> {
        unimplemented(Operation::Halt)
    }

    /// Creates the machine; `reboot` restarts it afterwards so installed
    /// software takes effect.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Unimplemented` unless overridden.
    fn create(&mut self, _ctx: &MachineContext<'_>, _reboot: bool) -> PluginResult<()> {
        unimplemented(Operation::Create)
    }

    /// Destroys the machine.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Unimplemented` unless overridden.
    fn destroy(&mut self, _ctx: &MachineContext<'_>) -> PluginResult<()> {
        unimplemented(Operation::Destroy)
    }

    /// Remote execution and file transfer, when the backend supports it.
    fn transport(&mut self) -> Option<&mut dyn Transport> {
        None
    }
}

// ============================================================================
// Plugin kinds
// ============================================================================

/// A boxed implementation of exactly one capability.
pub enum PluginKind {
    /// Attack implementation
    Attack(Box<dyn AttackPlugin>),
    /// Machinery implementation
    Machinery(Box<dyn MachineryPlugin>),
    /// Sensor implementation
    Sensor(Box<dyn SensorPlugin>),
    /// Vulnerability implementation
    Vulnerability(Box<dyn VulnerabilityPlugin>),
}

impl PluginKind {
    /// Capability implemented by this plugin.
    #[must_use]
    pub const fn capability(&self) -> Capability {
        match self {
            Self::Attack(_) => Capability::Attack,
            Self::Machinery(_) => Capability::Machinery,
            Self::Sensor(_) => Capability::Sensor,
            Self::Vulnerability(_) => Capability::Vulnerability,
        }
    }
}

impl fmt::Debug for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PluginKind").field(&self.capability()).finish()
    }
}
