//! The setup → run → teardown envelope.
//!
//! Every attack, sensor and vulnerability run goes through
//! [`LoadedPlugin::execute`], [`LoadedPlugin::collect`] or
//! [`LoadedPlugin::install`]. Teardown runs whenever setup succeeded, and
//! attack and vulnerability runs are bracketed by start and stop events on
//! the attack log.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use super::context::PluginContext;
use super::instance::LoadedPlugin;
use super::{Capability, PluginKind, templates};
use crate::error::{MachineRole, PluginError, PluginResult};
use crate::machinery::MachineRegistry;

/// Where a plugin instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Configurable, not started
    Uninitialized,
    /// Templates, file staging and the setup hook
    Setup,
    /// The capability operation
    Running,
    /// Implementation cleanup
    Teardown,
    /// Finished; cannot run again
    Done,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Setup => write!(f, "in setup"),
            Self::Running => write!(f, "running"),
            Self::Teardown => write!(f, "in teardown"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl LoadedPlugin {
    /// Runs an attack plugin against `targets`.
    ///
    /// The attacker machine must be bound; its VM name identifies the run
    /// in the start and stop events.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Binding` without side effects if the attacker,
    /// or a machine that receives required files, is not bound.
    /// Returns `PluginError::InvalidTransition` if the plugin already ran,
    /// and otherwise the failure of setup, run or teardown.
    pub fn execute(
        &mut self,
        machines: &mut MachineRegistry,
        targets: &[String],
    ) -> PluginResult<String> {
        self.expect_capability(Capability::Attack)?;
        self.ensure_fresh("execute")?;
        let machine = self.bound_vm_name(machines, MachineRole::Attacker)?;
        let plugin = self.display_name().to_owned();
        let ttp = self.descriptor.resolved_ttp().to_owned();
        let logger = Arc::clone(&self.logger);

        self.envelope(machines, |kind, ctx| {
            let PluginKind::Attack(attack) = kind else {
                return Err(wrong_kind(ctx, Capability::Attack, kind));
            };
            logger.start_kali_attack(&machine, targets, &plugin, &ttp);
            let result = attack.run(ctx, targets);
            logger.stop_kali_attack(&machine, targets, &plugin, &ttp);
            result
        })
    }

    /// Runs a sensor plugin and returns the collected artefacts.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::InvalidTransition` if the plugin already ran,
    /// and otherwise the failure of setup, collect or teardown.
    pub fn collect(&mut self, machines: &mut MachineRegistry) -> PluginResult<Vec<PathBuf>> {
        self.expect_capability(Capability::Sensor)?;
        self.ensure_fresh("collect")?;

        self.envelope(machines, |kind, ctx| match kind {
            PluginKind::Sensor(sensor) => sensor.collect(ctx),
            other => Err(wrong_kind(ctx, Capability::Sensor, other)),
        })
    }

    /// Installs a vulnerability on the bound machine.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Binding` without side effects if no machine is
    /// bound, `PluginError::InvalidTransition` if the plugin already ran,
    /// and otherwise the failure of setup, start or teardown.
    pub fn install(&mut self, machines: &mut MachineRegistry) -> PluginResult<()> {
        self.expect_capability(Capability::Vulnerability)?;
        self.ensure_fresh("install")?;
        let machine = self.bound_vm_name(machines, MachineRole::Default)?;
        let plugin = self.display_name().to_owned();
        let ttp = self.descriptor.resolved_ttp().to_owned();
        let logger = Arc::clone(&self.logger);

        self.envelope(machines, |kind, ctx| {
            let PluginKind::Vulnerability(vulnerability) = kind else {
                return Err(wrong_kind(ctx, Capability::Vulnerability, kind));
            };
            logger.start_vulnerability(&machine, &plugin, &ttp);
            let result = vulnerability.start(ctx);
            logger.stop_vulnerability(&machine, &plugin, &ttp);
            result
        })?;

        self.installed = true;
        Ok(())
    }

    /// Removes a previously installed vulnerability.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::InvalidTransition` unless [`install`](Self::install)
    /// completed and the vulnerability was not removed yet, and otherwise
    /// the failure of `stop`.
    pub fn remove(&mut self, machines: &mut MachineRegistry) -> PluginResult<()> {
        self.expect_capability(Capability::Vulnerability)?;
        if !self.installed {
            return Err(PluginError::InvalidTransition {
                plugin: self.display_name().to_owned(),
                requested: "remove",
                state: if self.state == LifecycleState::Done {
                    "not installed".to_owned()
                } else {
                    self.state.to_string()
                },
            });
        }
        let machine = self.bound_vm_name(machines, MachineRole::Default)?;
        let name = self.display_name().to_owned();
        let ttp = self.descriptor.resolved_ttp().to_owned();

        let Self {
            descriptor,
            kind,
            conf,
            binding,
            logger,
            ..
        } = self;
        let mut ctx = PluginContext::new(descriptor, conf, logger.as_ref(), machines, binding);
        let PluginKind::Vulnerability(vulnerability) = kind else {
            return Err(wrong_kind(&ctx, Capability::Vulnerability, kind));
        };

        logger.start_vulnerability(&machine, &name, &ttp);
        let result = vulnerability.stop(&mut ctx);
        logger.stop_vulnerability(&machine, &name, &ttp);
        result.map_err(|e| e.for_plugin(&name))?;

        self.installed = false;
        Ok(())
    }

    /// Drives setup, `body` and teardown, keeping the lifecycle state.
    fn envelope<T>(
        &mut self,
        machines: &mut MachineRegistry,
        body: impl FnOnce(&mut PluginKind, &mut PluginContext<'_>) -> PluginResult<T>,
    ) -> PluginResult<T> {
        let name = self.display_name().to_owned();
        self.check_staging_bindings(machines)?;
        let Self {
            descriptor,
            kind,
            conf,
            binding,
            logger,
            state,
            ..
        } = self;
        let mut ctx = PluginContext::new(descriptor, conf, logger.as_ref(), machines, binding);

        *state = LifecycleState::Setup;
        debug!(plugin = %name, "setup");
        if let Err(err) = setup(kind, &mut ctx) {
            *state = LifecycleState::Done;
            return Err(err.for_plugin(&name));
        }

        *state = LifecycleState::Running;
        debug!(plugin = %name, "running");
        let result = body(kind, &mut ctx).map_err(|e| e.for_plugin(&name));

        *state = LifecycleState::Teardown;
        debug!(plugin = %name, "teardown");
        let teardown = match kind {
            PluginKind::Attack(p) => p.teardown(&mut ctx),
            PluginKind::Sensor(p) => p.teardown(&mut ctx),
            PluginKind::Vulnerability(p) => p.teardown(&mut ctx),
            PluginKind::Machinery(_) => Ok(()),
        };
        *state = LifecycleState::Done;

        compose(result, teardown.map_err(|e| e.for_plugin(&name)))
    }

    fn expect_capability(&self, expected: Capability) -> PluginResult<()> {
        if self.capability() == expected {
            Ok(())
        } else {
            Err(PluginError::WrongCapability {
                plugin: self.display_name().to_owned(),
                expected: expected.to_string(),
                actual: self.capability().to_string(),
            })
        }
    }

    fn ensure_fresh(&self, requested: &'static str) -> PluginResult<()> {
        if self.state == LifecycleState::Uninitialized {
            Ok(())
        } else {
            Err(PluginError::InvalidTransition {
                plugin: self.display_name().to_owned(),
                requested,
                state: self.state.to_string(),
            })
        }
    }

    /// Every machine that setup copies required files to must be bound.
    fn check_staging_bindings(&self, machines: &MachineRegistry) -> PluginResult<()> {
        let descriptor = &self.descriptor;
        let mut roles = Vec::new();
        if !descriptor.required_files.is_empty() {
            roles.push(MachineRole::Default);
        }
        if self.capability() == Capability::Attack {
            if !descriptor.required_files_attacker.is_empty() {
                roles.push(MachineRole::Attacker);
            }
            if !descriptor.required_files_target.is_empty() {
                roles.push(MachineRole::Target);
            }
        }
        for role in roles {
            self.bound_vm_name(machines, role)?;
        }
        Ok(())
    }

    fn bound_vm_name(&self, machines: &MachineRegistry, role: MachineRole) -> PluginResult<String> {
        let handle = self.binding.slot(role).ok_or_else(|| PluginError::Binding {
            plugin: self.display_name().to_owned(),
            role,
        })?;
        Ok(machines.get(handle)?.vm_name().to_owned())
    }
}

/// Renders templates, stages required files, then calls the setup hook.
fn setup(kind: &mut PluginKind, ctx: &mut PluginContext<'_>) -> PluginResult<()> {
    let descriptor = ctx.descriptor();
    let dir = descriptor.plugin_dir();

    for rendered in templates::render_templates(descriptor, ctx.conf())? {
        ctx.vprint(&format!("rendered {}", rendered.display()), 3);
    }

    for file in &descriptor.required_files {
        let src = dir.join(file);
        ctx.vprint(&src.display().to_string(), 3);
        ctx.copy_to(MachineRole::Default, &src)?;
    }

    if matches!(kind, PluginKind::Attack(_)) {
        for file in &descriptor.required_files_attacker {
            let src = dir.join(file);
            ctx.vprint(&src.display().to_string(), 3);
            ctx.copy_to(MachineRole::Attacker, &src)?;
        }
        for file in &descriptor.required_files_target {
            let src = dir.join(file);
            ctx.vprint(&src.display().to_string(), 3);
            ctx.copy_to(MachineRole::Target, &src)?;
        }
    }

    match kind {
        PluginKind::Attack(p) => p.setup_hook(ctx),
        PluginKind::Sensor(p) => p.setup_hook(ctx),
        PluginKind::Vulnerability(p) => p.setup_hook(ctx),
        PluginKind::Machinery(_) => Ok(()),
    }
}

/// The run failure takes priority; a teardown failure is attached to it.
fn compose<T>(result: PluginResult<T>, teardown: PluginResult<()>) -> PluginResult<T> {
    match (result, teardown) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(teardown)) => Err(teardown),
        (Err(original), Ok(())) => Err(original),
        (Err(original), Err(teardown)) => {
            warn!(error = %teardown, "teardown failed after a failed run");
            Err(PluginError::TeardownAfterFailure {
                original: Box::new(original),
                teardown: Box::new(teardown),
            })
        }
    }
}

fn wrong_kind(ctx: &PluginContext<'_>, expected: Capability, kind: &PluginKind) -> PluginError {
    PluginError::WrongCapability {
        plugin: ctx.name().to_owned(),
        expected: expected.to_string(),
        actual: kind.capability().to_string(),
    }
}
