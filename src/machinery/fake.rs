//! In-memory machinery for unit tests.

use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{Machine, MachineState, Transport};
use crate::config::MachineConfig;
use crate::error::PluginResult;
use crate::observability::{AttackLog, AttackLogger};
use crate::plugin::{
    Capability, ImplementationInfo, LoadedPlugin, MachineContext, MachineryPlugin, Operation,
    PluginDescriptor, PluginKind,
};

pub(crate) const FAKE_INFO: ImplementationInfo = ImplementationInfo {
    id: "fake",
    operations: &[
        Operation::GetState,
        Operation::GetIp,
        Operation::Up,
        Operation::Halt,
    ],
    ssh_mixin: true,
    reusable: false,
};

/// Shared record of the calls a fake machine received.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub(crate) fn push(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Machinery answering every call from memory.
#[derive(Debug)]
pub(crate) struct FakeMachinery {
    name: String,
    log: CallLog,
}

impl FakeMachinery {
    pub(crate) fn new(name: &str, log: CallLog) -> Self {
        Self {
            name: name.to_owned(),
            log,
        }
    }
}

impl MachineryPlugin for FakeMachinery {
    fn get_state(&mut self, _ctx: &MachineContext<'_>) -> PluginResult<MachineState> {
        Ok(MachineState::Running)
    }

    fn get_ip(&mut self, _ctx: &MachineContext<'_>) -> PluginResult<String> {
        Ok(format!("{}.lan", self.name))
    }

    fn up(&mut self, _ctx: &MachineContext<'_>) -> PluginResult<()> {
        Ok(())
    }

    fn halt(&mut self, _ctx: &MachineContext<'_>) -> PluginResult<()> {
        Ok(())
    }

    fn transport(&mut self) -> Option<&mut dyn Transport> {
        Some(self)
    }
}

impl Transport for FakeMachinery {
    fn connect(&mut self) -> PluginResult<()> {
        self.log.push(format!("{}: connect", self.name));
        Ok(())
    }

    fn put(&mut self, src: &Path, dst: &str) -> PluginResult<()> {
        let file = src.file_name().map_or_else(String::new, |f| f.to_string_lossy().into_owned());
        self.log.push(format!("{}: put {file} -> {dst}", self.name));
        Ok(())
    }

    fn get(&mut self, src: &str, dst: &Path) -> PluginResult<()> {
        self.log.push(format!("{}: get {src}", self.name));
        std::fs::write(dst, format!("contents of {src}"))?;
        Ok(())
    }

    fn remote_run(&mut self, command: &str, disown: bool) -> PluginResult<String> {
        self.log.push(format!("{}: run {command} (disown={disown})", self.name));
        Ok(format!("ran {command}"))
    }

    fn disconnect(&mut self) -> PluginResult<()> {
        self.log.push(format!("{}: disconnect", self.name));
        Ok(())
    }
}

pub(crate) fn logger() -> Arc<dyn AttackLogger> {
    Arc::new(AttackLog::tracing_only())
}

/// A machine driven by `plugin`, with playground `/home/vagrant/playground`.
pub(crate) fn fake_machine(vm_name: &str, plugin: FakeMachinery) -> Machine {
    let mut descriptor = PluginDescriptor::new(Capability::Machinery, FAKE_INFO, "fake/plugin.yaml");
    descriptor.name = Some("fake".to_owned());
    let loaded = LoadedPlugin::new(
        Arc::new(descriptor),
        PluginKind::Machinery(Box::new(plugin)),
        logger(),
    )
    .unwrap();
    let config = MachineConfig::from_yaml(&format!(
        "vm_name: {vm_name}\nos: linux\nplayground: /home/vagrant/playground\nvm_controller:\n  vm_type: fake\n"
    ))
    .unwrap();
    Machine::new(loaded, config).unwrap()
}
