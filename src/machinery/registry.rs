//! Ownership of the machines of a run.
//!
//! Plugins refer to machines by [`MachineHandle`]; the registry is the only
//! owner, so a plugin never keeps a machine alive or aliases it.

use std::fmt;

use super::Machine;
use crate::error::{PluginError, PluginResult};

/// Index of a machine in a [`MachineRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineHandle(usize);

impl MachineHandle {
    /// Raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for MachineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "machine#{}", self.0)
    }
}

/// The machines of one run.
#[derive(Debug, Default)]
pub struct MachineRegistry {
    machines: Vec<Option<Machine>>,
}

impl MachineRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `machine`.
    pub fn add(&mut self, machine: Machine) -> MachineHandle {
        self.machines.push(Some(machine));
        MachineHandle(self.machines.len() - 1)
    }

    /// The machine behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::UnknownMachine` for a stale handle.
    pub fn get(&self, handle: MachineHandle) -> PluginResult<&Machine> {
        self.machines
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or(PluginError::UnknownMachine(handle.0))
    }

    /// The machine behind `handle`, mutably.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::UnknownMachine` for a stale handle.
    pub fn get_mut(&mut self, handle: MachineHandle) -> PluginResult<&mut Machine> {
        self.machines
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(PluginError::UnknownMachine(handle.0))
    }

    /// Removes the machine; `handle` is stale afterwards.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::UnknownMachine` for a stale handle.
    pub fn remove(&mut self, handle: MachineHandle) -> PluginResult<Machine> {
        self.machines
            .get_mut(handle.0)
            .and_then(Option::take)
            .ok_or(PluginError::UnknownMachine(handle.0))
    }

    /// Handle of the machine whose VM is named `vm_name`.
    #[must_use]
    pub fn find(&self, vm_name: &str) -> Option<MachineHandle> {
        self.machines.iter().enumerate().find_map(|(i, m)| {
            m.as_ref()
                .filter(|m| m.vm_name() == vm_name)
                .map(|_| MachineHandle(i))
        })
    }

    /// Handles of all live machines, in insertion order.
    pub fn handles(&self) -> impl Iterator<Item = MachineHandle> + '_ {
        self.machines
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_some())
            .map(|(i, _)| MachineHandle(i))
    }

    /// Number of live machines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.machines.iter().filter(|m| m.is_some()).count()
    }

    /// Whether no machine is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machinery::fake::{CallLog, FakeMachinery, fake_machine};

    fn machine(vm: &str) -> Machine {
        fake_machine(vm, FakeMachinery::new(vm, CallLog::default()))
    }

    #[test]
    fn find_by_vm_name() {
        let mut registry = MachineRegistry::new();
        let attacker = registry.add(machine("attacker"));
        let target = registry.add(machine("target1"));

        assert_eq!(registry.find("target1"), Some(target));
        assert_eq!(registry.find("attacker"), Some(attacker));
        assert_eq!(registry.find("target2"), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn removed_handle_is_stale() {
        let mut registry = MachineRegistry::new();
        let first = registry.add(machine("a"));
        let second = registry.add(machine("b"));

        let removed = registry.remove(first).unwrap();
        assert_eq!(removed.vm_name(), "a");
        assert!(matches!(registry.get(first), Err(PluginError::UnknownMachine(0))));
        assert!(registry.remove(first).is_err());
        assert_eq!(registry.handles().collect::<Vec<_>>(), vec![second]);
        assert_eq!(registry.find("a"), None);
        assert!(!registry.is_empty());
    }

    #[test]
    fn handle_display() {
        let mut registry = MachineRegistry::new();
        let handle = registry.add(machine("a"));
        assert_eq!(handle.to_string(), "machine#0");
        assert_eq!(handle.index(), 0);
    }
}
