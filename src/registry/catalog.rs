//! Compiled-in plugin implementations.
//!
//! Every implementation a manifest can name is registered here together
//! with the operations it overrides. The built-in catalog carries the two
//! VM controllers and the generic command runners; embedders register
//! their own implementations on top.

use indexmap::IndexMap;

use crate::machinery::{RunningVmMachinery, VagrantMachinery};
use crate::plugin::{
    AttackPlugin, Capability, ImplementationInfo, MachineryPlugin, Operation, PluginKind,
    SensorPlugin, VulnerabilityPlugin,
};
use crate::plugins::{CommandAttack, CommandSensor, CommandVulnerability};

// ============================================================================
// Types
// ============================================================================

/// Constructor of a fresh implementation value, one per capability.
#[derive(Debug, Clone, Copy)]
pub enum Builder {
    /// Builds an attack implementation
    Attack(fn() -> Box<dyn AttackPlugin>),
    /// Builds a machinery implementation
    Machinery(fn() -> Box<dyn MachineryPlugin>),
    /// Builds a sensor implementation
    Sensor(fn() -> Box<dyn SensorPlugin>),
    /// Builds a vulnerability implementation
    Vulnerability(fn() -> Box<dyn VulnerabilityPlugin>),
}

/// A registered implementation.
#[derive(Debug, Clone, Copy)]
pub struct PluginFactory {
    /// Identifier manifests refer to (e.g. "vagrant").
    pub implementation: &'static str,

    /// Operations the implementation overrides.
    pub operations: &'static [Operation],

    /// Whether the implementation carries the SSH transport helper.
    pub ssh_mixin: bool,

    /// Whether several manifest entries may share this implementation.
    pub reusable: bool,

    /// Constructor.
    pub builder: Builder,
}

impl PluginFactory {
    /// Capability of the implementation.
    #[must_use]
    pub const fn capability(&self) -> Capability {
        match self.builder {
            Builder::Attack(_) => Capability::Attack,
            Builder::Machinery(_) => Capability::Machinery,
            Builder::Sensor(_) => Capability::Sensor,
            Builder::Vulnerability(_) => Capability::Vulnerability,
        }
    }

    /// Compile-time facts recorded in descriptors.
    #[must_use]
    pub const fn info(&self) -> ImplementationInfo {
        ImplementationInfo {
            id: self.implementation,
            operations: self.operations,
            ssh_mixin: self.ssh_mixin,
            reusable: self.reusable,
        }
    }

    /// Builds a fresh implementation value.
    #[must_use]
    pub fn build(&self) -> PluginKind {
        match self.builder {
            Builder::Attack(build) => PluginKind::Attack(build()),
            Builder::Machinery(build) => PluginKind::Machinery(build()),
            Builder::Sensor(build) => PluginKind::Sensor(build()),
            Builder::Vulnerability(build) => PluginKind::Vulnerability(build()),
        }
    }
}

// ============================================================================
// Built-in implementations
// ============================================================================

const MACHINERY_OPERATIONS: &[Operation] = &[
    Operation::GetState,
    Operation::GetIp,
    Operation::Up,
    Operation::Halt,
    Operation::Create,
    Operation::Destroy,
];

fn vagrant() -> Box<dyn MachineryPlugin> {
    Box::new(VagrantMachinery::new())
}

fn running_vm() -> Box<dyn MachineryPlugin> {
    Box::new(RunningVmMachinery::new())
}

fn command_attack() -> Box<dyn AttackPlugin> {
    Box::new(CommandAttack)
}

fn command_sensor() -> Box<dyn SensorPlugin> {
    Box::new(CommandSensor)
}

fn command_vulnerability() -> Box<dyn VulnerabilityPlugin> {
    Box::new(CommandVulnerability)
}

/// Implementations shipped with the crate.
static BUILTIN_PLUGINS: &[PluginFactory] = &[
    PluginFactory {
        implementation: "vagrant",
        operations: MACHINERY_OPERATIONS,
        ssh_mixin: true,
        reusable: false,
        builder: Builder::Machinery(vagrant),
    },
    PluginFactory {
        implementation: "running_vm",
        operations: MACHINERY_OPERATIONS,
        ssh_mixin: true,
        reusable: false,
        builder: Builder::Machinery(running_vm),
    },
    PluginFactory {
        implementation: "command_attack",
        operations: &[Operation::Run],
        ssh_mixin: false,
        reusable: true,
        builder: Builder::Attack(command_attack),
    },
    PluginFactory {
        implementation: "command_sensor",
        operations: &[Operation::Collect],
        ssh_mixin: false,
        reusable: true,
        builder: Builder::Sensor(command_sensor),
    },
    PluginFactory {
        implementation: "command_vulnerability",
        operations: &[Operation::Start, Operation::Stop],
        ssh_mixin: false,
        reusable: true,
        builder: Builder::Vulnerability(command_vulnerability),
    },
];

// ============================================================================
// Catalog
// ============================================================================

/// Implementations known to a plugin manager, keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    factories: IndexMap<&'static str, PluginFactory>,
}

impl PluginCatalog {
    /// A catalog with no implementations.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A catalog with the built-in implementations.
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for factory in BUILTIN_PLUGINS {
            catalog.register(*factory);
        }
        catalog
    }

    /// Registers `factory`, returning the one it replaces.
    pub fn register(&mut self, factory: PluginFactory) -> Option<PluginFactory> {
        self.factories.insert(factory.implementation, factory)
    }

    /// Looks up an implementation by exact identifier.
    #[must_use]
    pub fn get(&self, implementation: &str) -> Option<&PluginFactory> {
        self.factories.get(implementation)
    }

    /// Suggests a registered identifier for a misspelled one.
    ///
    /// Returns the closest match if its Damerau-Levenshtein distance is ≤ 3.
    #[must_use]
    pub fn suggest(&self, input: &str) -> Option<String> {
        self.factories
            .keys()
            .map(|id| (*id, strsim::damerau_levenshtein(input, id)))
            .filter(|(_, dist)| *dist <= 3)
            .min_by_key(|(_, dist)| *dist)
            .map(|(id, _)| id.to_string())
    }

    /// Registered identifiers in registration order.
    pub fn implementations(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    /// Number of registered implementations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_contents() {
        let catalog = PluginCatalog::builtin();
        let ids: Vec<&str> = catalog.implementations().collect();
        assert_eq!(
            ids,
            vec![
                "vagrant",
                "running_vm",
                "command_attack",
                "command_sensor",
                "command_vulnerability"
            ]
        );
    }

    #[test]
    fn factories_build_their_capability() {
        for factory in BUILTIN_PLUGINS {
            assert_eq!(
                factory.build().capability(),
                factory.capability(),
                "{} builds the wrong kind",
                factory.implementation
            );
        }
    }

    #[test]
    fn builtin_factories_cover_required_operations() {
        for factory in BUILTIN_PLUGINS {
            for op in factory.capability().required_operations() {
                assert!(
                    factory.info().implements(*op),
                    "{} misses {op}",
                    factory.implementation
                );
            }
        }
    }

    #[test]
    fn only_command_runners_are_reusable() {
        let catalog = PluginCatalog::builtin();
        assert!(!catalog.get("vagrant").unwrap().reusable);
        assert!(catalog.get("command_attack").unwrap().reusable);
    }

    #[test]
    fn suggest_close_match() {
        let catalog = PluginCatalog::builtin();
        assert_eq!(catalog.suggest("vagrnt"), Some("vagrant".to_string()));
        assert_eq!(catalog.suggest("running-vm"), Some("running_vm".to_string()));
        assert_eq!(catalog.suggest("metasploit"), None);
    }

    #[test]
    fn register_replaces_and_returns_previous() {
        let mut catalog = PluginCatalog::builtin();
        let before = catalog.len();
        let mut factory = *catalog.get("vagrant").unwrap();
        factory.ssh_mixin = false;

        let previous = catalog.register(factory).unwrap();
        assert!(previous.ssh_mixin);
        assert!(!catalog.get("vagrant").unwrap().ssh_mixin);
        assert_eq!(catalog.len(), before);
    }

    #[test]
    fn empty_catalog_knows_nothing() {
        let catalog = PluginCatalog::empty();
        assert!(catalog.is_empty());
        assert!(catalog.get("vagrant").is_none());
        assert!(catalog.suggest("vagrant").is_none());
    }
}
