mod common;

use common::{PluginTree, logger, shipped_pattern};
use rangeforge::error::{DiscoveryError, RangeForgeError};
use rangeforge::plugin::{Capability, PluginBase, SensorPlugin};
use rangeforge::registry::{Builder, PluginCatalog, PluginFactory, PluginManager};
use rangeforge::validation::Validator;

// ============================================================================
// Shipped plugins
// ============================================================================

#[test]
fn shipped_plugins_pass_the_check() {
    let manager = PluginManager::new(logger()).with_pattern(shipped_pattern());
    let issues = manager.check_installed().unwrap();
    assert!(issues.is_empty(), "unexpected issues: {issues:?}");
}

#[test]
fn shipped_plugins_cover_every_capability() {
    let manager = PluginManager::new(logger()).with_pattern(shipped_pattern());
    for capability in Capability::all() {
        assert!(
            !manager.discover(*capability, None).unwrap().is_empty(),
            "no shipped {capability} plugin"
        );
    }
}

#[test]
fn shipped_vagrant_is_found_by_name() {
    let manager = PluginManager::new(logger()).with_pattern(shipped_pattern());
    let found = manager
        .discover(Capability::Machinery, Some(&["vagrant".to_string()]))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get_name().unwrap(), "vagrant");
    assert!(found[0].get_description().unwrap().contains("vagrant"));
}

#[test]
fn shipped_attack_default_config_renders() {
    let manager = PluginManager::new(logger()).with_pattern(shipped_pattern());
    let rendered = manager
        .render_default_config(Capability::Attack, "arp")
        .unwrap();
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].contains("command:"), "got {rendered:?}");
}

#[test]
fn machinery_without_config_renders_fallback() {
    let manager = PluginManager::new(logger()).with_pattern(shipped_pattern());
    let rendered = manager
        .render_default_config(Capability::Machinery, "vagrant")
        .unwrap();
    assert_eq!(
        rendered,
        vec!["# The plugin vagrant does not support configuration".to_string()]
    );
}

// ============================================================================
// Identity checks
// ============================================================================

#[test]
fn duplicate_vagrant_implementation_reported_once() {
    let tree = PluginTree::new();
    let first = tree.add(
        "a_vagrant",
        "plugins:\n  - implementation: vagrant\n    name: vagrant_one\n    description: first\n",
    );
    let second = tree.add(
        "b_vagrant",
        "plugins:\n  - implementation: vagrant\n    name: vagrant_two\n    description: second\n",
    );

    let issues = tree.manager().check_installed().unwrap();
    assert_eq!(issues.len(), 1, "got {issues:?}");
    assert_eq!(
        issues[0].message,
        format!(
            "Implementation duplication: vagrant is used in {} and {}",
            first.display(),
            second.display()
        )
    );
}

#[test]
fn duplicate_name_across_capabilities() {
    let tree = PluginTree::new();
    tree.add(
        "sensor",
        "plugins:\n  - implementation: command_sensor\n    name: shared\n    description: s\n",
    );
    tree.add(
        "vuln",
        "plugins:\n  - implementation: command_vulnerability\n    name: shared\n    description: v\n    ttp: T1110\n",
    );

    let issues = tree.manager().check_installed().unwrap();
    assert_eq!(issues.len(), 1, "got {issues:?}");
    assert!(issues[0].message.starts_with("Name duplication: shared is used in"));
}

#[test]
fn generic_runners_may_be_shared() {
    let tree = PluginTree::new();
    tree.add(
        "attacks",
        "plugins:\n  - implementation: command_attack\n    name: nmap\n    description: scan\n    ttp: T1046\n  - implementation: command_attack\n    name: hydra\n    description: brute force\n    ttp: T1110.001\n",
    );
    assert!(tree.manager().check_installed().unwrap().is_empty());
}

// ============================================================================
// Capability checks
// ============================================================================

#[test]
fn attack_ttp_is_checked() {
    let tree = PluginTree::new();
    let good = tree.add(
        "arp",
        "plugins:\n  - implementation: command_attack\n    name: arp\n    description: arp cache\n    ttp: T1016\n",
    );
    let bad = tree.add(
        "nottp",
        "plugins:\n  - implementation: command_attack\n    name: nottp\n    description: no ttp\n",
    );

    let plugins = tree.manager().discover(Capability::Attack, None).unwrap();
    assert_eq!(plugins.len(), 2);

    let mut validator = Validator::new();
    let issues = validator.check_all(&plugins);
    assert_eq!(issues.len(), 1, "got {issues:?}");
    assert_eq!(issues[0].path, bad.display().to_string());
    assert_eq!(
        issues[0].message,
        format!(
            "Attack plugins need a valid ttp number (either T1234, T1234.222 or ???)  nottp uses none in {}",
            bad.display()
        )
    );
    assert!(!issues.iter().any(|i| i.path == good.display().to_string()));
}

#[test]
fn missing_name_and_description() {
    let tree = PluginTree::new();
    let path = tree.add("anon", "plugins:\n  - implementation: command_sensor\n");

    let issues = tree.manager().check_installed().unwrap();
    let messages: Vec<_> = issues.iter().map(|i| i.message.clone()).collect();
    assert_eq!(
        messages,
        vec![
            format!("No name for plugin: in {}", path.display()),
            format!("No description in plugin: command_sensor in {}", path.display()),
        ]
    );
}

/// Sensor registered by an embedder without overriding `collect`.
struct LazySensor;

impl PluginBase for LazySensor {}
impl SensorPlugin for LazySensor {}

fn lazy_sensor() -> Box<dyn SensorPlugin> {
    Box::new(LazySensor)
}

#[test]
fn embedder_sensor_without_collect() {
    let mut catalog = PluginCatalog::builtin();
    let replaced = catalog.register(PluginFactory {
        implementation: "lazy_sensor",
        operations: &[],
        ssh_mixin: false,
        reusable: false,
        builder: Builder::Sensor(lazy_sensor),
    });
    assert!(replaced.is_none());

    let tree = PluginTree::new();
    let path = tree.add(
        "lazy",
        "plugins:\n  - implementation: lazy_sensor\n    name: lazy\n    description: does nothing\n",
    );

    let manager = tree.manager().with_catalog(catalog);
    let issues = manager.check_installed().unwrap();
    assert_eq!(issues.len(), 1, "got {issues:?}");
    assert_eq!(
        issues[0].message,
        format!("Method 'collect' not implemented in lazy in {}", path.display())
    );
}

// ============================================================================
// Fatal discovery errors
// ============================================================================

#[test]
fn misspelled_implementation_suggests_fix() {
    let tree = PluginTree::new();
    tree.add(
        "vm",
        "plugins:\n  - implementation: runing_vm\n    name: x\n",
    );

    let err = tree.manager().list().unwrap_err();
    let DiscoveryError::UnknownImplementation {
        implementation,
        suggestion,
        ..
    } = err
    else {
        panic!("expected UnknownImplementation, got {err:?}");
    };
    assert_eq!(implementation, "runing_vm");
    assert_eq!(suggestion.as_deref(), Some("running_vm"));
}

#[test]
fn malformed_manifest_is_fatal() {
    let tree = PluginTree::new();
    tree.add("broken", "plugins:\n  - implementation: [unclosed\n");
    let err = tree.manager().discover_all().unwrap_err();
    assert!(
        matches!(err, DiscoveryError::ManifestParse { .. }),
        "got {err:?}"
    );
}

#[test]
fn config_for_unknown_machine_controller() {
    let tree = PluginTree::new();
    let config = rangeforge::config::MachineConfig::from_yaml(
        "vm_name: target1\nos: linux\nvm_controller:\n  vm_type: hyperv\n",
    )
    .unwrap();
    let err = tree.manager().machine(config).unwrap_err();
    assert!(matches!(err, RangeForgeError::Config(_)), "got {err:?}");
}
