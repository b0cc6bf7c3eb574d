//! Attack running a configured command on the attacker machine.
//!
//! Configuration:
//!
//! ```yaml
//! command: nmap -sn ${targets}   # required
//! disown: false                  # detach from the command
//! cleanup: rm -f scan.xml        # optional, run during teardown
//! ```
//!
//! `${targets}` expands to every target separated by spaces and
//! `${target}` to the first one. Each target is shell-quoted.

use std::borrow::Cow;

use super::{optional_command, required_command};
use crate::error::{ConfigError, PluginResult};
use crate::plugin::{AttackPlugin, PluginBase, PluginContext};

/// Generic attack plugin.
#[derive(Debug, Default)]
pub struct CommandAttack;

impl PluginBase for CommandAttack {
    fn teardown(&mut self, ctx: &mut PluginContext<'_>) -> PluginResult<()> {
        if let Some(cleanup) = optional_command(ctx, "cleanup", &[]) {
            ctx.attacker_run_cmd(&cleanup, false)?;
        }
        Ok(())
    }
}

impl AttackPlugin for CommandAttack {
    fn run(&mut self, ctx: &mut PluginContext<'_>, targets: &[String]) -> PluginResult<String> {
        let quoted = quote_targets(targets)?;
        let extra = [
            ("targets", quoted.join(" ")),
            ("target", quoted.first().cloned().unwrap_or_default()),
        ];
        let command = required_command(ctx, "command", &extra)?;
        let disown = ctx.conf_flag("disown");
        ctx.vprint(&format!("Attacking {} with {}", targets.join(", "), ctx.name()), 2);
        ctx.attacker_run_cmd(&command, disown)
    }
}

/// Quotes every target for the attacker's shell.
fn quote_targets(targets: &[String]) -> PluginResult<Vec<String>> {
    targets
        .iter()
        .map(|target| {
            shlex::try_quote(target)
                .map(Cow::into_owned)
                .map_err(|e| {
                    ConfigError::InvalidValue {
                        field: "targets".to_owned(),
                        value: target.clone(),
                        expected: format!("a shell-quotable address ({e})"),
                    }
                    .into()
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::config::plugin_config::parse_conf;
    use crate::error::{ConfigError, MachineRole, PluginError};
    use crate::machinery::MachineRegistry;
    use crate::machinery::fake::{CallLog, FakeMachinery, fake_machine, logger};
    use crate::plugin::{Capability, ImplementationInfo, LoadedPlugin, Operation, PluginDescriptor, PluginKind};

    const INFO: ImplementationInfo = ImplementationInfo {
        id: "command_attack",
        operations: &[Operation::Run],
        ssh_mixin: false,
        reusable: true,
    };

    fn attack(conf: &str) -> LoadedPlugin {
        let mut d = PluginDescriptor::new(Capability::Attack, INFO, "nmap/plugin.yaml");
        d.name = Some("nmap".to_owned());
        d.ttp = Some("T1046".to_owned());
        let mut plugin =
            LoadedPlugin::new(Arc::new(d), PluginKind::Attack(Box::new(CommandAttack)), logger())
                .unwrap();
        plugin
            .process_config(parse_conf(conf, Path::new("conf.yaml")).unwrap())
            .unwrap();
        plugin
    }

    fn bound(plugin: &mut LoadedPlugin, log: &CallLog) -> MachineRegistry {
        let mut machines = MachineRegistry::new();
        let attacker = machines.add(fake_machine("attacker", FakeMachinery::new("attacker", log.clone())));
        let target = machines.add(fake_machine("target1", FakeMachinery::new("target1", log.clone())));
        plugin.set_attacker_machine(attacker);
        plugin.set_target_machine(target);
        machines
    }

    #[test]
    fn command_gets_targets() {
        let log = CallLog::default();
        let mut plugin = attack("command: nmap -p ${ports} ${targets}\nports: 22,80\n");
        let mut machines = bound(&mut plugin, &log);

        let targets = vec!["10.0.0.5".to_owned(), "10.0.0.6".to_owned()];
        let out = plugin.execute(&mut machines, &targets).unwrap();

        assert_eq!(out, "ran nmap -p 22,80 10.0.0.5 10.0.0.6");
        assert_eq!(
            log.calls(),
            vec!["attacker: run nmap -p 22,80 10.0.0.5 10.0.0.6 (disown=false)"]
        );
    }

    #[test]
    fn first_target_and_disown() {
        let log = CallLog::default();
        let mut plugin = attack("command: hydra ${target}\ndisown: true\n");
        let mut machines = bound(&mut plugin, &log);

        plugin
            .execute(&mut machines, &["10.0.0.7".to_owned(), "10.0.0.8".to_owned()])
            .unwrap();
        assert_eq!(log.calls(), vec!["attacker: run hydra 10.0.0.7 (disown=true)"]);
    }

    #[test]
    fn targets_cannot_inject_commands() {
        let log = CallLog::default();
        let mut plugin = attack("command: ping -c 1 ${target}\n");
        let mut machines = bound(&mut plugin, &log);

        let out = plugin
            .execute(&mut machines, &["10.0.0.5; reboot".to_owned()])
            .unwrap();

        let command = out.strip_prefix("ran ").unwrap();
        assert_eq!(
            shlex::split(command).unwrap(),
            vec!["ping", "-c", "1", "10.0.0.5; reboot"]
        );
    }

    #[test]
    fn unquotable_target_is_config_error() {
        let log = CallLog::default();
        let mut plugin = attack("command: ping ${targets}\n");
        let mut machines = bound(&mut plugin, &log);

        let err = plugin
            .execute(&mut machines, &["10.0.0.5\0".to_owned()])
            .unwrap_err();
        assert!(matches!(
            err,
            PluginError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "targets"
        ));
        assert!(log.calls().is_empty());
    }

    #[test]
    fn cleanup_runs_in_teardown() {
        let log = CallLog::default();
        let mut plugin = attack("command: scan\ncleanup: rm -f scan.xml\n");
        let mut machines = bound(&mut plugin, &log);

        plugin.execute(&mut machines, &[]).unwrap();
        assert_eq!(
            log.calls(),
            vec![
                "attacker: run scan (disown=false)",
                "attacker: run rm -f scan.xml (disown=false)",
            ]
        );
    }

    #[test]
    fn missing_command_is_config_error() {
        let log = CallLog::default();
        let mut plugin = attack("disown: true\n");
        let mut machines = bound(&mut plugin, &log);

        let err = plugin.execute(&mut machines, &[]).unwrap_err();
        assert!(matches!(
            err,
            PluginError::Config(ConfigError::MissingRequired { ref field, .. }) if field == "command"
        ));
        assert!(log.calls().is_empty());
    }

    #[test]
    fn unbound_attacker_is_binding_error() {
        let mut plugin = attack("command: scan\n");
        let err = plugin.execute(&mut MachineRegistry::new(), &[]).unwrap_err();
        assert!(matches!(
            err,
            PluginError::Binding { role: MachineRole::Attacker, .. }
        ));
    }
}
