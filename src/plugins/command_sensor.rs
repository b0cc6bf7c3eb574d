//! Sensor fetching files from its machine.
//!
//! Configuration:
//!
//! ```yaml
//! command: journalctl -o json > /tmp/journal.json   # optional, run first
//! files: [/tmp/journal.json, /var/log/auth.log]     # fetched to the host
//! output_dir: loot                                  # relative to the plugin dir
//! ```

use std::path::{Path, PathBuf};

use serde_yaml::Value;

use super::optional_command;
use crate::error::{ConfigError, PluginResult};
use crate::plugin::templates::value_to_string;
use crate::plugin::{PluginBase, PluginContext, SensorPlugin};

/// Directory collected files land in when `output_dir` is not configured.
const DEFAULT_OUTPUT_DIR: &str = "collected";

/// Generic sensor plugin.
#[derive(Debug, Default)]
pub struct CommandSensor;

impl PluginBase for CommandSensor {}

impl SensorPlugin for CommandSensor {
    fn collect(&mut self, ctx: &mut PluginContext<'_>) -> PluginResult<Vec<PathBuf>> {
        if let Some(command) = optional_command(ctx, "command", &[]) {
            ctx.run_cmd(&command, false)?;
        }

        let files = remote_files(ctx)?;
        let output_dir = output_dir(ctx);
        std::fs::create_dir_all(&output_dir)?;

        let mut collected = Vec::with_capacity(files.len());
        for remote in files {
            let Some(file_name) = Path::new(&remote).file_name() else {
                return Err(ConfigError::InvalidValue {
                    field: "files".to_string(),
                    value: remote,
                    expected: "a path naming a file".to_string(),
                }
                .into());
            };
            let local = output_dir.join(file_name);
            ctx.vprint(&format!("Collecting {remote} to {}", local.display()), 2);
            ctx.get_from_machine(&remote, &local)?;
            collected.push(local);
        }
        Ok(collected)
    }
}

fn remote_files(ctx: &PluginContext<'_>) -> PluginResult<Vec<String>> {
    match ctx.conf().get("files") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(single)) => Ok(vec![single.clone()]),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_owned).ok_or_else(|| {
                    ConfigError::InvalidValue {
                        field: "files".to_string(),
                        value: value_to_string(item),
                        expected: "a list of remote paths".to_string(),
                    }
                    .into()
                })
            })
            .collect(),
        Some(other) => Err(ConfigError::InvalidValue {
            field: "files".to_string(),
            value: value_to_string(other),
            expected: "a list of remote paths".to_string(),
        }
        .into()),
    }
}

fn output_dir(ctx: &PluginContext<'_>) -> PathBuf {
    let configured = ctx
        .conf_str("output_dir")
        .filter(|dir| !dir.is_empty())
        .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_owned());
    ctx.plugin_dir().join(configured)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::plugin_config::parse_conf;
    use crate::error::{MachineRole, PluginError};
    use crate::machinery::MachineRegistry;
    use crate::machinery::fake::{CallLog, FakeMachinery, fake_machine, logger};
    use crate::plugin::{Capability, ImplementationInfo, LoadedPlugin, Operation, PluginDescriptor, PluginKind};

    const INFO: ImplementationInfo = ImplementationInfo {
        id: "command_sensor",
        operations: &[Operation::Collect],
        ssh_mixin: false,
        reusable: true,
    };

    fn sensor(dir: &Path, conf: &str) -> LoadedPlugin {
        let mut d = PluginDescriptor::new(Capability::Sensor, INFO, dir.join("plugin.yaml"));
        d.name = Some("auth_log".to_owned());
        let mut plugin =
            LoadedPlugin::new(Arc::new(d), PluginKind::Sensor(Box::new(CommandSensor)), logger())
                .unwrap();
        plugin
            .process_config(parse_conf(conf, Path::new("conf.yaml")).unwrap())
            .unwrap();
        plugin
    }

    #[test]
    fn collects_files_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log = CallLog::default();
        let mut plugin = sensor(
            dir.path(),
            "command: sync-logs\nfiles: [/var/log/auth.log, /tmp/x.json]\noutput_dir: loot\n",
        );
        let mut machines = MachineRegistry::new();
        plugin.set_machine(machines.add(fake_machine("target1", FakeMachinery::new("target1", log.clone()))));

        let collected = plugin.collect(&mut machines).unwrap();

        let loot = dir.path().join("loot");
        assert_eq!(collected, vec![loot.join("auth.log"), loot.join("x.json")]);
        assert_eq!(
            std::fs::read_to_string(loot.join("auth.log")).unwrap(),
            "contents of /var/log/auth.log"
        );
        assert_eq!(
            log.calls(),
            vec![
                "target1: run sync-logs (disown=false)",
                "target1: get /var/log/auth.log",
                "target1: get /tmp/x.json",
            ]
        );
    }

    #[test]
    fn single_file_and_default_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log = CallLog::default();
        let mut plugin = sensor(dir.path(), "files: /var/log/syslog\n");
        let mut machines = MachineRegistry::new();
        plugin.set_machine(machines.add(fake_machine("t", FakeMachinery::new("t", log))));

        let collected = plugin.collect(&mut machines).unwrap();
        assert_eq!(collected, vec![dir.path().join("collected").join("syslog")]);
    }

    #[test]
    fn nothing_configured_collects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = CallLog::default();
        let mut plugin = sensor(dir.path(), "");
        let mut machines = MachineRegistry::new();
        plugin.set_machine(machines.add(fake_machine("t", FakeMachinery::new("t", log.clone()))));

        assert!(plugin.collect(&mut machines).unwrap().is_empty());
        assert!(log.calls().is_empty());
    }

    #[test]
    fn invalid_files_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = sensor(dir.path(), "files: {a: 1}\n");
        let mut machines = MachineRegistry::new();
        plugin.set_machine(machines.add(fake_machine("t", FakeMachinery::new("t", CallLog::default()))));

        let err = plugin.collect(&mut machines).unwrap_err();
        assert!(matches!(err, PluginError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn unbound_machine_fails_before_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = sensor(dir.path(), "files: [/a]\n");
        let err = plugin.collect(&mut MachineRegistry::new()).unwrap_err();
        assert!(matches!(err, PluginError::Binding { role: MachineRole::Default, .. }));
    }
}
