//! Configuration module
//!
//! Plugin configuration binding (defaults plus overrides) and per-machine
//! configuration.

pub mod machine;
pub mod plugin_config;

pub use machine::{MachineConfig, VmControllerConfig};
pub use plugin_config::{
    DEFAULT_CONFIG_NAME, PluginConf, load_default_config, merge_conf, raw_default_config,
};
