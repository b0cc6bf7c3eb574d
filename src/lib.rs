//! `RangeForge` - plugin framework for cyber-range experiments
//!
//! This library discovers, validates, configures and drives the plugins of
//! a cyber-range run: attacks, machine controllers, sensors and injected
//! vulnerabilities.

pub mod cli;
pub mod config;
pub mod error;
pub mod machinery;
pub mod observability;
pub mod plugin;
pub mod plugins;
pub mod registry;
pub mod validation;
