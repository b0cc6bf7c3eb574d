//! Command-line interface
//!
//! Argument parsing and command dispatch for the `rangeforge` binary.

pub mod args;
pub mod commands;
