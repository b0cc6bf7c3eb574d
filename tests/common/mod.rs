//! Shared integration-test harness: temporary plugin trees and a helper
//! for running the `rangeforge` binary.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;

use rangeforge::observability::{AttackLog, AttackLogger};
use rangeforge::registry::{MANIFEST_NAME, PluginManager};
use tempfile::TempDir;

/// A plugin tree in a temporary directory.
pub struct PluginTree {
    dir: TempDir,
}

impl PluginTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a manifest into `rel` and returns its path.
    pub fn add(&self, rel: &str, manifest: &str) -> PathBuf {
        self.add_file(rel, MANIFEST_NAME, manifest)
    }

    pub fn add_file(&self, rel: &str, name: &str, contents: &str) -> PathBuf {
        let dir = self.dir.path().join(rel);
        std::fs::create_dir_all(&dir).expect("failed to create plugin dir");
        let path = dir.join(name);
        std::fs::write(&path, contents).expect("failed to write plugin file");
        path
    }

    /// Glob selecting every manifest of the tree.
    pub fn pattern(&self) -> String {
        format!("{}/**/{MANIFEST_NAME}", self.dir.path().display())
    }

    pub fn manager(&self) -> PluginManager {
        PluginManager::new(logger()).with_pattern(self.pattern())
    }
}

pub fn logger() -> Arc<dyn AttackLogger> {
    Arc::new(AttackLog::tracing_only())
}

/// Glob selecting the plugins shipped with the crate.
pub fn shipped_pattern() -> String {
    format!("{}/plugins/**/{MANIFEST_NAME}", env!("CARGO_MANIFEST_DIR"))
}

/// Runs the binary with `args`, quietly and without colors.
pub fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rangeforge"))
        .args(args)
        .env_remove("RANGEFORGE_PLUGINS")
        .env_remove("RANGEFORGE_EVENTS")
        .env("RANGEFORGE_COLOR", "never")
        .output()
        .expect("failed to run rangeforge")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
