//! Plugin validation
//!
//! Static inspection of discovered plugins before they are used: missing
//! metadata, required operations the implementation never provides,
//! malformed technique identifiers, and plugin identities used twice.
//!
//! Validation collects ALL issues (doesn't stop at first). Issues are
//! returned, never raised; the caller decides whether they are fatal.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Severity, ValidationIssue};
use crate::plugin::{Capability, LoadedPlugin, Operation, PluginDescriptor, TTP_UNKNOWN};

/// Technique marker for plugins covering several techniques.
pub const TTP_MULTIPLE: &str = "multiple";

/// Short technique identifier: `T1234`.
static TTP_SHORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^T[0-9]{4}$").expect("valid regex"));

/// Detailed technique identifier: `T1234.123`.
static TTP_DETAILED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^T[0-9]{4}\.[0-9]{3}$").expect("valid regex"));

// ============================================================================
// Public API
// ============================================================================

/// Whether `ttp` is not a usable technique identifier.
///
/// Valid are `T1234`, `T1234.123`, `???` and `multiple`; absent is invalid.
#[must_use]
pub fn is_ttp_wrong(ttp: Option<&str>) -> bool {
    let Some(ttp) = ttp else {
        return true;
    };
    !(TTP_SHORT_RE.is_match(ttp)
        || TTP_DETAILED_RE.is_match(ttp)
        || ttp == TTP_UNKNOWN
        || ttp == TTP_MULTIPLE)
}

/// Plugin validator.
///
/// Per-plugin checks are stateless. Identity checks remember every name and
/// implementation seen by this validator, so one validator covers one
/// discovery pass.
#[derive(Debug, Default)]
pub struct Validator {
    issues: Vec<ValidationIssue>,
    names: HashMap<String, String>,
    implementations: HashMap<&'static str, String>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks one plugin on its own.
    pub fn check(&mut self, plugin: &LoadedPlugin) -> Vec<ValidationIssue> {
        self.check_descriptor(plugin.descriptor())
    }

    /// Checks `plugins` in order: identity issues of each plugin followed by
    /// its own issues.
    pub fn check_all(&mut self, plugins: &[LoadedPlugin]) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for plugin in plugins {
            issues.extend(self.check_identity(plugin.descriptor()));
            issues.extend(self.check(plugin));
        }
        issues
    }

    /// Checks metadata and required operations of one descriptor.
    pub fn check_descriptor(&mut self, descriptor: &PluginDescriptor) -> Vec<ValidationIssue> {
        self.issues.clear();
        let path = descriptor.plugin_path.display().to_string();
        let name = descriptor.display_name();

        if descriptor.name.is_none() {
            self.add_error(&path, format!("No name for plugin: in {path}"));
        }

        if descriptor.description.is_none() {
            self.add_error(&path, format!("No description in plugin: {name} in {path}"));
        }

        for operation in descriptor.capability.required_operations() {
            if !descriptor.implementation.implements(*operation) {
                if *operation == Operation::GetIp && descriptor.implementation.ssh_mixin {
                    tracing::debug!(
                        plugin = name,
                        "get_ip of the ssh transport helper does not count as an implementation"
                    );
                }
                self.add_error(
                    &path,
                    format!("Method '{operation}' not implemented in {name} in {path}"),
                );
            }
        }

        if descriptor.capability.requires_ttp() && is_ttp_wrong(descriptor.get_ttp()) {
            let kind = match descriptor.capability {
                Capability::Vulnerability => "Vulnerability",
                _ => "Attack",
            };
            self.add_error(
                &path,
                format!(
                    "{kind} plugins need a valid ttp number (either T1234, T1234.222 or ???)  {name} uses {} in {path}",
                    descriptor.get_ttp().unwrap_or("none")
                ),
            );
        }

        std::mem::take(&mut self.issues)
    }

    /// Records the identity of `descriptor`, reporting a name or an
    /// implementation already recorded for another plugin.
    ///
    /// Each finding names the most recent previous occurrence, so `n` uses
    /// of one identity produce `n - 1` issues.
    pub fn check_identity(&mut self, descriptor: &PluginDescriptor) -> Vec<ValidationIssue> {
        self.issues.clear();
        let path = descriptor.plugin_path.display().to_string();

        if let Some(name) = &descriptor.name
            && let Some(previous) = self.names.insert(name.clone(), path.clone())
        {
            self.add_error(
                &path,
                format!("Name duplication: {name} is used in {previous} and {path}"),
            );
        }

        let implementation = descriptor.implementation;
        if !implementation.reusable
            && let Some(previous) = self.implementations.insert(implementation.id, path.clone())
        {
            self.add_error(
                &path,
                format!(
                    "Implementation duplication: {} is used in {previous} and {path}",
                    implementation.id
                ),
            );
        }

        std::mem::take(&mut self.issues)
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    /// Adds an error to the collection.
    fn add_error(&mut self, path: &str, message: String) {
        self.issues.push(ValidationIssue {
            path: path.to_string(),
            message,
            severity: Severity::Error,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
