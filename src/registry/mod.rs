//! Plugin registry
//!
//! Compiled-in implementations ([`PluginCatalog`]), the on-disk manifest
//! declaring plugins ([`PluginManifest`]), and discovery tying the two
//! together ([`PluginManager`]).

pub mod catalog;
pub mod discovery;
pub mod manifest;

pub use catalog::{Builder, PluginCatalog, PluginFactory};
pub use discovery::{DEFAULT_PLUGIN_GLOB, PluginListing, PluginManager};
pub use manifest::{MANIFEST_NAME, ManifestEntry, PluginManifest, load_manifest};
