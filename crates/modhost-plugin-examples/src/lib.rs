//! Sample plugin of the `cz.mosra.Animal/1.0` interface.
//!
//! Built as a `cdylib`, the library is a dynamic plugin module. Copy it into
//! a plugin directory as `Canine` plus the platform module suffix, write
//! [`METADATA`] next to it as `Canine.conf` and load it with
//! [`Manager::load`](modhost_plugin_manager::Manager::load).

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

use std::sync::atomic::{AtomicUsize, Ordering};

use modhost_plugin_manager::PluginInstance;

/// Interface tag the plugin implements.
pub const INTERFACE: &str = "cz.mosra.Animal/1.0";

/// Metadata shipped next to the module.
pub const METADATA: &str = "\
# Canine plugin
[data]
name=Canine
legCount=4
hasTail=true
";

static LOADED: AtomicUsize = AtomicUsize::new(0);

/// A dog. Refuses deletion while it has not been walked.
#[derive(Debug, Default)]
pub struct Canine {
    plugin: String,
    walks: u32,
}

impl Canine {
    /// A dog created by the `plugin` plugin.
    pub fn new(plugin: &str) -> Self {
        Self {
            plugin: plugin.to_string(),
            walks: 0,
        }
    }

    /// Name of the plugin that created this dog.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Take the dog for a walk.
    pub fn walk(&mut self) -> u32 {
        self.walks += 1;
        self.walks
    }

    /// Walks so far.
    pub fn walks(&self) -> u32 {
        self.walks
    }
}

impl PluginInstance for Canine {
    fn can_be_deleted(&self) -> bool {
        self.walks > 0
    }
}

/// Number of times the module was initialized and not yet finalized.
pub fn loaded_count() -> usize {
    LOADED.load(Ordering::SeqCst)
}

fn initialize() {
    LOADED.fetch_add(1, Ordering::SeqCst);
    tracing::debug!(plugin = "Canine", "Plugin initialized");
}

fn finalize() {
    LOADED.fetch_sub(1, Ordering::SeqCst);
    tracing::debug!(plugin = "Canine", "Plugin finalized");
}

fn create(plugin: &str) -> Box<dyn PluginInstance> {
    Box::new(Canine::new(plugin))
}

modhost_plugin_manager::export_plugin! {
    interface: "cz.mosra.Animal/1.0",
    instancer: create,
    initializer: initialize,
    finalizer: finalize,
}
