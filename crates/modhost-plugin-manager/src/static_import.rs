//! Plugins linked into the program.
//!
//! A host registers its static plugins with
//! [`Registry::import_static_plugin`](crate::Registry::import_static_plugin)
//! before any manager is created. The pending list is drained into the
//! registry on first use, reading each plugin's `<name>.conf` from the
//! registry's [`ResourceStore`] under a group named after the plugin.

use modhost_config::Configuration;

use crate::abi::PLUGIN_VERSION;
use crate::error::RegistryError;
use crate::record::{PluginRecord, StaticInstancer};
use crate::resource::ResourceStore;

/// A plugin compiled into the program.
#[derive(Debug, Clone)]
pub struct StaticPlugin {
    name: String,
    version: i32,
    interface: String,
    instancer: StaticInstancer,
    initializer: fn(),
    finalizer: fn(),
}

fn noop() {}

impl StaticPlugin {
    /// A static plugin compiled against this crate's [`PLUGIN_VERSION`],
    /// with no initializer or finalizer.
    pub fn new(
        name: impl Into<String>,
        interface: impl Into<String>,
        instancer: StaticInstancer,
    ) -> Self {
        Self {
            name: name.into(),
            version: PLUGIN_VERSION,
            interface: interface.into(),
            instancer,
            initializer: noop,
            finalizer: noop,
        }
    }

    /// Report another plugin version.
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Called when a manager claims the plugin.
    pub fn with_initializer(mut self, initializer: fn()) -> Self {
        self.initializer = initializer;
        self
    }

    /// Called when the claiming manager is destroyed.
    pub fn with_finalizer(mut self, finalizer: fn()) -> Self {
        self.finalizer = finalizer;
        self
    }

    /// Plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugin version the plugin was compiled against.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Interface tag.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub(crate) fn instancer(&self) -> StaticInstancer {
        self.instancer
    }

    pub(crate) fn initializer(&self) -> fn() {
        self.initializer
    }

    pub(crate) fn finalizer(&self) -> fn() {
        self.finalizer
    }
}

/// Static plugins waiting to be drained into the registry.
#[derive(Debug)]
pub(crate) struct PendingImports {
    // `None` once drained.
    pending: Option<Vec<StaticPlugin>>,
}

impl PendingImports {
    pub(crate) fn new() -> Self {
        Self {
            pending: Some(Vec::new()),
        }
    }

    pub(crate) fn push(&mut self, plugin: StaticPlugin) -> Result<(), RegistryError> {
        if plugin.version != PLUGIN_VERSION {
            return Err(RegistryError::WrongStaticVersion {
                plugin: plugin.name,
                expected: PLUGIN_VERSION,
                actual: plugin.version,
            });
        }
        let Some(pending) = self.pending.as_mut() else {
            return Err(RegistryError::TooLateToImport {
                plugin: plugin.name,
            });
        };
        if pending.iter().any(|p| p.name == plugin.name) {
            return Err(RegistryError::DuplicateStaticPlugin {
                plugin: plugin.name,
            });
        }
        pending.push(plugin);
        Ok(())
    }

    pub(crate) fn is_drained(&self) -> bool {
        self.pending.is_none()
    }

    /// Take the pending list. Only the first call returns `Some`.
    pub(crate) fn take(&mut self) -> Option<Vec<StaticPlugin>> {
        self.pending.take()
    }
}

/// Build the record of a static plugin, reading its metadata resource.
pub(crate) fn static_record(plugin: StaticPlugin, resources: &ResourceStore) -> PluginRecord {
    let file = format!("{}.conf", plugin.name());
    let configuration = match resources.get_string(plugin.name(), &file) {
        Some(text) => Configuration::parse(&text).unwrap_or_else(|e| {
            tracing::warn!(
                plugin = %plugin.name(),
                error = %e,
                "Cannot parse metadata resource of static plugin"
            );
            Configuration::empty()
        }),
        None => {
            tracing::debug!(plugin = %plugin.name(), file = %file, "Static plugin has no metadata resource");
            Configuration::empty()
        }
    };
    PluginRecord::from_static(plugin, configuration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::PluginInstance;
    use crate::state::LoadState;

    struct Canary;
    impl PluginInstance for Canary {}

    fn canary() -> StaticPlugin {
        StaticPlugin::new("Canary", "cz.mosra.Animal/1.0", |_| Box::new(Canary))
    }

    #[test]
    fn test_push_rejects_wrong_version() {
        let mut pending = PendingImports::new();
        let err = pending.push(canary().with_version(PLUGIN_VERSION + 1));
        assert_eq!(
            err,
            Err(RegistryError::WrongStaticVersion {
                plugin: "Canary".to_string(),
                expected: PLUGIN_VERSION,
                actual: PLUGIN_VERSION + 1,
            })
        );
    }

    #[test]
    fn test_push_after_take_is_too_late() {
        let mut pending = PendingImports::new();
        assert_eq!(pending.push(canary()), Ok(()));
        assert_eq!(pending.take().map(|p| p.len()), Some(1));
        assert!(pending.is_drained());
        assert!(pending.take().is_none());
        assert!(matches!(
            pending.push(canary()),
            Err(RegistryError::TooLateToImport { .. })
        ));
    }

    #[test]
    fn test_push_rejects_duplicate() {
        let mut pending = PendingImports::new();
        assert_eq!(pending.push(canary()), Ok(()));
        assert!(matches!(
            pending.push(canary()),
            Err(RegistryError::DuplicateStaticPlugin { .. })
        ));
    }

    #[test]
    fn test_static_record_reads_resource() {
        let resources = ResourceStore::new();
        resources.register("Canary", "Canary.conf", &b"depends=Bird\n[data]\ncolor=yellow\n"[..]);
        let record = static_record(canary(), &resources);
        assert_eq!(record.load_state(), LoadState::Static);
        assert_eq!(record.metadata().depends(), ["Bird"]);
        assert_eq!(record.metadata().data().value("color"), Some("yellow"));
        assert_eq!(record.static_interface(), Some("cz.mosra.Animal/1.0"));
    }

    #[test]
    fn test_static_record_without_resource_is_empty() {
        let record = static_record(canary(), &ResourceStore::new());
        assert_eq!(record.load_state(), LoadState::Static);
        assert!(record.metadata().depends().is_empty());
    }
}
