//! The table of every known plugin.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;

use crate::error::RegistryError;
use crate::metadata::DependentChange;
use crate::record::PluginRecord;
use crate::resource::ResourceStore;
use crate::static_import::{PendingImports, StaticPlugin, static_record};

/// Every plugin known to the program, across all managers and interfaces.
///
/// Plugin names are unique registry-wide. Create one registry per program
/// and hand it to every [`Manager`](crate::Manager) as `Rc<Registry>`.
/// Records are only changed by the manager owning them.
///
/// Static plugins registered with [`import_static_plugin`] are moved into
/// the table on first access. Importing after that point is an error.
///
/// [`import_static_plugin`]: Registry::import_static_plugin
#[derive(Debug)]
pub struct Registry {
    records: RefCell<BTreeMap<String, PluginRecord>>,
    imports: RefCell<PendingImports>,
    resources: ResourceStore,
    // Plugins whose dependencies are being resolved, outermost first.
    resolving: RefCell<Vec<String>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            records: RefCell::new(BTreeMap::new()),
            imports: RefCell::new(PendingImports::new()),
            resources: ResourceStore::new(),
            resolving: RefCell::new(Vec::new()),
        }
    }

    /// Embedded resources, including static plugin metadata.
    pub fn resources(&self) -> &ResourceStore {
        &self.resources
    }

    /// Queue a static plugin for import.
    ///
    /// # Errors
    ///
    /// Fails if the plugin was compiled against another plugin version, if
    /// a plugin of the same name is already queued, or if the registry was
    /// already accessed and the queue drained.
    pub fn import_static_plugin(&self, plugin: StaticPlugin) -> Result<(), RegistryError> {
        let name = plugin.name().to_string();
        self.imports.borrow_mut().push(plugin).inspect_err(|e| {
            tracing::error!(plugin = %name, error = %e, "Cannot import static plugin");
        })?;
        tracing::debug!(plugin = %name, "Queued static plugin");
        Ok(())
    }

    /// Move queued static plugins into the table. Returns how many were
    /// imported; every call after the first returns 0.
    pub fn drain_static_imports(&self) -> usize {
        let Some(plugins) = self.imports.borrow_mut().take() else {
            return 0;
        };

        let mut imported = 0;
        for plugin in plugins {
            let record = static_record(plugin, &self.resources);
            let name = record.name().to_string();
            let mut records = self.records.borrow_mut();
            if records.contains_key(&name) {
                tracing::error!(plugin = %name, "Static plugin name already taken, skipping");
                continue;
            }
            records.insert(name.clone(), record);
            imported += 1;
            tracing::debug!(plugin = %name, "Imported static plugin");
        }
        imported
    }

    /// Whether static imports were drained.
    pub fn is_drained(&self) -> bool {
        self.imports.borrow().is_drained()
    }

    /// Record of `name`.
    pub fn find(&self, name: &str) -> Option<Ref<'_, PluginRecord>> {
        self.drain_static_imports();
        Ref::filter_map(self.records.borrow(), |records| records.get(name)).ok()
    }

    /// Whether `name` is known.
    pub fn contains(&self, name: &str) -> bool {
        self.drain_static_imports();
        self.records.borrow().contains_key(name)
    }

    /// All plugin names, sorted.
    pub fn plugin_names(&self) -> Vec<String> {
        self.names_where(|_| true)
    }

    /// Number of known plugins.
    pub fn len(&self) -> usize {
        self.drain_static_imports();
        self.records.borrow().len()
    }

    /// Whether no plugin is known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add `record` unless its name is taken.
    pub(crate) fn insert(&self, record: PluginRecord) -> bool {
        self.drain_static_imports();
        let mut records = self.records.borrow_mut();
        if records.contains_key(record.name()) {
            return false;
        }
        records.insert(record.name().to_string(), record);
        true
    }

    pub(crate) fn erase(&self, name: &str) -> Option<PluginRecord> {
        self.drain_static_imports();
        self.records.borrow_mut().remove(name)
    }

    pub(crate) fn find_mut(&self, name: &str) -> Option<RefMut<'_, PluginRecord>> {
        self.drain_static_imports();
        RefMut::filter_map(self.records.borrow_mut(), |records| records.get_mut(name)).ok()
    }

    /// Sorted names of records matching `predicate`.
    pub(crate) fn names_where(&self, predicate: impl Fn(&PluginRecord) -> bool) -> Vec<String> {
        self.drain_static_imports();
        self.records
            .borrow()
            .values()
            .filter(|record| predicate(record))
            .map(|record| record.name().to_string())
            .collect()
    }

    /// Remove records matching `predicate` and return them.
    pub(crate) fn remove_where(
        &self,
        predicate: impl Fn(&PluginRecord) -> bool,
    ) -> Vec<PluginRecord> {
        let names = self.names_where(&predicate);
        let mut records = self.records.borrow_mut();
        names
            .iter()
            .filter_map(|name| records.remove(name))
            .collect()
    }

    /// Update the dependents of a plugin no manager owns any more.
    pub(crate) fn record_orphan_dependent(
        &self,
        dependency: &str,
        dependent: &str,
        change: DependentChange,
    ) {
        let metadata = self.find(dependency).map(|record| record.metadata().clone());
        if let Some(metadata) = metadata {
            tracing::debug!(
                plugin = %dependency,
                dependent = %dependent,
                change = ?change,
                "Updating dependents of unowned plugin"
            );
            metadata.record_dependent(dependent, change);
        }
    }

    /// Mark `name` as being resolved. Returns `false` if it already is.
    pub(crate) fn enter_resolution(&self, name: &str) -> bool {
        let mut resolving = self.resolving.borrow_mut();
        if resolving.iter().any(|n| n == name) {
            return false;
        }
        resolving.push(name.to_string());
        true
    }

    pub(crate) fn leave_resolution(&self, name: &str) {
        let mut resolving = self.resolving.borrow_mut();
        if let Some(position) = resolving.iter().rposition(|n| n == name) {
            resolving.remove(position);
        }
    }

    /// Chain of plugins currently being resolved, outermost first.
    pub fn resolution_chain(&self) -> Vec<String> {
        self.resolving.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::PluginInstance;
    use crate::state::LoadState;

    struct Canary;
    impl PluginInstance for Canary {}

    fn canary(name: &str) -> StaticPlugin {
        StaticPlugin::new(name, "cz.mosra.Animal/1.0", |_| Box::new(Canary))
    }

    #[test]
    fn test_static_imports_drain_on_first_find() -> Result<(), RegistryError> {
        let registry = Registry::new();
        registry.import_static_plugin(canary("Canary"))?;
        assert!(!registry.is_drained());

        let state = registry.find("Canary").map(|r| r.load_state());
        assert_eq!(state, Some(LoadState::Static));
        assert!(registry.is_drained());
        assert_eq!(registry.drain_static_imports(), 0);
        Ok(())
    }

    #[test]
    fn test_import_after_drain_is_too_late() -> Result<(), RegistryError> {
        let registry = Registry::new();
        registry.import_static_plugin(canary("Canary"))?;
        assert_eq!(registry.drain_static_imports(), 1);
        assert!(matches!(
            registry.import_static_plugin(canary("Parrot")),
            Err(RegistryError::TooLateToImport { .. })
        ));
        assert!(!registry.contains("Parrot"));
        Ok(())
    }

    #[test]
    fn test_names_are_sorted() -> Result<(), RegistryError> {
        let registry = Registry::new();
        for name in ["Zebra", "Canary", "Mouse"] {
            registry.import_static_plugin(canary(name))?;
        }
        assert_eq!(registry.plugin_names(), ["Canary", "Mouse", "Zebra"]);
        assert_eq!(registry.len(), 3);
        Ok(())
    }

    #[test]
    fn test_resolution_guard() {
        let registry = Registry::new();
        assert!(registry.enter_resolution("A"));
        assert!(registry.enter_resolution("B"));
        assert!(!registry.enter_resolution("A"));
        assert_eq!(registry.resolution_chain(), ["A", "B"]);
        registry.leave_resolution("B");
        registry.leave_resolution("A");
        assert!(registry.resolution_chain().is_empty());
    }

    #[test]
    fn test_orphan_dependents() -> Result<(), RegistryError> {
        let registry = Registry::new();
        registry.import_static_plugin(canary("Canary"))?;
        registry.record_orphan_dependent("Canary", "Cage", DependentChange::Added);
        let used_by = registry.find("Canary").map(|r| r.metadata().used_by());
        assert_eq!(used_by, Some(vec!["Cage".to_string()]));
        registry.record_orphan_dependent("Canary", "Cage", DependentChange::Removed);
        assert_eq!(
            registry.find("Canary").map(|r| r.metadata().is_used()),
            Some(false)
        );
        Ok(())
    }
}
