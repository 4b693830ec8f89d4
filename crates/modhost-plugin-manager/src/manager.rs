//! Per-interface plugin manager.
//!
//! A [`Manager`] owns the registry records of the plugins it discovered in
//! its plugin directory, plus the static plugins of its interface it
//! claimed. It drives their load state machine:
//!
//! ```text
//!             load                      unload
//! NotLoaded ---------> Loaded ----------------------> NotLoaded
//!     ^  |                 |  Required / Used (no change)
//!     |  | failure         |  UnloadFailed (module stays unmapped)
//!     +--+                 v
//!
//! Static: absorbing, load and unload return Static
//! ```
//!
//! Dependencies are resolved through the registry and loaded by the manager
//! owning them, which may serve a different interface.

use std::cell::RefCell;
use std::ffi::{CStr, CString, c_void};
use std::path::PathBuf;
use std::ptr::NonNull;
use std::rc::{Rc, Weak};

use modhost_config::Configuration;

use crate::abi::{
    self, FINALIZER_SYMBOL, FinalizerFn, INITIALIZER_SYMBOL, INSTANCER_SYMBOL, INTERFACE_SYMBOL,
    InitializerFn, InstancerFn, InterfaceFn, PLUGIN_VERSION, VERSION_SYMBOL, VersionFn,
};
use crate::config::ManagerConfig;
use crate::instance::{Instance, InstanceKey, InstanceTracker, PluginInstance};
use crate::metadata::{DependentChange, PluginMetadata};
use crate::module::{LibraryLoader, ModuleHandle, ModuleLoader};
use crate::record::{Backing, PluginRecord, StaticInstancer};
use crate::registry::Registry;
use crate::state::LoadState;

/// Loads, unloads and instances the plugins of one interface.
///
/// Dropping the manager destroys every instance it tracks, including ones
/// that refuse deletion, then unloads every dynamic plugin it owns and
/// erases their records. Static plugins keep their records and lose their
/// owner, so a later manager for the same interface can claim them again.
///
/// # Panics
///
/// Dropping panics if an owned dynamic plugin cannot be unloaded because a
/// loaded plugin still depends on it. Plugins are unloaded in name order,
/// so a plugin whose name sorts before a loaded plugin depending on it
/// cannot be unloaded at that point; unload such chains explicitly first.
#[derive(Debug)]
pub struct Manager {
    shared: Rc<ManagerShared>,
}

impl Manager {
    /// Create a manager loading modules with [`LibraryLoader`].
    ///
    /// Scans the configured plugin directory and claims every unowned
    /// static plugin of the configured interface.
    pub fn new(registry: &Rc<Registry>, config: ManagerConfig) -> Self {
        Self::with_loader(registry, config, Rc::new(LibraryLoader::new()))
    }

    /// Create a manager loading modules with `loader`.
    pub fn with_loader(
        registry: &Rc<Registry>,
        config: ManagerConfig,
        loader: Rc<dyn ModuleLoader>,
    ) -> Self {
        let directory = config.plugin_directory.clone();
        let shared = Rc::new_cyclic(|this| ManagerShared {
            this: this.clone(),
            registry: Rc::clone(registry),
            loader,
            config: RefCell::new(config),
            instances: RefCell::new(InstanceTracker::new()),
        });
        shared.claim_static_plugins();
        shared.set_plugin_directory(directory);
        Self { shared }
    }

    /// Registry this manager works on.
    pub fn registry(&self) -> &Rc<Registry> {
        &self.shared.registry
    }

    /// Interface tag plugins must report.
    pub fn plugin_interface(&self) -> String {
        self.shared.config.borrow().interface.clone()
    }

    /// Current configuration.
    pub fn config(&self) -> ManagerConfig {
        self.shared.config.borrow().clone()
    }

    /// Directory scanned for plugins.
    pub fn plugin_directory(&self) -> PathBuf {
        self.shared.config.borrow().plugin_directory.clone()
    }

    /// Switch to another plugin directory and scan it.
    ///
    /// Records of owned plugins that are not loaded are dropped first, then
    /// every module file in `directory` whose name is not yet known is
    /// added. Loaded plugins are left alone even if their file is gone.
    ///
    /// Discovery keys on the module suffix, not the metadata suffix, so a
    /// module shipped without its metadata file is still listed, in state
    /// [`LoadState::WrongMetadataFile`]. A metadata file without a module is
    /// ignored.
    pub fn set_plugin_directory(&self, directory: impl Into<PathBuf>) {
        self.shared.set_plugin_directory(directory.into());
    }

    /// Scan the current plugin directory again.
    pub fn rescan_directory(&self) {
        let directory = self.plugin_directory();
        self.shared.set_plugin_directory(directory);
    }

    /// Names of the plugins this manager owns, sorted.
    pub fn plugin_list(&self) -> Vec<String> {
        self.shared.plugin_list()
    }

    /// Metadata of an owned plugin.
    pub fn metadata(&self, plugin: &str) -> Option<Rc<PluginMetadata>> {
        self.shared
            .owned(plugin, |record| Rc::clone(record.metadata()))
    }

    /// Parsed metadata file of an owned plugin.
    pub fn configuration(&self, plugin: &str) -> Option<Rc<Configuration>> {
        self.shared
            .owned(plugin, |record| Rc::clone(record.configuration()))
    }

    /// Load state of `plugin`, [`LoadState::NotFound`] if this manager does
    /// not own it.
    pub fn load_state(&self, plugin: &str) -> LoadState {
        self.shared
            .owned(plugin, PluginRecord::load_state)
            .unwrap_or(LoadState::NotFound)
    }

    /// Load `plugin` and, first, its dependencies.
    ///
    /// Returns [`LoadState::Loaded`] on success. Calling it on a plugin not
    /// in [`LoadState::NotLoaded`] changes nothing and returns its state.
    pub fn load(&self, plugin: &str) -> LoadState {
        self.shared.load(plugin)
    }

    /// Unload `plugin`, destroying its instances.
    ///
    /// Returns [`LoadState::NotLoaded`] on success. Calling it on a plugin
    /// not in [`LoadState::Loaded`] changes nothing and returns its state.
    pub fn unload(&self, plugin: &str) -> LoadState {
        self.shared.unload(plugin)
    }

    /// Unload and load `plugin` again.
    pub fn reload(&self, plugin: &str) -> LoadState {
        match self.shared.unload(plugin) {
            LoadState::NotLoaded => self.shared.load(plugin),
            state => state,
        }
    }

    /// Create an instance of a loaded or static plugin.
    pub fn instance(&self, plugin: &str) -> Option<Instance> {
        self.shared.instance(plugin)
    }

    /// Track an instance constructed outside the plugin's instancer.
    ///
    /// # Errors
    ///
    /// Hands `object` back if this manager does not own `plugin` or the
    /// plugin is neither loaded nor static.
    pub fn adopt_instance(
        &self,
        plugin: &str,
        object: Box<dyn PluginInstance>,
    ) -> Result<Instance, Box<dyn PluginInstance>> {
        self.shared.adopt(plugin, object)
    }

    /// Number of live instances of `plugin`.
    pub fn instance_count(&self, plugin: &str) -> usize {
        self.shared.instances.borrow().count(plugin)
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

/// Manager state shared with [`Instance`] handles and with managers whose
/// plugins depend on this one's.
pub(crate) struct ManagerShared {
    this: Weak<ManagerShared>,
    registry: Rc<Registry>,
    loader: Rc<dyn ModuleLoader>,
    config: RefCell<ManagerConfig>,
    instances: RefCell<InstanceTracker>,
}

impl std::fmt::Debug for ManagerShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerShared")
            .field("config", &self.config)
            .field("instances", &self.instances)
            .finish_non_exhaustive()
    }
}

enum Creator {
    Static(StaticInstancer),
    Native(InstancerFn),
}

impl ManagerShared {
    fn owned<R>(&self, plugin: &str, f: impl FnOnce(&PluginRecord) -> R) -> Option<R> {
        let record = self.registry.find(plugin)?;
        record.is_owned_by(&self.this).then(|| f(&record))
    }

    fn plugin_list(&self) -> Vec<String> {
        self.registry
            .names_where(|record| record.is_owned_by(&self.this))
    }

    fn claim_static_plugins(&self) {
        let interface = self.config.borrow().interface.clone();
        let claimable = self.registry.names_where(|record| {
            record.static_interface() == Some(interface.as_str()) && !record.has_owner()
        });

        for name in claimable {
            let initializer = match self.registry.find_mut(&name) {
                Some(mut record) => {
                    record.owner = Some(self.this.clone());
                    match record.backing {
                        Backing::Static { initializer, .. } => Some(initializer),
                        Backing::Dynamic { .. } => None,
                    }
                }
                None => None,
            };
            if let Some(initializer) = initializer {
                tracing::debug!(plugin = %name, interface = %interface, "Claimed static plugin");
                initializer();
            }
        }
    }

    fn set_plugin_directory(&self, directory: PathBuf) {
        self.config.borrow_mut().plugin_directory = directory.clone();

        let stale = self
            .registry
            .remove_where(|record| record.is_owned_by(&self.this) && record.state.is_unloaded());

        let entries = match std::fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    path = %directory.display(),
                    error = %e,
                    "Cannot list plugin directory"
                );
                return;
            }
        };

        let config = self.config.borrow().clone();
        let mut added = 0_usize;
        for entry in entries.flatten() {
            if entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|f| module_name(f, &config.module_suffix))
            else {
                continue;
            };
            if self.registry.contains(name) {
                continue;
            }

            let metadata = Configuration::from_file(config.metadata_path(name));
            if self
                .registry
                .insert(PluginRecord::dynamic(name, metadata, self.this.clone()))
            {
                added += 1;
            }
        }

        tracing::debug!(
            path = %directory.display(),
            dropped = stale.len(),
            added,
            "Scanned plugin directory"
        );
    }

    pub(crate) fn load(&self, plugin: &str) -> LoadState {
        let (state, depends) = match self.registry.find(plugin) {
            Some(record) if record.is_owned_by(&self.this) => {
                (record.state, record.metadata().depends().to_vec())
            }
            _ => return LoadState::NotFound,
        };
        if state != LoadState::NotLoaded {
            return state;
        }

        if !self.registry.enter_resolution(plugin) {
            tracing::error!(
                plugin = %plugin,
                chain = ?self.registry.resolution_chain(),
                "Circular dependency"
            );
            return LoadState::UnresolvedDependency;
        }
        let state = self.load_resolving(plugin, &depends);
        self.registry.leave_resolution(plugin);
        state
    }

    fn load_resolving(&self, plugin: &str, depends: &[String]) -> LoadState {
        let mut resolved: Vec<(&str, Rc<ManagerShared>)> = Vec::with_capacity(depends.len());
        for dependency in depends {
            let Some(owner) = self
                .registry
                .find(dependency)
                .and_then(|record| record.owner())
            else {
                tracing::error!(
                    plugin = %plugin,
                    dependency = %dependency,
                    "Unresolved dependency: not found or without a manager"
                );
                return LoadState::UnresolvedDependency;
            };

            let state = owner.load(dependency);
            if !state.is_available() {
                tracing::error!(
                    plugin = %plugin,
                    dependency = %dependency,
                    state = %state,
                    "Unresolved dependency: cannot be loaded"
                );
                return LoadState::UnresolvedDependency;
            }
            resolved.push((dependency.as_str(), owner));
        }

        let path = self.config.borrow().module_path(plugin);
        let module = match self.loader.open(&path) {
            Ok(module) => module,
            Err(e) => {
                tracing::error!(plugin = %plugin, error = %e, "Cannot load plugin");
                return LoadState::LoadFailed;
            }
        };

        let (instancer, initializer) = match self.link(plugin, &module) {
            Ok(entry_points) => entry_points,
            Err(state) => {
                self.close_module(plugin, module);
                return state;
            }
        };

        // SAFETY: `initializer` was resolved from the exported
        // `pluginInitializer` symbol, which takes no arguments.
        unsafe { initializer() };

        for (dependency, owner) in &resolved {
            owner.notify_dependent(dependency, plugin, DependentChange::Added);
        }

        match self.registry.find_mut(plugin) {
            Some(mut record) => {
                record.state = LoadState::Loaded;
                record.backing = Backing::Dynamic {
                    module: Some(module),
                    instancer: Some(instancer),
                };
            }
            None => {
                tracing::error!(plugin = %plugin, "Plugin record vanished during load");
                self.close_module(plugin, module);
                return LoadState::LoadFailed;
            }
        }

        tracing::info!(plugin = %plugin, path = %path.display(), "Plugin loaded");
        LoadState::Loaded
    }

    /// Check the version and interface of an opened module and resolve its
    /// instancer and initializer.
    fn link(
        &self,
        plugin: &str,
        module: &ModuleHandle,
    ) -> Result<(InstancerFn, InitializerFn), LoadState> {
        let version = self.symbol(plugin, module, VERSION_SYMBOL)?;
        // SAFETY: `pluginVersion` is documented as `VersionFn`.
        let version = unsafe { std::mem::transmute::<*mut c_void, VersionFn>(version.as_ptr()) };
        // SAFETY: `VersionFn` takes no arguments.
        let version = unsafe { version() };
        if version != PLUGIN_VERSION {
            tracing::error!(
                plugin = %plugin,
                expected = PLUGIN_VERSION,
                actual = version,
                "Wrong plugin version"
            );
            return Err(LoadState::WrongPluginVersion);
        }

        let interface = self.symbol(plugin, module, INTERFACE_SYMBOL)?;
        // SAFETY: `pluginInterface` is documented as `InterfaceFn`.
        let interface =
            unsafe { std::mem::transmute::<*mut c_void, InterfaceFn>(interface.as_ptr()) };
        // SAFETY: `InterfaceFn` takes no arguments.
        let interface = unsafe { interface() };
        let interface = if interface.is_null() {
            String::new()
        } else {
            // SAFETY: a non-null interface tag is a NUL-terminated string
            // living as long as the module.
            unsafe { CStr::from_ptr(interface) }
                .to_string_lossy()
                .into_owned()
        };
        let expected = self.config.borrow().interface.clone();
        if interface != expected {
            tracing::error!(
                plugin = %plugin,
                expected = %expected,
                actual = %interface,
                "Wrong plugin interface"
            );
            return Err(LoadState::WrongInterfaceVersion);
        }

        let instancer = self.symbol(plugin, module, INSTANCER_SYMBOL)?;
        let initializer = self.symbol(plugin, module, INITIALIZER_SYMBOL)?;
        // SAFETY: `pluginInstancer` is documented as `InstancerFn`.
        let instancer =
            unsafe { std::mem::transmute::<*mut c_void, InstancerFn>(instancer.as_ptr()) };
        // SAFETY: `pluginInitializer` is documented as `InitializerFn`.
        let initializer =
            unsafe { std::mem::transmute::<*mut c_void, InitializerFn>(initializer.as_ptr()) };
        Ok((instancer, initializer))
    }

    fn symbol(
        &self,
        plugin: &str,
        module: &ModuleHandle,
        symbol: &str,
    ) -> Result<NonNull<c_void>, LoadState> {
        self.loader.resolve_symbol(module, symbol).map_err(|e| {
            tracing::error!(plugin = %plugin, error = %e, "Cannot get plugin entry point");
            LoadState::LoadFailed
        })
    }

    fn close_module(&self, plugin: &str, module: ModuleHandle) -> bool {
        match self.loader.close(module) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(plugin = %plugin, error = %e, "Cannot unload plugin");
                false
            }
        }
    }

    pub(crate) fn unload(&self, plugin: &str) -> LoadState {
        let (state, depends, used_by) = match self.registry.find(plugin) {
            Some(record) if record.is_owned_by(&self.this) => (
                record.state,
                record.metadata().depends().to_vec(),
                record.metadata().used_by(),
            ),
            _ => return LoadState::NotFound,
        };
        if state != LoadState::Loaded {
            return state;
        }

        if !used_by.is_empty() {
            tracing::error!(plugin = %plugin, used_by = ?used_by, "Plugin is required by other plugins");
            return LoadState::Required;
        }

        if !self.instances.borrow().all_deletable(plugin) {
            tracing::error!(plugin = %plugin, "Plugin is currently used and cannot be deleted");
            return LoadState::Used;
        }

        let mut released = self.instances.borrow_mut().release_all(plugin);
        let destroyed = released.len();
        while let Some(object) = released.pop() {
            drop(object);
        }

        for dependency in &depends {
            let owner = self
                .registry
                .find(dependency)
                .and_then(|record| record.owner());
            match owner {
                Some(owner) => owner.notify_dependent(dependency, plugin, DependentChange::Removed),
                None => self.registry.record_orphan_dependent(
                    dependency,
                    plugin,
                    DependentChange::Removed,
                ),
            }
        }

        let module = self.registry.find_mut(plugin).and_then(|mut record| {
            record.state = LoadState::NotLoaded;
            match &mut record.backing {
                Backing::Dynamic { module, instancer } => {
                    *instancer = None;
                    module.take()
                }
                Backing::Static { .. } => None,
            }
        });
        let Some(module) = module else {
            tracing::error!(plugin = %plugin, "Loaded plugin has no module");
            return LoadState::UnloadFailed;
        };

        match self.loader.resolve_symbol(&module, FINALIZER_SYMBOL) {
            Ok(finalizer) => {
                // SAFETY: `pluginFinalizer` is documented as `FinalizerFn`.
                let finalizer = unsafe {
                    std::mem::transmute::<*mut c_void, FinalizerFn>(finalizer.as_ptr())
                };
                // SAFETY: `FinalizerFn` takes no arguments and runs once per load.
                unsafe { finalizer() };
            }
            Err(e) => {
                tracing::error!(plugin = %plugin, error = %e, "Cannot get plugin finalizer");
            }
        }

        if !self.close_module(plugin, module) {
            return LoadState::UnloadFailed;
        }

        tracing::info!(plugin = %plugin, instances = destroyed, "Plugin unloaded");
        LoadState::NotLoaded
    }

    /// Add or remove `dependent` from the dependents of `plugin`, which
    /// this manager owns.
    pub(crate) fn notify_dependent(&self, plugin: &str, dependent: &str, change: DependentChange) {
        let Some(metadata) = self.owned(plugin, |record| Rc::clone(record.metadata())) else {
            tracing::error!(
                plugin = %plugin,
                dependent = %dependent,
                "Dependent change for a plugin this manager does not own"
            );
            return;
        };
        tracing::trace!(plugin = %plugin, dependent = %dependent, change = ?change, "Dependents changed");
        metadata.record_dependent(dependent, change);
    }

    fn instance(&self, plugin: &str) -> Option<Instance> {
        let creator = self.owned(plugin, |record| {
            if !record.state.is_available() {
                return None;
            }
            match record.backing {
                Backing::Static { instancer, .. } => Some(Creator::Static(instancer)),
                Backing::Dynamic {
                    instancer: Some(instancer),
                    ..
                } => Some(Creator::Native(instancer)),
                Backing::Dynamic { instancer: None, .. } => None,
            }
        });
        let Some(creator) = creator.flatten() else {
            tracing::error!(plugin = %plugin, "Plugin is not loaded");
            return None;
        };

        let object = match creator {
            Creator::Static(instancer) => instancer(plugin),
            Creator::Native(instancer) => {
                let name = instancer_name(plugin)?;
                let manager = std::ptr::from_ref(self).cast_mut().cast::<c_void>();
                // SAFETY: `instancer` is the module's `pluginInstancer`; the
                // name outlives the call.
                let raw = unsafe { instancer(manager, name.as_ptr()) };
                // SAFETY: instancers return pointers from `into_raw_instance`.
                let Some(object) = (unsafe { abi::from_raw_instance(raw) }) else {
                    tracing::error!(plugin = %plugin, "Plugin instancer returned null");
                    return None;
                };
                object
            }
        };
        self.adopt(plugin, object).ok()
    }

    fn adopt(
        &self,
        plugin: &str,
        object: Box<dyn PluginInstance>,
    ) -> Result<Instance, Box<dyn PluginInstance>> {
        let shared = self.owned(plugin, |record| {
            record.state.is_available().then(|| {
                (
                    Rc::clone(record.metadata()),
                    Rc::clone(record.configuration()),
                )
            })
        });
        let Some((metadata, configuration)) = shared.flatten() else {
            tracing::error!(plugin = %plugin, "Cannot register instance of a plugin that is not loaded");
            return Err(object);
        };

        let key = self.instances.borrow_mut().register(plugin, object);
        tracing::debug!(plugin = %plugin, key = ?key, "Registered instance");
        Ok(Instance::new(
            key,
            plugin,
            self.this.clone(),
            metadata,
            configuration,
        ))
    }

    pub(crate) fn instance_alive(&self, key: InstanceKey) -> bool {
        self.instances.borrow().contains(key)
    }

    pub(crate) fn checkout_instance(&self, key: InstanceKey) -> Option<Box<dyn PluginInstance>> {
        self.instances.borrow_mut().checkout(key)
    }

    pub(crate) fn restore_instance(&self, key: InstanceKey, object: Box<dyn PluginInstance>) {
        let rejected = self.instances.borrow_mut().restore(key, object);
        drop(rejected);
    }

    pub(crate) fn destroy_instance(&self, key: InstanceKey) {
        let object = self.instances.borrow_mut().unregister(key);
        if object.is_some() {
            tracing::debug!(key = ?key, "Destroyed instance");
        }
        drop(object);
    }

    /// Destroy every tracked instance, then unload or release every owned
    /// plugin. Afterwards only dependency edges can keep a plugin loaded.
    fn teardown(&self) {
        let with_instances: Vec<String> = self
            .instances
            .borrow()
            .plugins()
            .map(str::to_owned)
            .collect();
        for plugin in &with_instances {
            let mut released = self.instances.borrow_mut().release_all(plugin);
            tracing::debug!(plugin = %plugin, instances = released.len(), "Destroying instances");
            while let Some(object) = released.pop() {
                drop(object);
            }
        }

        let owned = self.plugin_list();
        let mut erased = Vec::with_capacity(owned.len());

        for plugin in owned {
            let finalizer = self.registry.find_mut(&plugin).and_then(|mut record| {
                let finalizer = match record.backing {
                    Backing::Static { finalizer, .. } => Some(finalizer),
                    Backing::Dynamic { .. } => None,
                };
                if finalizer.is_some() {
                    record.owner = None;
                }
                finalizer
            });
            if let Some(finalizer) = finalizer {
                tracing::debug!(plugin = %plugin, "Released static plugin");
                finalizer();
                continue;
            }

            let state = self.unload(&plugin);
            if !state.is_settled() {
                tracing::error!(
                    plugin = %plugin,
                    state = %state,
                    "Cannot unload plugin on manager destruction"
                );
                if !std::thread::panicking() {
                    panic!("cannot unload plugin {plugin} on manager destruction: {state}");
                }
                continue;
            }
            erased.push(plugin);
        }

        for plugin in &erased {
            self.registry.erase(plugin);
        }
        tracing::debug!(erased = erased.len(), "Manager destroyed");
    }
}

/// Plugin name as passed to a module's instancer.
fn instancer_name(plugin: &str) -> Option<CString> {
    match CString::new(plugin) {
        Ok(name) => Some(name),
        Err(e) => {
            tracing::error!(plugin = %plugin.escape_default(), error = %e, "Cannot pass plugin name to instancer");
            None
        }
    }
}

fn module_name<'a>(file_name: &'a str, suffix: &str) -> Option<&'a str> {
    file_name.strip_suffix(suffix).filter(|name| !name.is_empty())
}
