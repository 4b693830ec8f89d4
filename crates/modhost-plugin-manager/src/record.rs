//! Registry records.

use std::rc::{Rc, Weak};

use modhost_config::{ConfigError, Configuration};

use crate::abi::InstancerFn;
use crate::instance::PluginInstance;
use crate::manager::ManagerShared;
use crate::metadata::PluginMetadata;
use crate::module::ModuleHandle;
use crate::state::LoadState;
use crate::static_import::StaticPlugin;

/// Instancer of a static plugin. Receives the plugin name.
pub type StaticInstancer = fn(&str) -> Box<dyn PluginInstance>;

/// What a plugin's code comes from.
#[derive(Debug)]
pub(crate) enum Backing {
    Static {
        interface: String,
        instancer: StaticInstancer,
        initializer: fn(),
        finalizer: fn(),
    },
    Dynamic {
        module: Option<ModuleHandle>,
        instancer: Option<InstancerFn>,
    },
}

/// One known plugin.
#[derive(Debug)]
pub struct PluginRecord {
    name: String,
    pub(crate) state: LoadState,
    metadata: Rc<PluginMetadata>,
    configuration: Rc<Configuration>,
    pub(crate) owner: Option<Weak<ManagerShared>>,
    pub(crate) backing: Backing,
}

impl PluginRecord {
    /// Record of a plugin found in a directory scan.
    pub(crate) fn dynamic(
        name: &str,
        configuration: Result<Configuration, ConfigError>,
        owner: Weak<ManagerShared>,
    ) -> Self {
        let (state, configuration) = match configuration {
            Ok(configuration) => (LoadState::NotLoaded, configuration),
            Err(e) => {
                tracing::warn!(plugin = %name, error = %e, "Cannot read plugin metadata file");
                (LoadState::WrongMetadataFile, Configuration::empty())
            }
        };
        Self {
            name: name.to_string(),
            state,
            metadata: Rc::new(PluginMetadata::from_configuration(name, &configuration)),
            configuration: Rc::new(configuration),
            owner: Some(owner),
            backing: Backing::Dynamic {
                module: None,
                instancer: None,
            },
        }
    }

    pub(crate) fn from_static(plugin: StaticPlugin, configuration: Configuration) -> Self {
        Self {
            name: plugin.name().to_string(),
            state: LoadState::Static,
            metadata: Rc::new(PluginMetadata::from_configuration(
                plugin.name(),
                &configuration,
            )),
            configuration: Rc::new(configuration),
            owner: None,
            backing: Backing::Static {
                interface: plugin.interface().to_string(),
                instancer: plugin.instancer(),
                initializer: plugin.initializer(),
                finalizer: plugin.finalizer(),
            },
        }
    }

    /// Plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current load state.
    pub fn load_state(&self) -> LoadState {
        self.state
    }

    /// Plugin metadata.
    pub fn metadata(&self) -> &Rc<PluginMetadata> {
        &self.metadata
    }

    /// Parsed metadata file.
    pub fn configuration(&self) -> &Rc<Configuration> {
        &self.configuration
    }

    /// Whether the plugin is linked into the program.
    pub fn is_static(&self) -> bool {
        matches!(self.backing, Backing::Static { .. })
    }

    /// Interface tag of a static plugin.
    pub fn static_interface(&self) -> Option<&str> {
        match &self.backing {
            Backing::Static { interface, .. } => Some(interface),
            Backing::Dynamic { .. } => None,
        }
    }

    /// Whether a live manager owns the plugin.
    pub fn has_owner(&self) -> bool {
        self.owner().is_some()
    }

    /// Whether a dynamic plugin currently has an open module.
    pub fn has_module(&self) -> bool {
        matches!(self.backing, Backing::Dynamic { module: Some(_), .. })
    }

    pub(crate) fn owner(&self) -> Option<Rc<ManagerShared>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn is_owned_by(&self, manager: &Weak<ManagerShared>) -> bool {
        self.owner.as_ref().is_some_and(|owner| owner.ptr_eq(manager))
    }
}
