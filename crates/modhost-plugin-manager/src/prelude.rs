//! Convenience re-exports for common types.

pub use crate::abi::PLUGIN_VERSION;
pub use crate::config::ManagerConfig;
pub use crate::error::{ManagerError, ModuleError, RegistryError};
pub use crate::instance::{Instance, PluginInstance};
pub use crate::manager::Manager;
pub use crate::metadata::PluginMetadata;
pub use crate::module::{LibraryLoader, ModuleLoader, ModuleSymbols, SymbolTableLoader};
pub use crate::registry::Registry;
pub use crate::state::LoadState;
pub use crate::static_import::StaticPlugin;
