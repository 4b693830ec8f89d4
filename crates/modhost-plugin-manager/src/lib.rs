//! Plugin registry, dynamic module loading and instance tracking.
//!
//! This crate discovers, loads and unloads plugins implementing a known
//! interface, tracking dependencies between plugins and the live instances
//! created from them so that nothing is unloaded while still in use.
//!
//! - [`Registry`]: every known plugin, across managers and interfaces
//! - [`Manager`]: per-interface facade owning a plugin directory
//! - [`ModuleLoader`]: opens modules and resolves symbols
//!   ([`LibraryLoader`] for shared libraries, [`SymbolTableLoader`]
//!   in-process)
//! - [`StaticPlugin`]: plugins linked into the program
//! - [`Instance`]: handle to an object created by a plugin
//!
//! # Plugin directory layout
//!
//! | File | Content |
//! |------|---------|
//! | `<name>.conf` | Metadata: `depends=` per dependency, optional `[data]` |
//! | `<name><module suffix>` | The module, exporting the [`abi`] symbols |
//!
//! # Threading
//!
//! Nothing here is `Send` or `Sync`. All plugin management happens on one
//! thread; the types are built on `Rc` and `RefCell` accordingly.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::rc::Rc;
//!
//! use modhost_plugin_manager::{LoadState, Manager, ManagerConfig, Registry};
//!
//! let registry = Rc::new(Registry::new());
//! let manager = Manager::new(
//!     &registry,
//!     ManagerConfig::new("cz.mosra.Animal/1.0", "/usr/lib/animals"),
//! );
//!
//! if manager.load("Dog") == LoadState::Loaded {
//!     let dog = manager.instance("Dog");
//!     assert!(dog.is_some_and(|d| d.is_alive()));
//! }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod abi;
pub mod config;
pub mod error;
pub mod instance;
pub mod manager;
pub mod metadata;
pub mod module;
pub mod prelude;
pub mod record;
pub mod registry;
pub mod resource;
pub mod state;
pub mod static_import;

pub use abi::PLUGIN_VERSION;
pub use config::ManagerConfig;
pub use error::{ManagerError, ModuleError, RegistryError};
pub use instance::{Instance, InstanceKey, InstanceTracker, PluginInstance};
pub use manager::Manager;
pub use metadata::PluginMetadata;
pub use module::{LibraryLoader, ModuleHandle, ModuleLoader, ModuleSymbols, SymbolTableLoader};
pub use record::{PluginRecord, StaticInstancer};
pub use registry::Registry;
pub use resource::ResourceStore;
pub use state::LoadState;
pub use static_import::StaticPlugin;

pub use modhost_config::{ConfigError, Configuration, ConfigurationGroup};
