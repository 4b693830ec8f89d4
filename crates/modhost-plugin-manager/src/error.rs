//! Error types for plugin management.
//!
//! Load and unload outcomes are reported as [`LoadState`](crate::LoadState)
//! values. The errors here cover the operations around them: the module
//! loader, static plugin import and manager configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Error reported by a [`ModuleLoader`](crate::module::ModuleLoader).
///
/// `reason` carries the platform loader's own diagnostic text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// The module file could not be opened.
    #[error("cannot open plugin file {path}: {reason}")]
    Open {
        /// Module file path.
        path: PathBuf,
        /// Loader diagnostic.
        reason: String,
    },

    /// An exported symbol is missing.
    #[error("cannot get symbol {symbol} of {path}: {reason}")]
    MissingSymbol {
        /// Module file path.
        path: PathBuf,
        /// Symbol name.
        symbol: String,
        /// Loader diagnostic.
        reason: String,
    },

    /// The module could not be closed.
    #[error("cannot unload plugin file {path}: {reason}")]
    Close {
        /// Module file path.
        path: PathBuf,
        /// Loader diagnostic.
        reason: String,
    },

    /// A handle opened by a different loader was passed in.
    #[error("module handle for {path} was not opened by this loader")]
    ForeignHandle {
        /// Module file path.
        path: PathBuf,
    },
}

/// Error reported by the [`Registry`](crate::Registry).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A static plugin was compiled against another plugin version.
    #[error("wrong version of static plugin {plugin}, got {actual} but expected {expected}")]
    WrongStaticVersion {
        /// Plugin name.
        plugin: String,
        /// Version this crate was compiled with.
        expected: i32,
        /// Version the plugin reports.
        actual: i32,
    },

    /// Static plugins were already imported into the registry.
    #[error("too late to import static plugin {plugin}")]
    TooLateToImport {
        /// Plugin name.
        plugin: String,
    },

    /// A static plugin with this name is already pending import.
    #[error("static plugin {plugin} is already registered")]
    DuplicateStaticPlugin {
        /// Plugin name.
        plugin: String,
    },
}

/// Error loading a [`ManagerConfig`](crate::ManagerConfig).
#[derive(Error, Debug)]
pub enum ManagerError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
