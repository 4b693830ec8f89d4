//! Opening modules and resolving their symbols.
//!
//! The manager never talks to the platform loader directly. It goes through
//! [`ModuleLoader`], which has two implementations:
//!
//! - [`LibraryLoader`]: real shared libraries via `libloading`
//! - [`SymbolTableLoader`]: an in-process table of symbol addresses, for
//!   hosts that link plugins in and for tests

mod library;
mod table;

pub use library::LibraryLoader;
pub use table::{ModuleSymbols, SymbolTableLoader};

use std::any::Any;
use std::ffi::c_void;
use std::fmt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use crate::error::ModuleError;

/// An opened module.
///
/// The handle owns whatever the loader needs to keep the module mapped.
/// Give it back to [`ModuleLoader::close`] to unmap it; simply dropping it
/// is loader specific.
pub struct ModuleHandle {
    path: PathBuf,
    inner: Box<dyn Any>,
}

impl ModuleHandle {
    /// Wrap loader specific state for the module at `path`.
    pub fn new(path: impl Into<PathBuf>, inner: impl Any) -> Self {
        Self {
            path: path.into(),
            inner: Box::new(inner),
        }
    }

    /// Path the module was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Borrow the loader specific state.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Take the loader specific state back, or return the handle unchanged.
    pub fn into_inner<T: Any>(self) -> Result<T, Self> {
        match self.inner.downcast::<T>() {
            Ok(inner) => Ok(*inner),
            Err(inner) => Err(Self {
                path: self.path,
                inner,
            }),
        }
    }
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Platform module loader.
pub trait ModuleLoader {
    /// Open the module at `path`, resolving all of its symbols immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Open`] if the module cannot be opened.
    fn open(&self, path: &Path) -> Result<ModuleHandle, ModuleError>;

    /// Address of the exported symbol `symbol`.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::MissingSymbol`] if the symbol is not exported,
    /// or [`ModuleError::ForeignHandle`] for a handle from another loader.
    fn resolve_symbol(
        &self,
        module: &ModuleHandle,
        symbol: &str,
    ) -> Result<NonNull<c_void>, ModuleError>;

    /// Close the module.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Close`] if the platform refuses to unmap it.
    fn close(&self, module: ModuleHandle) -> Result<(), ModuleError>;
}
