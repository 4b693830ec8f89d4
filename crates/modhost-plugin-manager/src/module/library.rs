//! Shared library loader backed by `libloading`.

use std::ffi::c_void;
use std::path::Path;
use std::ptr::NonNull;

use libloading::Library;

use super::{ModuleHandle, ModuleLoader};
use crate::error::ModuleError;

/// Loads plugin modules as shared libraries.
///
/// On Unix modules are opened with `RTLD_NOW | RTLD_GLOBAL`, so unresolved
/// references fail at load time and symbols of one plugin are visible to
/// plugins loaded after it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibraryLoader;

impl LibraryLoader {
    /// Create a loader.
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for LibraryLoader {
    fn open(&self, path: &Path) -> Result<ModuleHandle, ModuleError> {
        let library = open_library(path).map_err(|e| ModuleError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        tracing::trace!(path = %path.display(), "Opened shared library");
        Ok(ModuleHandle::new(path, library))
    }

    fn resolve_symbol(
        &self,
        module: &ModuleHandle,
        symbol: &str,
    ) -> Result<NonNull<c_void>, ModuleError> {
        let library = module
            .downcast_ref::<Library>()
            .ok_or_else(|| ModuleError::ForeignHandle {
                path: module.path().to_path_buf(),
            })?;

        let missing = |reason: String| ModuleError::MissingSymbol {
            path: module.path().to_path_buf(),
            symbol: symbol.to_string(),
            reason,
        };

        // SAFETY: the symbol is only read as an address here. Callers cast it
        // to the function type documented for that symbol name.
        let address = unsafe { library.get::<*mut c_void>(symbol.as_bytes()) }
            .map(|sym| *sym)
            .map_err(|e| missing(e.to_string()))?;

        NonNull::new(address).ok_or_else(|| missing("symbol resolves to null".to_string()))
    }

    fn close(&self, module: ModuleHandle) -> Result<(), ModuleError> {
        let path = module.path().to_path_buf();
        let library = module
            .into_inner::<Library>()
            .map_err(|module| ModuleError::ForeignHandle {
                path: module.path().to_path_buf(),
            })?;
        library.close().map_err(|e| ModuleError::Close {
            path,
            reason: e.to_string(),
        })?;
        tracing::trace!("Closed shared library");
        Ok(())
    }
}

#[cfg(unix)]
fn open_library(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};

    // SAFETY: opening a module runs its initialisation routines. Plugin
    // directories are trusted by the host that configured them.
    let library = unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }?;
    Ok(library.into())
}

#[cfg(windows)]
fn open_library(path: &Path) -> Result<Library, libloading::Error> {
    // SAFETY: see the Unix variant.
    unsafe { Library::new(path) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_fails() {
        let loader = LibraryLoader::new();
        let path = Path::new("/nonexistent/modhost/NoSuchPlugin.so");
        match loader.open(path) {
            Err(ModuleError::Open { path: p, reason }) => {
                assert_eq!(p, path);
                assert!(!reason.is_empty());
            }
            other => panic!("expected open failure, got {other:?}"),
        }
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let loader = LibraryLoader::new();
        let handle = ModuleHandle::new("/plugins/Dog.so", 7_u8);
        assert!(matches!(
            loader.resolve_symbol(&handle, "pluginVersion"),
            Err(ModuleError::ForeignHandle { .. })
        ));
        assert!(matches!(
            loader.close(handle),
            Err(ModuleError::ForeignHandle { .. })
        ));
    }
}
