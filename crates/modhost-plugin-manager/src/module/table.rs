//! In-process module loader backed by a symbol table.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use super::{ModuleHandle, ModuleLoader};
use crate::abi::{
    FINALIZER_SYMBOL, FinalizerFn, INITIALIZER_SYMBOL, INSTANCER_SYMBOL, INTERFACE_SYMBOL,
    InitializerFn, InstancerFn, InterfaceFn, VERSION_SYMBOL, VersionFn,
};
use crate::error::ModuleError;

/// Symbols exported by one in-process module.
#[derive(Debug, Clone, Default)]
pub struct ModuleSymbols {
    symbols: HashMap<String, *const c_void>,
}

impl ModuleSymbols {
    /// A module exporting nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// A module exporting the full plugin contract.
    pub fn with_entry_points(
        version: VersionFn,
        interface: InterfaceFn,
        instancer: InstancerFn,
        initializer: InitializerFn,
        finalizer: FinalizerFn,
    ) -> Self {
        Self::new()
            .with_symbol(VERSION_SYMBOL, version as *const c_void)
            .with_symbol(INTERFACE_SYMBOL, interface as *const c_void)
            .with_symbol(INSTANCER_SYMBOL, instancer as *const c_void)
            .with_symbol(INITIALIZER_SYMBOL, initializer as *const c_void)
            .with_symbol(FINALIZER_SYMBOL, finalizer as *const c_void)
    }

    /// Add or replace a symbol.
    pub fn with_symbol(mut self, name: impl Into<String>, address: *const c_void) -> Self {
        self.insert(name, address);
        self
    }

    /// Add or replace a symbol.
    pub fn insert(&mut self, name: impl Into<String>, address: *const c_void) {
        self.symbols.insert(name.into(), address);
    }

    /// Drop a symbol.
    pub fn without_symbol(mut self, name: &str) -> Self {
        self.symbols.remove(name);
        self
    }

    /// Whether `name` is exported.
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<*const c_void> {
        self.symbols.get(name).copied()
    }
}

#[derive(Debug)]
struct TableModule {
    symbols: ModuleSymbols,
    open: bool,
    opens: usize,
    closes: usize,
    lookups: Vec<String>,
    fail_close: bool,
}

#[derive(Debug)]
struct TableHandle;

/// Module loader that serves modules from an in-process table.
///
/// Modules are registered under the path the manager will ask for, usually
/// `<plugin directory>/<name><module suffix>`. The loader keeps counters of
/// opens, closes and symbol lookups per path and can be told to refuse
/// closing a module.
#[derive(Debug, Default)]
pub struct SymbolTableLoader {
    modules: RefCell<HashMap<PathBuf, TableModule>>,
}

impl SymbolTableLoader {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the module served at `path`.
    pub fn insert(&self, path: impl Into<PathBuf>, symbols: ModuleSymbols) {
        self.modules.borrow_mut().insert(
            path.into(),
            TableModule {
                symbols,
                open: false,
                opens: 0,
                closes: 0,
                lookups: Vec::new(),
                fail_close: false,
            },
        );
    }

    /// Stop serving the module at `path`.
    pub fn remove(&self, path: &Path) -> bool {
        self.modules.borrow_mut().remove(path).is_some()
    }

    /// Make closing the module at `path` fail, or succeed again.
    pub fn set_fail_close(&self, path: &Path, fail: bool) {
        if let Some(module) = self.modules.borrow_mut().get_mut(path) {
            module.fail_close = fail;
        }
    }

    /// Whether the module at `path` is currently open.
    pub fn is_open(&self, path: &Path) -> bool {
        self.modules.borrow().get(path).is_some_and(|m| m.open)
    }

    /// How many times the module at `path` was opened.
    pub fn open_count(&self, path: &Path) -> usize {
        self.modules.borrow().get(path).map_or(0, |m| m.opens)
    }

    /// How many times the module at `path` was closed.
    pub fn close_count(&self, path: &Path) -> usize {
        self.modules.borrow().get(path).map_or(0, |m| m.closes)
    }

    /// Symbol names looked up in the module at `path`, in order.
    pub fn lookups(&self, path: &Path) -> Vec<String> {
        self.modules
            .borrow()
            .get(path)
            .map(|m| m.lookups.clone())
            .unwrap_or_default()
    }
}

impl ModuleLoader for SymbolTableLoader {
    fn open(&self, path: &Path) -> Result<ModuleHandle, ModuleError> {
        let mut modules = self.modules.borrow_mut();
        let module = modules.get_mut(path).ok_or_else(|| ModuleError::Open {
            path: path.to_path_buf(),
            reason: "no module registered at this path".to_string(),
        })?;
        module.open = true;
        module.opens += 1;
        Ok(ModuleHandle::new(path, TableHandle))
    }

    fn resolve_symbol(
        &self,
        module: &ModuleHandle,
        symbol: &str,
    ) -> Result<NonNull<c_void>, ModuleError> {
        if module.downcast_ref::<TableHandle>().is_none() {
            return Err(ModuleError::ForeignHandle {
                path: module.path().to_path_buf(),
            });
        }

        let mut modules = self.modules.borrow_mut();
        let missing = |reason: &str| ModuleError::MissingSymbol {
            path: module.path().to_path_buf(),
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        };
        let entry = modules
            .get_mut(module.path())
            .ok_or_else(|| missing("module was removed from the table"))?;
        entry.lookups.push(symbol.to_string());

        let address = entry
            .symbols
            .get(symbol)
            .ok_or_else(|| missing("undefined symbol"))?;
        NonNull::new(address.cast_mut()).ok_or_else(|| missing("symbol resolves to null"))
    }

    fn close(&self, module: ModuleHandle) -> Result<(), ModuleError> {
        if module.downcast_ref::<TableHandle>().is_none() {
            return Err(ModuleError::ForeignHandle {
                path: module.path().to_path_buf(),
            });
        }

        let mut modules = self.modules.borrow_mut();
        let Some(entry) = modules.get_mut(module.path()) else {
            return Err(ModuleError::Close {
                path: module.path().to_path_buf(),
                reason: "module was removed from the table".to_string(),
            });
        };
        if entry.fail_close {
            return Err(ModuleError::Close {
                path: module.path().to_path_buf(),
                reason: "module refused to close".to_string(),
            });
        }
        entry.open = false;
        entry.closes += 1;
        Ok(())
    }
}
