//! Shared fixtures: in-process plugin modules, an event log and a plugin
//! directory wired to a [`SymbolTableLoader`].

#![allow(dead_code)]

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use modhost_plugin_manager::{
    Manager, ManagerConfig, ModuleSymbols, PluginInstance, Registry, StaticPlugin,
    SymbolTableLoader,
};
use modhost_test_helpers::prelude::PluginDirFixture;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const ANIMAL: &str = "cz.mosra.Animal/1.0";
pub const FOOD: &str = "cz.mosra.Food/1.0";

thread_local! {
    static EVENTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Append to this thread's event log.
pub fn record(event: &str) {
    EVENTS.with(|events| events.borrow_mut().push(event.to_string()));
}

/// This thread's event log.
pub fn events() -> Vec<String> {
    EVENTS.with(|events| events.borrow().clone())
}

/// How often `event` was recorded on this thread.
pub fn count(event: &str) -> usize {
    EVENTS.with(|events| events.borrow().iter().filter(|e| *e == event).count())
}

/// Events starting with `prefix`, in order.
pub fn events_with_prefix(prefix: &str) -> Vec<String> {
    events()
        .into_iter()
        .filter(|e| e.starts_with(prefix))
        .collect()
}

/// Instance type every fixture plugin creates.
#[derive(Debug)]
pub struct Animal {
    pub name: String,
    pub deletable: bool,
    pub petted: u32,
}

impl Animal {
    pub fn new(name: &str, deletable: bool) -> Self {
        Self {
            name: name.to_string(),
            deletable,
            petted: 0,
        }
    }

    pub fn boxed(name: &str, deletable: bool) -> Box<dyn PluginInstance> {
        Box::new(Self::new(name, deletable))
    }
}

impl PluginInstance for Animal {
    fn can_be_deleted(&self) -> bool {
        self.deletable
    }
}

impl Drop for Animal {
    fn drop(&mut self) {
        record(&format!("{}:drop", self.name));
    }
}

/// An in-process module exporting the plugin contract. Every entry point
/// records `<Name>:<entry point>` in the event log.
macro_rules! fixture_module {
    ($module:ident, $name:literal, $interface:literal, $version:literal) => {
        pub mod $module {
            use std::ffi::c_void;
            use std::os::raw::{c_char, c_int};

            use modhost_plugin_manager::ModuleSymbols;
            use modhost_plugin_manager::abi::into_raw_instance;

            pub const NAME: &str = $name;

            unsafe extern "C" fn version() -> c_int {
                $version
            }

            unsafe extern "C" fn interface() -> *const c_char {
                ::std::concat!($interface, "\0").as_ptr().cast()
            }

            unsafe extern "C" fn instancer(
                _manager: *mut c_void,
                _plugin: *const c_char,
            ) -> *mut c_void {
                super::record(::std::concat!($name, ":instance"));
                into_raw_instance(super::Animal::boxed($name, true))
            }

            unsafe extern "C" fn initializer() {
                super::record(::std::concat!($name, ":init"));
            }

            unsafe extern "C" fn finalizer() {
                super::record(::std::concat!($name, ":fini"));
            }

            pub fn symbols() -> ModuleSymbols {
                ModuleSymbols::with_entry_points(version, interface, instancer, initializer, finalizer)
            }
        }
    };
}

fixture_module!(dog, "Dog", "cz.mosra.Animal/1.0", 1);
fixture_module!(aardvark, "Aardvark", "cz.mosra.Animal/1.0", 1);
fixture_module!(beaver, "Beaver", "cz.mosra.Animal/1.0", 1);
fixture_module!(cheetah, "Cheetah", "cz.mosra.Animal/1.0", 1);
fixture_module!(mouse, "Mouse", "cz.mosra.Animal/1.0", 1);
fixture_module!(ping, "Ping", "cz.mosra.Animal/1.0", 1);
fixture_module!(pong, "Pong", "cz.mosra.Animal/1.0", 1);
fixture_module!(cage, "Cage", "cz.mosra.Animal/1.0", 1);
fixture_module!(old_dog, "OldDog", "cz.mosra.Animal/1.0", 99);
fixture_module!(cat, "Cat", "cz.mosra.Food/1.0", 1);
fixture_module!(cheese, "Cheese", "cz.mosra.Food/1.0", 1);

/// Static plugin of the animal interface.
pub fn canary() -> StaticPlugin {
    StaticPlugin::new("Canary", ANIMAL, |name| Animal::boxed(name, true))
        .with_initializer(canary_initializer)
        .with_finalizer(canary_finalizer)
}

fn canary_initializer() {
    record("Canary:init");
}

fn canary_finalizer() {
    record("Canary:fini");
}

/// A plugin directory, a registry and an in-process loader serving the
/// modules of the directory.
pub struct Harness {
    pub fixture: PluginDirFixture,
    pub loader: Rc<SymbolTableLoader>,
    pub registry: Rc<Registry>,
}

impl Harness {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            fixture: PluginDirFixture::new()?,
            loader: Rc::new(SymbolTableLoader::new()),
            registry: Rc::new(Registry::new()),
        })
    }

    /// Write `<name>.conf` and an empty module file, and serve `symbols`
    /// for that module file.
    pub fn add(&self, name: &str, metadata: &str, symbols: ModuleSymbols) -> io::Result<()> {
        self.add_to(&self.fixture, name, metadata, symbols)
    }

    /// Like [`add`](Self::add) for another plugin directory.
    pub fn add_to(
        &self,
        fixture: &PluginDirFixture,
        name: &str,
        metadata: &str,
        symbols: ModuleSymbols,
    ) -> io::Result<()> {
        fixture.add_plugin(name, metadata)?;
        self.loader.insert(fixture.module_path(name), symbols);
        Ok(())
    }

    pub fn config(&self) -> ManagerConfig {
        ManagerConfig::new(ANIMAL, self.fixture.path())
    }

    /// A manager for the animal interface over the harness directory.
    pub fn manager(&self) -> Manager {
        self.manager_with(self.config())
    }

    pub fn manager_with(&self, config: ManagerConfig) -> Manager {
        Manager::with_loader(&self.registry, config, self.loader.clone())
    }
}
