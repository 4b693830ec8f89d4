//! Dynamic plugin module contract.
//!
//! A dynamic plugin module exports five C-linkage symbols:
//!
//! | Symbol | Type | Purpose |
//! |--------|------|---------|
//! | `pluginVersion` | [`VersionFn`] | Must return [`PLUGIN_VERSION`] |
//! | `pluginInterface` | [`InterfaceFn`] | NUL-terminated interface tag |
//! | `pluginInstancer` | [`InstancerFn`] | Creates one instance |
//! | `pluginInitializer` | [`InitializerFn`] | Called once after load |
//! | `pluginFinalizer` | [`FinalizerFn`] | Called once before unload |
//!
//! Plugins written in Rust get all five from [`export_plugin!`](crate::export_plugin).

use std::ffi::c_void;
use std::os::raw::{c_char, c_int};

use crate::instance::PluginInstance;

/// Plugin ABI version this crate was compiled with.
///
/// Dynamic modules and static plugins reporting any other value are
/// rejected. Increment on breaking changes to the plugin ABI.
pub const PLUGIN_VERSION: i32 = 1;

/// Exported version symbol.
pub const VERSION_SYMBOL: &str = "pluginVersion";
/// Exported interface tag symbol.
pub const INTERFACE_SYMBOL: &str = "pluginInterface";
/// Exported instancer symbol.
pub const INSTANCER_SYMBOL: &str = "pluginInstancer";
/// Exported initializer symbol.
pub const INITIALIZER_SYMBOL: &str = "pluginInitializer";
/// Exported finalizer symbol.
pub const FINALIZER_SYMBOL: &str = "pluginFinalizer";

/// `pluginVersion`.
pub type VersionFn = unsafe extern "C" fn() -> c_int;
/// `pluginInterface`. The returned string must outlive the module.
pub type InterfaceFn = unsafe extern "C" fn() -> *const c_char;
/// `pluginInstancer(manager, plugin)`. Returns a pointer produced by
/// [`into_raw_instance`], or null on failure.
pub type InstancerFn =
    unsafe extern "C" fn(manager: *mut c_void, plugin: *const c_char) -> *mut c_void;
/// `pluginInitializer`.
pub type InitializerFn = unsafe extern "C" fn();
/// `pluginFinalizer`.
pub type FinalizerFn = unsafe extern "C" fn();

/// Hand an instance across the module boundary.
pub fn into_raw_instance(instance: Box<dyn PluginInstance>) -> *mut c_void {
    Box::into_raw(Box::new(instance)).cast()
}

/// Take back an instance returned by an instancer.
///
/// Returns `None` for a null pointer.
///
/// # Safety
///
/// `raw` must be null or a pointer returned by [`into_raw_instance`] that
/// has not been reclaimed yet.
pub unsafe fn from_raw_instance(raw: *mut c_void) -> Option<Box<dyn PluginInstance>> {
    if raw.is_null() {
        return None;
    }
    // SAFETY: the caller guarantees `raw` came from `into_raw_instance`.
    let outer = unsafe { Box::from_raw(raw.cast::<Box<dyn PluginInstance>>()) };
    Some(*outer)
}

/// Export the dynamic plugin contract from a `cdylib`.
///
/// ```rust,ignore
/// struct Dog;
/// impl modhost_plugin_manager::PluginInstance for Dog {}
///
/// modhost_plugin_manager::export_plugin! {
///     interface: "cz.mosra.Animal/1.0",
///     instancer: |_plugin| Box::new(Dog),
///     initializer: || println!("Dog initialized"),
///     finalizer: || println!("Dog finalized"),
/// }
/// ```
///
/// `initializer` and `finalizer` are optional. The instancer receives the
/// plugin name and must not capture anything.
#[macro_export]
macro_rules! export_plugin {
    (
        interface: $interface:literal,
        instancer: $instancer:expr
        $(, initializer: $initializer:expr)?
        $(, finalizer: $finalizer:expr)?
        $(,)?
    ) => {
        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub extern "C" fn pluginVersion() -> ::std::os::raw::c_int {
            $crate::abi::PLUGIN_VERSION
        }

        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub extern "C" fn pluginInterface() -> *const ::std::os::raw::c_char {
            ::std::concat!($interface, "\0").as_ptr().cast()
        }

        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn pluginInstancer(
            _manager: *mut ::std::ffi::c_void,
            plugin: *const ::std::os::raw::c_char,
        ) -> *mut ::std::ffi::c_void {
            let name = if plugin.is_null() {
                ::std::string::String::new()
            } else {
                // SAFETY: the manager passes a NUL-terminated plugin name.
                unsafe { ::std::ffi::CStr::from_ptr(plugin) }
                    .to_string_lossy()
                    .into_owned()
            };
            let create: fn(&str) -> ::std::boxed::Box<dyn $crate::PluginInstance> = $instancer;
            $crate::abi::into_raw_instance(create(&name))
        }

        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub extern "C" fn pluginInitializer() {
            $( ($initializer)(); )?
        }

        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub extern "C" fn pluginFinalizer() {
            $( ($finalizer)(); )?
        }
    };
}
