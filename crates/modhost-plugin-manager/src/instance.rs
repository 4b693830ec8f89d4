//! Plugin instances and their tracking.
//!
//! Every instance a [`Manager`](crate::Manager) hands out lives in an
//! [`InstanceTracker`] arena owned by that manager. Callers hold an
//! [`Instance`] handle: a slot index plus a generation counter. Releasing a
//! slot bumps its generation, so a handle whose instance was destroyed by
//! `unload` simply stops resolving instead of dangling.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use modhost_config::Configuration;

use crate::manager::ManagerShared;
use crate::metadata::PluginMetadata;

/// An object created by a plugin.
///
/// The only capability the manager needs is [`can_be_deleted`]: `unload`
/// refuses to tear a plugin down while any of its instances returns
/// `false`.
///
/// [`can_be_deleted`]: PluginInstance::can_be_deleted
pub trait PluginInstance: Any {
    /// Whether the instance may be destroyed by `unload`. Manager
    /// teardown destroys it regardless.
    fn can_be_deleted(&self) -> bool {
        false
    }
}

/// Address of a tracked instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    index: usize,
    generation: u64,
}

struct Entry {
    plugin: String,
    // `None` while checked out to a caller.
    object: Option<Box<dyn PluginInstance>>,
}

struct Slot {
    generation: u64,
    entry: Option<Entry>,
}

/// Arena of live instances, grouped by plugin name.
#[derive(Default)]
pub struct InstanceTracker {
    slots: Vec<Slot>,
    free: Vec<usize>,
    by_plugin: BTreeMap<String, Vec<InstanceKey>>,
}

impl InstanceTracker {
    /// An empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `object` as an instance of `plugin`.
    pub fn register(&mut self, plugin: &str, object: Box<dyn PluginInstance>) -> InstanceKey {
        let entry = Entry {
            plugin: plugin.to_string(),
            object: Some(object),
        };
        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.entry = Some(entry);
                InstanceKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                InstanceKey {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        };
        self.by_plugin
            .entry(plugin.to_string())
            .or_default()
            .push(key);
        key
    }

    /// Stop tracking `key` and hand its object back.
    ///
    /// Returns `None` for a stale key, or if the object is checked out. In
    /// the latter case the slot is still released and the object is
    /// dropped when it comes back.
    pub fn unregister(&mut self, key: InstanceKey) -> Option<Box<dyn PluginInstance>> {
        let entry = self.release(key)?;
        self.forget(&entry.plugin, key);
        entry.object
    }

    /// Whether `key` addresses a live instance.
    pub fn contains(&self, key: InstanceKey) -> bool {
        self.entry(key).is_some()
    }

    /// Plugin the instance at `key` belongs to.
    pub fn plugin_of(&self, key: InstanceKey) -> Option<&str> {
        self.entry(key).map(|entry| entry.plugin.as_str())
    }

    /// Number of live instances of `plugin`.
    pub fn count(&self, plugin: &str) -> usize {
        self.by_plugin.get(plugin).map_or(0, Vec::len)
    }

    /// Keys of live instances of `plugin`, oldest first.
    pub fn keys(&self, plugin: &str) -> &[InstanceKey] {
        self.by_plugin.get(plugin).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Plugins with at least one live instance.
    pub fn plugins(&self) -> impl Iterator<Item = &str> {
        self.by_plugin.keys().map(String::as_str)
    }

    /// Total number of live instances.
    pub fn len(&self) -> usize {
        self.by_plugin.values().map(Vec::len).sum()
    }

    /// Whether no instance is tracked.
    pub fn is_empty(&self) -> bool {
        self.by_plugin.is_empty()
    }

    /// Whether every live instance of `plugin` agrees to be deleted.
    /// A checked-out instance never does.
    pub fn all_deletable(&self, plugin: &str) -> bool {
        self.keys(plugin).iter().all(|key| {
            self.entry(*key)
                .and_then(|entry| entry.object.as_deref())
                .is_some_and(|object| object.can_be_deleted())
        })
    }

    /// Release every instance of `plugin`, oldest first.
    ///
    /// All keys of `plugin` become stale. Dropping the returned objects is
    /// up to the caller.
    pub fn release_all(&mut self, plugin: &str) -> Vec<Box<dyn PluginInstance>> {
        let keys = self.by_plugin.remove(plugin).unwrap_or_default();
        keys.into_iter()
            .filter_map(|key| self.release(key))
            .filter_map(|entry| entry.object)
            .collect()
    }

    /// Take the object at `key` out for exclusive use.
    pub fn checkout(&mut self, key: InstanceKey) -> Option<Box<dyn PluginInstance>> {
        self.entry_mut(key)?.object.take()
    }

    /// Put a checked-out object back. Fails if the slot was released or is
    /// occupied meanwhile.
    pub fn restore(
        &mut self,
        key: InstanceKey,
        object: Box<dyn PluginInstance>,
    ) -> Result<(), Box<dyn PluginInstance>> {
        match self.entry_mut(key) {
            Some(entry) if entry.object.is_none() => {
                entry.object = Some(object);
                Ok(())
            }
            _ => Err(object),
        }
    }

    fn entry(&self, key: InstanceKey) -> Option<&Entry> {
        self.slots
            .get(key.index)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, key: InstanceKey) -> Option<&mut Entry> {
        self.slots
            .get_mut(key.index)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    fn release(&mut self, key: InstanceKey) -> Option<Entry> {
        let slot = self
            .slots
            .get_mut(key.index)
            .filter(|slot| slot.generation == key.generation)?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        Some(entry)
    }

    fn forget(&mut self, plugin: &str, key: InstanceKey) {
        if let Some(keys) = self.by_plugin.get_mut(plugin) {
            keys.retain(|k| *k != key);
            if keys.is_empty() {
                self.by_plugin.remove(plugin);
            }
        }
    }
}

impl fmt::Debug for InstanceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceTracker")
            .field("slots", &self.slots.len())
            .field("by_plugin", &self.by_plugin)
            .finish()
    }
}

/// Handle to a live plugin instance.
///
/// Dropping the handle destroys the instance. After the plugin is unloaded
/// or the manager is destroyed the handle stays valid but no longer
/// resolves: [`is_alive`](Self::is_alive) returns `false` and
/// [`with`](Self::with) returns `None`.
#[derive(Debug)]
pub struct Instance {
    key: InstanceKey,
    plugin: String,
    manager: Weak<ManagerShared>,
    metadata: Rc<PluginMetadata>,
    configuration: Rc<Configuration>,
}

impl Instance {
    pub(crate) fn new(
        key: InstanceKey,
        plugin: &str,
        manager: Weak<ManagerShared>,
        metadata: Rc<PluginMetadata>,
        configuration: Rc<Configuration>,
    ) -> Self {
        Self {
            key,
            plugin: plugin.to_string(),
            manager,
            metadata,
            configuration,
        }
    }

    /// Name of the plugin this instance was created from.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Metadata of the plugin.
    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    /// Configuration parsed from the plugin's metadata file.
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Tracker key of this instance.
    pub fn key(&self) -> InstanceKey {
        self.key
    }

    /// Whether the instance still exists.
    pub fn is_alive(&self) -> bool {
        self.manager
            .upgrade()
            .is_some_and(|manager| manager.instance_alive(self.key))
    }

    /// Run `f` on the instance.
    ///
    /// Returns `None` if the instance is gone or already borrowed by an
    /// outer call. While `f` runs the instance counts as in use, so an
    /// `unload` of its plugin from inside `f` returns
    /// [`LoadState::Used`](crate::LoadState::Used).
    pub fn with_dyn<R>(&self, f: impl FnOnce(&mut dyn PluginInstance) -> R) -> Option<R> {
        let manager = self.manager.upgrade()?;
        let object = manager.checkout_instance(self.key)?;
        let mut checkout = Checkout {
            manager: &manager,
            key: self.key,
            object: Some(object),
        };
        let object = checkout.object.as_deref_mut()?;
        Some(f(object))
    }

    /// Run `f` on the instance downcast to `T`.
    ///
    /// Returns `None` if the instance is gone or is not a `T`.
    pub fn with<T: PluginInstance, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.with_dyn(|object| {
            let object: &mut dyn Any = object;
            object.downcast_mut::<T>().map(f)
        })
        .flatten()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.destroy_instance(self.key);
        }
    }
}

struct Checkout<'a> {
    manager: &'a ManagerShared,
    key: InstanceKey,
    object: Option<Box<dyn PluginInstance>>,
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        if let Some(object) = self.object.take() {
            self.manager.restore_instance(self.key, object);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pet {
        deletable: bool,
    }

    impl PluginInstance for Pet {
        fn can_be_deleted(&self) -> bool {
            self.deletable
        }
    }

    fn pet(deletable: bool) -> Box<dyn PluginInstance> {
        Box::new(Pet { deletable })
    }

    #[test]
    fn test_register_groups_by_plugin() {
        let mut tracker = InstanceTracker::new();
        let a = tracker.register("Dog", pet(true));
        let b = tracker.register("Dog", pet(true));
        let c = tracker.register("Cat", pet(true));

        assert_eq!(tracker.count("Dog"), 2);
        assert_eq!(tracker.keys("Dog"), [a, b]);
        assert_eq!(tracker.plugin_of(c), Some("Cat"));
        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.plugins().collect::<Vec<_>>(), vec!["Cat", "Dog"]);
    }

    #[test]
    fn test_unregister_drops_empty_mapping() {
        let mut tracker = InstanceTracker::new();
        let key = tracker.register("Dog", pet(true));
        assert!(tracker.unregister(key).is_some());
        assert!(!tracker.contains(key));
        assert_eq!(tracker.count("Dog"), 0);
        assert!(tracker.plugins().next().is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_stale_key_does_not_reach_reused_slot() {
        let mut tracker = InstanceTracker::new();
        let old = tracker.register("Dog", pet(true));
        tracker.unregister(old);
        let new = tracker.register("Cat", pet(true));

        assert_ne!(old, new);
        assert!(!tracker.contains(old));
        assert!(tracker.unregister(old).is_none());
        assert!(tracker.contains(new));
    }

    #[test]
    fn test_all_deletable() {
        let mut tracker = InstanceTracker::new();
        tracker.register("Dog", pet(true));
        assert!(tracker.all_deletable("Dog"));
        tracker.register("Dog", pet(false));
        assert!(!tracker.all_deletable("Dog"));
        assert!(tracker.all_deletable("Nobody"));
    }

    #[test]
    fn test_checked_out_instance_is_not_deletable() {
        let mut tracker = InstanceTracker::new();
        let key = tracker.register("Dog", pet(true));
        let object = tracker.checkout(key);
        assert!(object.is_some());
        assert!(tracker.checkout(key).is_none());
        assert!(!tracker.all_deletable("Dog"));

        if let Some(object) = object {
            assert!(tracker.restore(key, object).is_ok());
        }
        assert!(tracker.all_deletable("Dog"));
    }

    #[test]
    fn test_restore_after_release_fails() {
        let mut tracker = InstanceTracker::new();
        let key = tracker.register("Dog", pet(true));
        let object = tracker.checkout(key);
        assert!(tracker.unregister(key).is_none());
        if let Some(object) = object {
            assert!(tracker.restore(key, object).is_err());
        }
    }

    #[test]
    fn test_release_all_in_registration_order() {
        let mut tracker = InstanceTracker::new();
        let a = tracker.register("Dog", pet(true));
        let b = tracker.register("Dog", pet(false));
        tracker.register("Cat", pet(true));

        let released = tracker.release_all("Dog");
        let flags: Vec<bool> = released.iter().map(|o| o.can_be_deleted()).collect();
        assert_eq!(flags, vec![true, false]);
        assert!(!tracker.contains(a));
        assert!(!tracker.contains(b));
        assert_eq!(tracker.count("Cat"), 1);
    }
}
