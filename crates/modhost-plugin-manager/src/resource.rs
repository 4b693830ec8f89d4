//! Compiled-in resource store.
//!
//! Static plugins carry their metadata file as an embedded resource instead
//! of a file next to a module. Resources are grouped by plugin name and
//! addressed by file name within the group.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Named groups of embedded files.
#[derive(Debug, Default)]
pub struct ResourceStore {
    groups: RefCell<BTreeMap<String, BTreeMap<String, Cow<'static, [u8]>>>>,
}

impl ResourceStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace `file` in `group`.
    pub fn register(
        &self,
        group: impl Into<String>,
        file: impl Into<String>,
        data: impl Into<Cow<'static, [u8]>>,
    ) {
        let (group, file) = (group.into(), file.into());
        tracing::trace!(group = %group, file = %file, "Registered resource");
        self.groups
            .borrow_mut()
            .entry(group)
            .or_default()
            .insert(file, data.into());
    }

    /// Contents of `file` in `group`.
    pub fn get(&self, group: &str, file: &str) -> Option<Cow<'static, [u8]>> {
        self.groups
            .borrow()
            .get(group)
            .and_then(|files| files.get(file))
            .cloned()
    }

    /// Contents of `file` in `group` as text, lossily decoded.
    pub fn get_string(&self, group: &str, file: &str) -> Option<String> {
        self.get(group, file)
            .map(|data| String::from_utf8_lossy(&data).into_owned())
    }

    /// Whether `group` holds any file.
    pub fn has_group(&self, group: &str) -> bool {
        self.groups.borrow().contains_key(group)
    }

    /// File names in `group`, sorted.
    pub fn files(&self, group: &str) -> Vec<String> {
        self.groups
            .borrow()
            .get(group)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let store = ResourceStore::new();
        store.register("Canary", "Canary.conf", &b"depends=Bird\n"[..]);
        assert_eq!(
            store.get_string("Canary", "Canary.conf").as_deref(),
            Some("depends=Bird\n")
        );
        assert!(store.get("Canary", "other.conf").is_none());
        assert!(store.get("Parrot", "Canary.conf").is_none());
    }

    #[test]
    fn test_register_replaces() {
        let store = ResourceStore::new();
        store.register("Canary", "Canary.conf", b"a".to_vec());
        store.register("Canary", "Canary.conf", b"b".to_vec());
        assert_eq!(store.get_string("Canary", "Canary.conf").as_deref(), Some("b"));
        assert_eq!(store.files("Canary"), vec!["Canary.conf".to_string()]);
        assert!(store.has_group("Canary"));
        assert!(!store.has_group("Parrot"));
    }
}
