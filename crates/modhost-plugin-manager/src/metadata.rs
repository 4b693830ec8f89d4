//! Per-plugin metadata parsed from `<name>.conf`.

use std::cell::RefCell;

use modhost_config::{Configuration, ConfigurationGroup};

/// Read-only plugin metadata plus the reverse-dependency list.
///
/// Recognized keys of the metadata file:
///
/// - `depends`: a plugin that must be loaded first, repeated per dependency
/// - `replaces`: a plugin this one supersedes, repeated, informational only
/// - `[data]`: plugin specific data, exposed verbatim
///
/// `used_by` is not read from the file. It lists the loaded plugins that
/// depend on this one and changes as they load and unload.
#[derive(Debug)]
pub struct PluginMetadata {
    name: String,
    depends: Vec<String>,
    replaces: Vec<String>,
    data: ConfigurationGroup,
    used_by: RefCell<Vec<String>>,
}

/// A change to a plugin's list of dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DependentChange {
    Added,
    Removed,
}

impl PluginMetadata {
    /// Metadata of `name` read from its parsed metadata file.
    pub fn from_configuration(name: impl Into<String>, configuration: &Configuration) -> Self {
        Self {
            name: name.into(),
            depends: owned(configuration.values("depends")),
            replaces: owned(configuration.values("replaces")),
            data: configuration.group("data").cloned().unwrap_or_default(),
            used_by: RefCell::new(Vec::new()),
        }
    }

    /// Plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugins this one depends on, in file order.
    pub fn depends(&self) -> &[String] {
        &self.depends
    }

    /// Plugins this one replaces.
    pub fn replaces(&self) -> &[String] {
        &self.replaces
    }

    /// The `[data]` group, empty if the file has none.
    pub fn data(&self) -> &ConfigurationGroup {
        &self.data
    }

    /// Loaded plugins currently depending on this one.
    pub fn used_by(&self) -> Vec<String> {
        self.used_by.borrow().clone()
    }

    /// Whether any loaded plugin depends on this one.
    pub fn is_used(&self) -> bool {
        !self.used_by.borrow().is_empty()
    }

    pub(crate) fn record_dependent(&self, dependent: &str, change: DependentChange) {
        let mut used_by = self.used_by.borrow_mut();
        match change {
            DependentChange::Added => used_by.push(dependent.to_string()),
            DependentChange::Removed => {
                if let Some(position) = used_by.iter().position(|d| d == dependent) {
                    used_by.remove(position);
                }
            }
        }
    }
}

fn owned(values: Vec<&str>) -> Vec<String> {
    values.into_iter().map(str::to_string).collect()
}
