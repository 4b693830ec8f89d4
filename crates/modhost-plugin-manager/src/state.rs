//! Plugin load states.
//!
//! [`LoadState`] is both the state stored per plugin and the result of every
//! state-changing operation. It is a plain sum type: "is it one of A, B, C"
//! questions go through [`LoadState::is_any_of`] or the named predicates,
//! never through bit arithmetic.

use std::fmt;

/// Load state of a plugin, or the outcome of a load/unload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// The plugin is not known to the manager that was asked.
    NotFound,
    /// The plugin's metadata file is missing or cannot be parsed.
    WrongMetadataFile,
    /// The plugin is known and can be loaded.
    NotLoaded,
    /// The plugin is loaded and can be instanced.
    Loaded,
    /// The plugin is linked into the program and can never be unloaded.
    Static,
    /// `load` only: the module reports a different plugin version.
    WrongPluginVersion,
    /// `load` only: the module implements a different interface.
    WrongInterfaceVersion,
    /// `load` only: a dependency could not be loaded.
    UnresolvedDependency,
    /// `load` only: the module could not be opened or lacks an entry point.
    LoadFailed,
    /// `unload` only: another loaded plugin depends on this one.
    Required,
    /// `unload` only: a live instance refuses to be deleted.
    Used,
    /// `unload` only: the module could not be closed.
    UnloadFailed,
}

impl LoadState {
    /// Every state, in declaration order.
    pub const ALL: [LoadState; 12] = [
        LoadState::NotFound,
        LoadState::WrongMetadataFile,
        LoadState::NotLoaded,
        LoadState::Loaded,
        LoadState::Static,
        LoadState::WrongPluginVersion,
        LoadState::WrongInterfaceVersion,
        LoadState::UnresolvedDependency,
        LoadState::LoadFailed,
        LoadState::Required,
        LoadState::Used,
        LoadState::UnloadFailed,
    ];

    /// Whether this state is one of `states`.
    pub fn is_any_of(self, states: &[LoadState]) -> bool {
        states.contains(&self)
    }

    /// Loaded or static: instances can be created and dependents satisfied.
    pub fn is_available(self) -> bool {
        self.is_any_of(&[LoadState::Loaded, LoadState::Static])
    }

    /// Known but not loaded. Records in these states may be dropped by a
    /// directory rescan.
    pub fn is_unloaded(self) -> bool {
        self.is_any_of(&[LoadState::NotLoaded, LoadState::WrongMetadataFile])
    }

    /// States a plugin may be left in when its manager is destroyed.
    pub fn is_settled(self) -> bool {
        self.is_any_of(&[
            LoadState::Static,
            LoadState::NotLoaded,
            LoadState::WrongMetadataFile,
        ])
    }

    /// Failures only `load` returns.
    pub fn is_load_failure(self) -> bool {
        self.is_any_of(&[
            LoadState::WrongPluginVersion,
            LoadState::WrongInterfaceVersion,
            LoadState::UnresolvedDependency,
            LoadState::LoadFailed,
        ])
    }

    /// Failures only `unload` returns.
    pub fn is_unload_failure(self) -> bool {
        self.is_any_of(&[LoadState::Required, LoadState::Used, LoadState::UnloadFailed])
    }

    /// Short name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            LoadState::NotFound => "NotFound",
            LoadState::WrongMetadataFile => "WrongMetadataFile",
            LoadState::NotLoaded => "NotLoaded",
            LoadState::Loaded => "Loaded",
            LoadState::Static => "Static",
            LoadState::WrongPluginVersion => "WrongPluginVersion",
            LoadState::WrongInterfaceVersion => "WrongInterfaceVersion",
            LoadState::UnresolvedDependency => "UnresolvedDependency",
            LoadState::LoadFailed => "LoadFailed",
            LoadState::Required => "Required",
            LoadState::Used => "Used",
            LoadState::UnloadFailed => "UnloadFailed",
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoadState::{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_any_of() {
        assert!(LoadState::Loaded.is_any_of(&[LoadState::Static, LoadState::Loaded]));
        assert!(!LoadState::NotLoaded.is_any_of(&[LoadState::Static, LoadState::Loaded]));
        assert!(!LoadState::Loaded.is_any_of(&[]));
    }

    #[test]
    fn test_failure_sets_are_disjoint() {
        for state in LoadState::ALL {
            assert!(
                !(state.is_load_failure() && state.is_unload_failure()),
                "{state} is in both failure sets"
            );
        }
    }

    #[test]
    fn test_settled_states() {
        let settled: Vec<LoadState> = LoadState::ALL
            .into_iter()
            .filter(|s| s.is_settled())
            .collect();
        assert_eq!(
            settled,
            vec![
                LoadState::WrongMetadataFile,
                LoadState::NotLoaded,
                LoadState::Static
            ]
        );
    }

    #[test]
    fn test_available_states() {
        assert!(LoadState::Loaded.is_available());
        assert!(LoadState::Static.is_available());
        assert!(!LoadState::NotLoaded.is_available());
        assert!(!LoadState::UnloadFailed.is_available());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            LoadState::UnresolvedDependency.to_string(),
            "LoadState::UnresolvedDependency"
        );
    }
}
