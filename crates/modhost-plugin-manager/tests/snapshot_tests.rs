//! Snapshot tests for user-facing text: state names, error messages and
//! the serialized manager configuration.

use std::path::PathBuf;

use insta::assert_snapshot;
use modhost_plugin_manager::{LoadState, ManagerConfig, ModuleError, RegistryError};

mod load_state_snapshots {
    use super::*;

    #[test]
    fn snapshot_all_state_names() {
        let names: Vec<String> = LoadState::ALL.iter().map(ToString::to_string).collect();
        assert_snapshot!(names.join("\n"), @r"
        LoadState::NotFound
        LoadState::WrongMetadataFile
        LoadState::NotLoaded
        LoadState::Loaded
        LoadState::Static
        LoadState::WrongPluginVersion
        LoadState::WrongInterfaceVersion
        LoadState::UnresolvedDependency
        LoadState::LoadFailed
        LoadState::Required
        LoadState::Used
        LoadState::UnloadFailed
        ");
    }

    #[test]
    fn snapshot_state_classification() {
        let rows: Vec<String> = LoadState::ALL
            .iter()
            .map(|state| {
                format!(
                    "{}: available={} load_failure={} unload_failure={}",
                    state.as_str(),
                    state.is_available(),
                    state.is_load_failure(),
                    state.is_unload_failure()
                )
            })
            .collect();
        assert_snapshot!(rows.join("\n"), @r"
        NotFound: available=false load_failure=false unload_failure=false
        WrongMetadataFile: available=false load_failure=false unload_failure=false
        NotLoaded: available=false load_failure=false unload_failure=false
        Loaded: available=true load_failure=false unload_failure=false
        Static: available=true load_failure=false unload_failure=false
        WrongPluginVersion: available=false load_failure=true unload_failure=false
        WrongInterfaceVersion: available=false load_failure=true unload_failure=false
        UnresolvedDependency: available=false load_failure=true unload_failure=false
        LoadFailed: available=false load_failure=true unload_failure=false
        Required: available=false load_failure=false unload_failure=true
        Used: available=false load_failure=false unload_failure=true
        UnloadFailed: available=false load_failure=false unload_failure=true
        ");
    }
}

mod error_snapshots {
    use super::*;

    fn module_path() -> PathBuf {
        PathBuf::from("/plugins/Dog.so")
    }

    #[test]
    fn snapshot_module_open_error() {
        let err = ModuleError::Open {
            path: module_path(),
            reason: "file not found".to_string(),
        };
        assert_snapshot!(err.to_string(), @"cannot open plugin file /plugins/Dog.so: file not found");
    }

    #[test]
    fn snapshot_module_missing_symbol_error() {
        let err = ModuleError::MissingSymbol {
            path: module_path(),
            symbol: "pluginVersion".to_string(),
            reason: "undefined symbol".to_string(),
        };
        assert_snapshot!(err.to_string(), @"cannot get symbol pluginVersion of /plugins/Dog.so: undefined symbol");
    }

    #[test]
    fn snapshot_module_close_error() {
        let err = ModuleError::Close {
            path: module_path(),
            reason: "module refused to close".to_string(),
        };
        assert_snapshot!(err.to_string(), @"cannot unload plugin file /plugins/Dog.so: module refused to close");
    }

    #[test]
    fn snapshot_registry_errors() {
        let errors = [
            RegistryError::WrongStaticVersion {
                plugin: "Canary".to_string(),
                expected: 1,
                actual: 7,
            },
            RegistryError::TooLateToImport {
                plugin: "Canary".to_string(),
            },
            RegistryError::DuplicateStaticPlugin {
                plugin: "Canary".to_string(),
            },
        ];
        let lines: Vec<String> = errors.iter().map(ToString::to_string).collect();
        assert_snapshot!(lines.join("\n"), @r"
        wrong version of static plugin Canary, got 7 but expected 1
        too late to import static plugin Canary
        static plugin Canary is already registered
        ");
    }
}

mod config_snapshots {
    use super::*;

    #[test]
    fn snapshot_config_json() -> Result<(), serde_json::Error> {
        let config = ManagerConfig::new("cz.mosra.Animal/1.0", "/usr/lib/animals")
            .with_module_suffix(".so")
            .with_metadata_suffix(".conf");
        assert_snapshot!(serde_json::to_string_pretty(&config)?, @r#"
        {
          "interface": "cz.mosra.Animal/1.0",
          "plugin_directory": "/usr/lib/animals",
          "module_suffix": ".so",
          "metadata_suffix": ".conf"
        }
        "#);
        Ok(())
    }
}
