//! Temporary plugin directories for manager tests.
//!
//! A plugin directory holds, per plugin, a metadata file `<name>.conf` and a
//! module file `<name><suffix>`. The module files written here are empty
//! placeholders: tests pair them with an in-process module loader keyed by
//! [`PluginDirFixture::module_path`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Default metadata file suffix.
pub const METADATA_SUFFIX: &str = ".conf";

/// A temporary directory laid out like a plugin directory.
#[derive(Debug)]
pub struct PluginDirFixture {
    dir: TempDir,
    module_suffix: String,
}

impl PluginDirFixture {
    /// Create an empty plugin directory using the platform module suffix.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> io::Result<Self> {
        Self::with_module_suffix(std::env::consts::DLL_SUFFIX)
    }

    /// Create an empty plugin directory using a custom module suffix.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn with_module_suffix(suffix: impl Into<String>) -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
            module_suffix: suffix.into(),
        })
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Module file suffix in use.
    pub fn module_suffix(&self) -> &str {
        &self.module_suffix
    }

    /// Path of the module file for `name`.
    pub fn module_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{name}{}", self.module_suffix))
    }

    /// Path of the metadata file for `name`.
    pub fn metadata_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{name}{METADATA_SUFFIX}"))
    }

    /// Write a plugin: its metadata file and an empty module file.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub fn add_plugin(&self, name: &str, metadata: &str) -> io::Result<&Self> {
        fs::write(self.metadata_path(name), metadata)?;
        fs::write(self.module_path(name), b"")?;
        Ok(self)
    }

    /// Write a plugin whose only dependencies are `depends`.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub fn add_plugin_depending_on(&self, name: &str, depends: &[&str]) -> io::Result<&Self> {
        let metadata: String = depends.iter().map(|d| format!("depends={d}\n")).collect();
        self.add_plugin(name, &metadata)
    }

    /// Write only the module file, leaving the metadata file missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn add_module_only(&self, name: &str) -> io::Result<&Self> {
        fs::write(self.module_path(name), b"")?;
        Ok(self)
    }

    /// Write an arbitrary file into the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn add_file(&self, file_name: &str, contents: &str) -> io::Result<&Self> {
        fs::write(self.dir.path().join(file_name), contents)?;
        Ok(self)
    }

    /// Create a subdirectory, named like a module file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn add_module_directory(&self, name: &str) -> io::Result<&Self> {
        fs::create_dir(self.module_path(name))?;
        Ok(self)
    }

    /// Delete both files of a plugin. Missing files are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    pub fn remove_plugin(&self, name: &str) -> io::Result<&Self> {
        for path in [self.metadata_path(name), self.module_path(name)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::must;

    #[test]
    fn test_add_plugin_writes_both_files() {
        let fixture = must(PluginDirFixture::with_module_suffix(".so"));
        must(fixture.add_plugin("Dog", "depends=Bone\n"));
        assert!(fixture.module_path("Dog").is_file());
        assert_eq!(
            must(fs::read_to_string(fixture.metadata_path("Dog"))),
            "depends=Bone\n"
        );
        assert!(fixture.module_path("Dog").ends_with("Dog.so"));
    }

    #[test]
    fn test_add_plugin_depending_on() {
        let fixture = must(PluginDirFixture::new());
        must(fixture.add_plugin_depending_on("HotDog", &["Dog", "Bun"]));
        assert_eq!(
            must(fs::read_to_string(fixture.metadata_path("HotDog"))),
            "depends=Dog\ndepends=Bun\n"
        );
    }

    #[test]
    fn test_remove_plugin_is_idempotent() {
        let fixture = must(PluginDirFixture::new());
        must(fixture.add_module_only("Snail"));
        must(fixture.remove_plugin("Snail"));
        must(fixture.remove_plugin("Snail"));
        assert!(!fixture.module_path("Snail").exists());
    }
}
