//! Parsing of configuration text into a read-only [`Configuration`].

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::group::ConfigurationGroup;

const BOM: char = '\u{feff}';

/// A parsed, read-only configuration file.
///
/// The format is line based:
///
/// ```text
/// # comment
/// ; also a comment
/// depends=Dog
/// depends=Bone
/// description="quoted value"
///
/// [data]
/// legs=4
///
/// [data/toys]
/// ball=red
/// ```
///
/// Keys may repeat. Group headers may name nested groups with `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    root: ConfigurationGroup,
    path: Option<PathBuf>,
    has_bom: bool,
    windows_eol: bool,
}

impl Configuration {
    /// An empty configuration not backed by any file.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse configuration text.
    ///
    /// # Errors
    ///
    /// Returns a syntax error with the offending line number.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let (text, has_bom) = match text.strip_prefix(BOM) {
            Some(rest) => (rest, true),
            None => (text, false),
        };

        let mut configuration = Self {
            has_bom,
            ..Self::default()
        };

        // Indices from the root down to the group currently receiving values.
        let mut current: Vec<usize> = Vec::new();

        for (index, raw) in text.split('\n').enumerate() {
            let line = index + 1;
            if raw.ends_with('\r') {
                configuration.windows_eol = true;
            }
            let buffer = raw.trim();

            if buffer.is_empty() || buffer.starts_with('#') || buffer.starts_with(';') {
                continue;
            }

            if let Some(header) = buffer.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .ok_or(ConfigError::MissingClosingBracket { line })?
                    .trim();
                current = configuration.open_group(name, line)?;
                continue;
            }

            let (key, value) = buffer
                .split_once('=')
                .ok_or(ConfigError::MissingEquals { line })?;
            let value = unquote(value.trim(), line)?;

            group_at(&mut configuration.root, &current)
                .push_value(key.trim().to_string(), value.to_string());
        }

        Ok(configuration)
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read (a missing file
    /// is an error; read-only configurations are never created implicitly)
    /// or a syntax error from [`Configuration::parse`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut configuration = Self::parse(&text)?;
        configuration.path = Some(path.to_path_buf());
        tracing::trace!(path = %path.display(), "parsed configuration file");
        Ok(configuration)
    }

    /// Root group holding top-level values and groups.
    pub fn root(&self) -> &ConfigurationGroup {
        &self.root
    }

    /// First top-level value stored under `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.root.value(key)
    }

    /// All top-level values stored under `key`.
    pub fn values(&self, key: &str) -> Vec<&str> {
        self.root.values(key)
    }

    /// First top-level group named `name`.
    pub fn group(&self, name: &str) -> Option<&ConfigurationGroup> {
        self.root.group(name)
    }

    /// File this configuration was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the source started with a UTF-8 byte order mark.
    pub fn has_bom(&self) -> bool {
        self.has_bom
    }

    /// Whether the source used `\r\n` line endings.
    pub fn has_windows_eol(&self) -> bool {
        self.windows_eol
    }

    fn open_group(&mut self, name: &str, line: usize) -> Result<Vec<usize>, ConfigError> {
        if name.is_empty() {
            return Err(ConfigError::EmptyGroupName { line });
        }

        let components: Vec<&str> = name.split('/').map(str::trim).collect();
        if components.iter().any(|c| c.is_empty()) {
            return Err(ConfigError::EmptyGroupName { line });
        }

        let mut path = Vec::with_capacity(components.len());
        let last = components.len() - 1;
        for (depth, component) in components.iter().enumerate() {
            let group = group_at(&mut self.root, &path);
            let index = match group.last_group_index(component) {
                Some(index) if depth < last => index,
                _ => group.push_group((*component).to_string()),
            };
            path.push(index);
        }

        Ok(path)
    }
}

fn group_at<'a>(group: &'a mut ConfigurationGroup, path: &[usize]) -> &'a mut ConfigurationGroup {
    match path.split_first() {
        Some((&index, rest)) if index < group.group_len() => {
            group_at(group.child_mut(index), rest)
        }
        _ => group,
    }
}

fn unquote(value: &str, line: usize) -> Result<&str, ConfigError> {
    match value.strip_prefix('"') {
        Some(rest) => rest
            .strip_suffix('"')
            .ok_or(ConfigError::MissingClosingQuote { line }),
        None => Ok(value),
    }
}
