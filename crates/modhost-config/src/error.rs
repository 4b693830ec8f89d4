//! Error types for configuration parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for configuration loading and parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot open configuration file {path}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A group header is missing its closing bracket.
    #[error("line {line}: missing closing bracket for group header")]
    MissingClosingBracket {
        /// 1-based line number.
        line: usize,
    },

    /// A group header has an empty name or an empty path component.
    #[error("line {line}: empty group name")]
    EmptyGroupName {
        /// 1-based line number.
        line: usize,
    },

    /// A non-comment line has no `=` separator.
    #[error("line {line}: key/value pair without '=' character")]
    MissingEquals {
        /// 1-based line number.
        line: usize,
    },

    /// A quoted value is missing its closing quote.
    #[error("line {line}: missing closing quotes in value")]
    MissingClosingQuote {
        /// 1-based line number.
        line: usize,
    },
}

impl ConfigError {
    /// Line number the error refers to, if it is a syntax error.
    pub fn line(&self) -> Option<usize> {
        match self {
            ConfigError::Io { .. } => None,
            ConfigError::MissingClosingBracket { line }
            | ConfigError::EmptyGroupName { line }
            | ConfigError::MissingEquals { line }
            | ConfigError::MissingClosingQuote { line } => Some(*line),
        }
    }
}
