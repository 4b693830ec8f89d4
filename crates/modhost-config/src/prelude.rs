//! Convenience re-exports for common types.

pub use crate::configuration::Configuration;
pub use crate::error::ConfigError;
pub use crate::group::ConfigurationGroup;
