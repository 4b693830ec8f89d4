//! Convenience re-exports for common test utilities.
//!
//! ```rust,ignore
//! use modhost_test_helpers::prelude::*;
//! ```

pub use crate::must::{must, must_parse, must_some, must_with};

#[cfg(feature = "fixtures")]
pub use crate::fixtures::PluginDirFixture;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
