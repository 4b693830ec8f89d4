//! Read-only key/value configuration files.
//!
//! This crate parses the small INI-like format used for plugin metadata
//! files (`<plugin>.conf`):
//!
//! - `key=value` pairs, keys may repeat (`depends=A`, `depends=B`)
//! - `[group]` and `[group/subgroup]` headers
//! - `#` and `;` comment lines
//! - optional double quotes around values to keep surrounding whitespace
//!
//! Configurations are read-only once parsed; nothing is ever written back.
//!
//! # Example
//!
//! ```
//! use modhost_config::Configuration;
//!
//! let conf = Configuration::parse("depends=Dog\n[data]\nlegs=4\n")?;
//! assert_eq!(conf.values("depends"), vec!["Dog"]);
//! assert_eq!(conf.group("data").and_then(|g| g.value("legs")), Some("4"));
//! # Ok::<(), modhost_config::ConfigError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod configuration;
pub mod error;
pub mod group;
pub mod prelude;

pub use configuration::Configuration;
pub use error::ConfigError;
pub use group::ConfigurationGroup;
