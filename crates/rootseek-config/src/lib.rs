//! Configuration management for rootseek
//!
//! This crate provides a validated configuration system with support for:
//! - Multiple formats (YAML, TOML, JSON)
//! - Config validation with helpful error messages
//! - Config merging (file + environment + explicit overrides)
//! - Type-safe configuration structs
//!
//! # Example
//!
//! ```no_run
//! use rootseek_config::Config;
//!
//! // Load from default location (.rootseek.{toml,yml,json})
//! let config = Config::load()?;
//!
//! // Or load from specific file
//! let config = Config::from_file("path/to/config.toml")?;
//!
//! let threshold = config.ranking.acceptance_threshold;
//! let hops = config.graph.max_hops;
//! # Ok::<(), rootseek_config::ConfigError>(())
//! ```

pub mod error;
pub mod loader;
pub mod types;
pub mod validation;

pub use error::{ConfigError, ErrorFormatter, Result};
pub use loader::ConfigBuilder;
pub use types::*;

/// Trait for config validation
pub use validation::Validate;
