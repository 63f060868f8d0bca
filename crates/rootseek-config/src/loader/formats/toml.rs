//! TOML format parser

use crate::{error::ConfigError, Config, Result};

pub fn parse(content: &str) -> Result<Config> {
    parse_with_path(content, None)
}

/// Parse configuration from TOML with the file path for error messages
pub fn parse_with_path(content: &str, path: Option<&str>) -> Result<Config> {
    ::toml::from_str(content).map_err(|e| ConfigError::from_toml_error(e, content, path))
}
