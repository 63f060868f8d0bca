//! YAML format parser

use crate::{error::ConfigError, Config, Result};

pub fn parse(content: &str) -> Result<Config> {
    parse_with_path(content, None)
}

/// Parse configuration from YAML with the file path for error messages
pub fn parse_with_path(content: &str, path: Option<&str>) -> Result<Config> {
    serde_yaml::from_str(content).map_err(|e| ConfigError::from_yaml_error(e, content, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ranking_section() {
        let yaml = "ranking:\n  lexical: 0.5\n  disagreement_margin: 0.1\n";
        let config = parse(yaml).unwrap();
        assert!((config.ranking.lexical - 0.5).abs() < 1e-6);
        assert!((config.ranking.disagreement_margin - 0.1).abs() < 1e-6);
        assert!((config.ranking.semantic - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_error() {
        let err = parse("ranking: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::YamlError { .. }));
    }
}
