//! JSON format parser

use crate::{error::ConfigError, Config, Result};

pub fn parse(content: &str) -> Result<Config> {
    parse_with_path(content, None)
}

/// Parse configuration from JSON with the file path for error messages
pub fn parse_with_path(content: &str, path: Option<&str>) -> Result<Config> {
    serde_json::from_str(content).map_err(|e| ConfigError::from_json_error(e, content, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_graph_relations() {
        let json = r#"{ "graph": { "relations": ["SIMILAR_TO", "CALLS"], "max_hops": 2 } }"#;
        let config = parse(json).unwrap();
        assert_eq!(config.graph.relations, vec!["SIMILAR_TO", "CALLS"]);
        assert_eq!(config.graph.max_hops, 2);
    }

    #[test]
    fn test_parse_error_points_at_column() {
        let err = parse_with_path("{\n  \"graph\": {,}\n}", Some("cfg.json")).unwrap_err();
        match err {
            ConfigError::JsonError {
                location, context, ..
            } => {
                assert_eq!(location, " in cfg.json");
                assert!(context.contains('^'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
