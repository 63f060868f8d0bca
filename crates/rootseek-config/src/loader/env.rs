//! Environment variable configuration overlay
//!
//! Variables use the format `ROOTSEEK_<section>_<field>=value`:
//! - `ROOTSEEK_RANKING_ACCEPTANCE_THRESHOLD=0.7`
//! - `ROOTSEEK_GRAPH_MAX_HOPS=2`
//! - `ROOTSEEK_RETRIEVAL_TIMEOUT_MS=2000`
//! - `ROOTSEEK_PLANNER_MODE=speculative`

use crate::{error::ConfigError, types::*, Config, Result};
use std::env;
use std::str::FromStr;

const PREFIX: &str = "ROOTSEEK_";

/// Parse configuration from environment variables
///
/// Returns `Ok(None)` when no `ROOTSEEK_` variable is set. `ROOTSEEK_LOG`
/// belongs to the tracing setup and is ignored here.
pub fn from_env() -> Result<Option<Config>> {
    let env_vars: Vec<(String, String)> = env::vars()
        .filter(|(k, _)| k.starts_with(PREFIX) && k != "ROOTSEEK_LOG")
        .collect();

    if env_vars.is_empty() {
        return Ok(None);
    }

    let mut config = Config::default();
    for (key, value) in env_vars {
        apply_env_var(&mut config, &key, &value)?;
    }
    Ok(Some(config))
}

fn apply_env_var(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let stripped = key.strip_prefix(PREFIX).unwrap_or(key);

    let Some((section, field)) = stripped.split_once('_') else {
        return Err(ConfigError::EnvVarError {
            var: key.to_string(),
            message: "Expected format: ROOTSEEK_<section>_<field>".to_string(),
        });
    };

    let section = section.to_lowercase();
    let field = field.to_lowercase();
    match section.as_str() {
        "ranking" => apply_ranking_var(&mut config.ranking, &field, value),
        "layers" => apply_layers_var(&mut config.layers, &field, value),
        "graph" => apply_graph_var(&mut config.graph, &field, value),
        "retrieval" => apply_retrieval_var(&mut config.retrieval, &field, value),
        "planner" => apply_planner_var(&mut config.planner, &field, value),
        _ => Err(ConfigError::EnvVarError {
            var: key.to_string(),
            message: format!("Unknown section: {}", section),
        }),
    }
}

fn parse_num<T: FromStr>(section: &str, field: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| ConfigError::EnvVarError {
        var: var_name(section, field),
        message: format!("Invalid number: {}", value),
    })
}

fn var_name(section: &str, field: &str) -> String {
    format!("{}{}_{}", PREFIX, section.to_uppercase(), field.to_uppercase())
}

fn unknown_field(section: &str, field: &str) -> ConfigError {
    ConfigError::EnvVarError {
        var: var_name(section, field),
        message: format!("Unknown field: {}", field),
    }
}

fn apply_ranking_var(config: &mut RankingConfig, field: &str, value: &str) -> Result<()> {
    let target = match field {
        "semantic" => &mut config.semantic,
        "graph" => &mut config.graph,
        "lexical" => &mut config.lexical,
        "layer_bonus_divisor" => &mut config.layer_bonus_divisor,
        "acceptance_threshold" => &mut config.acceptance_threshold,
        "disagreement_margin" => &mut config.disagreement_margin,
        _ => return Err(unknown_field("ranking", field)),
    };
    *target = parse_num("ranking", field, value)?;
    Ok(())
}

fn apply_layers_var(config: &mut LayerConfig, field: &str, value: &str) -> Result<()> {
    match field {
        "fallback_priority" => config.fallback_priority = parse_num("layers", field, value)?,
        _ => return Err(unknown_field("layers", field)),
    }
    Ok(())
}

fn apply_graph_var(config: &mut GraphConfig, field: &str, value: &str) -> Result<()> {
    match field {
        "max_hops" => config.max_hops = parse_num("graph", field, value)?,
        "max_paths" => config.max_paths = parse_num("graph", field, value)?,
        "expansion_seeds" => config.expansion_seeds = parse_num("graph", field, value)?,
        "similarity_threshold" => {
            config.similarity_threshold = parse_num("graph", field, value)?
        }
        "relations" => config.relations = parse_list(value),
        _ => return Err(unknown_field("graph", field)),
    }
    Ok(())
}

fn apply_retrieval_var(config: &mut RetrievalConfig, field: &str, value: &str) -> Result<()> {
    match field {
        "timeout_ms" => config.timeout_ms = parse_num("retrieval", field, value)?,
        "top_k" => config.top_k = parse_num("retrieval", field, value)?,
        "lexical_max_matches" => {
            config.lexical_max_matches = parse_num("retrieval", field, value)?
        }
        "include_paths" => config.include_paths = parse_list(value),
        "exclude_paths" => config.exclude_paths = parse_list(value),
        _ => return Err(unknown_field("retrieval", field)),
    }
    Ok(())
}

fn apply_planner_var(config: &mut PlannerConfig, field: &str, value: &str) -> Result<()> {
    match field {
        "mode" => {
            config.mode = match value.to_lowercase().as_str() {
                "sequential" => PlannerMode::Sequential,
                "speculative" => PlannerMode::Speculative,
                _ => {
                    return Err(ConfigError::invalid_enum(
                        "planner.mode",
                        value,
                        &["sequential", "speculative"],
                    ))
                }
            };
        }
        "explain" => config.explain = parse_bool(value)?,
        "derive_literal_hints" => config.derive_literal_hints = parse_bool(value)?,
        "max_candidates" => config.max_candidates = parse_num("planner", field, value)?,
        _ => return Err(unknown_field("planner", field)),
    }
    Ok(())
}

/// Comma-separated list, blanks dropped
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::EnvVarError {
            var: value.to_string(),
            message: format!(
                "Invalid boolean: {} (use true/false, 1/0, yes/no, on/off)",
                value
            ),
        }),
    }
}
