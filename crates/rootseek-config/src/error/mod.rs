//! Error types for configuration loading and validation

pub mod format;

use std::path::PathBuf;
use thiserror::Error;

pub use format::ErrorFormatter;

/// Result type for config operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and validation
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Unknown configuration format
    #[error("Unknown configuration format for file: {path}\nSupported formats: .yml, .yaml, .toml, .json")]
    UnknownFormat { path: PathBuf },

    /// YAML parsing error with context
    #[error("Failed to parse YAML configuration{location}:\n{message}\n{context}")]
    YamlError {
        location: String,
        message: String,
        context: String,
    },

    /// TOML parsing error with context
    #[error("Failed to parse TOML configuration{location}:\n{message}\n{context}")]
    TomlError {
        location: String,
        message: String,
        context: String,
    },

    /// JSON parsing error with context
    #[error("Failed to parse JSON configuration{location}:\n{message}\n{context}")]
    JsonError {
        location: String,
        message: String,
        context: String,
    },

    /// IO error
    #[error("Failed to read configuration file: {path}\n{source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid enum value
    #[error("Invalid value '{value}' for {field}\n  Valid options: {options}\n  Hint: {hint}")]
    InvalidEnum {
        field: String,
        value: String,
        options: String,
        hint: String,
    },

    /// Value out of valid range
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Invalid integer value
    #[error("{field} must be > {min}, got {value}")]
    InvalidInteger {
        field: String,
        value: usize,
        min: usize,
    },

    /// Environment variable parsing error
    #[error("Failed to parse environment variable {var}: {message}")]
    EnvVarError { var: String, message: String },

    /// Generic validation error
    #[error("Validation error: {field}: {message}")]
    ValidationError { field: String, message: String },
}

impl ConfigError {
    /// Create an invalid enum error with a suggestion
    pub fn invalid_enum(
        field: impl Into<String>,
        value: impl Into<String>,
        options: &[&str],
    ) -> Self {
        let value = value.into();
        let hint = Self::suggest_option(&value, options);
        Self::InvalidEnum {
            field: field.into(),
            value,
            options: options.join(", "),
            hint,
        }
    }

    /// Create a YAML error from serde_yaml::Error
    pub fn from_yaml_error(err: serde_yaml::Error, content: &str, path: Option<&str>) -> Self {
        let context = err
            .location()
            .map(|loc| line_context(content, loc.line(), None))
            .unwrap_or_default();
        Self::YamlError {
            location: path.map(|p| format!(" in {}", p)).unwrap_or_default(),
            message: err.to_string(),
            context,
        }
    }

    /// Create a TOML error from toml::de::Error
    pub fn from_toml_error(err: toml::de::Error, content: &str, path: Option<&str>) -> Self {
        let context = err
            .span()
            .map(|span| {
                let line = content[..span.start.min(content.len())].matches('\n').count() + 1;
                line_context(content, line, None)
            })
            .unwrap_or_default();
        Self::TomlError {
            location: path.map(|p| format!(" in {}", p)).unwrap_or_default(),
            message: err.message().to_string(),
            context,
        }
    }

    /// Create a JSON error from serde_json::Error
    pub fn from_json_error(err: serde_json::Error, content: &str, path: Option<&str>) -> Self {
        let context = line_context(content, err.line(), Some(err.column()));
        Self::JsonError {
            location: path.map(|p| format!(" in {}", p)).unwrap_or_default(),
            message: err.to_string(),
            context,
        }
    }

    fn suggest_option(input: &str, options: &[&str]) -> String {
        let input_lower = input.to_lowercase();
        let closest = options
            .iter()
            .min_by_key(|opt| Self::distance(&input_lower, &opt.to_lowercase()));

        match closest {
            Some(opt) if Self::distance(&input_lower, &opt.to_lowercase()) <= 3 => {
                format!("Did you mean '{}'?", opt)
            }
            _ => "Check your configuration file".to_string(),
        }
    }

    /// Levenshtein distance between two short strings
    fn distance(a: &str, b: &str) -> usize {
        let b_chars: Vec<char> = b.chars().collect();
        let mut prev_row: Vec<usize> = (0..=b_chars.len()).collect();

        for (i, a_char) in a.chars().enumerate() {
            let mut curr_row = vec![i + 1];
            for (j, b_char) in b_chars.iter().enumerate() {
                let cost = if a_char == *b_char { 0 } else { 1 };
                let best = (curr_row[j] + 1)
                    .min(prev_row[j + 1] + 1)
                    .min(prev_row[j] + cost);
                curr_row.push(best);
            }
            prev_row = curr_row;
        }

        prev_row.last().copied().unwrap_or(0)
    }
}

/// Render the offending line with one line of context on each side.
fn line_context(content: &str, line_num: usize, column: Option<usize>) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if line_num == 0 || line_num > lines.len() {
        return String::new();
    }

    let start = line_num.saturating_sub(2);
    let end = (line_num + 1).min(lines.len());

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            if num != line_num {
                return format!("  {:3} | {}", num, line);
            }
            let mut marked = format!("→ {:3} | {}", num, line);
            if let Some(col) = column.filter(|c| *c > 0) {
                marked.push_str(&format!("\n        {}^", " ".repeat(col - 1)));
            }
            marked
        })
        .collect::<Vec<_>>()
        .join("\n")
}
