//! Error formatting with colors and context

use crate::error::ConfigError;
use std::fmt;
use yansi::Paint;

/// Format error with colors and context
pub struct ErrorFormatter {
    error: ConfigError,
    use_colors: bool,
}

impl ErrorFormatter {
    pub fn new(error: ConfigError) -> Self {
        Self {
            error,
            use_colors: supports_color(),
        }
    }

    pub fn format(&self) -> String {
        if self.use_colors {
            self.format_colored()
        } else {
            self.format_plain()
        }
    }

    fn format_colored(&self) -> String {
        match &self.error {
            ConfigError::InvalidEnum {
                field,
                value,
                options,
                hint,
            } => {
                let value_str = format!("'{}'", value);
                format!(
                    "{} Invalid value {} for {}\n  {}: {}\n  {}: {}",
                    "✗".red().bold(),
                    value_str.yellow(),
                    field.cyan(),
                    "Valid options".bold(),
                    options,
                    "Hint".bold(),
                    hint.green()
                )
            }
            ConfigError::OutOfRange {
                field,
                value,
                min,
                max,
            } => format!(
                "{} {} must be between {} and {}, got {}",
                "✗".red().bold(),
                field.cyan(),
                min.green(),
                max.green(),
                value.red()
            ),
            ConfigError::ValidationError { field, message } => {
                format!("{} {}: {}", "✗".red().bold(), field.cyan(), message)
            }
            ConfigError::FileNotFound { path } => {
                let path_str = path.display().to_string();
                format!(
                    "{} Configuration file not found: {}",
                    "✗".red().bold(),
                    path_str.yellow()
                )
            }
            _ => self.format_plain(),
        }
    }

    fn format_plain(&self) -> String {
        self.error.to_string()
    }
}

/// Check if terminal supports colors
fn supports_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    atty::is(atty::Stream::Stderr)
}

impl fmt::Display for ErrorFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_invalid_enum_plain() {
        let error = ConfigError::invalid_enum("planner.mode", "foo", &["sequential", "speculative"]);
        let formatter = ErrorFormatter {
            error,
            use_colors: false,
        };
        let output = formatter.format();
        assert!(output.contains("Invalid value"));
        assert!(output.contains("'foo'"));
    }

    #[test]
    fn test_format_out_of_range_colored_mentions_field() {
        let error = ConfigError::OutOfRange {
            field: "ranking.semantic".to_string(),
            value: 1.5,
            min: 0.0,
            max: 1.0,
        };
        let formatter = ErrorFormatter {
            error,
            use_colors: true,
        };
        assert!(formatter.format().contains("ranking.semantic"));
    }
}
