//! Validation trait and helpers for configuration types

use crate::error::{ConfigError, Result};

/// Trait for validating configuration values
///
/// Implement this for any config type that needs validation beyond
/// type-level checks.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Validate that a value lies within `[min, max]`
pub fn validate_range(field: impl Into<String>, value: f32, min: f32, max: f32) -> Result<()> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::OutOfRange {
            field: field.into(),
            value: value as f64,
            min: min as f64,
            max: max as f64,
        });
    }
    Ok(())
}

/// Validate that an integer is strictly above `min`
pub fn validate_positive(field: impl Into<String>, value: usize, min: usize) -> Result<()> {
    if value <= min {
        return Err(ConfigError::InvalidInteger {
            field: field.into(),
            value,
            min,
        });
    }
    Ok(())
}

/// Validate that an integer does not exceed `max`
pub fn validate_at_most(field: impl Into<String>, value: usize, max: usize) -> Result<()> {
    if value > max {
        let field = field.into();
        return Err(ConfigError::ValidationError {
            message: format!("{} too large ({}), consider using <= {}", field, value, max),
            field,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_valid() {
        assert!(validate_range("test", 0.5, 0.0, 1.0).is_ok());
    }

    #[test]
    fn test_range_invalid() {
        assert!(validate_range("test", 1.5, 0.0, 1.0).is_err());
        assert!(validate_range("test", f32::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_positive() {
        assert!(validate_positive("test", 5, 0).is_ok());
        assert!(validate_positive("test", 0, 0).is_err());
    }

    #[test]
    fn test_at_most() {
        assert!(validate_at_most("test", 10, 10).is_ok());
        assert!(validate_at_most("test", 11, 10).is_err());
    }
}
