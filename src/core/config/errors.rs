//! Configuration error types and validation traits.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An image dimension is zero.
    #[error("invalid image dimensions: {height}x{width}")]
    InvalidDimensions { height: u32, width: u32 },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The configuration file could not be read or parsed.
    #[error("failed to load configuration from '{path}': {message}")]
    LoadFailed { path: String, message: String },
}

/// A trait for validating configuration parameters.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Returns the default configuration.
    fn get_defaults() -> Self
    where
        Self: Sized;

    /// Validates that both image dimensions are non-zero.
    fn validate_image_dimensions(&self, height: u32, width: u32) -> Result<(), ConfigError> {
        if height == 0 || width == 0 {
            return Err(ConfigError::InvalidDimensions { height, width });
        }
        Ok(())
    }

    /// Validates that a value lies in `[0, 1]`.
    fn validate_unit_interval(&self, name: &str, value: f32) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&value) || value.is_nan() {
            return Err(ConfigError::InvalidConfig {
                message: format!("{} must be within [0, 1], got {}", name, value),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Thresholds;

    impl ConfigValidator for Thresholds {
        fn validate(&self) -> Result<(), ConfigError> {
            Ok(())
        }

        fn get_defaults() -> Self {
            Thresholds
        }
    }

    #[test]
    fn test_validate_image_dimensions() {
        assert!(Thresholds.validate_image_dimensions(150, 150).is_ok());
        assert!(matches!(
            Thresholds.validate_image_dimensions(0, 150),
            Err(ConfigError::InvalidDimensions {
                height: 0,
                width: 150
            })
        ));
    }

    #[test]
    fn test_validate_unit_interval() {
        assert!(Thresholds.validate_unit_interval("alpha", 0.0).is_ok());
        assert!(Thresholds.validate_unit_interval("alpha", 1.0).is_ok());
        assert!(Thresholds.validate_unit_interval("alpha", 1.5).is_err());
        assert!(Thresholds.validate_unit_interval("alpha", f32::NAN).is_err());
    }
}
