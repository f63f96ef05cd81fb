//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

/// Accepted values for `optimize.png_compression`.
pub const PNG_COMPRESSION_LEVELS: [&str; 3] = ["fast", "default", "best"];

impl Config {
    /// Validate configuration values are within acceptable ranges.
    ///
    /// Called on load; callers that override fields afterwards (CLI flags)
    /// should call it again.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "fetch.concurrency must be > 0".into(),
            ));
        }
        if self.optimize.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "optimize.concurrency must be > 0".into(),
            ));
        }
        if self.fetch.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "fetch.timeout_ms must be > 0".into(),
            ));
        }
        if self.fetch.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "fetch.connect_timeout_ms must be > 0".into(),
            ));
        }
        if self.optimize.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "optimize.timeout_ms must be > 0".into(),
            ));
        }
        if !(1..=100).contains(&self.optimize.jpeg_quality) {
            return Err(ConfigError::ValidationError(
                "optimize.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if !PNG_COMPRESSION_LEVELS.contains(&self.optimize.png_compression.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "optimize.png_compression must be one of {}",
                PNG_COMPRESSION_LEVELS.join(", ")
            )));
        }
        if self
            .input
            .required_columns()
            .iter()
            .any(|column| column.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "input column names must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_fetch_concurrency() {
        let mut config = Config::default();
        config.fetch.concurrency = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fetch.concurrency"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.optimize.timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("optimize.timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_jpeg_quality_out_of_range() {
        let mut config = Config::default();
        config.optimize.jpeg_quality = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jpeg_quality"));

        config.optimize.jpeg_quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_png_compression() {
        let mut config = Config::default();
        config.optimize.png_compression = "ultra".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("png_compression"));
    }

    #[test]
    fn test_validate_rejects_blank_column_name() {
        let mut config = Config::default();
        config.input.template_column = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("column"));
    }
}
