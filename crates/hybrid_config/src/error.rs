//! Configuration errors.

/// Problems reading or validating `hybrid.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The file is not valid TOML or does not match the schema.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A target name that no generator knows.
    #[error("unknown target '{0}'")]
    UnknownTarget(String),

    /// A value is out of range.
    #[error("validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_target() {
        let err = ConfigError::UnknownTarget("java".to_string());
        assert_eq!(err.to_string(), "unknown target 'java'");
    }

    #[test]
    fn display_validation_error() {
        let err = ConfigError::ValidationError("opt_level must be between 0 and 3".into());
        assert_eq!(
            err.to_string(),
            "validation error: opt_level must be between 0 and 3"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ConfigError = io.into();
        assert!(err.to_string().starts_with("failed to read configuration:"));
    }
}
