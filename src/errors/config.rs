//! Configuration error types.

/// Errors raised while reading environment configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is absent.
    #[error("Missing environment variable: {name}")]
    MissingVar { name: &'static str },

    /// An environment variable could not be parsed.
    #[error("Invalid value for {name}: {reason}")]
    InvalidVar { name: &'static str, reason: String },
}

impl ConfigError {
    pub fn missing(name: &'static str) -> Self {
        ConfigError::MissingVar { name }
    }

    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidVar {
            name,
            reason: reason.into(),
        }
    }
}
