//! Configuration error types.

use std::fmt;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to parse environment variable.
    Parse {
        key: String,
        value: String,
        error: String,
    },
    /// Invalid value for environment variable.
    Invalid { key: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse { key, value, error } => {
                write!(f, "failed to parse {}='{}': {}", key, value, error)
            }
            ConfigError::Invalid { key, message } => {
                write!(f, "invalid value for {}: {}", key, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::Parse {
            key: "DOS_PAGE_COUNT".into(),
            value: "abc".into(),
            error: "invalid digit found in string".into(),
        };
        assert!(err.to_string().contains("DOS_PAGE_COUNT"));
        assert!(err.to_string().contains("abc"));

        let err = ConfigError::Invalid {
            key: "DOS_HTTP_STATUS".into(),
            message: "1000 is not a valid HTTP status code".into(),
        };
        assert!(err.to_string().contains("DOS_HTTP_STATUS"));
    }
}
