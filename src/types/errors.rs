use std::error::Error as StdError;
use thiserror::Error;

/// Boxed root cause carried by [`SdkError::Serialization`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("SDK '{sdk}' is not valid: {message}")]
    Validation { sdk: String, message: String },

    #[error("Failed to (de)serialize SDK registry: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{failed} of {total} SDK update listener(s) failed")]
    Listener {
        failed: usize,
        total: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Cannot resolve container path: {0}")]
    Resolution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdkError {
    pub fn serialization(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        SdkError::Serialization {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        SdkError::Serialization {
            message: message.into(),
            source: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
