use thiserror::Error;

use crate::transport::TransportError;

/// Validation and configuration errors exposed by `fxfeed-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("endpoint pool must contain at least one endpoint")]
    EmptyEndpointPool,
    #[error("endpoint must be an http(s) URL: '{value}'")]
    InvalidEndpoint { value: String },

    #[error("feed address must be 0x followed by 40 hex characters: '{value}'")]
    InvalidFeedAddress { value: String },

    #[error("currency must be a 3-letter uppercase ISO code: '{value}'")]
    InvalidCurrency { value: String },
    #[error("currency pair must be formatted as BASE/QUOTE: '{value}'")]
    InvalidPair { value: String },

    #[error("environment variable '{name}' is required")]
    MissingEnv { name: &'static str },
    #[error("environment variable '{name}' must be a positive integer: '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("field '{field}' must be greater than zero")]
    ZeroValue { field: &'static str },
}

/// Arithmetic failures raised while deriving a rate pair from a raw answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateError {
    #[error("raw answer is zero; reciprocal rate is undefined")]
    ZeroAnswer,
    #[error("decimals {decimals} exceeds supported maximum {max}")]
    UnsupportedDecimals { decimals: u8, max: u8 },
}

/// Retry classification for [`FeedError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rotate the endpoint pool, back off, then retry.
    Transient,
    /// Retry immediately on the same endpoint while attempts remain.
    Other,
    /// Never retried.
    Fatal,
}

/// Top-level error type for feed operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Rate(#[from] RateError),

    #[error("failed to build transport for endpoint '{endpoint}': {message}")]
    Construction { endpoint: String, message: String },

    #[error("serialization gate is closed")]
    GateClosed,
}

impl FeedError {
    pub fn construction(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construction {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transport(error) if error.is_transient() => ErrorClass::Transient,
            Self::Transport(_) => ErrorClass::Other,
            Self::Validation(_) | Self::Rate(_) | Self::Construction { .. } | Self::GateClosed => {
                ErrorClass::Fatal
            }
        }
    }

    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(error) => Some(error),
            _ => None,
        }
    }
}
