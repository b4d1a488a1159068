//! Error types for strategy resolution.

use std::num::ParseIntError;

use thiserror::Error;

/// Errors resolving an int-or-percent value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntOrStringError {
    /// The string form did not end in `%`.
    #[error("invalid type: string is not a percentage: {0:?}")]
    NotAPercentage(String),

    /// The numeric part of a percentage did not parse.
    #[error("invalid value for IntOrString: invalid value {value:?}: {source}")]
    InvalidPercentage {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Errors produced by a deployment strategy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StrategyError {
    /// maxUnavailable could not be resolved against the desired count.
    #[error("failed to get scaled value from maxUnavailable")]
    MaxUnavailable(#[source] IntOrStringError),

    /// maxSurge could not be resolved against the desired count.
    #[error("failed to get scaled value from maxSurge")]
    MaxSurge(#[source] IntOrStringError),

    /// The strategy is internally inconsistent.
    #[error("invalid rolling update strategy: {0}")]
    Invalid(String),
}

impl StrategyError {
    /// Returns true if this error came from resolving an int-or-percent value.
    pub fn is_resolution_error(&self) -> bool {
        matches!(self, Self::MaxUnavailable(_) | Self::MaxSurge(_))
    }
}
