//! Error types for signal handling.

use thiserror::Error;

/// Reasons a raw signal cannot be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("signal is missing an action (action, side or signal)")]
    MissingAction,

    #[error("signal is missing a token (token, symbol or ticker)")]
    MissingToken,
}

/// Policy rejections from the filter engine. Not failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterRejection {
    #[error("token {0} is not in the allowed token list")]
    TokenNotAllowed(String),

    #[error("strategy {0} is not in the allowed strategy list")]
    StrategyNotAllowed(String),

    #[error("action {0} is not a valid trade action")]
    InvalidAction(String),
}
