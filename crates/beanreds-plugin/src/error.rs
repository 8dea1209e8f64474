//! Plugin configuration errors.

use rust_decimal::Decimal;
use thiserror::Error;

/// Error returned when a plugin configuration string cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration literal is malformed.
    #[error("syntax error at position {position}: {message}")]
    Syntax {
        /// Byte offset of the error in the configuration string.
        position: usize,
        /// What went wrong.
        message: String,
    },
    /// The top-level value is not a mapping.
    #[error("configuration must be a mapping, found {found}")]
    NotAMapping {
        /// Kind of value that was found instead.
        found: &'static str,
    },
    /// A key holds a value of the wrong shape.
    #[error("invalid value for '{key}': expected {expected}")]
    InvalidValue {
        /// Offending key.
        key: String,
        /// Expected shape.
        expected: &'static str,
    },
    /// A clearing account appears twice.
    #[error("clearing account '{0}' is listed more than once")]
    DuplicateAccount(String),
    /// A clearing account has a negative date range.
    #[error("date range for '{account}' must not be negative, got {days}")]
    NegativeDateRange {
        /// Clearing account.
        account: String,
        /// The configured range.
        days: Decimal,
    },
    /// The matching tolerance is zero or negative.
    #[error("tolerance must be greater than zero, got {0}")]
    NonPositiveTolerance(Decimal),
    /// Matched postings would be moved back into their own clearing account.
    #[error("target account for '{0}' resolves to the clearing account itself")]
    TargetIsClearingAccount(String),
    /// A rename pattern is not a valid regular expression.
    #[error("invalid account pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The pattern as written.
        pattern: String,
        /// Regex compiler message.
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidValue {
            key: key.into(),
            expected,
        }
    }
}
