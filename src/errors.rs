//! Unified error type for the disbursement tracker.
//!
//! Lookups that miss return `Ok(None)` or `Ok(false)` rather than an error;
//! the variants here cover invalid input and storage failures.

use thiserror::Error;

/// Errors produced by the store operations, configuration loading and the CLI.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
    },

    /// Any failure reported by the database layer
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem failure (proof storage, config file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Audit snapshot could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Monetary amount outside the accepted range
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: i64,
    },

    /// Attendance count outside `0..=total_saturdays`
    #[error("Attendance {attended} must be between 0 and {total_saturdays}")]
    InvalidAttendance {
        /// The rejected attendance count
        attended: i32,
        /// The batch's configured number of Saturdays
        total_saturdays: i32,
    },

    /// Date or month string in the wrong format
    #[error("Invalid date '{value}', expected {expected}")]
    InvalidDate {
        /// The rejected input
        value: String,
        /// The expected format, e.g. `YYYY-MM-DD`
        expected: &'static str,
    },

    /// Input rejected by a business rule
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable description of the rule that failed
        message: String,
    },
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
