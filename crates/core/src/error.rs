//! Error types for the quotegrid pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the quotegrid pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// An expected column is absent from a raw batch.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A column could not be cast to its declared non-numeric type.
    #[error("Coercion error in column {column}: {reason}")]
    Coercion { column: String, reason: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (malformed batch, mismatched lengths, ...).
    #[error("Data error: {0}")]
    Data(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by a polars frame operation.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a missing column error.
    pub fn missing_column(column: impl Into<String>) -> Self {
        Error::MissingColumn(column.into())
    }

    /// Create a coercion error.
    pub fn coercion(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Coercion {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Whether this error only invalidates the batch it was raised for.
    pub fn is_batch_local(&self) -> bool {
        matches!(
            self,
            Error::MissingColumn(_) | Error::Coercion { .. } | Error::Data(_) | Error::Polars(_)
        )
    }
}
