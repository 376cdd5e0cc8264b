//! Error types for milk-core

use thiserror::Error;

/// Result type alias using milk-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// PostgREST code for a relation that does not exist.
const PG_UNDEFINED_TABLE: &str = "42P01";
/// PostgREST code for a relation missing from the schema cache.
const PGRST_SCHEMA_CACHE_MISS: &str = "PGRST205";
/// Postgres unique constraint violation.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// Errors that can occur in milk-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with an error payload
    #[error("Backend error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// A table or view the client expects is not deployed
    #[error("Table not found: {0}")]
    MissingTable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing or malformed client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Object storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Build an API error from a status and an optional PostgREST error code.
    ///
    /// Undefined-table codes are folded into [`Error::MissingTable`] so callers
    /// can treat an undeployed relation as a soft condition.
    pub fn api(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        match code.as_deref() {
            Some(PG_UNDEFINED_TABLE | PGRST_SCHEMA_CACHE_MISS) => Self::MissingTable(message),
            _ => Self::Api {
                status,
                code,
                message,
            },
        }
    }

    /// Whether the error is a unique-constraint violation on insert.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Api { code: Some(code), .. } if code == PG_UNIQUE_VIOLATION)
    }

    pub const fn is_missing_table(&self) -> bool {
        matches!(self, Self::MissingTable(_))
    }
}
