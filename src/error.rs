use thiserror::Error;

/// Errors surfaced by the data-access layer.
///
/// Driver errors pass through unchanged so callers always see the original
/// `mysql_async` error for connectivity and statement failures. The remaining
/// variants cover problems this layer detects itself: bad configuration,
/// caller misuse of the builder or cursor, and value-conversion mismatches.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    MysqlError(#[from] mysql_async::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Value conversion error: {0}")]
    ConversionError(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Cursor error: {0}")]
    CursorError(String),
}

impl From<mysql_async::UrlError> for DbError {
    fn from(err: mysql_async::UrlError) -> Self {
        DbError::ConfigError(err.to_string())
    }
}
