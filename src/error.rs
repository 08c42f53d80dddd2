//! Error types for Gator.

use thiserror::Error;

/// Common error type for Gator.
#[derive(Error, Debug)]
pub enum GatorError {
    /// Database error.
    ///
    /// Generic wrapper for backend errors that have no more specific variant.
    #[error("database error: {0}")]
    Database(String),

    /// A uniqueness constraint rejected an insert.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Session state error (no current user, unreadable session file).
    #[error("session error: {0}")]
    Session(String),

    /// Feed fetch error.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
}

/// Failure modes of a single feed fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The URL could not be parsed or uses an unsupported scheme.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Connection, timeout or body read failure.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// The body exceeded the configured size limit.
    #[error("feed too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    /// The body is not a recognizable RSS or Atom document.
    #[error("failed to parse feed: {0}")]
    Parse(String),
}

impl From<sqlx::Error> for GatorError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => GatorError::NotFound("row".to_string()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                GatorError::DuplicateKey(db_err.message().to_string())
            }
            other => GatorError::Database(other.to_string()),
        }
    }
}

impl GatorError {
    /// Whether this error is a uniqueness violation.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, GatorError::DuplicateKey(_))
    }
}

/// Result type alias for Gator operations.
pub type Result<T> = std::result::Result<T, GatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error_display() {
        let err = GatorError::NotFound("feed".to_string());
        assert_eq!(err.to_string(), "feed not found");
    }

    #[test]
    fn test_duplicate_key_display() {
        let err = GatorError::DuplicateKey("posts.url".to_string());
        assert_eq!(err.to_string(), "duplicate key: posts.url");
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_fetch_error_conversion() {
        let err: GatorError = FetchError::HttpStatus(404).into();
        assert!(matches!(err, GatorError::Fetch(FetchError::HttpStatus(404))));
        assert_eq!(err.to_string(), "fetch error: HTTP status 404");
        assert!(!err.is_duplicate());
    }

    #[test]
    fn test_too_large_display() {
        let err = FetchError::TooLarge { size: 10, max: 5 };
        assert_eq!(err.to_string(), "feed too large: 10 bytes (max 5 bytes)");
    }

    #[test]
    fn test_row_not_found_conversion() {
        let err: GatorError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, GatorError::NotFound(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GatorError = io_err.into();
        assert!(matches!(err, GatorError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
