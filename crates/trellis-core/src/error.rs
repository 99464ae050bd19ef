//! Error types for Trellis

use thiserror::Error;

/// How the batch driver should react to a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Another attempt may succeed (network, remote service, storage)
    Retryable,
    /// Retrying the same item cannot help
    Terminal,
    /// The user asked the run to stop
    Cancelled,
}

/// The main error type for Trellis operations
#[derive(Debug, Error)]
pub enum TrellisError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Catalog store error: {0}")]
    Store(String),

    #[error("No rows updated for item {0}")]
    NoRowsUpdated(String),

    #[error("Image download failed: {0}")]
    Download(String),

    #[error("Not an image: {0}")]
    InvalidImage(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Invalid asset: {0}")]
    InvalidAsset(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Cancelled")]
    Cancelled,
}

impl TrellisError {
    /// Classify this error for the retry loop
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrellisError::Cancelled => ErrorKind::Cancelled,
            TrellisError::Config(_) => ErrorKind::Terminal,
            _ => ErrorKind::Retryable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }
}

/// Result type alias for Trellis operations
pub type Result<T> = std::result::Result<T, TrellisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_failures_are_retryable() {
        assert!(TrellisError::Generation("timeout".into()).is_retryable());
        assert!(TrellisError::Storage("502".into()).is_retryable());
        assert!(TrellisError::NoRowsUpdated("A100".into()).is_retryable());
        assert!(TrellisError::Download("reset".into()).is_retryable());
        // A CDN can serve an HTML error page with status 200 for a while
        assert!(TrellisError::InvalidImage("text/html".into()).is_retryable());
    }

    #[test]
    fn test_terminal_and_cancelled_kinds() {
        assert_eq!(TrellisError::Config("x".into()).kind(), ErrorKind::Terminal);
        assert_eq!(TrellisError::Cancelled.kind(), ErrorKind::Cancelled);
        assert!(!TrellisError::Cancelled.is_retryable());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TrellisError = io.into();
        assert!(matches!(err, TrellisError::IoError(_)));
        assert!(err.to_string().contains("gone"));
    }
}
