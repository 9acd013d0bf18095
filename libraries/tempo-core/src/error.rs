/// Core error types for Tempo
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while loading catalog data
#[derive(Error, Debug)]
pub enum CoreError {
    /// Catalog file could not be read
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Catalog document is not valid
    #[error("Invalid catalog: {0}")]
    Parse(#[from] serde_json::Error),
}
