use thiserror::Error;

/// Main error type for Docdex
#[derive(Error, Debug)]
pub enum DocdexError {
    /// Record store (SQLite) errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File extension has no registered parser
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Parser could not produce usable content
    #[error("Parse error: {0}")]
    Parse(String),

    /// An index batch task failed or timed out
    #[error("Index batch error: {0}")]
    IndexBatch(String),

    /// Engine transport or API errors
    #[error("Engine error: {0}")]
    Engine(String),

    /// Engine has not reached readiness yet
    #[error("Search engine is not ready")]
    EngineNotReady,

    /// Record store used before initialize()
    #[error("Record store is not initialized")]
    StoreNotInitialized,

    /// Upload record does not exist
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Delete left the index and the record store disagreeing
    #[error("Deletion inconsistency: {0}")]
    DeletionInconsistency(String),
}

/// Convenient Result type using DocdexError
pub type Result<T> = std::result::Result<T, DocdexError>;
