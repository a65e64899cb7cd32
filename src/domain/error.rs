use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Transient storage error: {0}")]
    TransientStorage(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Retries exhausted for '{operation}' after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Unknown client: {0}")]
    UnknownClient(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' in column '{column}' at row {row}: {reason}")]
    InvalidCell {
        row: usize,
        column: &'static str,
        value: String,
        reason: String,
    },

    #[error("Column layout mismatch: expected {expected} columns, found {found}")]
    LayoutMismatch { expected: usize, found: usize },

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Acquisition error: {0}")]
    Acquisition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    /// Connectivity-class storage failures that the retry policy may repeat.
    pub fn is_transient(&self) -> bool {
        matches!(self, IngestionError::TransientStorage(_))
    }

    /// Whether the failure ends the current client's run rather than just
    /// the report file being processed.
    pub fn aborts_client_run(&self) -> bool {
        matches!(
            self,
            IngestionError::TransientStorage(_)
                | IngestionError::Storage(_)
                | IngestionError::RetriesExhausted { .. }
                | IngestionError::UnknownClient(_)
                | IngestionError::Config(_)
                | IngestionError::Runtime(_)
        )
    }
}
