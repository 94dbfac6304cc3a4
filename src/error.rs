//! Error types for the batch orchestrator

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the batch orchestrator
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing signing seed: {0}")]
    MissingSeed(String),

    #[error("Invalid signing seed: {0}")]
    InvalidSeed(String),

    // Operator input errors
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid operation request: {0}")]
    InvalidRequest(String),

    // Query service errors
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Query returned HTTP {status}: {body}")]
    QueryStatus { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    // Signing service errors
    #[error("Signing service error: {0}")]
    Signer(String),

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Transaction rejected with code {code}: {raw_log}")]
    Rejected { code: u32, raw_log: String },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error came from submitting a transaction.
    ///
    /// Submission failures are recorded as failed attempts and never abort a run.
    pub fn is_submission_failure(&self) -> bool {
        matches!(
            self,
            Error::Signer(_) | Error::Broadcast(_) | Error::Rejected { .. } | Error::Http(_)
        )
    }

    /// Check if this error came from the read side of the ledger.
    ///
    /// These abort the current operation for the current identity only.
    pub fn is_query_failure(&self) -> bool {
        matches!(
            self,
            Error::Query(_) | Error::QueryStatus { .. } | Error::Deserialization(_)
        )
    }

    /// Check if this error should stop the process at startup
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::MissingSeed(_) | Error::InvalidSeed(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
