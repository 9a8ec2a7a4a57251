//! Error types for the mistake notebook
//!
//! All errors use thiserror for structured error handling.
//! Every error renders to a message that can be shown to the user as-is.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Rejected user input. The operation left no trace.
    #[error("{0}")]
    Validation(String),

    #[error("Mistake not found: {0}")]
    MistakeNotFound(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Another export or import is already running")]
    ArchiveBusy,

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Import failed: {0}")]
    Import(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
