//! Error types for stream execution.

use thiserror::Error;

/// The main error type for stream invocations.
#[derive(Error, Debug)]
pub enum Error {
    /// A producer or transform failed while a sequence was being pulled.
    #[error("Execution error: {0}")]
    Execution(String),

    /// An output was asked for data of a type it does not carry.
    #[error("Type mismatch at '{producer}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Label of the stream that produced the output.
        producer: String,
        /// The requested type.
        expected: &'static str,
        /// The type actually carried.
        found: &'static str,
    },

    /// A single-use inner sequence was drained twice.
    #[error("Sequence '{0}' was already consumed")]
    Consumed(String),

    /// A JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error raised by an external collaborator, such as a provider client.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// A generic error with a message.
    #[error("{0}")]
    Message(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Message(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Message(msg.to_string())
    }
}

/// A specialized `Result` type for stream operations.
pub type Result<T> = std::result::Result<T, Error>;
