//! Core data models for the CSV reader input

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parsers::csv_parser::ParseError;

/// A single parsed row as produced by the parsing collaborator.
///
/// The pipeline never looks inside it: plain rows arrive as JSON arrays,
/// header-mode rows as JSON objects keyed by field name.
pub type ParsedRecord = serde_json::Value;

/// Snapshot of the selected file's attributes at selection time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,

    /// Size in bytes
    pub size: u64,

    /// Declared MIME type, possibly empty
    pub media_type: String,

    /// Last modification time, milliseconds since the Unix epoch
    pub modified_at: i64,
}

/// Result of processing one change event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// The event carried no files
    NoFile,

    /// Strict mode refused the declared media type
    Rejected,

    /// The loaded callback fired with this many records
    Loaded { records: usize },

    /// The file's bytes could not be read
    ReadFailed,

    /// A newer selection superseded this one before it completed
    Stale,
}

/// Errors delivered to the consumer's error callback
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("[strict mode] Accept type not respected: got '{media_type}' but not in '{accept}'")]
    StrictMode { media_type: String, accept: String },

    #[error("Parsing error: {0}")]
    Parse(#[from] ParseError),

    #[error("Failed to read '{name}': {message}")]
    Read { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl ReaderError {
    /// Whether the error came from the parsing collaborator
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

/// Result type alias for reader operations
pub type ReaderResult<T> = Result<T, ReaderError>;
