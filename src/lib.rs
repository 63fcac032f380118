//! CSV Reader Input - Core Library
//!
//! A file-selection control that reads the first selected file as text,
//! hands it to a CSV parsing collaborator and reports the parsed rows and
//! file metadata through consumer callbacks.

pub mod core;
pub mod parsers;
pub mod utils;

// Re-export commonly used types
pub use self::core::{
    config::ReaderSettings,
    csv_input::{FileCsvInput, FileCsvInputBuilder},
    element::{InputElement, InputRef},
    host::{ChangeEvent, HostFile, LocalFile, MemoryFile},
    models::{FileInfo, ParsedRecord, ReaderError, ReaderResult, SelectionOutcome},
};
pub use parsers::csv_parser::{CsvCrateParser, CsvParser, ParseError, ParserOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize the library with default settings
pub fn init() -> anyhow::Result<()> {
    utils::logging::init_tracing();

    tracing::info!("📚 {} v{} initialized", NAME, VERSION);
    Ok(())
}
