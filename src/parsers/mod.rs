//! File parsing modules
//!
//! Contains the parsing collaborator the reader component delegates to.

pub mod csv_parser;

// Re-export commonly used parsers
pub use csv_parser::*;
