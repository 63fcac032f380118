//! Core component module
//!
//! This module contains the reader component, its rendered control, the host
//! file abstraction, configuration and shared models.

pub mod config;
pub mod csv_input;
pub mod element;
pub mod host;
pub mod models;

#[cfg(test)]
mod csv_input_tests;

// Re-export commonly used types
pub use config::ReaderSettings;
pub use csv_input::FileCsvInput;
