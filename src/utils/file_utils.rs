//! File system utilities

use std::path::Path;

/// Get file extension
pub fn get_file_extension(filename: &str) -> Option<&str> {
    Path::new(filename).extension().and_then(|ext| ext.to_str())
}

/// Media type a browser would declare for a file with this name
///
/// Unknown extensions map to the empty string, which is what a file picker
/// reports when it cannot tell.
pub fn media_type_for(filename: &str) -> &'static str {
    match get_file_extension(filename).map(|ext| ext.to_ascii_lowercase()) {
        Some(ext) => match ext.as_str() {
            "csv" => "text/csv",
            "tsv" => "text/tab-separated-values",
            "txt" | "text" => "text/plain",
            "json" => "application/json",
            "xls" => "application/vnd.ms-excel",
            "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "html" | "htm" => "text/html",
            "xml" => "text/xml",
            _ => "",
        },
        None => "",
    }
}
