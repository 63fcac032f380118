//! CSV parsing collaborator
//!
//! The reader component never interprets CSV itself. It hands decoded text to
//! a [`CsvParser`] together with a [`ParseConfig`] and forwards whatever the
//! parser produces. [`CsvCrateParser`] is the default collaborator, built on
//! the `csv` crate.

use csv::{ReaderBuilder, StringRecord, Trim};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

use crate::core::models::ParsedRecord;

/// Key under which header-mode rows keep fields beyond the header width
pub const EXTRA_FIELDS_KEY: &str = "__parsed_extra";

/// Delimiters tried when none is configured, in preference order
const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Number of leading lines sampled for delimiter detection
const MAX_SAMPLE_LINES: usize = 5;

/// Empty-line policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SkipEmptyLines {
    /// Keep every record the reader yields
    #[default]
    No,
    /// Drop records consisting of a single empty field
    Yes,
    /// Drop records whose fields are all blank after trimming
    Greedy,
}

/// Options forwarded verbatim to the parsing collaborator
///
/// Recognized options are independently defaulted. Anything else found in a
/// settings file lands in `extra` and is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ParserOptions {
    /// Field delimiter; `None` auto-detects
    pub delimiter: Option<char>,
    /// Treat the first row as field names
    pub header: bool,
    /// Convert booleans, numerals and empty fields
    pub dynamic_typing: bool,
    /// Maximum number of data rows (0 = unlimited)
    pub preview: usize,
    /// Lines starting with this character are ignored
    pub comments: Option<char>,
    pub quote_char: char,
    pub escape_char: Option<char>,
    pub skip_empty_lines: SkipEmptyLines,
    /// Trim surrounding whitespace from every field
    pub trim: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            header: false,
            dynamic_typing: false,
            preview: 0,
            comments: None,
            quote_char: '"',
            escape_char: None,
            skip_empty_lines: SkipEmptyLines::No,
            trim: false,
            extra: Map::new(),
        }
    }
}

impl ParserOptions {
    /// Check that every configured character can drive the byte-oriented reader
    pub fn validate(&self) -> Result<(), String> {
        let single_byte = |label: &str, value: char| -> Result<(), String> {
            if value.is_ascii() && value != '\n' && value != '\r' {
                Ok(())
            } else {
                Err(format!("{label} must be a single ASCII character other than a line break, got {value:?}"))
            }
        };

        if let Some(delimiter) = self.delimiter {
            single_byte("delimiter", delimiter)?;
            if delimiter == self.quote_char {
                return Err("delimiter and quote character must differ".to_string());
            }
        }
        single_byte("quoteChar", self.quote_char)?;
        if let Some(escape) = self.escape_char {
            single_byte("escapeChar", escape)?;
        }
        if let Some(comments) = self.comments {
            single_byte("comments", comments)?;
        }
        Ok(())
    }
}

/// Broad category of a parse error
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParseErrorKind {
    Delimiter,
    FieldMismatch,
    Record,
    Options,
}

/// Machine-readable parse error code
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParseErrorCode {
    TooFewFields,
    TooManyFields,
    UndetectableDelimiter,
    InvalidRecord,
    InvalidOptions,
}

/// Error reported by the parser through its error hook
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub code: ParseErrorCode,
    pub message: String,
    /// Index of the data row the error belongs to, header row excluded
    pub row: Option<usize>,
}

impl ParseError {
    fn too_few_fields(row: usize, expected: usize, parsed: usize) -> Self {
        Self {
            kind: ParseErrorKind::FieldMismatch,
            code: ParseErrorCode::TooFewFields,
            message: format!("Too few fields: expected {expected} fields but parsed {parsed}"),
            row: Some(row),
        }
    }

    fn too_many_fields(row: usize, expected: usize, parsed: usize) -> Self {
        Self {
            kind: ParseErrorKind::FieldMismatch,
            code: ParseErrorCode::TooManyFields,
            message: format!("Too many fields: expected {expected} fields but parsed {parsed}"),
            row: Some(row),
        }
    }

    fn undetectable_delimiter() -> Self {
        Self {
            kind: ParseErrorKind::Delimiter,
            code: ParseErrorCode::UndetectableDelimiter,
            message: "Unable to auto-detect delimiting character; defaulted to ','".to_string(),
            row: None,
        }
    }

    fn invalid_options(message: String) -> Self {
        Self {
            kind: ParseErrorKind::Options,
            code: ParseErrorCode::InvalidOptions,
            message: format!("Invalid parser options: {message}"),
            row: None,
        }
    }

    fn invalid_record(row: usize, source: &csv::Error) -> Self {
        Self {
            kind: ParseErrorKind::Record,
            code: ParseErrorCode::InvalidRecord,
            message: format!("Invalid record: {source}"),
            row: Some(row),
        }
    }
}

/// Configuration handed to the parser for one call
pub struct ParseConfig<'a> {
    pub options: &'a ParserOptions,
    /// Name of the encoding the text was decoded with
    pub encoding: &'a str,
    error: &'a dyn Fn(ParseError),
}

impl<'a> ParseConfig<'a> {
    pub fn new(options: &'a ParserOptions, encoding: &'a str, error: &'a dyn Fn(ParseError)) -> Self {
        Self {
            options,
            encoding,
            error,
        }
    }

    /// Report an error through the hook, synchronously
    pub fn report(&self, error: ParseError) {
        (self.error)(error);
    }
}

/// Details about a finished parse
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParseMeta {
    pub delimiter: char,
    /// Field names when header mode is on
    pub fields: Option<Vec<String>>,
    /// More rows were available than `preview` allowed
    pub truncated: bool,
    pub row_count: usize,
}

/// Output of a parse call
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub data: Option<Vec<ParsedRecord>>,
    pub errors: Vec<ParseError>,
    pub meta: ParseMeta,
}

/// A CSV parsing collaborator
///
/// Implementations must not fail: problems are reported through
/// [`ParseConfig::report`] during the call, and whatever data could be
/// produced is returned.
pub trait CsvParser: Send + Sync {
    fn parse(&self, text: &str, config: &ParseConfig<'_>) -> ParseResult;
}

/// Default collaborator backed by `csv::Reader`
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvCrateParser;

impl CsvCrateParser {
    pub fn new() -> Self {
        Self
    }
}

impl CsvParser for CsvCrateParser {
    fn parse(&self, text: &str, config: &ParseConfig<'_>) -> ParseResult {
        let options = config.options;
        let mut errors = Vec::new();
        let mut emit = |error: ParseError| {
            config.report(error.clone());
            errors.push(error);
        };

        // Options that skipped validation could carry non-ASCII characters
        if let Err(message) = options.validate() {
            emit(ParseError::invalid_options(message));
            return ParseResult {
                data: None,
                errors,
                meta: ParseMeta::default(),
            };
        }

        let delimiter = match options.delimiter {
            Some(delimiter) => delimiter as u8,
            None => match detect_delimiter(text, options.comments, options.quote_char) {
                Some(delimiter) => delimiter,
                None => {
                    if sample_lines(text, options.comments).len() > 1 {
                        emit(ParseError::undetectable_delimiter());
                    }
                    b','
                }
            },
        };
        debug!("Using CSV delimiter {:?} (encoding {})", delimiter as char, config.encoding);

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .quote(options.quote_char as u8)
            .escape(options.escape_char.map(|c| c as u8))
            .comment(options.comments.map(|c| c as u8))
            .trim(if options.trim { Trim::All } else { Trim::None })
            .from_reader(text.as_bytes());

        let mut data = Vec::new();
        let mut fields: Option<Vec<String>> = None;
        let mut truncated = false;

        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    emit(ParseError::invalid_record(data.len(), &e));
                    continue;
                }
            };

            if should_skip(&record, options.skip_empty_lines) {
                continue;
            }

            if options.header && fields.is_none() {
                fields = Some(unique_field_names(&record));
                continue;
            }

            if options.preview > 0 && data.len() >= options.preview {
                truncated = true;
                break;
            }

            let row = data.len();
            let value = match &fields {
                Some(names) => {
                    if record.len() < names.len() {
                        emit(ParseError::too_few_fields(row, names.len(), record.len()));
                    } else if record.len() > names.len() {
                        emit(ParseError::too_many_fields(row, names.len(), record.len()));
                    }
                    record_to_object(&record, names, options.dynamic_typing)
                }
                None => Value::Array(
                    record
                        .iter()
                        .map(|field| field_value(field, options.dynamic_typing))
                        .collect(),
                ),
            };
            data.push(value);
        }

        debug!(
            "CSV parse finished: {} rows, {} errors, truncated={}",
            data.len(),
            errors.len(),
            truncated
        );

        ParseResult {
            meta: ParseMeta {
                delimiter: delimiter as char,
                fields,
                truncated,
                row_count: data.len(),
            },
            data: Some(data),
            errors,
        }
    }
}

/// First few non-empty, non-comment lines of the text
fn sample_lines(text: &str, comments: Option<char>) -> Vec<&str> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| comments.map_or(true, |c| !line.starts_with(c)))
        .take(MAX_SAMPLE_LINES)
        .collect()
}

/// Pick the candidate delimiter that splits the sample most consistently
///
/// Score is the total field count, doubled when every sampled line has the
/// same number of fields. Candidates that never occur or equal the quote
/// character are not considered; ties go to the earlier candidate.
fn detect_delimiter(text: &str, comments: Option<char>, quote_char: char) -> Option<u8> {
    let lines = sample_lines(text, comments);
    let mut best: Option<(u8, f64)> = None;

    for delimiter in DELIMITER_CANDIDATES {
        if char::from(delimiter) == quote_char {
            continue;
        }

        let counts: Vec<usize> = lines
            .iter()
            .map(|line| line.bytes().filter(|&b| b == delimiter).count())
            .collect();

        if counts.iter().all(|&count| count == 0) {
            continue;
        }

        let total_fields: usize = counts.iter().map(|count| count + 1).sum();
        let consistent = counts.windows(2).all(|pair| pair[0] == pair[1]);
        let consistency_bonus = if consistent { 2.0 } else { 1.0 };
        let score = total_fields as f64 * consistency_bonus;

        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((delimiter, score));
        }
    }

    best.map(|(delimiter, _)| delimiter)
}

fn should_skip(record: &StringRecord, policy: SkipEmptyLines) -> bool {
    match policy {
        SkipEmptyLines::No => false,
        SkipEmptyLines::Yes => record.len() == 1 && record.get(0).map_or(true, str::is_empty),
        SkipEmptyLines::Greedy => record.iter().all(|field| field.trim().is_empty()),
    }
}

/// Header names with duplicates disambiguated as `name_1`, `name_2`, ...
fn unique_field_names(record: &StringRecord) -> Vec<String> {
    let mut seen = HashSet::new();
    record
        .iter()
        .map(|field| {
            let mut name = field.to_string();
            let mut suffix = 1;
            while !seen.insert(name.clone()) {
                name = format!("{field}_{suffix}");
                suffix += 1;
            }
            name
        })
        .collect()
}

fn record_to_object(record: &StringRecord, names: &[String], dynamic_typing: bool) -> Value {
    let mut object = Map::new();
    for (name, field) in names.iter().zip(record.iter()) {
        object.insert(name.clone(), field_value(field, dynamic_typing));
    }

    if record.len() > names.len() {
        let extra = record
            .iter()
            .skip(names.len())
            .map(|field| field_value(field, dynamic_typing))
            .collect();
        object.insert(EXTRA_FIELDS_KEY.to_string(), Value::Array(extra));
    }

    Value::Object(object)
}

fn float_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*-?(\d+\.?|\.\d+|\d+\.\d+)([eE][-+]?\d+)?\s*$").expect("static float pattern")
    })
}

fn field_value(raw: &str, dynamic_typing: bool) -> Value {
    if !dynamic_typing {
        return Value::String(raw.to_string());
    }

    match raw {
        "" => Value::Null,
        "true" | "TRUE" => Value::Bool(true),
        "false" | "FALSE" => Value::Bool(false),
        _ if float_pattern().is_match(raw) => {
            let trimmed = raw.trim();
            if let Ok(int) = trimmed.parse::<i64>() {
                Value::Number(Number::from(int))
            } else {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(raw.to_string()))
            }
        }
        _ => Value::String(raw.to_string()),
    }
}
