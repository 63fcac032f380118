//! Encoding resolution and text decoding
//!
//! Turns raw file bytes into text the way a browser text read does: the
//! configured label picks the decoder, a byte order mark overrides it, and
//! malformed sequences become U+FFFD instead of failing the read.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use tracing::{debug, warn};

/// Label that asks for detection instead of a fixed encoding
pub const AUTO_ENCODING: &str = "auto";

/// Default encoding label
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// How many leading bytes are fed to the detector
const DETECTION_SAMPLE_SIZE: usize = 8192;

/// Decoded file contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    /// Encoding actually used, after BOM sniffing
    pub encoding: &'static Encoding,
    /// Malformed sequences were replaced
    pub had_errors: bool,
}

/// Whether a label names an encoding we can decode, or is `auto`
pub fn is_known_label(label: &str) -> bool {
    let label = label.trim();
    label.eq_ignore_ascii_case(AUTO_ENCODING) || Encoding::for_label(label.as_bytes()).is_some()
}

/// Resolve a label to an encoding; unknown labels fall back to UTF-8
pub fn resolve_encoding(label: &str, data: &[u8]) -> &'static Encoding {
    let label = label.trim();
    if label.eq_ignore_ascii_case(AUTO_ENCODING) {
        return detect_encoding(data);
    }

    match Encoding::for_label(label.as_bytes()) {
        Some(encoding) => encoding,
        None => {
            warn!("Unknown encoding label '{}', falling back to UTF-8", label);
            UTF_8
        }
    }
}

/// Decode bytes using the encoding named by `label`
pub fn decode_text(data: &[u8], label: &str) -> DecodedText {
    let encoding = resolve_encoding(label, data);
    let (text, used, had_errors) = encoding.decode(data);

    if had_errors {
        warn!(
            "Malformed {} sequences replaced while decoding {} bytes",
            used.name(),
            data.len()
        );
    }

    DecodedText {
        text: text.into_owned(),
        encoding: used,
        had_errors,
    }
}

/// Guess the encoding of a byte sample
///
/// BOM first, then UTF-8 validity, then chardetng.
pub fn detect_encoding(data: &[u8]) -> &'static Encoding {
    if data.is_empty() {
        return UTF_8;
    }

    if let Some(encoding) = detect_bom(data) {
        debug!("Detected encoding from BOM: {}", encoding.name());
        return encoding;
    }

    let sample = &data[..data.len().min(DETECTION_SAMPLE_SIZE)];
    if valid_utf8_prefix(sample) {
        return UTF_8;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, sample.len() == data.len());
    let guessed = detector.guess(None, true);
    debug!("Detected encoding with chardetng: {}", guessed.name());
    guessed
}

fn detect_bom(data: &[u8]) -> Option<&'static Encoding> {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some(UTF_8)
    } else if data.starts_with(&[0xFF, 0xFE]) {
        Some(UTF_16LE)
    } else if data.starts_with(&[0xFE, 0xFF]) {
        Some(UTF_16BE)
    } else {
        None
    }
}

// The sample may end in the middle of a multi-byte character
fn valid_utf8_prefix(sample: &[u8]) -> bool {
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && sample.len() - e.valid_up_to() < 4,
    }
}
