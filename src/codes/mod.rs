//! Barcode and QR code generation.

pub mod barcode;
pub mod qr;

pub use barcode::{encode, Barcode, BarcodeFormat};
pub use qr::qr_svg;

use crate::errors::ServiceError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BarcodeError {
    #[error("No data to encode")]
    EmptyData,
    #[error("The data contains '{ch}', which is not allowed in {format} format")]
    IllegalCharacter { format: BarcodeFormat, ch: char },
    #[error("{format} needs {expected}, got {got}")]
    InvalidLength {
        format: BarcodeFormat,
        expected: String,
        got: usize,
    },
    #[error("Wrong check digit for {format}; expected {expected}")]
    ChecksumMismatch { format: BarcodeFormat, expected: char },
    #[error("Could not encode {format}: {reason}")]
    Encoding { format: BarcodeFormat, reason: String },
    #[error("Unsupported barcode format: {0}")]
    UnsupportedFormat(String),
    #[error("QR encoding failed: {0}")]
    QrEncoding(String),
}

impl From<BarcodeError> for ServiceError {
    fn from(err: BarcodeError) -> Self {
        ServiceError::BadRequest(err.to_string())
    }
}

/// Parse a user-supplied format name.
pub fn parse_format(raw: &str) -> Result<BarcodeFormat, BarcodeError> {
    raw.trim()
        .parse()
        .map_err(|_| BarcodeError::UnsupportedFormat(raw.trim().to_string()))
}

pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Default output file name for the CLI: the payload with path-hostile
/// characters replaced.
pub fn default_file_name(data: &str) -> String {
    let stem: String = data
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    format!("{}.svg", if stem.is_empty() { "code".to_string() } else { stem })
}
