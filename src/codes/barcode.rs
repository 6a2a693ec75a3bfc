//! 1-D barcode symbologies rendered to SVG.

use super::{escape_xml, BarcodeError};
use barcoders::error::Error as BarcodersError;
use barcoders::sym::{code128::Code128, code39::Code39, ean13::EAN13, ean8::EAN8};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use strum::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BarcodeFormat {
    #[default]
    #[strum(to_string = "ean13", serialize = "ean-13")]
    Ean13,
    #[strum(to_string = "ean8", serialize = "ean-8")]
    Ean8,
    #[strum(to_string = "upca", serialize = "upc-a", serialize = "upc")]
    UpcA,
    Code128,
    Code39,
}

/// Encoded symbol: one flag per module, `true` for a bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Barcode {
    pub format: BarcodeFormat,
    /// Human readable text, including any computed check character
    pub text: String,
    pub modules: Vec<bool>,
}

/// Selects Code 128 character set B.
const CODE128_SET_B: char = 'Ɓ';
const CODE39_ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-. $/+%";

const MODULE_WIDTH: usize = 2;
const QUIET_ZONE: usize = 10;
const BAR_HEIGHT: usize = 80;
const TEXT_HEIGHT: usize = 20;

fn modules_of(format: BarcodeFormat, encoded: Result<Vec<u8>, BarcodersError>) -> Result<Vec<bool>, BarcodeError> {
    encoded
        .map(|bits| bits.into_iter().map(|b| b == 1).collect())
        .map_err(|e| BarcodeError::Encoding {
            format,
            reason: format!("{e:?}"),
        })
}

/// Modulo-10 check digit with 3,1,3,... weights from the rightmost digit.
pub fn gtin_check_digit(digits: &[u8]) -> u8 {
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| u32::from(*d) * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// Digits with the check digit appended, or verified when already present.
fn gtin_digits(format: BarcodeFormat, data: &str, payload_len: usize) -> Result<Vec<u8>, BarcodeError> {
    if let Some(bad) = data.chars().find(|c| !c.is_ascii_digit()) {
        return Err(BarcodeError::IllegalCharacter { format, ch: bad });
    }
    let mut digits: Vec<u8> = data.bytes().map(|b| b - b'0').collect();

    if digits.len() == payload_len {
        digits.push(gtin_check_digit(&digits));
    } else if digits.len() == payload_len + 1 {
        let expected = gtin_check_digit(&digits[..payload_len]);
        if digits[payload_len] != expected {
            return Err(BarcodeError::ChecksumMismatch {
                format,
                expected: char::from(b'0' + expected),
            });
        }
    } else {
        return Err(BarcodeError::InvalidLength {
            format,
            expected: format!("{} or {} digits", payload_len, payload_len + 1),
            got: digits.len(),
        });
    }

    Ok(digits)
}

fn digits_text(digits: &[u8]) -> String {
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

fn encode_ean13(data: &str) -> Result<Barcode, BarcodeError> {
    let format = BarcodeFormat::Ean13;
    let text = digits_text(&gtin_digits(format, data, 12)?);
    let modules = modules_of(format, EAN13::new(text[..12].to_string()).map(|s| s.encode()))?;
    Ok(Barcode { format, text, modules })
}

fn encode_ean8(data: &str) -> Result<Barcode, BarcodeError> {
    let format = BarcodeFormat::Ean8;
    let text = digits_text(&gtin_digits(format, data, 7)?);
    let modules = modules_of(format, EAN8::new(text[..7].to_string()).map(|s| s.encode()))?;
    Ok(Barcode { format, text, modules })
}

/// UPC-A is EAN-13 with a leading zero.
fn encode_upca(data: &str) -> Result<Barcode, BarcodeError> {
    let format = BarcodeFormat::UpcA;
    let text = digits_text(&gtin_digits(format, data, 11)?);
    let modules = modules_of(format, EAN13::new(format!("0{}", &text[..11])).map(|s| s.encode()))?;
    Ok(Barcode { format, text, modules })
}

/// Code 128 character set B: printable ASCII only.
fn encode_code128(data: &str) -> Result<Barcode, BarcodeError> {
    let format = BarcodeFormat::Code128;
    if let Some(ch) = data.chars().find(|c| !(' '..='~').contains(c)) {
        return Err(BarcodeError::IllegalCharacter { format, ch });
    }
    let modules = modules_of(
        format,
        Code128::new(format!("{CODE128_SET_B}{data}")).map(|s| s.encode()),
    )?;
    Ok(Barcode {
        format,
        text: data.to_string(),
        modules,
    })
}

/// Code 39 with its mod-43 check character; input is upper-cased.
fn encode_code39(data: &str) -> Result<Barcode, BarcodeError> {
    let format = BarcodeFormat::Code39;
    let upper = data.to_uppercase();

    let mut sum = 0;
    for ch in upper.chars() {
        sum += CODE39_ALPHABET
            .find(ch)
            .ok_or(BarcodeError::IllegalCharacter { format, ch })?;
    }
    let modules = modules_of(format, Code39::with_checksum(upper.clone()).map(|s| s.encode()))?;

    let mut text = upper;
    text.push(char::from(CODE39_ALPHABET.as_bytes()[sum % 43]));
    Ok(Barcode { format, text, modules })
}

pub fn encode(data: &str, format: BarcodeFormat) -> Result<Barcode, BarcodeError> {
    let data = data.trim();
    if data.is_empty() {
        return Err(BarcodeError::EmptyData);
    }

    match format {
        BarcodeFormat::Ean13 => encode_ean13(data),
        BarcodeFormat::Ean8 => encode_ean8(data),
        BarcodeFormat::UpcA => encode_upca(data),
        BarcodeFormat::Code128 => encode_code128(data),
        BarcodeFormat::Code39 => encode_code39(data),
    }
}

impl Barcode {
    /// Bars as merged rectangles, quiet zone on both sides, text underneath.
    pub fn to_svg(&self) -> String {
        let width = (self.modules.len() + 2 * QUIET_ZONE) * MODULE_WIDTH;
        let height = BAR_HEIGHT + TEXT_HEIGHT;

        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
        );
        let _ = write!(svg, r#"<rect width="{width}" height="{height}" fill="white"/>"#);

        let mut i = 0;
        while i < self.modules.len() {
            if !self.modules[i] {
                i += 1;
                continue;
            }
            let start = i;
            while i < self.modules.len() && self.modules[i] {
                i += 1;
            }
            let x = (QUIET_ZONE + start) * MODULE_WIDTH;
            let w = (i - start) * MODULE_WIDTH;
            let _ = write!(
                svg,
                r#"<rect x="{x}" y="0" width="{w}" height="{BAR_HEIGHT}" fill="black"/>"#
            );
        }

        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" font-family="monospace" font-size="14" text-anchor="middle">{}</text>"#,
            width / 2,
            height - 4,
            escape_xml(&self.text)
        );
        svg.push_str("</svg>");
        svg
    }
}
