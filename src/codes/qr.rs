use super::BarcodeError;
use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};

const MIN_DIMENSION: u32 = 200;

/// QR symbol at error-correction level L, smallest version that fits.
pub fn qr_svg(data: &str) -> Result<String, BarcodeError> {
    if data.trim().is_empty() {
        return Err(BarcodeError::EmptyData);
    }

    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)
        .map_err(|e| BarcodeError::QrEncoding(e.to_string()))?;

    Ok(code
        .render::<svg::Color>()
        .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .quiet_zone(true)
        .build())
}
