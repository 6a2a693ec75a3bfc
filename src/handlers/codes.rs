use super::common::svg_response;
use crate::{
    auth::AuthRouterExt,
    codes::{encode, parse_format, qr_svg, BarcodeFormat},
    errors::ServiceError,
    AppState,
};
use axum::{extract::Query, response::Response, routing::get, Router};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BarcodeParams {
    #[param(example = "590123412345")]
    pub data: String,
    /// ean13 (default), ean8, upca, code128 or code39
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QrParams {
    pub data: String,
}

pub fn code_routes() -> Router<AppState> {
    Router::new()
        .route("/codes/barcode", get(barcode))
        .route("/codes/qr", get(qr))
        .with_auth()
}

#[utoipa::path(
    get,
    path = "/api/v1/codes/barcode",
    summary = "Render a barcode as SVG",
    params(BarcodeParams),
    responses(
        (status = 200, description = "SVG image", content_type = "image/svg+xml", body = String),
        (status = 400, description = "Unsupported format or illegal data", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "codes"
)]
pub async fn barcode(Query(params): Query<BarcodeParams>) -> Result<Response, ServiceError> {
    let format = match params.format.as_deref() {
        Some(raw) if !raw.trim().is_empty() => parse_format(raw)?,
        _ => BarcodeFormat::default(),
    };
    let symbol = encode(&params.data, format)?;
    Ok(svg_response(symbol.to_svg()))
}

#[utoipa::path(
    get,
    path = "/api/v1/codes/qr",
    summary = "Render a QR code as SVG",
    params(QrParams),
    responses(
        (status = 200, description = "SVG image", content_type = "image/svg+xml", body = String),
        (status = 400, description = "Empty or oversized data", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "codes"
)]
pub async fn qr(Query(params): Query<QrParams>) -> Result<Response, ServiceError> {
    Ok(svg_response(qr_svg(&params.data)?))
}
