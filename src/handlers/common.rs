use crate::{entities::account::Role, errors::ServiceError, ApiResponse};
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::str::FromStr;

/// 200 with the standard envelope
pub fn success_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

/// 201 with the standard envelope
pub fn created_response<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

pub fn no_content_response() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub fn svg_response(svg: String) -> Response {
    ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response()
}

/// Role taken from a path segment such as `/auth/manager/login`.
pub fn parse_role(raw: &str) -> Result<Role, ServiceError> {
    Role::from_str(raw).map_err(|_| ServiceError::NotFound(format!("Unknown role '{}'", raw)))
}
