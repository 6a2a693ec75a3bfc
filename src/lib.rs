//! RetailX API Library
//!
//! Retail back-office service: staff accounts with e-mail verified
//! registration, inventory, dashboard figures, barcode and QR rendering, a
//! chat assistant and festival sales ranking from trained forecast models.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod codes;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod festival;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::AuthService;
use crate::services::factory::ServiceContainer;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub services: ServiceContainer,
}

// Common response wrappers
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_carries_message_without_data() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.message.as_deref(), Some("oops"));
        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
    }
}

/// Everything under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        // Status and health endpoints
        .route("/status", get(handlers::health::api_status))
        .route("/health", get(handlers::health::health_check))
        // Festival sales (admin, manager)
        .merge(handlers::festival::festival_routes())
        // Inventory (read: any role, write: admin, manager)
        .merge(handlers::products::product_routes())
        // Manager dashboard
        .merge(handlers::dashboard::dashboard_routes())
        .merge(handlers::staff::staff_routes())
        // Utilities (any role)
        .merge(handlers::codes::code_routes())
        .merge(handlers::assistant::assistant_routes())
}

/// Full application router with tracing, request ids and auth wiring.
/// CORS and compression are left to the binary.
pub fn app_router(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    Router::<AppState>::new()
        .route("/health", get(handlers::health::liveness))
        .nest("/api/v1", api_v1_routes())
        .nest("/auth", handlers::auth::auth_routes())
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            auth::inject_auth_service,
        ))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::festival::{FestivalError, FestivalSalesResponse};
    pub use crate::services::factory::{ServiceContainer, ServiceFactory};
    pub use crate::tracing::*;
    pub use crate::{ApiResponse, AppState};
}
