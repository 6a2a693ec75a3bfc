use crate::{handlers::AppState, ApiResponse};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::time::Instant;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthDetails {
    pub database: ComponentHealth,
    pub model_folder: ComponentHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub details: HealthDetails,
}

static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Call once at startup so uptime is measured from there.
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// Liveness: the process is answering.
pub async fn liveness() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/status",
    summary = "Service version and environment",
    responses((status = 200, description = "Status")),
    tag = "health"
)]
pub async fn api_status(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(json!({
        "status": "ok",
        "service": "retailx-api",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "assistant_configured": state.config.assistant.is_configured(),
    })))
}

async fn check_redis_connection(url: &str) -> Result<(), String> {
    let client = redis::Client::open(url).map_err(|e| format!("Invalid URL: {}", e))?;
    let mut conn = client
        .get_async_connection()
        .await
        .map_err(|e| format!("Failed to connect: {}", e))?;

    let _: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .map_err(|e| format!("Ping failed: {}", e))?;

    Ok(())
}

fn component(result: Result<(), String>, latency_ms: Option<u64>) -> ComponentHealth {
    match result {
        Ok(()) => ComponentHealth {
            status: ComponentStatus::Up,
            message: "OK".to_string(),
            latency_ms,
        },
        Err(e) => ComponentHealth {
            status: ComponentStatus::Down,
            message: e,
            latency_ms,
        },
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    summary = "Dependency health",
    description = "Database is critical; the model folder and Redis (when used for OTPs) only degrade the status.",
    responses(
        (status = 200, description = "Up or degraded", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse),
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_start = Instant::now();
    let db_result = crate::db::check_connection(&state.db)
        .await
        .map_err(|e| e.to_string());
    let database = component(db_result, Some(db_start.elapsed().as_millis() as u64));

    let model_dir = &state.config.forecast.model_dir;
    let model_folder = component(
        if Path::new(model_dir).is_dir() {
            Ok(())
        } else {
            Err(format!("{} is not a directory", model_dir))
        },
        None,
    );

    let redis = if state.config.otp.backend == "redis" {
        let start = Instant::now();
        let result = check_redis_connection(&state.config.redis_url).await;
        Some(component(result, Some(start.elapsed().as_millis() as u64)))
    } else {
        None
    };

    let optional_up = model_folder.status == ComponentStatus::Up
        && redis.as_ref().map_or(true, |r| r.status == ComponentStatus::Up);
    let status = match (database.status, optional_up) {
        (ComponentStatus::Up, true) => ComponentStatus::Up,
        (ComponentStatus::Up, false) => ComponentStatus::Degraded,
        _ => ComponentStatus::Down,
    };
    let code = if status == ComponentStatus::Down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_secs: uptime_secs(),
            details: HealthDetails {
                database,
                model_folder,
                redis,
            },
        }),
    )
}
