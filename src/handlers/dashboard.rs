use super::common::success_response;
use crate::{
    auth::AuthRouterExt,
    errors::ServiceError,
    services::dashboard::{CategoryChart, DashboardAlert, KpiSummary},
    ApiResponse, AppState,
};
use axum::{extract::State, routing::get, Json, Router};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/kpi", get(kpi))
        .route("/dashboard/category-chart", get(category_chart))
        .route("/dashboard/alerts", get(alerts))
        .with_any_role(&["admin", "manager"])
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/kpi",
    summary = "Headline inventory and staff figures",
    responses((status = 200, description = "KPIs", body = ApiResponse<KpiSummary>)),
    security(("Bearer" = [])),
    tag = "dashboard"
)]
pub async fn kpi(State(state): State<AppState>) -> Result<Json<ApiResponse<KpiSummary>>, ServiceError> {
    Ok(success_response(state.services.dashboard.kpis().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/category-chart",
    summary = "Stock value per category",
    responses((status = 200, description = "Chart series", body = ApiResponse<CategoryChart>)),
    security(("Bearer" = [])),
    tag = "dashboard"
)]
pub async fn category_chart(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CategoryChart>>, ServiceError> {
    Ok(success_response(state.services.dashboard.category_chart().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/alerts",
    summary = "Up to three low-stock alerts",
    responses((status = 200, description = "Alerts", body = ApiResponse<Vec<DashboardAlert>>)),
    security(("Bearer" = [])),
    tag = "dashboard"
)]
pub async fn alerts(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<DashboardAlert>>>, ServiceError> {
    Ok(success_response(state.services.dashboard.alerts().await?))
}
