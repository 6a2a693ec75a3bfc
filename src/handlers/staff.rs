use super::common::{created_response, success_response};
use crate::{
    auth::AuthRouterExt,
    errors::ServiceError,
    services::accounts::{AddStaffRequest, NewStaffMember, StaffMember, StaffSummary},
    ApiResponse, AppState,
};
use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};

pub fn staff_routes() -> Router<AppState> {
    Router::new()
        .route("/staff", get(list_staff).post(add_staff))
        .route("/staff/summary", get(staff_summary))
        .with_any_role(&["admin", "manager"])
}

#[utoipa::path(
    get,
    path = "/api/v1/staff",
    summary = "Managers and cashiers",
    responses((status = 200, description = "Staff list", body = ApiResponse<Vec<StaffMember>>)),
    security(("Bearer" = [])),
    tag = "staff"
)]
pub async fn list_staff(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<StaffMember>>>, ServiceError> {
    Ok(success_response(state.services.accounts.list_staff().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/staff/summary",
    summary = "Staff head count",
    responses((status = 200, description = "Counts", body = ApiResponse<StaffSummary>)),
    security(("Bearer" = [])),
    tag = "staff"
)]
pub async fn staff_summary(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StaffSummary>>, ServiceError> {
    Ok(success_response(state.services.accounts.staff_summary().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/staff",
    summary = "Add a cashier",
    description = "Username is the e-mail's local part; the temporary password is only returned here.",
    request_body = AddStaffRequest,
    responses(
        (status = 201, description = "Cashier created", body = ApiResponse<NewStaffMember>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "E-mail or username taken", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "staff"
)]
pub async fn add_staff(
    State(state): State<AppState>,
    Json(payload): Json<AddStaffRequest>,
) -> Result<(StatusCode, Json<ApiResponse<NewStaffMember>>), ServiceError> {
    let created = state.services.accounts.add_cashier(payload).await?;
    Ok(created_response(created))
}
