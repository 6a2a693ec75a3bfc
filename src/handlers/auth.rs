use super::common::{created_response, parse_role, success_response};
use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ServiceError,
    services::accounts::{
        AccountResponse, LoginRequest, LoginResponse, OtpDispatched, RegistrationRequest,
        VerifyOtpRequest,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

/// Public registration and login routes plus authenticated logout.
pub fn auth_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/:role/register/request-otp", post(request_registration_otp))
        .route("/:role/register/verify", post(verify_registration))
        .route("/:role/login", post(login));

    let authenticated = Router::new().route("/logout", post(logout)).with_auth();

    public.merge(authenticated)
}

#[utoipa::path(
    post,
    path = "/auth/{role}/register/request-otp",
    summary = "Start registration",
    description = "Validate a registration and e-mail a one-time code",
    params(("role" = String, Path, description = "admin, manager or cashier")),
    request_body = RegistrationRequest,
    responses(
        (status = 200, description = "Code sent", body = ApiResponse<OtpDispatched>),
        (status = 400, description = "Invalid registration", body = crate::errors::ErrorResponse),
        (status = 409, description = "E-mail or username taken", body = crate::errors::ErrorResponse),
        (status = 502, description = "E-mail could not be sent", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn request_registration_otp(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Json(payload): Json<RegistrationRequest>,
) -> Result<Json<ApiResponse<OtpDispatched>>, ServiceError> {
    let role = parse_role(&role)?;
    let dispatched = state
        .services
        .accounts
        .request_registration_otp(role, payload)
        .await?;
    Ok(success_response(dispatched))
}

#[utoipa::path(
    post,
    path = "/auth/{role}/register/verify",
    summary = "Complete registration",
    params(("role" = String, Path, description = "admin, manager or cashier")),
    request_body = VerifyOtpRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<AccountResponse>),
        (status = 400, description = "Wrong, expired or exhausted code", body = crate::errors::ErrorResponse),
        (status = 409, description = "E-mail or username taken meanwhile", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn verify_registration(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AccountResponse>>), ServiceError> {
    let role = parse_role(&role)?;
    let account = state
        .services
        .accounts
        .verify_registration(role, payload)
        .await?;
    Ok(created_response(AccountResponse::from(account)))
}

#[utoipa::path(
    post,
    path = "/auth/{role}/login",
    summary = "Log in",
    params(("role" = String, Path, description = "admin, manager or cashier")),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid username or password", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ServiceError> {
    let role = parse_role(&role)?;
    let response = state.services.accounts.login(role, payload).await?;
    Ok(success_response(response))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    summary = "Log out",
    description = "Revoke the presented access token",
    responses(
        (status = 200, description = "Token revoked"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> Json<ApiResponse<Value>> {
    state.services.accounts.logout(&user).await;
    success_response(json!({ "logged_out": true }))
}
