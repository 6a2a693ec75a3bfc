use super::common::success_response;
use crate::{
    auth::AuthRouterExt,
    errors::ServiceError,
    festival::{catalog, FestivalDef, FestivalSalesResponse},
    ApiResponse, AppState,
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct FestivalSalesQuery {
    /// Festival name, alias or `DD-MM-YYYY` date
    #[serde(default)]
    #[param(example = "Diwali")]
    pub query: String,
}

/// Catalog entry as exposed over HTTP
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FestivalInfo {
    pub name: String,
    pub aliases: Vec<String>,
    /// `DD-MM` of the fixed calendar day
    pub date: String,
}

impl From<&FestivalDef> for FestivalInfo {
    fn from(def: &FestivalDef) -> Self {
        Self {
            name: def.name.to_string(),
            aliases: def.aliases.iter().map(|a| a.to_string()).collect(),
            date: format!("{:02}-{:02}", def.day, def.month),
        }
    }
}

pub fn festival_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/festival-sales",
            get(festival_sales).post(festival_sales_json),
        )
        .route("/festivals", get(list_festivals))
        .with_any_role(&["admin", "manager"])
}

#[utoipa::path(
    get,
    path = "/api/v1/festival-sales",
    summary = "Rank products for a festival",
    description = "Top and least 10 products by predicted sales. Domain failures are reported in the `error` field with status 200.",
    params(FestivalSalesQuery),
    responses(
        (status = 200, description = "Ranking or a reported failure", body = FestivalSalesResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admins and managers only"),
        (status = 500, description = "Model folder unreadable", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "festival"
)]
pub async fn festival_sales(
    State(state): State<AppState>,
    Query(params): Query<FestivalSalesQuery>,
) -> Result<Json<FestivalSalesResponse>, ServiceError> {
    let response = state.services.festival_sales.rank_for(&params.query).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/v1/festival-sales",
    summary = "Rank products for a festival (JSON body)",
    request_body = FestivalSalesQuery,
    responses(
        (status = 200, description = "Ranking or a reported failure", body = FestivalSalesResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admins and managers only"),
    ),
    security(("Bearer" = [])),
    tag = "festival"
)]
pub async fn festival_sales_json(
    State(state): State<AppState>,
    Json(params): Json<FestivalSalesQuery>,
) -> Result<Json<FestivalSalesResponse>, ServiceError> {
    let response = state.services.festival_sales.rank_for(&params.query).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/festivals",
    summary = "Known festivals",
    responses((status = 200, description = "Festival catalog", body = ApiResponse<Vec<FestivalInfo>>)),
    security(("Bearer" = [])),
    tag = "festival"
)]
pub async fn list_festivals() -> Json<ApiResponse<Vec<FestivalInfo>>> {
    success_response(catalog().iter().map(FestivalInfo::from).collect())
}
