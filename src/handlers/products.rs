use super::common::{created_response, no_content_response, success_response};
use crate::{
    auth::AuthRouterExt,
    errors::ServiceError,
    services::products::{
        CreateProductRequest, LowStockAlert, ProductFilter, ProductListResponse, ProductResponse,
        UpdateProductRequest,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

/// Reads are open to every role; writes need admin or manager.
pub fn product_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/products", get(list_products))
        .route("/products/low-stock", get(low_stock_products))
        .route("/products/:id", get(get_product))
        .with_auth();

    let write = Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product))
        .with_any_role(&["admin", "manager"]);

    read.merge(write)
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    summary = "List products",
    params(ProductFilter),
    responses(
        (status = 200, description = "Products and low-stock alerts", body = ApiResponse<ProductListResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<ApiResponse<ProductListResponse>>, ServiceError> {
    let listing = state.services.products.list(filter).await?;
    Ok(success_response(listing))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/low-stock",
    summary = "Products under the low-stock threshold",
    responses((status = 200, description = "Low-stock alerts", body = ApiResponse<Vec<LowStockAlert>>)),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn low_stock_products(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<LowStockAlert>>>, ServiceError> {
    let products = state.services.products.low_stock(None).await?;
    Ok(success_response(
        products.iter().map(LowStockAlert::from).collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    summary = "Get product",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state.services.products.get(id).await?;
    Ok(success_response(product.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    summary = "Create product",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Created", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid product", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admins and managers only"),
        (status = 409, description = "SKU already exists", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductResponse>>), ServiceError> {
    let product = state.services.products.create(payload).await?;
    Ok(created_response(product.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    summary = "Update product",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already exists", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state.services.products.update(id, payload).await?;
    Ok(success_response(product.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    summary = "Delete product",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.products.delete(id).await?;
    Ok(no_content_response())
}
