use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "RetailX API",
        version = "0.1.0",
        description = r#"
# RetailX Retail Back-Office API

Accounts with e-mail verified registration, inventory, a manager dashboard,
barcode and QR rendering, a retail chat assistant and festival sales ranking
from pre-trained per-product forecast models.

## Authentication

Log in with `POST /auth/{role}/login` and send the returned token:

```
Authorization: Bearer <your-jwt-token>
```

Festival sales, dashboard and staff endpoints need the `admin` or `manager` role.

## Error Handling

Failures use one body shape:

```json
{
  "error": "Bad Request",
  "message": "Bad request: Passwords do not match",
  "request_id": "5f0c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

The festival ranking is the exception: domain failures such as an unknown
festival or a missing model folder come back with status 200 and a populated
`error` field.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Registration, login and logout"),
        (name = "festival", description = "Festival sales ranking"),
        (name = "products", description = "Inventory management"),
        (name = "dashboard", description = "Manager dashboard figures"),
        (name = "staff", description = "Staff management"),
        (name = "codes", description = "Barcode and QR rendering"),
        (name = "assistant", description = "Retail chat assistant"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::auth::request_registration_otp,
        crate::handlers::auth::verify_registration,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,

        crate::handlers::festival::festival_sales,
        crate::handlers::festival::festival_sales_json,
        crate::handlers::festival::list_festivals,

        crate::handlers::products::list_products,
        crate::handlers::products::low_stock_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,

        crate::handlers::dashboard::kpi,
        crate::handlers::dashboard::category_chart,
        crate::handlers::dashboard::alerts,

        crate::handlers::staff::list_staff,
        crate::handlers::staff::staff_summary,
        crate::handlers::staff::add_staff,

        crate::handlers::codes::barcode,
        crate::handlers::codes::qr,

        crate::handlers::assistant::chat,

        crate::handlers::health::api_status,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::entities::account::Role,
            crate::festival::FestivalSalesResponse,
            crate::festival::ProductPrediction,
            crate::services::products::StockLevel,
            crate::codes::BarcodeFormat,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
