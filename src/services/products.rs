use crate::{
    entities::product::{self, Entity as Product, DEFAULT_MIN_STOCK_LEVEL},
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Fixed threshold used by the list filter, alerts and dashboard.
pub const LOW_STOCK_THRESHOLD: i32 = 10;
/// Anything above this is "high" stock.
pub const HIGH_STOCK_THRESHOLD: i32 = 50;
pub const LIST_ALERT_LIMIT: u64 = 5;
/// Upper bound on a unit price; keeps inventory totals well inside `Decimal`.
pub const MAX_PRICE: i64 = 1_000_000_000;

fn validate_price(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("price_min_zero"));
    }
    if *value > Decimal::from(MAX_PRICE) {
        return Err(ValidationError::new("price_too_large"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StockLevel {
    /// Fewer than 10 units
    Low,
    /// Zero units
    Out,
    /// More than 50 units
    High,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ProductFilter {
    /// Name contains (case-insensitive)
    pub search: Option<String>,
    pub category: Option<String>,
    pub stock_level: Option<StockLevel>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product name must be between 1 and 200 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 100, message = "SKU must be between 1 and 100 characters"))]
    pub sku: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub in_stock: i32,
    #[validate(range(min = 0, message = "Minimum stock level cannot be negative"))]
    pub min_stock_level: Option<i32>,
    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product name must be between 1 and 200 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "SKU must be between 1 and 100 characters"))]
    pub sku: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub in_stock: Option<i32>,
    #[validate(range(min = 0, message = "Minimum stock level cannot be negative"))]
    pub min_stock_level: Option<i32>,
    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price: Decimal,
    pub in_stock: i32,
    pub min_stock_level: i32,
    pub description: Option<String>,
    pub is_available: bool,
    pub stock_status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        let stock_status = model.stock_status().to_string();
        Self {
            id: model.id,
            name: model.name,
            sku: model.sku,
            category: model.category,
            brand: model.brand,
            price: model.price,
            in_stock: model.in_stock,
            min_stock_level: model.min_stock_level,
            description: model.description,
            is_available: model.is_available,
            stock_status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LowStockAlert {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub current_stock: i32,
    pub min_stock: i32,
}

impl From<&product::Model> for LowStockAlert {
    fn from(model: &product::Model) -> Self {
        Self {
            product_id: model.id,
            product_name: model.name.clone(),
            sku: model.sku.clone(),
            current_stock: model.in_stock,
            min_stock: model.min_stock_level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    pub low_stock_alerts: Vec<LowStockAlert>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Inventory CRUD
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn filtered(filter: &ProductFilter) -> Select<Product> {
        let mut query = Product::find();

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(product::Column::Name.contains(search));
        }
        if let Some(category) = filter.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(product::Column::Category.eq(category));
        }
        query = match filter.stock_level {
            Some(StockLevel::Low) => query.filter(product::Column::InStock.lt(LOW_STOCK_THRESHOLD)),
            Some(StockLevel::Out) => query.filter(product::Column::InStock.eq(0)),
            Some(StockLevel::High) => query.filter(product::Column::InStock.gt(HIGH_STOCK_THRESHOLD)),
            None => query,
        };

        query
    }

    /// Filtered products, newest first, plus up to five low-stock alerts
    /// drawn from the whole inventory.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: ProductFilter) -> Result<ProductListResponse, ServiceError> {
        let products = Self::filtered(&filter)
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        let alerts = self.low_stock(Some(LIST_ALERT_LIMIT)).await?;

        Ok(ProductListResponse {
            products: products.into_iter().map(ProductResponse::from).collect(),
            low_stock_alerts: alerts.iter().map(LowStockAlert::from).collect(),
        })
    }

    /// Products under the fixed low-stock threshold, lowest stock first.
    pub async fn low_stock(&self, limit: Option<u64>) -> Result<Vec<product::Model>, ServiceError> {
        let mut query = Product::find()
            .filter(product::Column::InStock.lt(LOW_STOCK_THRESHOLD))
            .order_by_asc(product::Column::InStock)
            .order_by_asc(product::Column::Name);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        Ok(query.all(&*self.db).await?)
    }

    pub async fn all(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(Product::find().all(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    #[instrument(skip(self, request), fields(sku = %request.sku))]
    pub async fn create(&self, request: CreateProductRequest) -> Result<product::Model, ServiceError> {
        request.validate()?;
        let sku = request.sku.trim().to_string();
        self.ensure_unique_sku(&sku, None).await?;

        let created = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            sku: Set(sku),
            category: Set(blank_to_none(request.category)),
            brand: Set(blank_to_none(request.brand)),
            price: Set(request.price),
            in_stock: Set(request.in_stock),
            min_stock_level: Set(request.min_stock_level.unwrap_or(DEFAULT_MIN_STOCK_LEVEL)),
            description: Set(blank_to_none(request.description)),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = %created.id, "product created");
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;
        let existing = self.get(id).await?;
        let mut active: product::ActiveModel = existing.into();

        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(sku) = request.sku {
            let sku = sku.trim().to_string();
            self.ensure_unique_sku(&sku, Some(id)).await?;
            active.sku = Set(sku);
        }
        if request.category.is_some() {
            active.category = Set(blank_to_none(request.category));
        }
        if request.brand.is_some() {
            active.brand = Set(blank_to_none(request.brand));
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        if let Some(in_stock) = request.in_stock {
            active.in_stock = Set(in_stock);
        }
        if let Some(min) = request.min_stock_level {
            active.min_stock_level = Set(min);
        }
        if request.description.is_some() {
            active.description = Set(blank_to_none(request.description));
        }

        let updated = active.update(&*self.db).await?;
        info!(product_id = %updated.id, "product updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = Product::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Product {} not found", id)));
        }
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    async fn ensure_unique_sku(&self, sku: &str, exclude_id: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = Product::find().filter(product::Column::Sku.eq(sku));
        if let Some(id) = exclude_id {
            query = query.filter(product::Column::Id.ne(id));
        }

        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::Conflict(format!("SKU {} already exists", sku)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sea_orm::{ConnectOptions, Database};
    use sea_orm_migration::MigratorTrait;

    async fn service() -> ProductService {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.unwrap();
        crate::migrator::Migrator::up(&db, None).await.unwrap();
        ProductService::new(Arc::new(db))
    }

    fn request(name: &str, sku: &str, category: Option<&str>, in_stock: i32) -> CreateProductRequest {
        CreateProductRequest {
            name: name.into(),
            sku: sku.into(),
            category: category.map(Into::into),
            brand: None,
            price: Decimal::new(2500, 2),
            in_stock,
            min_stock_level: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn create_applies_defaults_and_availability() {
        let service = service().await;
        let empty = service
            .create(request("Rangoli Colours", "RC-1", Some("Decor"), 0))
            .await
            .unwrap();
        assert_eq!(empty.min_stock_level, DEFAULT_MIN_STOCK_LEVEL);
        assert!(!empty.is_available);

        let updated = service
            .update(
                empty.id,
                UpdateProductRequest {
                    in_stock: Some(30),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_available);
        assert_eq!(updated.stock_status(), "In Stock");
    }

    #[tokio::test]
    async fn duplicate_sku_conflicts() {
        let service = service().await;
        service.create(request("A", "SKU-1", None, 5)).await.unwrap();
        assert_matches!(
            service.create(request("B", "SKU-1", None, 5)).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn filters_combine_search_category_and_stock_level() {
        let service = service().await;
        service.create(request("Brass Diya", "D-1", Some("Decor"), 3)).await.unwrap();
        service.create(request("Clay Diya", "D-2", Some("Decor"), 80)).await.unwrap();
        service.create(request("Sweet Box", "S-1", Some("Food"), 0)).await.unwrap();

        let diyas = service
            .list(ProductFilter {
                search: Some("diya".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(diyas.products.len(), 2);
        assert_eq!(diyas.low_stock_alerts.len(), 2);

        let high = service
            .list(ProductFilter {
                category: Some("Decor".into()),
                stock_level: Some(StockLevel::High),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(high.products.len(), 1);
        assert_eq!(high.products[0].sku, "D-2");

        let out = service
            .list(ProductFilter {
                stock_level: Some(StockLevel::Out),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(out.products.len(), 1);
        assert_eq!(out.products[0].stock_status, "Out of Stock");
    }

    #[tokio::test]
    async fn prices_must_be_non_negative_and_bounded() {
        let service = service().await;

        let mut negative = request("Candle", "C-1", None, 5);
        negative.price = Decimal::new(-1, 0);
        assert_matches!(service.create(negative).await, Err(ServiceError::ValidationError(_)));

        let mut huge = request("Candle", "C-2", None, 5);
        huge.price = Decimal::from(MAX_PRICE) + Decimal::ONE;
        assert_matches!(service.create(huge).await, Err(ServiceError::ValidationError(_)));

        let created = service.create(request("Candle", "C-3", None, 5)).await.unwrap();
        assert_matches!(
            service
                .update(
                    created.id,
                    UpdateProductRequest {
                        price: Some(Decimal::from(MAX_PRICE) * Decimal::TEN),
                        ..Default::default()
                    },
                )
                .await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn delete_missing_product_is_not_found() {
        let service = service().await;
        assert_matches!(
            service.delete(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
    }
}
