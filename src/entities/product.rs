use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Stock level at or below which a product counts as running low.
pub const DEFAULT_MIN_STOCK_LEVEL: i32 = 10;

/// Inventory product
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 200,
        message = "Product name must be between 1 and 200 characters"
    ))]
    pub name: String,

    /// SKU (Stock Keeping Unit)
    #[sea_orm(unique)]
    #[validate(length(
        min = 1,
        max = 100,
        message = "SKU must be between 1 and 100 characters"
    ))]
    pub sku: String,

    pub category: Option<String>,

    pub brand: Option<String>,

    pub price: Decimal,

    /// Units on hand
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub in_stock: i32,

    #[validate(range(min = 0, message = "Minimum stock level cannot be negative"))]
    pub min_stock_level: i32,

    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,

    /// Derived from `in_stock` on every save
    pub is_available: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Model {
    pub fn is_low_stock(&self) -> bool {
        self.in_stock <= self.min_stock_level
    }

    pub fn stock_status(&self) -> &'static str {
        if self.in_stock == 0 {
            "Out of Stock"
        } else if self.is_low_stock() {
            "Low Stock"
        } else {
            "In Stock"
        }
    }

    /// price x units on hand, `None` when the product overflows `Decimal`
    pub fn stock_value(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.in_stock))
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.min_stock_level {
                active_model.min_stock_level = Set(DEFAULT_MIN_STOCK_LEVEL);
            }
            active_model.created_at = Set(now);
        }

        match &active_model.in_stock {
            ActiveValue::Set(stock) | ActiveValue::Unchanged(stock) => {
                active_model.is_available = Set(*stock > 0);
            }
            ActiveValue::NotSet => {}
        }

        active_model.updated_at = Set(now);

        if insert {
            let model: Model = active_model.clone().try_into().map_err(|_| {
                DbErr::Custom("Failed to convert ActiveModel to Model for validation".to_string())
            })?;
            if let Err(err) = model.validate() {
                return Err(DbErr::Custom(format!("Validation error: {}", err)));
            }
        }

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    fn product(in_stock: i32, min_stock_level: i32) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            name: "Diya Set".to_string(),
            sku: "DIYA-01".to_string(),
            category: Some("Decor".to_string()),
            brand: None,
            price: Decimal::from_f64(49.5).unwrap(),
            in_stock,
            min_stock_level,
            description: None,
            is_available: in_stock > 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stock_status_bands() {
        assert_eq!(product(0, 10).stock_status(), "Out of Stock");
        assert_eq!(product(10, 10).stock_status(), "Low Stock");
        assert_eq!(product(11, 10).stock_status(), "In Stock");
    }

    #[test]
    fn stock_value_multiplies_price_by_units() {
        assert_eq!(product(4, 10).stock_value(), Some(Decimal::from(198)));
    }

    #[test]
    fn stock_value_reports_overflow() {
        let mut huge = product(i32::MAX, 10);
        huge.price = Decimal::MAX;
        assert_eq!(huge.stock_value(), None);
    }
}
