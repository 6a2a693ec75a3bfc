//! Manager dashboard figures computed from inventory and staff tables.

use crate::{
    entities::{account::Role, product},
    errors::ServiceError,
    services::{
        accounts::AccountsService,
        products::{ProductService, LOW_STOCK_THRESHOLD},
    },
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;
use utoipa::ToSchema;

pub const UNCATEGORIZED: &str = "Uncategorized";
pub const DASHBOARD_ALERT_LIMIT: u64 = 3;
const CRITICAL_STOCK: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KpiSummary {
    pub total_products: u64,
    /// Estimated at 30% of inventory value
    pub total_revenue: Decimal,
    pub inventory_value: Decimal,
    pub active_staff: u64,
    pub low_stock_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryChart {
    pub labels: Vec<String>,
    pub values: Vec<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Critical,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardAlert {
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: AlertPriority,
    pub message: String,
    pub time: String,
}

impl From<&product::Model> for DashboardAlert {
    fn from(model: &product::Model) -> Self {
        Self {
            kind: "inventory".to_string(),
            priority: if model.in_stock < CRITICAL_STOCK {
                AlertPriority::Critical
            } else {
                AlertPriority::Warning
            },
            message: format!("Low stock alert: {} (Stock: {})", model.name, model.in_stock),
            time: "Today".to_string(),
        }
    }
}

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn value_overflow() -> ServiceError {
    ServiceError::InternalError("Inventory value exceeds the representable range".to_string())
}

fn checked_stock_value(p: &product::Model) -> Result<Decimal, ServiceError> {
    p.stock_value().ok_or_else(value_overflow)
}

/// Σ price × stock over the whole inventory.
pub fn total_inventory_value(products: &[product::Model]) -> Result<Decimal, ServiceError> {
    products.iter().try_fold(Decimal::ZERO, |acc, p| {
        acc.checked_add(checked_stock_value(p)?)
            .ok_or_else(value_overflow)
    })
}

/// Σ price × stock grouped by category, labels sorted.
pub fn category_totals(products: &[product::Model]) -> Result<CategoryChart, ServiceError> {
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for p in products {
        let label = p
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(UNCATEGORIZED)
            .to_string();
        let value = checked_stock_value(p)?;
        let total = totals.entry(label).or_default();
        *total = total.checked_add(value).ok_or_else(value_overflow)?;
    }

    let (labels, values) = totals
        .into_iter()
        .map(|(label, value)| (label, round_money(value)))
        .unzip();
    Ok(CategoryChart { labels, values })
}

#[derive(Clone)]
pub struct DashboardService {
    products: ProductService,
    accounts: AccountsService,
}

impl DashboardService {
    pub fn new(products: ProductService, accounts: AccountsService) -> Self {
        Self { products, accounts }
    }

    #[instrument(skip(self))]
    pub async fn kpis(&self) -> Result<KpiSummary, ServiceError> {
        let products = self.products.all().await?;
        let inventory_value = total_inventory_value(&products)?;
        let low_stock_count = products
            .iter()
            .filter(|p| p.in_stock < LOW_STOCK_THRESHOLD)
            .count() as u64;
        let active_staff = self.accounts.count_role(Role::Manager).await?
            + self.accounts.count_role(Role::Cashier).await?;

        Ok(KpiSummary {
            total_products: products.len() as u64,
            total_revenue: round_money(
                inventory_value
                    .checked_mul(Decimal::new(3, 1))
                    .ok_or_else(value_overflow)?,
            ),
            inventory_value: round_money(inventory_value),
            active_staff,
            low_stock_count,
        })
    }

    pub async fn category_chart(&self) -> Result<CategoryChart, ServiceError> {
        category_totals(&self.products.all().await?)
    }

    pub async fn alerts(&self) -> Result<Vec<DashboardAlert>, ServiceError> {
        let low = self.products.low_stock(Some(DASHBOARD_ALERT_LIMIT)).await?;
        Ok(low.iter().map(DashboardAlert::from).collect())
    }
}
