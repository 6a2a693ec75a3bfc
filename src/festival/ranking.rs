use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::calendar::FestivalKey;
use super::model::HistoryRange;
use super::FestivalError;

/// Length cap of both ranked lists.
pub const RANKING_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProductPrediction {
    #[schema(example = "Led Lights")]
    pub product: String,
    pub predicted_sales: u64,
}

/// Ranking result. When `error` is set both lists are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FestivalSalesResponse {
    #[schema(example = "Diwali")]
    pub festival: Option<String>,
    /// Highest predicted sales first
    pub top_products: Vec<ProductPrediction>,
    /// Lowest predicted sales first
    pub least_products: Vec<ProductPrediction>,
    pub error: Option<String>,
}

impl FestivalSalesResponse {
    pub fn failure(festival: Option<String>, error: &FestivalError) -> Self {
        Self {
            festival,
            top_products: Vec::new(),
            least_products: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-artifact result handed to [`rank`], in file-name order.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Predicted { product: String, value: u64 },
    Failed { product: String, reason: String },
}

/// Date a model should predict for.
///
/// Models that know their history project one year past its end. Otherwise the
/// festival's next calendar occurrence (today counts), and for festivals
/// outside the catalog the requested date or today.
pub fn target_date(
    festival: &FestivalKey,
    history: Option<&HistoryRange>,
    today: NaiveDate,
) -> NaiveDate {
    if let Some(range) = history {
        let last = range.end;
        let year = last.year() + 1;
        if let Some(date) = last
            .with_year(year)
            .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
        {
            return date;
        }
    }

    let fallback = festival.requested_date.unwrap_or(today);
    let Some((month, day)) = festival.static_date else {
        return fallback;
    };

    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(this_year) if this_year >= today => this_year,
        Some(_) => NaiveDate::from_ymd_opt(today.year() + 1, month, day).unwrap_or(fallback),
        None => fallback,
    }
}

/// NaN and negatives become zero, then round half away from zero. Infinity has
/// no meaningful rank and is rejected.
pub fn clamp_prediction(raw: f64) -> Option<u64> {
    if raw.is_nan() || raw <= 0.0 {
        return Some(0);
    }
    if raw.is_infinite() {
        return None;
    }
    Some(raw.round() as u64)
}

/// Order successful predictions into the top and least lists.
pub fn rank(festival: &str, outcomes: Vec<PredictionOutcome>) -> FestivalSalesResponse {
    let mut predictions: Vec<ProductPrediction> = outcomes
        .into_iter()
        .filter_map(|outcome| match outcome {
            PredictionOutcome::Predicted { product, value } => Some(ProductPrediction {
                product,
                predicted_sales: value,
            }),
            PredictionOutcome::Failed { .. } => None,
        })
        .collect();

    if predictions.is_empty() {
        return FestivalSalesResponse::failure(
            Some(festival.to_string()),
            &FestivalError::AllPredictionsFailed(festival.to_string()),
        );
    }

    // stable, so ties keep file-name order
    predictions.sort_by(|a, b| b.predicted_sales.cmp(&a.predicted_sales));

    let top_products = predictions.iter().take(RANKING_LIMIT).cloned().collect();
    let least_products = predictions.iter().rev().take(RANKING_LIMIT).cloned().collect();

    FestivalSalesResponse {
        festival: Some(festival.to_string()),
        top_products,
        least_products,
        error: None,
    }
}
