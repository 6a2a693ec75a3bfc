//! Festival sales ranking.
//!
//! A free-text query (festival name, alias or `DD-MM-YYYY` date) is resolved
//! to a [`calendar::FestivalKey`]; the [`loader::ForecastLoader`] finds the
//! per-product forecast artifacts for that festival; each artifact predicts
//! sales for a target date and [`ranking::rank`] orders the results into the
//! top and least sellers.

pub mod calendar;
pub mod loader;
pub mod model;
pub mod ranking;

use chrono::NaiveDate;
use thiserror::Error;

pub use calendar::{catalog, resolve, FestivalDef, FestivalKey};
pub use loader::{ForecastLoader, JsonModelCodec, LoadError, ModelCodec, ModelHandle};
pub use model::{HistoryRange, ModelArtifact, PredictError, Predictor};
pub use ranking::{
    clamp_prediction, rank, target_date, FestivalSalesResponse, PredictionOutcome,
    ProductPrediction, RANKING_LIMIT,
};

/// Everything that can go wrong while answering a ranking query. All of these
/// end up in the `error` field of a [`FestivalSalesResponse`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FestivalError {
    #[error("Invalid date \"{0}\". Use DD-MM-YYYY.")]
    InputParse(String),

    #[error("Invalid input. Enter a valid festival name or date.")]
    FestivalNotFound,

    #[error("No festival found for {}.", .0.format("%d-%m-%Y"))]
    NoFestivalForDate(NaiveDate),

    #[error("No models found for festival \"{0}\". Add trained models for it to the model folder.")]
    NoArtifactsFound(String),

    #[error("Prediction failed for {product}: {reason}")]
    PredictionFailed { product: String, reason: String },

    #[error("All predictions failed for festival \"{0}\".")]
    AllPredictionsFailed(String),

    #[error("Model folder not found.")]
    FolderMissing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_response_contract() {
        assert_eq!(
            FestivalError::FolderMissing.to_string(),
            "Model folder not found."
        );
        assert!(FestivalError::NoArtifactsFound("Festivus".into())
            .to_string()
            .starts_with("No models found for festival \"Festivus\"."));
        assert_eq!(
            FestivalError::NoFestivalForDate(NaiveDate::from_ymd_opt(2024, 6, 5).unwrap())
                .to_string(),
            "No festival found for 05-06-2024."
        );
    }
}
