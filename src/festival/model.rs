//! Serving-time forecast models.
//!
//! Models are trained offline. At serving time a model is only something that
//! can `predict(date)` and may know the range of history it was fitted on.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("prediction is not a finite number")]
    NonFinite,

    #[error("{0}")]
    Model(String),
}

/// Dates the model saw during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub trait Predictor: Send + Sync {
    /// Predicted units sold on `date`; may be negative or NaN, callers clamp.
    fn predict(&self, date: NaiveDate) -> Result<f64, PredictError>;

    /// Training history, when the model records it.
    fn history(&self) -> Option<HistoryRange> {
        None
    }
}

/// Piecewise-linear growth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Growth {
    /// Slope in units per day
    pub k: f64,
    /// Offset at the epoch
    pub m: f64,
    #[serde(default)]
    pub changepoints: Vec<Changepoint>,
}

/// Slope adjustment that applies from `date` onwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Changepoint {
    pub date: NaiveDate,
    pub delta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FourierSeries {
    /// Period in days
    pub period: f64,
    #[serde(default)]
    pub sin: Vec<f64>,
    #[serde(default)]
    pub cos: Vec<f64>,
}

impl FourierSeries {
    fn value(&self, t: f64) -> f64 {
        let base = 2.0 * PI * t / self.period;
        let sin: f64 = self
            .sin
            .iter()
            .enumerate()
            .map(|(i, a)| a * (base * (i + 1) as f64).sin())
            .sum();
        let cos: f64 = self
            .cos
            .iter()
            .enumerate()
            .map(|(i, b)| b * (base * (i + 1) as f64).cos())
            .sum();
        sin + cos
    }
}

/// Additive lift around a recurring calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayEffect {
    pub month: u32,
    pub day: u32,
    /// Days either side of the holiday that also get the lift
    #[serde(default)]
    pub window: i64,
    pub effect: f64,
}

impl HolidayEffect {
    fn applies(&self, date: NaiveDate) -> bool {
        // check the neighbouring years so windows can straddle New Year
        (date.year() - 1..=date.year() + 1).any(|year| {
            NaiveDate::from_ymd_opt(year, self.month, self.day)
                .map(|holiday| (date - holiday).num_days().abs() <= self.window)
                .unwrap_or(false)
        })
    }
}

/// On-disk model description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    /// trend + yearly/weekly seasonality + holiday windows, scaled by `y_scale`
    SeasonalTrend {
        #[serde(default)]
        history: Option<HistoryRange>,
        growth: Growth,
        #[serde(default)]
        yearly: Option<FourierSeries>,
        #[serde(default)]
        weekly: Option<FourierSeries>,
        #[serde(default)]
        holidays: Vec<HolidayEffect>,
        #[serde(default = "unit_scale")]
        y_scale: f64,
    },
    Constant {
        value: f64,
    },
}

fn unit_scale() -> f64 {
    1.0
}

impl ModelArtifact {
    /// Check the artifact is usable and wrap it as a predictor.
    pub fn into_predictor(self) -> Result<Box<dyn Predictor>, String> {
        match self {
            ModelArtifact::Constant { value } => Ok(Box::new(ConstantModel { value })),
            ModelArtifact::SeasonalTrend {
                history,
                growth,
                yearly,
                weekly,
                holidays,
                y_scale,
            } => {
                if !y_scale.is_finite() {
                    return Err("y_scale must be finite".to_string());
                }
                for series in yearly.iter().chain(weekly.iter()) {
                    if !(series.period.is_finite() && series.period > 0.0) {
                        return Err("seasonality period must be positive".to_string());
                    }
                }
                if let Some(range) = history {
                    if range.end < range.start {
                        return Err("history ends before it starts".to_string());
                    }
                }
                let mut growth = growth;
                growth.changepoints.sort_by_key(|c| c.date);
                Ok(Box::new(SeasonalTrendModel {
                    history,
                    growth,
                    yearly,
                    weekly,
                    holidays,
                    y_scale,
                }))
            }
        }
    }
}

struct ConstantModel {
    value: f64,
}

impl Predictor for ConstantModel {
    fn predict(&self, _date: NaiveDate) -> Result<f64, PredictError> {
        Ok(self.value)
    }
}

pub struct SeasonalTrendModel {
    history: Option<HistoryRange>,
    growth: Growth,
    yearly: Option<FourierSeries>,
    weekly: Option<FourierSeries>,
    holidays: Vec<HolidayEffect>,
    y_scale: f64,
}

fn days_since_epoch(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as f64
}

impl SeasonalTrendModel {
    fn trend(&self, date: NaiveDate, t: f64) -> f64 {
        let adjustments: f64 = self
            .growth
            .changepoints
            .iter()
            .take_while(|c| c.date <= date)
            .map(|c| c.delta * (t - days_since_epoch(c.date)))
            .sum();
        self.growth.k * t + self.growth.m + adjustments
    }
}

impl Predictor for SeasonalTrendModel {
    fn predict(&self, date: NaiveDate) -> Result<f64, PredictError> {
        let t = days_since_epoch(date);
        let seasonal = self.yearly.as_ref().map_or(0.0, |s| s.value(t))
            + self.weekly.as_ref().map_or(0.0, |s| s.value(t));
        let holiday: f64 = self
            .holidays
            .iter()
            .filter(|h| h.applies(date))
            .map(|h| h.effect)
            .sum();

        let value = (self.trend(date, t) + seasonal + holiday) * self.y_scale;
        if value.is_infinite() {
            return Err(PredictError::NonFinite);
        }
        Ok(value)
    }

    fn history(&self) -> Option<HistoryRange> {
        self.history
    }
}
