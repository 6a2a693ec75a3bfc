use crate::{
    config::ForecastConfig,
    errors::ServiceError,
    festival::{
        clamp_prediction, rank, resolve, target_date, FestivalError, FestivalKey,
        FestivalSalesResponse, ForecastLoader, LoadError, ModelHandle, PredictionOutcome,
    },
};
use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, decrement_gauge, increment_gauge};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

const BLOCKING_IN_FLIGHT: &str = "retailx.festival_sales.blocking_in_flight";

/// Held by a blocking prediction until its worker thread returns. A timeout
/// abandons the wait, not the thread.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        increment_gauge!(BLOCKING_IN_FLIGHT, 1.0);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
        decrement_gauge!(BLOCKING_IN_FLIGHT, 1.0);
    }
}

/// Answers festival ranking queries from the trained models on disk.
#[derive(Clone, Debug)]
pub struct FestivalSalesService {
    loader: Arc<ForecastLoader>,
    prediction_timeout: Duration,
    max_concurrency: usize,
    in_flight: Arc<AtomicUsize>,
}

impl FestivalSalesService {
    pub fn new(config: &ForecastConfig) -> Self {
        Self::with_loader(
            ForecastLoader::new(&config.model_dir),
            Duration::from_millis(config.prediction_timeout_ms),
            config.max_concurrency,
        )
    }

    pub fn with_loader(
        loader: ForecastLoader,
        prediction_timeout: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            loader: Arc::new(loader),
            prediction_timeout,
            max_concurrency: max_concurrency.max(1),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Blocking predictions still running, including ones whose request
    /// already timed out.
    pub fn blocking_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Rank products for a festival name, alias or `DD-MM-YYYY` date.
    ///
    /// Every domain failure comes back inside the response; only unexpected
    /// I/O on the model folder is an `Err`.
    #[instrument(skip(self))]
    pub async fn rank_for(&self, query: &str) -> Result<FestivalSalesResponse, ServiceError> {
        self.rank_for_date(query, Utc::now().date_naive()).await
    }

    #[instrument(skip(self))]
    pub async fn rank_for_date(
        &self,
        query: &str,
        today: NaiveDate,
    ) -> Result<FestivalSalesResponse, ServiceError> {
        counter!("retailx.festival_sales.requests", 1);

        let festival = match resolve(query) {
            Ok(festival) => festival,
            Err(e) => {
                info!(error = %e, "festival query not resolved");
                return Ok(FestivalSalesResponse::failure(None, &e));
            }
        };

        let handles = match self.list(&festival).await? {
            Ok(handles) => handles,
            Err(e) => return Ok(FestivalSalesResponse::failure(Some(festival.name), &e)),
        };

        if handles.is_empty() {
            let err = FestivalError::NoArtifactsFound(festival.name.clone());
            return Ok(FestivalSalesResponse::failure(Some(festival.name), &err));
        }

        let festival = Arc::new(festival);
        let outcomes: Vec<PredictionOutcome> = stream::iter(handles)
            .map(|handle| self.predict_one(festival.clone(), handle, today))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let response = rank(&festival.name, outcomes);
        if response.is_error() {
            counter!("retailx.festival_sales.all_failed", 1);
        }
        Ok(response)
    }

    /// Outer error is unexpected I/O; inner error is a reportable condition.
    async fn list(
        &self,
        festival: &FestivalKey,
    ) -> Result<Result<Vec<ModelHandle>, FestivalError>, ServiceError> {
        let loader = self.loader.clone();
        let key = festival.clone();
        let listed = tokio::task::spawn_blocking(move || loader.list_models(&key))
            .await
            .map_err(|e| ServiceError::InternalError(format!("model listing task failed: {e}")))?;

        match listed {
            Ok(handles) => Ok(Ok(handles)),
            Err(LoadError::FolderMissing) => {
                warn!(dir = %self.loader.model_dir().display(), "model folder missing");
                Ok(Err(FestivalError::FolderMissing))
            }
            Err(e) => Err(ServiceError::InternalError(e.to_string())),
        }
    }

    async fn predict_one(
        &self,
        festival: Arc<FestivalKey>,
        handle: ModelHandle,
        today: NaiveDate,
    ) -> PredictionOutcome {
        let loader = self.loader.clone();
        let product = handle.product.clone();
        let guard = InFlight::enter(&self.in_flight);

        let task = tokio::task::spawn_blocking(move || -> Result<f64, String> {
            let _guard = guard;
            let predictor = loader.load(&handle).map_err(|e| e.to_string())?;
            let date = target_date(&festival, predictor.history().as_ref(), today);
            predictor.predict(date).map_err(|e| e.to_string())
        });

        let result = match tokio::time::timeout(self.prediction_timeout, task).await {
            Ok(Ok(Ok(raw))) => clamp_prediction(raw).ok_or_else(|| "prediction is infinite".to_string()),
            Ok(Ok(Err(reason))) => Err(reason),
            Ok(Err(join_err)) => Err(format!("prediction task failed: {join_err}")),
            Err(_) => Err(format!(
                "timed out after {} ms",
                self.prediction_timeout.as_millis()
            )),
        };

        match result {
            Ok(value) => PredictionOutcome::Predicted { product, value },
            Err(reason) => {
                let err = FestivalError::PredictionFailed {
                    product: product.clone(),
                    reason: reason.clone(),
                };
                warn!(error = %err, "skipping product");
                counter!("retailx.festival_sales.prediction_failures", 1);
                PredictionOutcome::Failed { product, reason }
            }
        }
    }
}
