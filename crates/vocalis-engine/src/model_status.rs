//! Model lifecycle tracking with download throughput estimation.
//!
//! The worker reports model status in several historical shapes; by the time an
//! update reaches this module it is a [`ModelStatusUpdate`]. The tracker folds
//! it into the last known [`ModelStatus`] for the configured model, discarding
//! updates that are out of order or addressed to another model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use vocalis_core::events::ModelStatusUpdate;
use vocalis_core::types::{ModelLifecycle, ModelProgress, ModelStatus};

/// Weight kept from the previous smoothed rate on each new sample.
const RATE_SMOOTHING: f64 = 0.7;

/// Merge `update` into `previous`. Pure.
///
/// Absent fields carry over. Progress never exceeds its total. A stale error is
/// cleared once the model leaves the error state.
pub fn merge_status(previous: &ModelStatus, update: &ModelStatusUpdate) -> ModelStatus {
    let status = ModelLifecycle::from_wire(&update.status);

    let progress = match &update.progress {
        Some(next) => {
            let total = next
                .total
                .or_else(|| previous.progress.as_ref().and_then(|p| p.total));
            Some(ModelProgress {
                current: total.map_or(next.current, |t| next.current.min(t)),
                total,
                unit: next.unit.clone(),
            })
        }
        None => previous.progress.clone(),
    };

    let error = match (status, &update.error) {
        (_, Some(error)) => Some(error.clone()),
        (ModelLifecycle::Error, None) => previous.error.clone(),
        (_, None) => None,
    };

    ModelStatus {
        model_id: update
            .model_id
            .clone()
            .unwrap_or_else(|| previous.model_id.clone()),
        status,
        revision: update.revision.clone().or_else(|| previous.revision.clone()),
        cache_path: update
            .cache_path
            .clone()
            .or_else(|| previous.cache_path.clone()),
        progress,
        error,
    }
}

/// Smoothed transfer rate and time remaining.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct DownloadEstimate {
    pub bytes_per_sec: Option<f64>,
    pub eta_secs: Option<f64>,
}

/// Exponentially smoothed throughput over `(bytes, timestamp)` samples.
#[derive(Clone, Debug, Default)]
pub struct ThroughputEstimator {
    last_sample: Option<(u64, DateTime<Utc>)>,
    rate: Option<f64>,
}

impl ThroughputEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample and return the current smoothed rate.
    pub fn observe(&mut self, current: u64, at: DateTime<Utc>) -> Option<f64> {
        match self.last_sample {
            None => {
                self.last_sample = Some((current, at));
            }
            Some((last_bytes, _)) if current < last_bytes => {
                // Counter went backwards: a new transfer started.
                self.rate = None;
                self.last_sample = Some((current, at));
            }
            Some((last_bytes, last_at)) if current > last_bytes => {
                let elapsed = (at - last_at).num_milliseconds() as f64 / 1000.0;
                if elapsed > 0.0 {
                    let instant = (current - last_bytes) as f64 / elapsed;
                    self.rate = Some(match self.rate {
                        Some(old) => RATE_SMOOTHING * old + (1.0 - RATE_SMOOTHING) * instant,
                        None => instant,
                    });
                    self.last_sample = Some((current, at));
                }
            }
            Some(_) => {}
        }
        self.rate
    }

    pub fn rate(&self) -> Option<f64> {
        self.rate
    }

    /// Seconds remaining, when the total is known and the rate is usable.
    pub fn eta_secs(&self, current: u64, total: Option<u64>) -> Option<f64> {
        let total = total?;
        let rate = self.rate.filter(|r| r.is_finite() && *r > 0.0)?;
        let eta = total.saturating_sub(current) as f64 / rate;
        eta.is_finite().then_some(eta)
    }

    pub fn reset(&mut self) {
        self.last_sample = None;
        self.rate = None;
    }
}

/// Why an update was or was not applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelUpdateOutcome {
    Applied,
    /// Sequence number behind the last applied one.
    Stale { seq: u64, last_seq: u64 },
    /// Addressed to a model other than the configured one.
    OtherModel(String),
}

/// Displayed status of the configured model.
#[derive(Clone, Debug)]
pub struct ModelStatusTracker {
    status: ModelStatus,
    last_seq: Option<u64>,
    estimator: ThroughputEstimator,
    estimate: DownloadEstimate,
}

impl ModelStatusTracker {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            status: ModelStatus {
                model_id: model_id.into(),
                ..ModelStatus::default()
            },
            last_seq: None,
            estimator: ThroughputEstimator::new(),
            estimate: DownloadEstimate::default(),
        }
    }

    pub fn status(&self) -> &ModelStatus {
        &self.status
    }

    pub fn model_id(&self) -> &str {
        &self.status.model_id
    }

    pub fn estimate(&self) -> DownloadEstimate {
        self.estimate
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    /// Whether the configured model is known to be unusable right now.
    pub fn blocks_recording(&self) -> bool {
        !matches!(
            self.status.status,
            ModelLifecycle::Ready | ModelLifecycle::Unknown
        )
    }

    /// Apply an update received now.
    pub fn apply(&mut self, update: &ModelStatusUpdate) -> ModelUpdateOutcome {
        self.apply_at(update, Utc::now())
    }

    /// Apply an update observed at `at`.
    pub fn apply_at(
        &mut self,
        update: &ModelStatusUpdate,
        at: DateTime<Utc>,
    ) -> ModelUpdateOutcome {
        if let Some(other) = update
            .model_id
            .as_deref()
            .filter(|id| *id != self.status.model_id)
        {
            debug!(
                model_id = %other,
                configured = %self.status.model_id,
                "Ignoring status for another model"
            );
            return ModelUpdateOutcome::OtherModel(other.to_string());
        }

        match (update.seq, self.last_seq) {
            (Some(seq), Some(last_seq)) if seq < last_seq => {
                debug!(seq, last_seq, "Dropping stale model status");
                return ModelUpdateOutcome::Stale { seq, last_seq };
            }
            (Some(seq), _) => self.last_seq = Some(seq),
            (None, Some(last_seq)) => {
                debug!(last_seq, "Applying unsequenced model status after a sequenced one");
            }
            (None, None) => {}
        }

        self.status = merge_status(&self.status, update);
        self.update_estimate(at);
        ModelUpdateOutcome::Applied
    }

    /// Switch to a different configured model. Resets everything.
    pub fn set_model_id(&mut self, model_id: &str) {
        if self.status.model_id == model_id {
            return;
        }
        debug!(from = %self.status.model_id, to = %model_id, "Configured model changed");
        *self = Self::new(model_id);
    }

    /// Record a successful cache purge.
    pub fn mark_missing(&mut self) {
        self.status.status = ModelLifecycle::Missing;
        self.status.progress = None;
        self.status.error = None;
        self.status.cache_path = None;
        self.estimator.reset();
        self.estimate = DownloadEstimate::default();
    }

    fn update_estimate(&mut self, at: DateTime<Utc>) {
        match self.status.status {
            ModelLifecycle::Ready | ModelLifecycle::Error | ModelLifecycle::Missing => {
                self.estimator.reset();
                self.estimate = DownloadEstimate::default();
            }
            ModelLifecycle::Downloading => {
                if let Some(progress) = &self.status.progress {
                    let rate = self.estimator.observe(progress.current, at);
                    self.estimate = DownloadEstimate {
                        bytes_per_sec: rate,
                        eta_secs: self.estimator.eta_secs(progress.current, progress.total),
                    };
                }
            }
            _ => {}
        }
    }
}
