use super::types::{AnalysisJobError, ImpactJobResultV1, ImpactJobTypeV1};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::services::analysis::repository::{EventBounds, TimeSeriesRepository};
use crate::services::analysis::temporal::significance::SignificanceSettings;
use crate::services::analysis::temporal::types::TimeSeriesPoint;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub enum JobFailure {
    Canceled,
    Failed(AnalysisJobError),
}

impl From<EngineError> for JobFailure {
    fn from(err: EngineError) -> Self {
        JobFailure::Failed(err.to_job_error())
    }
}

/// Series fetched once for a job, with the event it is anchored on.
pub(super) struct LoadedSeries {
    pub event_id: String,
    pub bounds: EventBounds,
    pub points: Vec<TimeSeriesPoint>,
    pub load_ms: u64,
}

/// Runs analysis jobs against an injected repository.
///
/// Holds no per-call state; one engine can serve concurrent jobs.
pub struct AnalysisEngine<R> {
    repo: R,
    config: EngineConfig,
}

impl<R: TimeSeriesRepository> AnalysisEngine<R> {
    pub fn new(repo: R, config: EngineConfig) -> Self {
        Self { repo, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub(super) fn significance_settings(&self) -> SignificanceSettings {
        SignificanceSettings {
            iterations: self.config.permutation_iterations as usize,
            seed: self.config.random_seed,
            p_value_mode: self.config.p_value_mode,
            alpha: self.config.significance_alpha,
        }
    }

    /// Parses `params` for `job_type`, runs the job and returns its JSON result.
    pub async fn execute(
        &self,
        job_type: &str,
        params: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, JobFailure> {
        let Some(job_type) = ImpactJobTypeV1::parse(job_type) else {
            return Err(JobFailure::Failed(AnalysisJobError {
                code: "invalid_params".to_string(),
                message: format!("unsupported job type {job_type:?}"),
                details: Some(serde_json::json!({
                    "supported": ImpactJobTypeV1::ALL.map(|t| t.as_str()),
                })),
            }));
        };
        if cancel.is_cancelled() {
            return Err(JobFailure::Canceled);
        }

        let started = Instant::now();
        let outcome = match job_type {
            ImpactJobTypeV1::WindowStatistics => {
                super::window_statistics_v1::execute(self, params, cancel).await
            }
            ImpactJobTypeV1::WindowSize => {
                super::window_size_v1::execute(self, params, cancel).await
            }
            ImpactJobTypeV1::Periodicity => {
                super::periodicity_v1::execute(self, params, cancel).await
            }
            ImpactJobTypeV1::SeasonalDecomposition => {
                super::seasonal_decomposition_v1::execute(self, params, cancel).await
            }
            ImpactJobTypeV1::Breakpoints => {
                super::breakpoints_v1::execute(self, params, cancel).await
            }
            ImpactJobTypeV1::WindowComparison => {
                super::window_comparison_v1::execute(self, params, cancel).await
            }
            ImpactJobTypeV1::RollingCorrelation => {
                super::rolling_correlation_v1::execute(self, params, cancel).await
            }
            ImpactJobTypeV1::ChangeSignificance => {
                super::change_significance_v1::execute(self, params, cancel).await
            }
            ImpactJobTypeV1::TemporalAggregation => {
                super::temporal_aggregation_v1::execute(self, params, cancel).await
            }
            ImpactJobTypeV1::GapAnalysis => {
                super::gap_analysis_v1::execute(self, params, cancel).await
            }
            ImpactJobTypeV1::TemporalFeatures => {
                super::temporal_features_v1::execute(self, params, cancel).await
            }
            ImpactJobTypeV1::EventWindowOptimization => {
                super::event_window_optimization_v1::execute(self, params, cancel).await
            }
            ImpactJobTypeV1::ImpactTiming => {
                super::impact_timing_v1::execute(self, params, cancel).await
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => tracing::info!(
                job_type = job_type.as_str(),
                duration_ms,
                status = "completed",
                "analysis job completed"
            ),
            Err(JobFailure::Canceled) => tracing::info!(
                job_type = job_type.as_str(),
                duration_ms,
                status = "canceled",
                "analysis job canceled"
            ),
            Err(JobFailure::Failed(error)) => tracing::warn!(
                job_type = job_type.as_str(),
                duration_ms,
                code = %error.code,
                error = %error.message,
                "analysis job failed"
            ),
        }
        outcome
    }

    /// Resolves the event, fetches its series once and stops if the job was canceled
    /// meanwhile. Params must already be validated.
    pub(super) async fn load(
        &self,
        job_type: ImpactJobTypeV1,
        event_id: &str,
        fields: &[String],
        cancel: &CancellationToken,
    ) -> Result<LoadedSeries, JobFailure> {
        let load_started = Instant::now();
        let bounds = self.repo.event_bounds(event_id).await?;
        let points = self.repo.fetch_series(event_id, fields).await?;
        let load_ms = load_started.elapsed().as_millis() as u64;
        tracing::info!(
            phase = "load_series",
            job_type = job_type.as_str(),
            event_id = %event_id,
            points = points.len(),
            duration_ms = load_ms,
            "event series loaded"
        );

        if cancel.is_cancelled() {
            return Err(JobFailure::Canceled);
        }

        Ok(LoadedSeries {
            event_id: event_id.to_string(),
            bounds,
            points,
            load_ms,
        })
    }

    /// Wraps a computed result in the shared envelope.
    pub(super) fn finish<T: Serialize>(
        &self,
        job_type: ImpactJobTypeV1,
        loaded: &LoadedSeries,
        compute_started: Instant,
        result: T,
    ) -> Result<serde_json::Value, JobFailure> {
        let compute_ms = compute_started.elapsed().as_millis() as u64;
        tracing::info!(
            phase = "compute",
            job_type = job_type.as_str(),
            event_id = %loaded.event_id,
            duration_ms = compute_ms,
            "analysis computed"
        );
        let envelope = ImpactJobResultV1 {
            job_type: job_type.as_str().to_string(),
            event_id: loaded.event_id.clone(),
            event_start: loaded.bounds.start,
            event_end: loaded.bounds.end,
            points_total: loaded.points.len(),
            timings_ms: BTreeMap::from([
                ("load_ms".to_string(), loaded.load_ms),
                ("compute_ms".to_string(), compute_ms),
            ]),
            result,
        };
        serde_json::to_value(envelope).map_err(|err| EngineError::from(err).into())
    }
}

/// Deserialises job params; shape errors are reported as `invalid_params`.
pub(super) fn parse_params<P: DeserializeOwned>(
    params: serde_json::Value,
) -> Result<P, JobFailure> {
    serde_json::from_value(params)
        .map_err(|err| EngineError::validation(err.to_string()).into())
}
