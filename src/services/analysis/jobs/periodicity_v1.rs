use super::runner::{parse_params, AnalysisEngine, JobFailure};
use super::series_utils::{
    ordered_series, require_event_id, require_field, timestamps_of, values_of,
};
use super::types::{ImpactJobTypeV1, PeriodicityJobParamsV1};
use crate::error::EngineError;
use crate::services::analysis::repository::TimeSeriesRepository;
use crate::services::analysis::temporal::periodicity::detect_periods;
use crate::time::median_interval_seconds;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const JOB: ImpactJobTypeV1 = ImpactJobTypeV1::Periodicity;
const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 0.5;

pub(super) async fn execute<R: TimeSeriesRepository>(
    engine: &AnalysisEngine<R>,
    params: serde_json::Value,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, JobFailure> {
    let params: PeriodicityJobParamsV1 = parse_params(params)?;
    let event_id = require_event_id(&params.event_id)?;
    let field = require_field("field", &params.field)?;
    if params.candidate_periods.is_empty() {
        return Err(EngineError::validation("candidate_periods must not be empty").into());
    }
    for period in &params.candidate_periods {
        period.ensure_positive("candidate period")?;
    }
    if let Some(interval) = params.sample_interval.as_ref() {
        interval.ensure_positive("sample_interval")?;
    }
    let threshold = params
        .significance_threshold
        .unwrap_or(DEFAULT_SIGNIFICANCE_THRESHOLD);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(EngineError::validation(format!(
            "significance_threshold must be within [0, 1], got {threshold}"
        ))
        .into());
    }

    tracing::info!(
        phase = "start",
        job_type = JOB.as_str(),
        event_id = %event_id,
        field = %field,
        candidates = params.candidate_periods.len(),
        "periodicity job started"
    );
    let loaded = engine
        .load(JOB, &event_id, std::slice::from_ref(&field), cancel)
        .await?;

    let compute_started = Instant::now();
    let samples = ordered_series(&loaded.points, &field);
    let interval_seconds = params
        .sample_interval
        .as_ref()
        .map(|interval| interval.seconds())
        .unwrap_or_else(|| median_interval_seconds(&timestamps_of(&samples)));
    let report = detect_periods(
        &values_of(&samples),
        interval_seconds,
        &params.candidate_periods,
        threshold,
        engine.config().max_autocorrelation_lag as usize,
    );
    engine.finish(JOB, &loaded, compute_started, report)
}
