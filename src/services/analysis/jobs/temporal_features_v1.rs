use super::runner::{parse_params, AnalysisEngine, JobFailure};
use super::series_utils::{ordered_series, require_event_id, require_field};
use super::types::{ImpactJobTypeV1, TemporalFeaturesJobParamsV1};
use crate::error::EngineError;
use crate::services::analysis::repository::TimeSeriesRepository;
use crate::services::analysis::temporal::features::generate_features;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const JOB: ImpactJobTypeV1 = ImpactJobTypeV1::TemporalFeatures;
const DEFAULT_LAG_PERIODS: [usize; 3] = [1, 6, 24];
const DEFAULT_ROLLING_WINDOWS: [usize; 2] = [6, 24];

pub(super) async fn execute<R: TimeSeriesRepository>(
    engine: &AnalysisEngine<R>,
    params: serde_json::Value,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, JobFailure> {
    let params: TemporalFeaturesJobParamsV1 = parse_params(params)?;
    let event_id = require_event_id(&params.event_id)?;
    let field = require_field("field", &params.field)?;
    let feature_types = params.feature_types.unwrap_or_default();
    let lag_periods = params
        .lag_periods
        .unwrap_or_else(|| DEFAULT_LAG_PERIODS.to_vec());
    let rolling_windows = params
        .rolling_windows
        .unwrap_or_else(|| DEFAULT_ROLLING_WINDOWS.to_vec());
    if lag_periods.contains(&0) {
        return Err(EngineError::validation("lag periods must be at least 1 point").into());
    }
    if rolling_windows.contains(&0) {
        return Err(EngineError::validation("rolling windows must be at least 1 point").into());
    }

    tracing::info!(
        phase = "start",
        job_type = JOB.as_str(),
        event_id = %event_id,
        field = %field,
        "temporal features job started"
    );
    let loaded = engine
        .load(JOB, &event_id, std::slice::from_ref(&field), cancel)
        .await?;

    let compute_started = Instant::now();
    let samples = ordered_series(&loaded.points, &field);
    let features = generate_features(&samples, &feature_types, &lag_periods, &rolling_windows)?;
    engine.finish(JOB, &loaded, compute_started, features)
}
