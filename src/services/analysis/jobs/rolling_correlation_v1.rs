use super::runner::{parse_params, AnalysisEngine, JobFailure};
use super::series_utils::{require_event_id, require_field};
use super::types::{ImpactJobTypeV1, RollingCorrelationJobParamsV1};
use crate::error::EngineError;
use crate::services::analysis::repository::TimeSeriesRepository;
use crate::services::analysis::temporal::rolling_correlation::rolling_correlation;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const JOB: ImpactJobTypeV1 = ImpactJobTypeV1::RollingCorrelation;

pub(super) async fn execute<R: TimeSeriesRepository>(
    engine: &AnalysisEngine<R>,
    params: serde_json::Value,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, JobFailure> {
    let params: RollingCorrelationJobParamsV1 = parse_params(params)?;
    let event_id = require_event_id(&params.event_id)?;
    let field_a = require_field("field_a", &params.field_a)?;
    let field_b = require_field("field_b", &params.field_b)?;
    if params.window_size < 2 {
        return Err(EngineError::validation("window_size must be at least 2 points").into());
    }
    let step_size = params.step_size.unwrap_or(1);
    if step_size == 0 {
        return Err(EngineError::validation("step_size must be at least 1").into());
    }

    tracing::info!(
        phase = "start",
        job_type = JOB.as_str(),
        event_id = %event_id,
        field_a = %field_a,
        field_b = %field_b,
        window_size = params.window_size,
        step_size,
        "rolling correlation job started"
    );
    let fields = [field_a.clone(), field_b.clone()];
    let loaded = engine.load(JOB, &event_id, &fields, cancel).await?;

    let compute_started = Instant::now();
    // Only records carrying both fields are paired.
    let mut series_a = Vec::new();
    let mut series_b = Vec::new();
    let mut timestamps: Vec<DateTime<Utc>> = Vec::new();
    for point in &loaded.points {
        if let (Some(a), Some(b)) = (point.value(&field_a), point.value(&field_b)) {
            series_a.push(a);
            series_b.push(b);
            timestamps.push(point.timestamp);
        }
    }
    let correlation = rolling_correlation(
        &series_a,
        &series_b,
        &timestamps,
        params.window_size,
        step_size,
    );
    engine.finish(JOB, &loaded, compute_started, correlation)
}
