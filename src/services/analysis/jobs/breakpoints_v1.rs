use super::runner::{parse_params, AnalysisEngine, JobFailure};
use super::series_utils::{
    ordered_series, require_event_id, require_field, timestamps_of, values_of,
};
use super::types::{BreakpointsJobParamsV1, ImpactJobTypeV1};
use crate::error::EngineError;
use crate::services::analysis::repository::TimeSeriesRepository;
use crate::services::analysis::temporal::breakpoints::find_breakpoints;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const JOB: ImpactJobTypeV1 = ImpactJobTypeV1::Breakpoints;
const DEFAULT_MIN_SEGMENT_LENGTH: usize = 5;

pub(super) async fn execute<R: TimeSeriesRepository>(
    engine: &AnalysisEngine<R>,
    params: serde_json::Value,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, JobFailure> {
    let params: BreakpointsJobParamsV1 = parse_params(params)?;
    let event_id = require_event_id(&params.event_id)?;
    let field = require_field("field", &params.field)?;
    let min_segment_length = params
        .min_segment_length
        .unwrap_or(DEFAULT_MIN_SEGMENT_LENGTH);
    if min_segment_length == 0 {
        return Err(EngineError::validation("min_segment_length must be at least 1").into());
    }
    let max_breakpoints = params.max_breakpoints.unwrap_or(1);
    if max_breakpoints == 0 {
        return Err(EngineError::validation("max_breakpoints must be at least 1").into());
    }

    tracing::info!(
        phase = "start",
        job_type = JOB.as_str(),
        event_id = %event_id,
        field = %field,
        min_segment_length,
        max_breakpoints,
        "breakpoints job started"
    );
    let loaded = engine
        .load(JOB, &event_id, std::slice::from_ref(&field), cancel)
        .await?;

    let compute_started = Instant::now();
    let samples = ordered_series(&loaded.points, &field);
    let timestamps = timestamps_of(&samples);
    let report = find_breakpoints(
        &values_of(&samples),
        min_segment_length,
        max_breakpoints,
        Some(timestamps.as_slice()),
    );
    engine.finish(JOB, &loaded, compute_started, report)
}
