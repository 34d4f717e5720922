use super::runner::{parse_params, AnalysisEngine, JobFailure};
use super::series_utils::{ordered_series, require_event_id, require_field};
use super::types::{GapAnalysisJobParamsV1, ImpactJobTypeV1};
use crate::services::analysis::repository::TimeSeriesRepository;
use crate::services::analysis::temporal::gaps::handle_gaps;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const JOB: ImpactJobTypeV1 = ImpactJobTypeV1::GapAnalysis;

pub(super) async fn execute<R: TimeSeriesRepository>(
    engine: &AnalysisEngine<R>,
    params: serde_json::Value,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, JobFailure> {
    let params: GapAnalysisJobParamsV1 = parse_params(params)?;
    let event_id = require_event_id(&params.event_id)?;
    let field = require_field("field", &params.field)?;
    params.expected_interval.ensure_positive("expected_interval")?;
    let method = params.interpolation_method.unwrap_or_default();

    tracing::info!(
        phase = "start",
        job_type = JOB.as_str(),
        event_id = %event_id,
        field = %field,
        expected_interval = %params.expected_interval,
        max_gap_size = %params.max_gap_size,
        "gap analysis job started"
    );
    let loaded = engine
        .load(JOB, &event_id, std::slice::from_ref(&field), cancel)
        .await?;

    let compute_started = Instant::now();
    let samples = ordered_series(&loaded.points, &field);
    let report = handle_gaps(
        &samples,
        &params.expected_interval,
        method,
        &params.max_gap_size,
    )?;
    engine.finish(JOB, &loaded, compute_started, report)
}
