use super::runner::{parse_params, AnalysisEngine, JobFailure};
use super::series_utils::{ordered_series, require_event_id, require_field};
use super::types::{EventWindowOptimizationJobParamsV1, ImpactJobTypeV1};
use crate::services::analysis::repository::TimeSeriesRepository;
use crate::services::analysis::temporal::event_window::optimize_event_windows;
use crate::time::WindowDuration;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const JOB: ImpactJobTypeV1 = ImpactJobTypeV1::EventWindowOptimization;
const DEFAULT_MAX_WINDOW: &str = "7d";

pub(super) async fn execute<R: TimeSeriesRepository>(
    engine: &AnalysisEngine<R>,
    params: serde_json::Value,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, JobFailure> {
    let params: EventWindowOptimizationJobParamsV1 = parse_params(params)?;
    let event_id = require_event_id(&params.event_id)?;
    let field = require_field("field", &params.field)?;
    let max_pre = match params.max_pre_window {
        Some(window) => window,
        None => WindowDuration::parse(DEFAULT_MAX_WINDOW)?,
    };
    let max_post = match params.max_post_window {
        Some(window) => window,
        None => WindowDuration::parse(DEFAULT_MAX_WINDOW)?,
    };
    max_pre.ensure_positive("max_pre_window")?;
    max_post.ensure_positive("max_post_window")?;
    let check_stationarity = params.check_stationarity.unwrap_or(true);

    tracing::info!(
        phase = "start",
        job_type = JOB.as_str(),
        event_id = %event_id,
        field = %field,
        max_pre_window = %max_pre,
        max_post_window = %max_post,
        "event window optimization job started"
    );
    let loaded = engine
        .load(JOB, &event_id, std::slice::from_ref(&field), cancel)
        .await?;

    let compute_started = Instant::now();
    let samples = ordered_series(&loaded.points, &field);
    let optimization = optimize_event_windows(
        &samples,
        loaded.bounds.start,
        &max_pre,
        &max_post,
        check_stationarity,
    );
    engine.finish(JOB, &loaded, compute_started, optimization)
}
