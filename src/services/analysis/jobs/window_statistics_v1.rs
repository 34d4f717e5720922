use super::runner::{parse_params, AnalysisEngine, JobFailure};
use super::series_utils::{require_event_id, require_fields};
use super::types::{ImpactJobTypeV1, WindowStatisticsJobParamsV1};
use crate::error::EngineError;
use crate::services::analysis::repository::TimeSeriesRepository;
use crate::services::analysis::temporal::windows::build_windows;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const JOB: ImpactJobTypeV1 = ImpactJobTypeV1::WindowStatistics;

pub(super) async fn execute<R: TimeSeriesRepository>(
    engine: &AnalysisEngine<R>,
    params: serde_json::Value,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, JobFailure> {
    let params: WindowStatisticsJobParamsV1 = parse_params(params)?;
    let event_id = require_event_id(&params.event_id)?;
    let fields = require_fields(&params.fields)?;
    let window_sizes = params
        .window_sizes
        .unwrap_or_else(|| engine.config().default_window_sizes.clone());
    if window_sizes.is_empty() {
        return Err(EngineError::validation("window_sizes must not be empty").into());
    }
    for size in &window_sizes {
        size.ensure_positive("window size")?;
    }

    tracing::info!(
        phase = "start",
        job_type = JOB.as_str(),
        event_id = %event_id,
        fields = fields.len(),
        window_sizes = window_sizes.len(),
        "window statistics job started"
    );
    let loaded = engine.load(JOB, &event_id, &fields, cancel).await?;

    let compute_started = Instant::now();
    let windows = build_windows(loaded.bounds.start, &window_sizes, &fields, &loaded.points);
    engine.finish(JOB, &loaded, compute_started, windows)
}
