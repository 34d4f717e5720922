use super::runner::{parse_params, AnalysisEngine, JobFailure};
use super::series_utils::{
    ordered_series, require_event_id, require_field, split_at, timestamps_of, values_of,
};
use super::types::{ImpactJobTypeV1, WindowSizeJobParamsV1};
use crate::error::EngineError;
use crate::services::analysis::repository::TimeSeriesRepository;
use crate::services::analysis::temporal::window_size::{choose_window, WindowCandidate};
use crate::time::median_interval_seconds;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const JOB: ImpactJobTypeV1 = ImpactJobTypeV1::WindowSize;

/// Scores candidate windows over the post-event values, converting each window into
/// a sample count at the series' median spacing.
pub(super) async fn execute<R: TimeSeriesRepository>(
    engine: &AnalysisEngine<R>,
    params: serde_json::Value,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, JobFailure> {
    let params: WindowSizeJobParamsV1 = parse_params(params)?;
    let event_id = require_event_id(&params.event_id)?;
    let field = require_field("field", &params.field)?;
    let candidates = params
        .candidate_sizes
        .unwrap_or_else(|| engine.config().default_window_sizes.clone());
    if candidates.is_empty() {
        return Err(EngineError::validation("candidate_sizes must not be empty").into());
    }
    for size in &candidates {
        size.ensure_positive("candidate size")?;
    }
    let criterion = params.criterion.unwrap_or_default();

    tracing::info!(
        phase = "start",
        job_type = JOB.as_str(),
        event_id = %event_id,
        field = %field,
        candidates = candidates.len(),
        "window size job started"
    );
    let loaded = engine
        .load(JOB, &event_id, std::slice::from_ref(&field), cancel)
        .await?;

    let compute_started = Instant::now();
    let samples = ordered_series(&loaded.points, &field);
    let (_, post) = split_at(&samples, loaded.bounds.start);
    let interval_seconds = median_interval_seconds(&timestamps_of(&samples));
    let candidates: Vec<WindowCandidate> = candidates
        .iter()
        .map(|size| WindowCandidate {
            label: size.label().to_string(),
            samples: size.to_samples(interval_seconds),
        })
        .collect();
    let recommendation = choose_window(&values_of(&post), &candidates, criterion);
    engine.finish(JOB, &loaded, compute_started, recommendation)
}
