use super::runner::{parse_params, AnalysisEngine, JobFailure};
use super::series_utils::{ordered_series, require_event_id, require_field};
use super::types::{ImpactJobTypeV1, ImpactTimingJobParamsV1};
use crate::error::EngineError;
use crate::services::analysis::repository::TimeSeriesRepository;
use crate::services::analysis::temporal::impact_timing::impact_timing;
use crate::time::WindowDuration;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const JOB: ImpactJobTypeV1 = ImpactJobTypeV1::ImpactTiming;
const DEFAULT_BASELINE_WINDOW: &str = "24h";
const DEFAULT_BASELINE_THRESHOLD: f64 = 0.1;
const DEFAULT_RECOVERY_THRESHOLD: f64 = 0.9;

/// Baseline is the mean over `baseline_window` before the event; the response is
/// scanned from the event start onwards.
pub(super) async fn execute<R: TimeSeriesRepository>(
    engine: &AnalysisEngine<R>,
    params: serde_json::Value,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, JobFailure> {
    let params: ImpactTimingJobParamsV1 = parse_params(params)?;
    let event_id = require_event_id(&params.event_id)?;
    let field = require_field("field", &params.field)?;
    let baseline_window = match params.baseline_window {
        Some(window) => window,
        None => WindowDuration::parse(DEFAULT_BASELINE_WINDOW)?,
    };
    baseline_window.ensure_positive("baseline_window")?;
    if let Some(window) = params.max_post_window.as_ref() {
        window.ensure_positive("max_post_window")?;
    }
    let baseline_threshold = params
        .baseline_threshold
        .unwrap_or(DEFAULT_BASELINE_THRESHOLD);
    if !(baseline_threshold.is_finite() && baseline_threshold > 0.0) {
        return Err(EngineError::validation(format!(
            "baseline_threshold must be positive, got {baseline_threshold}"
        ))
        .into());
    }
    let recovery_threshold = params
        .recovery_threshold
        .unwrap_or(DEFAULT_RECOVERY_THRESHOLD);
    if !(recovery_threshold > 0.0 && recovery_threshold <= 1.0) {
        return Err(EngineError::validation(format!(
            "recovery_threshold must be within (0, 1], got {recovery_threshold}"
        ))
        .into());
    }

    tracing::info!(
        phase = "start",
        job_type = JOB.as_str(),
        event_id = %event_id,
        field = %field,
        baseline_window = %baseline_window,
        "impact timing job started"
    );
    let loaded = engine
        .load(JOB, &event_id, std::slice::from_ref(&field), cancel)
        .await?;

    let compute_started = Instant::now();
    let event = loaded.bounds.start;
    let baseline_from = baseline_window.before(event);
    let post_until = params
        .max_post_window
        .as_ref()
        .map(|window| window.after(event));
    let samples = ordered_series(&loaded.points, &field);
    let pre_values: Vec<f64> = samples
        .iter()
        .filter(|(ts, _)| *ts >= baseline_from && *ts < event)
        .map(|(_, value)| *value)
        .collect();
    let post: Vec<_> = samples
        .into_iter()
        .filter(|(ts, _)| *ts >= event && post_until.map_or(true, |until| *ts <= until))
        .collect();
    if pre_values.is_empty() {
        tracing::debug!(event_id = %event_id, "no pre-event baseline points; baseline is 0");
    }
    let timing = impact_timing(
        &pre_values,
        &post,
        event,
        baseline_threshold,
        recovery_threshold,
    );
    engine.finish(JOB, &loaded, compute_started, timing)
}
