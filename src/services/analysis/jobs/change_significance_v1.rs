use super::runner::{parse_params, AnalysisEngine, JobFailure};
use super::series_utils::{require_event_id, require_field};
use super::types::{ChangeSignificanceJobParamsV1, ImpactJobTypeV1};
use crate::error::EngineError;
use crate::services::analysis::repository::TimeSeriesRepository;
use crate::services::analysis::temporal::significance::test_significance;
use crate::services::analysis::temporal::types::{field_samples, SignificanceTest};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const JOB: ImpactJobTypeV1 = ImpactJobTypeV1::ChangeSignificance;
const DEFAULT_TESTS: [SignificanceTest; 2] =
    [SignificanceTest::Permutation, SignificanceTest::Parametric];

pub(super) async fn execute<R: TimeSeriesRepository>(
    engine: &AnalysisEngine<R>,
    params: serde_json::Value,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, JobFailure> {
    let params: ChangeSignificanceJobParamsV1 = parse_params(params)?;
    let event_id = require_event_id(&params.event_id)?;
    let field = require_field("field", &params.field)?;
    let tests = params.tests.unwrap_or_else(|| DEFAULT_TESTS.to_vec());
    if tests.is_empty() {
        return Err(EngineError::validation("at least one significance test is required").into());
    }
    if let Some(window) = params.window_size.as_ref() {
        window.ensure_positive("window_size")?;
    }

    tracing::info!(
        phase = "start",
        job_type = JOB.as_str(),
        event_id = %event_id,
        field = %field,
        tests = tests.len(),
        "change significance job started"
    );
    let loaded = engine
        .load(JOB, &event_id, std::slice::from_ref(&field), cancel)
        .await?;

    let compute_started = Instant::now();
    let change_at = params.change_timestamp.unwrap_or(loaded.bounds.start);
    let span = params
        .window_size
        .as_ref()
        .map(|window| (window.before(change_at), window.after(change_at)));
    let mut pre = Vec::new();
    let mut post = Vec::new();
    for (ts, value) in field_samples(&loaded.points, &field) {
        if ts < change_at {
            if span.map_or(true, |(from, _)| ts >= from) {
                pre.push(value);
            }
        } else if span.map_or(true, |(_, until)| ts <= until) {
            post.push(value);
        }
    }
    let report = test_significance(&pre, &post, &tests, &engine.significance_settings())?;
    engine.finish(JOB, &loaded, compute_started, report)
}
