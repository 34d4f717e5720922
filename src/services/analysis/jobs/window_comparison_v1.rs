use super::runner::{parse_params, AnalysisEngine, JobFailure};
use super::series_utils::{require_event_id, require_fields};
use super::types::{ImpactJobTypeV1, WindowComparisonJobParamsV1};
use crate::services::analysis::repository::TimeSeriesRepository;
use crate::services::analysis::temporal::comparison::compare_fields;
use crate::services::analysis::temporal::windows::{post_event_window, pre_event_window};
use std::collections::BTreeMap;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const JOB: ImpactJobTypeV1 = ImpactJobTypeV1::WindowComparison;

/// Compares each field's pre-event window against the post-event window of the same length.
pub(super) async fn execute<R: TimeSeriesRepository>(
    engine: &AnalysisEngine<R>,
    params: serde_json::Value,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, JobFailure> {
    let params: WindowComparisonJobParamsV1 = parse_params(params)?;
    let event_id = require_event_id(&params.event_id)?;
    let fields = require_fields(&params.fields)?;
    params.window_size.ensure_positive("window_size")?;

    tracing::info!(
        phase = "start",
        job_type = JOB.as_str(),
        event_id = %event_id,
        fields = fields.len(),
        window_size = %params.window_size,
        "window comparison job started"
    );
    let loaded = engine.load(JOB, &event_id, &fields, cancel).await?;

    let compute_started = Instant::now();
    let event = loaded.bounds.start;
    let pre = pre_event_window(&loaded.points, event, &params.window_size);
    let post = post_event_window(&loaded.points, event, &params.window_size);
    let per_field: BTreeMap<String, (Vec<f64>, Vec<f64>)> = fields
        .iter()
        .map(|field| (field.clone(), (pre.values(field), post.values(field))))
        .collect();
    let config = engine.config();
    let comparison = compare_fields(&per_field, config.p_value_mode, config.significance_alpha);
    engine.finish(JOB, &loaded, compute_started, comparison)
}
