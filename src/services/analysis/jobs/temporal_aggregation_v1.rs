use super::runner::{parse_params, AnalysisEngine, JobFailure};
use super::series_utils::{require_event_id, require_field, require_fields};
use super::types::{ImpactJobTypeV1, TemporalAggregationJobParamsV1};
use crate::error::EngineError;
use crate::services::analysis::repository::TimeSeriesRepository;
use crate::services::analysis::temporal::aggregation::{aggregate, validate_methods};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const JOB: ImpactJobTypeV1 = ImpactJobTypeV1::TemporalAggregation;

pub(super) async fn execute<R: TimeSeriesRepository>(
    engine: &AnalysisEngine<R>,
    params: serde_json::Value,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, JobFailure> {
    let params: TemporalAggregationJobParamsV1 = parse_params(params)?;
    let event_id = require_event_id(&params.event_id)?;
    let fields = require_fields(&params.fields)?;
    let weight_field = params
        .weight_field
        .as_deref()
        .map(|field| require_field("weight_field", field))
        .transpose()?;
    validate_methods(&params.methods, weight_field.as_deref())?;
    if params.resolutions.is_empty() {
        return Err(EngineError::validation("resolutions must not be empty").into());
    }
    for resolution in &params.resolutions {
        resolution.ensure_positive("resolution")?;
    }

    tracing::info!(
        phase = "start",
        job_type = JOB.as_str(),
        event_id = %event_id,
        fields = fields.len(),
        resolutions = params.resolutions.len(),
        "temporal aggregation job started"
    );
    let mut fetch_fields = fields.clone();
    if let Some(weight) = weight_field.as_ref() {
        if !fetch_fields.contains(weight) {
            fetch_fields.push(weight.clone());
        }
    }
    let loaded = engine.load(JOB, &event_id, &fetch_fields, cancel).await?;

    let compute_started = Instant::now();
    let buckets = aggregate(
        &loaded.points,
        &fields,
        &params.resolutions,
        &params.methods,
        weight_field.as_deref(),
    )?;
    engine.finish(JOB, &loaded, compute_started, buckets)
}
