use super::runner::{parse_params, AnalysisEngine, JobFailure};
use super::series_utils::{
    ordered_series, require_event_id, require_field, timestamps_of, values_of,
};
use super::types::{ImpactJobTypeV1, SeasonalDecompositionJobParamsV1};
use crate::services::analysis::repository::TimeSeriesRepository;
use crate::services::analysis::temporal::seasonal::decompose;
use crate::services::analysis::temporal::types::SeasonalGranularity;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const JOB: ImpactJobTypeV1 = ImpactJobTypeV1::SeasonalDecomposition;

pub(super) async fn execute<R: TimeSeriesRepository>(
    engine: &AnalysisEngine<R>,
    params: serde_json::Value,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, JobFailure> {
    let params: SeasonalDecompositionJobParamsV1 = parse_params(params)?;
    let event_id = require_event_id(&params.event_id)?;
    let field = require_field("field", &params.field)?;
    let components = params
        .components
        .filter(|components| !components.is_empty())
        .unwrap_or_else(|| vec![SeasonalGranularity::Hourly]);

    tracing::info!(
        phase = "start",
        job_type = JOB.as_str(),
        event_id = %event_id,
        field = %field,
        "seasonal decomposition job started"
    );
    let loaded = engine
        .load(JOB, &event_id, std::slice::from_ref(&field), cancel)
        .await?;

    let compute_started = Instant::now();
    let samples = ordered_series(&loaded.points, &field);
    let decomposition = decompose(&values_of(&samples), &timestamps_of(&samples), &components);
    engine.finish(JOB, &loaded, compute_started, decomposition)
}
