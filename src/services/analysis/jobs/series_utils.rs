use super::runner::JobFailure;
use crate::error::EngineError;
use crate::services::analysis::temporal::types::{field_samples, TimeSeriesPoint};
use chrono::{DateTime, Utc};

pub fn require_event_id(event_id: &str) -> Result<String, JobFailure> {
    let trimmed = event_id.trim();
    if trimmed.is_empty() {
        return Err(EngineError::validation("event_id is required").into());
    }
    Ok(trimmed.to_string())
}

pub fn require_field(name: &str, field: &str) -> Result<String, JobFailure> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Err(EngineError::validation(format!("{name} is required")).into());
    }
    Ok(trimmed.to_string())
}

/// Trimmed, de-duplicated field list in request order; must not be empty.
pub fn require_fields(fields: &[String]) -> Result<Vec<String>, JobFailure> {
    let mut out: Vec<String> = Vec::with_capacity(fields.len());
    for field in fields.iter().map(|f| f.trim()).filter(|f| !f.is_empty()) {
        if !out.iter().any(|existing| existing == field) {
            out.push(field.to_string());
        }
    }
    if out.is_empty() {
        return Err(EngineError::validation("at least one field is required").into());
    }
    Ok(out)
}

/// Averages samples that share a timestamp, e.g. readings from several customers
/// taken at the same instant. Input must be ordered by timestamp.
pub fn collapse_duplicate_timestamps(
    samples: &[(DateTime<Utc>, f64)],
) -> Vec<(DateTime<Utc>, f64)> {
    let mut out: Vec<(DateTime<Utc>, f64)> = Vec::with_capacity(samples.len());
    let mut run = 0usize;
    for (ts, value) in samples {
        match out.last_mut() {
            Some((last_ts, mean)) if last_ts == ts => {
                run += 1;
                *mean += (value - *mean) / run as f64;
            }
            _ => {
                out.push((*ts, *value));
                run = 1;
            }
        }
    }
    out
}

/// `field` as one ordered series with one sample per timestamp.
pub fn ordered_series(points: &[TimeSeriesPoint], field: &str) -> Vec<(DateTime<Utc>, f64)> {
    collapse_duplicate_timestamps(&field_samples(points, field))
}

/// Values strictly before `at`, and samples at or after it.
pub fn split_at(
    samples: &[(DateTime<Utc>, f64)],
    at: DateTime<Utc>,
) -> (Vec<f64>, Vec<(DateTime<Utc>, f64)>) {
    let pivot = samples.partition_point(|(ts, _)| *ts < at);
    let before = samples[..pivot].iter().map(|(_, v)| *v).collect();
    (before, samples[pivot..].to_vec())
}

pub fn values_of(samples: &[(DateTime<Utc>, f64)]) -> Vec<f64> {
    samples.iter().map(|(_, v)| *v).collect()
}

pub fn timestamps_of(samples: &[(DateTime<Utc>, f64)]) -> Vec<DateTime<Utc>> {
    samples.iter().map(|(ts, _)| *ts).collect()
}
