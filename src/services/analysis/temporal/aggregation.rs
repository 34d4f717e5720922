use super::types::{AggregationMethod, TimeSeriesPoint};
use crate::error::{EngineError, EngineResult};
use crate::services::analysis::stats::descriptive::{mean, min_max, std_dev};
use crate::services::analysis::stats::robust::{median, quantile};
use crate::time::WindowDuration;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: usize,
    /// Keyed by method name (`"mean"`, `"percentile_95"`, ...).
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    timestamp: DateTime<Utc>,
    value: f64,
    weight: Option<f64>,
}

pub fn validate_methods(
    methods: &[AggregationMethod],
    weight_field: Option<&str>,
) -> EngineResult<()> {
    if methods.is_empty() {
        return Err(EngineError::validation("at least one aggregation method is required"));
    }
    if methods.contains(&AggregationMethod::WeightedMean) && weight_field.is_none() {
        return Err(EngineError::validation(
            "weighted_mean aggregation requires weight_field",
        ));
    }
    Ok(())
}

fn weighted_mean(samples: &[Sample]) -> f64 {
    let (weighted, total) = samples
        .iter()
        .filter_map(|s| s.weight.map(|w| (s.value * w, w)))
        .fold((0.0, 0.0), |(acc_v, acc_w), (v, w)| (acc_v + v, acc_w + w));
    if total == 0.0 {
        tracing::debug!("zero weight sum in bucket; weighted mean normalised to 0");
        return 0.0;
    }
    weighted / total
}

fn apply(method: AggregationMethod, samples: &[Sample]) -> f64 {
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    match method {
        AggregationMethod::Mean => mean(&values),
        AggregationMethod::WeightedMean => weighted_mean(samples),
        AggregationMethod::Median => median(&values).unwrap_or(0.0),
        AggregationMethod::Percentile95 => quantile(&values, 0.95).unwrap_or(0.0),
        AggregationMethod::Min => min_max(&values).map(|(lo, _)| lo).unwrap_or(0.0),
        AggregationMethod::Max => min_max(&values).map(|(_, hi)| hi).unwrap_or(0.0),
        AggregationMethod::Std => std_dev(&values),
        AggregationMethod::Sum => values.iter().sum(),
    }
}

fn bucket(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    samples: &[Sample],
    methods: &[AggregationMethod],
) -> AggregateBucket {
    AggregateBucket {
        start,
        end,
        count: samples.len(),
        values: methods
            .iter()
            .map(|method| (method.as_str().to_string(), apply(*method, samples)))
            .collect(),
    }
}

/// Buckets one field at one resolution.
///
/// Boundaries advance from the first timestamp in steps of `resolution`; a point falls
/// in the bucket whose `[start, start + resolution)` contains it. Empty buckets are not
/// emitted and points without a finite `field` value are ignored.
pub fn aggregate_field(
    series: &[TimeSeriesPoint],
    field: &str,
    resolution: &WindowDuration,
    methods: &[AggregationMethod],
    weight_field: Option<&str>,
) -> Vec<AggregateBucket> {
    let samples: Vec<Sample> = series
        .iter()
        .filter_map(|point| {
            point.value(field).map(|value| Sample {
                timestamp: point.timestamp,
                value,
                weight: weight_field.and_then(|w| point.value(w)),
            })
        })
        .collect();
    let Some(first) = samples.first() else {
        return Vec::new();
    };

    let mut buckets = Vec::new();
    let mut start = first.timestamp;
    let mut current: Vec<Sample> = Vec::new();
    for sample in samples {
        if sample.timestamp >= resolution.after(start) {
            if !current.is_empty() {
                buckets.push(bucket(start, resolution.after(start), &current, methods));
                current.clear();
            }
            let skipped = (sample.timestamp - start).num_seconds() / resolution.seconds();
            start += Duration::seconds(skipped * resolution.seconds());
        }
        current.push(sample);
    }
    if !current.is_empty() {
        buckets.push(bucket(start, resolution.after(start), &current, methods));
    }
    buckets
}

/// `resolution label -> field -> buckets`.
pub fn aggregate(
    series: &[TimeSeriesPoint],
    fields: &[String],
    resolutions: &[WindowDuration],
    methods: &[AggregationMethod],
    weight_field: Option<&str>,
) -> EngineResult<BTreeMap<String, BTreeMap<String, Vec<AggregateBucket>>>> {
    validate_methods(methods, weight_field)?;
    for resolution in resolutions {
        resolution.ensure_positive("resolution")?;
    }

    Ok(resolutions
        .iter()
        .map(|resolution| {
            let per_field = fields
                .iter()
                .map(|field| {
                    (
                        field.clone(),
                        aggregate_field(series, field, resolution, methods, weight_field),
                    )
                })
                .collect();
            (resolution.label().to_string(), per_field)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(start: DateTime<Utc>, minutes: i64, fields: &[(&str, f64)]) -> TimeSeriesPoint {
        TimeSeriesPoint::new(
            start + Duration::minutes(minutes),
            fields.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        )
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).single().expect("start")
    }

    #[test]
    fn bucket_counts_cover_every_valued_point() {
        let s = start();
        let series: Vec<TimeSeriesPoint> = [0, 10, 25, 59, 60, 61, 200, 241, 300]
            .iter()
            .map(|m| point(s, *m, &[("sentiment", *m as f64 / 100.0)]))
            .chain(std::iter::once(point(s, 320, &[("churn", 1.0)])))
            .collect();
        for label in ["30m", "1h", "2h", "1d"] {
            let resolution = WindowDuration::parse(label).expect("resolution");
            let buckets = aggregate_field(
                &series,
                "sentiment",
                &resolution,
                &[AggregationMethod::Mean],
                None,
            );
            let total: usize = buckets.iter().map(|b| b.count).sum();
            assert_eq!(total, 9, "resolution {label}");
        }
    }

    #[test]
    fn hourly_buckets_skip_empty_stretches() {
        let s = start();
        let series = vec![
            point(s, 0, &[("v", 1.0)]),
            point(s, 30, &[("v", 3.0)]),
            point(s, 185, &[("v", 10.0)]),
        ];
        let resolution = WindowDuration::parse("1h").expect("resolution");
        let buckets = aggregate_field(
            &series,
            "v",
            &resolution,
            &[AggregationMethod::Mean, AggregationMethod::Max],
            None,
        );
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].values["mean"], 2.0);
        assert_eq!(buckets[0].values["max"], 3.0);
        assert_eq!(buckets[1].start, s + Duration::hours(3));
        assert_eq!(buckets[1].count, 1);
    }

    #[test]
    fn weighted_mean_divides_by_weight_sum() {
        let s = start();
        let series = vec![
            point(s, 0, &[("v", 1.0), ("w", 3.0)]),
            point(s, 5, &[("v", 5.0), ("w", 1.0)]),
        ];
        let resolution = WindowDuration::parse("1h").expect("resolution");
        let buckets = aggregate_field(
            &series,
            "v",
            &resolution,
            &[AggregationMethod::WeightedMean, AggregationMethod::Median],
            Some("w"),
        );
        assert_eq!(buckets[0].values["weighted_mean"], 2.0);
        assert_eq!(buckets[0].values["median"], 3.0);
    }

    #[test]
    fn weighted_mean_without_weight_field_is_rejected() {
        let resolution = WindowDuration::parse("1h").expect("resolution");
        let err = aggregate(
            &[],
            &["v".to_string()],
            &[resolution],
            &[AggregationMethod::WeightedMean],
            None,
        )
        .expect_err("missing weight field");
        assert_eq!(err.code(), "invalid_params");
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let resolution = WindowDuration::parse("0h").expect("resolution");
        assert!(aggregate(&[], &[], &[resolution], &[AggregationMethod::Mean], None).is_err());
    }
}
