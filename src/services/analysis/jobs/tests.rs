use super::{AnalysisEngine, JobFailure};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::services::analysis::repository::{
    EventBounds, InMemoryRepository, TimeSeriesRepository,
};
use crate::services::analysis::temporal::types::TimeSeriesPoint;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

const EVENT_ID: &str = "price-change-1";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).single().expect("t0")
}

fn point(ts: DateTime<Utc>, fields: &[(&str, f64)]) -> TimeSeriesPoint {
    TimeSeriesPoint::new(
        ts,
        fields
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn hourly_sentiment(values: &[f64]) -> Vec<TimeSeriesPoint> {
    values
        .iter()
        .enumerate()
        .map(|(idx, v)| point(t0() + Duration::hours(idx as i64), &[("sentiment", *v)]))
        .collect()
}

fn engine_with(
    points: Vec<TimeSeriesPoint>,
    event_at: DateTime<Utc>,
) -> AnalysisEngine<InMemoryRepository> {
    let bounds = EventBounds {
        start: event_at,
        end: event_at + Duration::hours(1),
    };
    let repo = InMemoryRepository::new().with_event(EVENT_ID, bounds, points);
    let config = EngineConfig {
        random_seed: Some(7),
        ..EngineConfig::default()
    };
    AnalysisEngine::new(repo, config)
}

fn failure_code(failure: JobFailure) -> String {
    match failure {
        JobFailure::Failed(error) => error.code,
        JobFailure::Canceled => "canceled".to_string(),
    }
}

/// Counts repository calls so tests can assert nothing was fetched.
struct CountingRepository {
    inner: InMemoryRepository,
    calls: AtomicUsize,
}

impl TimeSeriesRepository for CountingRepository {
    async fn event_bounds(&self, event_id: &str) -> EngineResult<EventBounds> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.event_bounds(event_id).await
    }

    async fn fetch_series(
        &self,
        event_id: &str,
        fields: &[String],
    ) -> EngineResult<Vec<TimeSeriesPoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_series(event_id, fields).await
    }
}

#[tokio::test]
async fn unknown_job_type_is_rejected() {
    let engine = engine_with(Vec::new(), t0());
    let failure = engine
        .execute("forecast_v9", json!({}), &CancellationToken::new())
        .await
        .expect_err("unknown job");
    assert_eq!(failure_code(failure), "invalid_params");
}

#[tokio::test]
async fn missing_event_is_not_found() {
    let engine = engine_with(hourly_sentiment(&[0.5, 0.6]), t0());
    let failure = engine
        .execute(
            "window_statistics_v1",
            json!({"event_id": "nope", "fields": ["sentiment"]}),
            &CancellationToken::new(),
        )
        .await
        .expect_err("missing event");
    match failure {
        JobFailure::Failed(error) => {
            assert_eq!(error.code, "not_found");
            assert_eq!(error.details, Some(json!({"event_id": "nope"})));
        }
        JobFailure::Canceled => panic!("expected not_found"),
    }
}

#[tokio::test]
async fn invalid_params_fail_before_any_fetch() {
    let repo = CountingRepository {
        inner: InMemoryRepository::new().with_event(
            EVENT_ID,
            EventBounds { start: t0(), end: t0() },
            hourly_sentiment(&[0.1, 0.2, 0.3]),
        ),
        calls: AtomicUsize::new(0),
    };
    let engine = AnalysisEngine::new(repo, EngineConfig::default());
    let cancel = CancellationToken::new();

    let cases = [
        ("window_comparison_v1", json!({
            "event_id": EVENT_ID, "fields": ["sentiment"], "window_size": "0h"
        })),
        ("window_statistics_v1", json!({"event_id": EVENT_ID, "fields": []})),
        ("temporal_aggregation_v1", json!({
            "event_id": EVENT_ID, "fields": ["sentiment"], "resolutions": ["1h"],
            "methods": ["weighted_mean"]
        })),
        ("temporal_aggregation_v1", json!({
            "event_id": EVENT_ID, "fields": ["sentiment"], "resolutions": ["1h"],
            "methods": ["mode"]
        })),
        ("rolling_correlation_v1", json!({
            "event_id": EVENT_ID, "field_a": "sentiment", "field_b": "churn", "window_size": 1
        })),
        ("impact_timing_v1", json!({
            "event_id": EVENT_ID, "field": "sentiment", "recovery_threshold": 1.5
        })),
        ("change_significance_v1", json!({
            "event_id": EVENT_ID, "field": "sentiment", "tests": []
        })),
        ("gap_analysis_v1", json!({
            "event_id": EVENT_ID, "field": "sentiment",
            "expected_interval": "0m", "max_gap_size": "1h"
        })),
        ("breakpoints_v1", json!({"event_id": " ", "field": "sentiment"})),
        ("window_statistics_v1", json!({
            "event_id": EVENT_ID, "fields": ["sentiment"], "window_sizes": ["999999999d"]
        })),
        ("event_window_optimization_v1", json!({
            "event_id": EVENT_ID, "field": "sentiment", "max_pre_window": "9999999w"
        })),
    ];
    for (job_type, params) in cases {
        let failure = engine
            .execute(job_type, params, &cancel)
            .await
            .expect_err(job_type);
        assert_eq!(failure_code(failure), "invalid_params", "{job_type}");
    }
    assert_eq!(engine.repository().calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn canceled_job_does_not_compute() {
    let engine = engine_with(hourly_sentiment(&[0.5; 8]), t0() + Duration::hours(4));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let failure = engine
        .execute(
            "window_statistics_v1",
            json!({"event_id": EVENT_ID, "fields": ["sentiment"]}),
            &cancel,
        )
        .await
        .expect_err("canceled");
    assert_eq!(failure, JobFailure::Canceled);
}

#[tokio::test]
async fn window_statistics_result_carries_envelope() {
    let values = [0.9, 0.8, 0.7, 0.6, 0.2, 0.3, 0.4, 0.5];
    let engine = engine_with(hourly_sentiment(&values), t0() + Duration::hours(4));
    let value = engine
        .execute(
            "window_statistics_v1",
            json!({"event_id": EVENT_ID, "fields": ["sentiment"], "window_sizes": ["3h"]}),
            &CancellationToken::new(),
        )
        .await
        .expect("window statistics");

    assert_eq!(value["job_type"], "window_statistics_v1");
    assert_eq!(value["event_id"], EVENT_ID);
    assert_eq!(value["points_total"], 8);
    assert!(value["timings_ms"]["load_ms"].is_u64());
    assert!(value["timings_ms"]["compute_ms"].is_u64());

    let stats = &value["result"]["statistics"]["3h"]["sentiment"];
    assert_eq!(stats["pre_event"]["count"], 3);
    assert_eq!(stats["post_event"]["count"], 4);
    assert_eq!(stats["pre_event"]["trend"], "decreasing");
    assert_eq!(stats["post_event"]["trend"], "increasing");
}

#[tokio::test]
async fn two_customers_daily_cycle_is_detected() {
    let mut points = Vec::new();
    for customer in 0..2 {
        for hour in 0..48 {
            let ts = t0() + Duration::hours(hour);
            let sentiment = 0.5 + 0.3 * (2.0 * PI * hour as f64 / 24.0).sin();
            points.push(point(ts, &[("sentiment", sentiment), ("customer", customer as f64)]));
        }
    }
    let engine = engine_with(points, t0() + Duration::hours(24));
    let value = engine
        .execute(
            "periodicity_v1",
            json!({
                "event_id": EVENT_ID,
                "field": "sentiment",
                "candidate_periods": ["24h"],
                "significance_threshold": 0.5
            }),
            &CancellationToken::new(),
        )
        .await
        .expect("periodicity");

    let result = &value["result"];
    assert_eq!(result["detected_periods"], json!(["24h"]));
    assert_eq!(result["dominant_frequency"], "24h");
    assert_eq!(result["sample_interval_seconds"], 3_600);
    let strength = result["periodicity_strength"]["24h"].as_f64().expect("strength");
    assert!(strength > 0.9, "strength {strength}");
    assert_eq!(value["points_total"], 96);
}

/// Two customers reporting `sentiment` at the same hourly instants.
fn two_customers(hours: i64, value: impl Fn(i64, i64) -> f64) -> Vec<TimeSeriesPoint> {
    let mut points = Vec::new();
    for customer in 0..2 {
        for hour in 0..hours {
            let fields = [("sentiment", value(customer, hour)), ("customer", customer as f64)];
            points.push(point(t0() + Duration::hours(hour), &fields));
        }
    }
    points
}

#[tokio::test]
async fn window_size_counts_samples_per_timestamp_not_per_customer() {
    let points = two_customers(12, |customer, hour| 0.1 * hour as f64 + 0.2 * customer as f64);
    let engine = engine_with(points, t0());
    let value = engine
        .execute(
            "window_size_v1",
            json!({
                "event_id": EVENT_ID,
                "field": "sentiment",
                "candidate_sizes": ["6h", "24h"]
            }),
            &CancellationToken::new(),
        )
        .await
        .expect("window size");

    let result = &value["result"];
    assert_eq!(result["window_scores"]["24h"].as_f64(), Some(0.0));
    assert!(result["window_scores"]["6h"].as_f64().expect("6h score") > 0.0);
    assert_eq!(result["recommended_window"], "6h");
}

#[tokio::test]
async fn temporal_features_average_customers_sharing_an_hour() {
    let points = two_customers(4, |customer, hour| hour as f64 + 2.0 * customer as f64);
    let engine = engine_with(points, t0() + Duration::hours(2));
    let value = engine
        .execute(
            "temporal_features_v1",
            json!({
                "event_id": EVENT_ID,
                "field": "sentiment",
                "feature_types": ["lag", "trend"],
                "lag_periods": [1]
            }),
            &CancellationToken::new(),
        )
        .await
        .expect("features");

    let features = &value["result"];
    assert_eq!(features["lag_features"]["lag_1"], json!([0.0, 1.0, 2.0, 3.0]));
    assert_eq!(features["trend_features"]["momentum"], json!([0.0, 1.0, 1.0, 1.0]));
}

#[tokio::test]
async fn gap_analysis_fills_one_midpoint() {
    let points: Vec<TimeSeriesPoint> = [0, 1, 2, 3, 7, 8, 9]
        .into_iter()
        .map(|hour| point(t0() + Duration::hours(hour), &[("sentiment", hour as f64)]))
        .collect();
    let engine = engine_with(points, t0() + Duration::hours(5));
    let params = |max_gap: &str| {
        json!({
            "event_id": EVENT_ID,
            "field": "sentiment",
            "expected_interval": "1h",
            "max_gap_size": max_gap
        })
    };
    let cancel = CancellationToken::new();

    let filled = engine
        .execute("gap_analysis_v1", params("6h"), &cancel)
        .await
        .expect("gaps");
    let report = &filled["result"];
    assert_eq!(report["detected_gaps"].as_array().map(Vec::len), Some(1));
    let interpolated = report["interpolated_values"].as_array().expect("interpolated");
    assert_eq!(interpolated.len(), 1);
    let at: DateTime<Utc> =
        serde_json::from_value(interpolated[0]["timestamp"].clone()).expect("timestamp");
    assert_eq!(at, t0() + Duration::hours(5));
    assert!((interpolated[0]["value"].as_f64().expect("value") - 5.0).abs() < 1e-12);

    let skipped = engine
        .execute("gap_analysis_v1", params("2h"), &cancel)
        .await
        .expect("gaps");
    assert_eq!(skipped["result"]["detected_gaps"].as_array().map(Vec::len), Some(1));
    assert_eq!(skipped["result"]["interpolated_values"], json!([]));
}

#[tokio::test]
async fn aggregation_buckets_account_for_every_point() {
    let mut points = hourly_sentiment(&[0.1, 0.4, 0.2, 0.8, 0.5, 0.3, 0.9, 0.7, 0.6, 0.2]);
    points.push(point(t0() + Duration::minutes(90), &[("churn", 0.2)]));
    let engine = engine_with(points, t0() + Duration::hours(5));
    let value = engine
        .execute(
            "temporal_aggregation_v1",
            json!({
                "event_id": EVENT_ID,
                "fields": ["sentiment"],
                "resolutions": ["3h", "4h"],
                "methods": ["mean", "median", "percentile_95"]
            }),
            &CancellationToken::new(),
        )
        .await
        .expect("aggregation");

    for resolution in ["3h", "4h"] {
        let buckets = value["result"][resolution]["sentiment"]
            .as_array()
            .expect("buckets");
        let total: u64 = buckets
            .iter()
            .map(|bucket| bucket["count"].as_u64().expect("count"))
            .sum();
        assert_eq!(total, 10, "{resolution}");
    }
}

#[tokio::test]
async fn breakpoint_job_stamps_change_point() {
    let mut values = vec![1.0; 15];
    values.extend(vec![3.0; 15]);
    let engine = engine_with(hourly_sentiment(&values), t0() + Duration::hours(15));
    let value = engine
        .execute(
            "breakpoints_v1",
            json!({"event_id": EVENT_ID, "field": "sentiment"}),
            &CancellationToken::new(),
        )
        .await
        .expect("breakpoints");

    let change_points = value["result"]["change_points"].as_array().expect("points");
    assert_eq!(change_points.len(), 1);
    assert_eq!(change_points[0]["location"], 15);
    let at: DateTime<Utc> =
        serde_json::from_value(change_points[0]["timestamp"].clone()).expect("timestamp");
    assert_eq!(at, t0() + Duration::hours(15));
    assert_eq!(value["result"]["segments"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn level_shift_is_significant_with_seeded_tests() {
    let mut values = vec![0.2, 0.25, 0.22, 0.18, 0.21, 0.24, 0.19, 0.2, 0.23, 0.21];
    values.extend([0.8, 0.82, 0.79, 0.85, 0.81, 0.78, 0.83, 0.8, 0.84, 0.8]);
    let engine = engine_with(hourly_sentiment(&values), t0() + Duration::hours(10));
    let value = engine
        .execute(
            "change_significance_v1",
            json!({
                "event_id": EVENT_ID,
                "field": "sentiment",
                "tests": ["permutation", "bootstrap", "parametric"]
            }),
            &CancellationToken::new(),
        )
        .await
        .expect("significance");

    let result = &value["result"];
    assert_eq!(result["is_significant"], true);
    assert_eq!(result["test_results"].as_object().map(|m| m.len()), Some(3));
    assert!(result["effect_size"].as_f64().expect("effect") > 0.8);
}

#[tokio::test]
async fn impact_timing_uses_pre_event_baseline() {
    let values = [1.0, 1.0, 1.0, 1.0, 1.0, 0.95, 0.6, 0.5, 0.7, 0.85, 0.92, 1.0, 1.02];
    let engine = engine_with(hourly_sentiment(&values), t0() + Duration::hours(5));
    let value = engine
        .execute(
            "impact_timing_v1",
            json!({"event_id": EVENT_ID, "field": "sentiment", "baseline_window": "5h"}),
            &CancellationToken::new(),
        )
        .await
        .expect("impact timing");

    let result = &value["result"];
    assert_eq!(result["baseline_value"], 1.0);
    assert_eq!(result["onset_delay_seconds"], 3_600);
    assert_eq!(result["full_recovery_seconds"], 6 * 3_600);
    assert_eq!(result["recovered"], true);
}

#[tokio::test]
async fn rolling_correlation_pairs_records_with_both_fields() {
    let points: Vec<TimeSeriesPoint> = (0..12)
        .map(|idx| {
            let ts = t0() + Duration::hours(idx);
            let x = idx as f64;
            if idx == 5 {
                point(ts, &[("sentiment", x)])
            } else {
                point(ts, &[("sentiment", x), ("satisfaction", 2.0 * x + 1.0)])
            }
        })
        .collect();
    let engine = engine_with(points, t0() + Duration::hours(6));
    let value = engine
        .execute(
            "rolling_correlation_v1",
            json!({
                "event_id": EVENT_ID,
                "field_a": "sentiment",
                "field_b": "satisfaction",
                "window_size": 4,
                "step_size": 2
            }),
            &CancellationToken::new(),
        )
        .await
        .expect("rolling correlation");

    let correlations = value["result"]["correlations"].as_array().expect("correlations");
    // 11 paired records: floor((11 - 4) / 2) + 1 windows.
    assert_eq!(correlations.len(), 4);
    for r in correlations {
        assert!((r.as_f64().expect("r") - 1.0).abs() < 1e-9);
    }
}

#[tokio::test]
async fn dataset_file_feeds_the_engine() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let path = temp.path().join("dataset.json");
    std::fs::write(
        &path,
        r#"{
            "events": [{"id": "outage-7", "start": "2026-06-01T03:00:00Z", "end": "2026-06-01T05:00:00Z"}],
            "points": {"outage-7": [
                {"timestamp": "2026-06-01T01:00:00Z", "fields": {"sentiment": 0.8}},
                {"timestamp": "2026-06-01T02:00:00Z", "fields": {"sentiment": 0.7}},
                {"timestamp": "2026-06-01T03:00:00Z", "fields": {"sentiment": 0.3}},
                {"timestamp": "2026-06-01T04:00:00Z", "fields": {"sentiment": 0.4}}
            ]}
        }"#,
    )?;
    let repo = InMemoryRepository::from_json_file(&path)?;
    let engine = AnalysisEngine::new(repo, EngineConfig::default());
    let value = engine
        .execute(
            "window_comparison_v1",
            json!({"event_id": "outage-7", "fields": ["sentiment"], "window_size": "2h"}),
            &CancellationToken::new(),
        )
        .await
        .map_err(|failure| anyhow::anyhow!("job failed: {failure:?}"))?;

    let comparison = &value["result"]["field_comparisons"]["sentiment"];
    assert_eq!(comparison["n_before"], 2);
    assert_eq!(comparison["n_after"], 2);
    assert!(comparison["mean_difference"].as_f64().unwrap_or_default() < 0.0);
    Ok(())
}
