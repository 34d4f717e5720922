use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One fetched record: a timestamp plus the metric values observed at that instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub fields: BTreeMap<String, f64>,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, fields: BTreeMap<String, f64>) -> Self {
        Self { timestamp, fields }
    }

    /// Finite value of `field`, if present.
    pub fn value(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied().filter(|v| v.is_finite())
    }
}

/// `(timestamp, value)` pairs for one field, skipping records without a finite value.
pub fn field_samples(points: &[TimeSeriesPoint], field: &str) -> Vec<(DateTime<Utc>, f64)> {
    points
        .iter()
        .filter_map(|point| point.value(field).map(|value| (point.timestamp, value)))
        .collect()
}

pub fn field_values(points: &[TimeSeriesPoint], field: &str) -> Vec<f64> {
    points.iter().filter_map(|point| point.value(field)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub points: Vec<TimeSeriesPoint>,
}

impl TimeWindow {
    pub fn count(&self) -> usize {
        self.points.len()
    }

    pub fn values(&self, field: &str) -> Vec<f64> {
        field_values(&self.points, field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStatistics {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub trend: TrendDirection,
    pub count: usize,
}

impl WindowStatistics {
    pub fn empty() -> Self {
        Self {
            mean: 0.0,
            std: 0.0,
            min: 0.0,
            max: 0.0,
            trend: TrendDirection::Stable,
            count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Mean,
    Variance,
    Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Index of the first sample of the new regime.
    pub location: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub confidence: f64,
    pub change_type: ChangeType,
}

/// A half-open `[start, end)` index range between breakpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    pub trend: TrendDirection,
    pub slope: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSeries {
    pub correlations: Vec<f64>,
    pub timestamps: Vec<DateTime<Utc>>,
    pub mean_correlation: f64,
    pub stability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapRecord {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolatedValue {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Feature families keyed by feature name; every sequence is index-aligned with the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalFeatureSet {
    pub lag_features: BTreeMap<String, Vec<f64>>,
    pub rolling_features: BTreeMap<String, Vec<f64>>,
    pub seasonal_features: BTreeMap<String, Vec<f64>>,
    pub trend_features: BTreeMap<String, Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    Mean,
    WeightedMean,
    Median,
    #[serde(rename = "percentile_95")]
    Percentile95,
    Min,
    Max,
    Std,
    Sum,
}

impl AggregationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMethod::Mean => "mean",
            AggregationMethod::WeightedMean => "weighted_mean",
            AggregationMethod::Median => "median",
            AggregationMethod::Percentile95 => "percentile_95",
            AggregationMethod::Min => "min",
            AggregationMethod::Max => "max",
            AggregationMethod::Std => "std",
            AggregationMethod::Sum => "sum",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMethod {
    #[default]
    Linear,
    ForwardFill,
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignificanceTest {
    Permutation,
    Bootstrap,
    Parametric,
}

impl SignificanceTest {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignificanceTest::Permutation => "permutation",
            SignificanceTest::Bootstrap => "bootstrap",
            SignificanceTest::Parametric => "parametric",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationCriterion {
    #[default]
    SignalToNoiseRatio,
    VarianceStability,
    TrendStrength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalGranularity {
    Hourly,
    Daily,
    Weekly,
}

impl SeasonalGranularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonalGranularity::Hourly => "hourly",
            SeasonalGranularity::Daily => "daily",
            SeasonalGranularity::Weekly => "weekly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    Lag,
    Rolling,
    Seasonal,
    Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactMagnitude {
    Weak,
    Moderate,
    Strong,
}

/// How p-values are derived from a t statistic.
///
/// `Coarse` buckets `|t|` into 0.01 / 0.05 / 0.20; `Exact` uses the Student-t survival function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PValueMode {
    #[default]
    Coarse,
    Exact,
}

impl PValueMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "coarse" => Some(Self::Coarse),
            "exact" => Some(Self::Exact),
            _ => None,
        }
    }
}
