use crate::services::analysis::temporal::types::{
    AggregationMethod, FeatureType, InterpolationMethod, OptimizationCriterion,
    SeasonalGranularity, SignificanceTest,
};
use crate::time::WindowDuration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJobError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImpactJobTypeV1 {
    #[serde(rename = "window_statistics_v1")]
    WindowStatistics,
    #[serde(rename = "window_size_v1")]
    WindowSize,
    #[serde(rename = "periodicity_v1")]
    Periodicity,
    #[serde(rename = "seasonal_decomposition_v1")]
    SeasonalDecomposition,
    #[serde(rename = "breakpoints_v1")]
    Breakpoints,
    #[serde(rename = "window_comparison_v1")]
    WindowComparison,
    #[serde(rename = "rolling_correlation_v1")]
    RollingCorrelation,
    #[serde(rename = "change_significance_v1")]
    ChangeSignificance,
    #[serde(rename = "temporal_aggregation_v1")]
    TemporalAggregation,
    #[serde(rename = "gap_analysis_v1")]
    GapAnalysis,
    #[serde(rename = "temporal_features_v1")]
    TemporalFeatures,
    #[serde(rename = "event_window_optimization_v1")]
    EventWindowOptimization,
    #[serde(rename = "impact_timing_v1")]
    ImpactTiming,
}

impl ImpactJobTypeV1 {
    pub const ALL: [ImpactJobTypeV1; 13] = [
        ImpactJobTypeV1::WindowStatistics,
        ImpactJobTypeV1::WindowSize,
        ImpactJobTypeV1::Periodicity,
        ImpactJobTypeV1::SeasonalDecomposition,
        ImpactJobTypeV1::Breakpoints,
        ImpactJobTypeV1::WindowComparison,
        ImpactJobTypeV1::RollingCorrelation,
        ImpactJobTypeV1::ChangeSignificance,
        ImpactJobTypeV1::TemporalAggregation,
        ImpactJobTypeV1::GapAnalysis,
        ImpactJobTypeV1::TemporalFeatures,
        ImpactJobTypeV1::EventWindowOptimization,
        ImpactJobTypeV1::ImpactTiming,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactJobTypeV1::WindowStatistics => "window_statistics_v1",
            ImpactJobTypeV1::WindowSize => "window_size_v1",
            ImpactJobTypeV1::Periodicity => "periodicity_v1",
            ImpactJobTypeV1::SeasonalDecomposition => "seasonal_decomposition_v1",
            ImpactJobTypeV1::Breakpoints => "breakpoints_v1",
            ImpactJobTypeV1::WindowComparison => "window_comparison_v1",
            ImpactJobTypeV1::RollingCorrelation => "rolling_correlation_v1",
            ImpactJobTypeV1::ChangeSignificance => "change_significance_v1",
            ImpactJobTypeV1::TemporalAggregation => "temporal_aggregation_v1",
            ImpactJobTypeV1::GapAnalysis => "gap_analysis_v1",
            ImpactJobTypeV1::TemporalFeatures => "temporal_features_v1",
            ImpactJobTypeV1::EventWindowOptimization => "event_window_optimization_v1",
            ImpactJobTypeV1::ImpactTiming => "impact_timing_v1",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|job_type| job_type.as_str() == raw)
    }
}

/// Envelope shared by every job result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactJobResultV1<T> {
    pub job_type: String,
    pub event_id: String,
    pub event_start: DateTime<Utc>,
    pub event_end: DateTime<Utc>,
    /// Records returned by the repository before any per-field filtering.
    pub points_total: usize,
    #[serde(default)]
    pub timings_ms: BTreeMap<String, u64>,
    pub result: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowStatisticsJobParamsV1 {
    pub event_id: String,
    pub fields: Vec<String>,
    /// Falls back to the configured default window sizes.
    #[serde(default)]
    pub window_sizes: Option<Vec<WindowDuration>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSizeJobParamsV1 {
    pub event_id: String,
    pub field: String,
    #[serde(default)]
    pub candidate_sizes: Option<Vec<WindowDuration>>,
    #[serde(default)]
    pub criterion: Option<OptimizationCriterion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodicityJobParamsV1 {
    pub event_id: String,
    pub field: String,
    pub candidate_periods: Vec<WindowDuration>,
    #[serde(default)]
    pub significance_threshold: Option<f64>,
    /// Inferred from the median timestamp spacing when absent.
    #[serde(default)]
    pub sample_interval: Option<WindowDuration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalDecompositionJobParamsV1 {
    pub event_id: String,
    pub field: String,
    #[serde(default)]
    pub components: Option<Vec<SeasonalGranularity>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakpointsJobParamsV1 {
    pub event_id: String,
    pub field: String,
    #[serde(default)]
    pub min_segment_length: Option<usize>,
    /// Values above 1 switch to recursive binary segmentation.
    #[serde(default)]
    pub max_breakpoints: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowComparisonJobParamsV1 {
    pub event_id: String,
    pub fields: Vec<String>,
    pub window_size: WindowDuration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingCorrelationJobParamsV1 {
    pub event_id: String,
    pub field_a: String,
    pub field_b: String,
    /// Window length in points.
    pub window_size: usize,
    #[serde(default)]
    pub step_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSignificanceJobParamsV1 {
    pub event_id: String,
    pub field: String,
    /// Defaults to the event start.
    #[serde(default)]
    pub change_timestamp: Option<DateTime<Utc>>,
    /// Limits each side to this much time around the change; the whole series otherwise.
    #[serde(default)]
    pub window_size: Option<WindowDuration>,
    #[serde(default)]
    pub tests: Option<Vec<SignificanceTest>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalAggregationJobParamsV1 {
    pub event_id: String,
    pub fields: Vec<String>,
    pub resolutions: Vec<WindowDuration>,
    pub methods: Vec<AggregationMethod>,
    #[serde(default)]
    pub weight_field: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapAnalysisJobParamsV1 {
    pub event_id: String,
    pub field: String,
    pub expected_interval: WindowDuration,
    pub max_gap_size: WindowDuration,
    #[serde(default)]
    pub interpolation_method: Option<InterpolationMethod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalFeaturesJobParamsV1 {
    pub event_id: String,
    pub field: String,
    #[serde(default)]
    pub feature_types: Option<Vec<FeatureType>>,
    #[serde(default)]
    pub lag_periods: Option<Vec<usize>>,
    #[serde(default)]
    pub rolling_windows: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventWindowOptimizationJobParamsV1 {
    pub event_id: String,
    pub field: String,
    #[serde(default)]
    pub max_pre_window: Option<WindowDuration>,
    #[serde(default)]
    pub max_post_window: Option<WindowDuration>,
    #[serde(default)]
    pub check_stationarity: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactTimingJobParamsV1 {
    pub event_id: String,
    pub field: String,
    /// Pre-event span whose mean is the baseline.
    #[serde(default)]
    pub baseline_window: Option<WindowDuration>,
    #[serde(default)]
    pub baseline_threshold: Option<f64>,
    #[serde(default)]
    pub recovery_threshold: Option<f64>,
    /// Post-event span to scan; everything after the event when absent.
    #[serde(default)]
    pub max_post_window: Option<WindowDuration>,
}
