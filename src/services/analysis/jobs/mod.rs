mod breakpoints_v1;
mod change_significance_v1;
mod event_window_optimization_v1;
mod gap_analysis_v1;
mod impact_timing_v1;
mod periodicity_v1;
mod rolling_correlation_v1;
mod runner;
mod seasonal_decomposition_v1;
pub(crate) mod series_utils;
mod temporal_aggregation_v1;
mod temporal_features_v1;
mod types;
mod window_comparison_v1;
mod window_size_v1;
mod window_statistics_v1;

#[cfg(test)]
mod tests;

pub use runner::{AnalysisEngine, JobFailure};
pub use types::*;
