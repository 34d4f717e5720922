use super::types::CorrelationSeries;
use crate::services::analysis::stats::correlation::pearson;
use crate::services::analysis::stats::descriptive::{mean, min_max, population_variance};
use chrono::{DateTime, Utc};

/// `1 / (1 + variance / range)` of the correlation sequence; 1 when the range is 0.
pub fn correlation_stability(correlations: &[f64]) -> f64 {
    let Some((lo, hi)) = min_max(correlations) else {
        return 1.0;
    };
    let range = hi - lo;
    if range <= 0.0 {
        return 1.0;
    }
    1.0 / (1.0 + population_variance(correlations) / range)
}

/// Pearson correlation of `series_a` and `series_b` over windows of `window_size`
/// points advanced by `step_size`.
///
/// The series are aligned index-for-index and truncated to the shorter length. Each
/// entry is stamped with its window's last timestamp. A window where either side is
/// constant contributes 0.
pub fn rolling_correlation(
    series_a: &[f64],
    series_b: &[f64],
    timestamps: &[DateTime<Utc>],
    window_size: usize,
    step_size: usize,
) -> CorrelationSeries {
    let n = series_a.len().min(series_b.len()).min(timestamps.len());
    let step = step_size.max(1);
    let mut correlations = Vec::new();
    let mut window_ends = Vec::new();

    if window_size >= 2 && n >= window_size {
        let mut start = 0;
        while start + window_size <= n {
            let end = start + window_size;
            let r = pearson(&series_a[start..end], &series_b[start..end]).unwrap_or_else(|| {
                tracing::debug!(start, end, "constant window; correlation normalised to 0");
                0.0
            });
            correlations.push(r);
            window_ends.push(timestamps[end - 1]);
            start += step;
        }
    }

    CorrelationSeries {
        mean_correlation: mean(&correlations),
        stability: correlation_stability(&correlations),
        correlations,
        timestamps: window_ends,
    }
}
