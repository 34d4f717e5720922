use crate::services::analysis::temporal::types::TrendDirection;

/// Slopes with magnitude at or below this are classified as stable.
pub const STABLE_SLOPE_THRESHOLD: f64 = 0.01;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by `n`). Empty input yields 0.
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Sample variance (divides by `n - 1`). Fewer than two values yields 0.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    pub fn at(&self, index: usize) -> f64 {
        self.intercept + self.slope * index as f64
    }

    /// Sum of squared residuals of `values` around this line.
    pub fn sse(&self, values: &[f64]) -> f64 {
        values
            .iter()
            .enumerate()
            .map(|(idx, v)| (v - self.at(idx)).powi(2))
            .sum()
    }
}

/// Ordinary least squares of value against sequence index `0..n`.
///
/// Fewer than two points gives a flat line through the mean.
pub fn linear_fit(values: &[f64]) -> LinearFit {
    let n = values.len();
    if n < 2 {
        return LinearFit {
            slope: 0.0,
            intercept: mean(values),
            r_squared: 0.0,
        };
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = mean(values);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (idx, v) in values.iter().enumerate() {
        let dx = idx as f64 - mean_x;
        let dy = v - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let intercept = mean_y - slope * mean_x;
    let r_squared = if sxx > 0.0 && syy > 0.0 {
        ((sxy * sxy) / (sxx * syy)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    LinearFit {
        slope,
        intercept,
        r_squared,
    }
}

pub fn classify_trend(slope: f64) -> TrendDirection {
    if !slope.is_finite() || slope.abs() <= STABLE_SLOPE_THRESHOLD {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_are_zero_not_nan() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(population_variance(&[]), 0.0);
        assert_eq!(sample_variance(&[1.0]), 0.0);
        assert!(min_max(&[]).is_none());
    }

    #[test]
    fn linear_fit_recovers_exact_line() {
        let values: Vec<f64> = (0..10).map(|i| 2.0 + 0.5 * i as f64).collect();
        let fit = linear_fit(&values);
        assert!((fit.slope - 0.5).abs() < 1e-12);
        assert!((fit.intercept - 2.0).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert!(fit.sse(&values) < 1e-20);
    }

    #[test]
    fn trend_classification_respects_stable_band() {
        assert_eq!(classify_trend(0.01), TrendDirection::Stable);
        assert_eq!(classify_trend(-0.005), TrendDirection::Stable);
        assert_eq!(classify_trend(0.02), TrendDirection::Increasing);
        assert_eq!(classify_trend(-0.3), TrendDirection::Decreasing);
        assert_eq!(classify_trend(f64::NAN), TrendDirection::Stable);
    }
}
