use super::descriptive::{mean, population_variance};
use std::f64::consts::PI;

/// Normalised autocovariance at `lag`:
/// `Σ (x[i]-μ)(x[i+lag]-μ) / ((n-lag)·σ²)`.
///
/// Zero variance or a lag that leaves no overlapping pairs yields 0.
pub fn autocorrelation_at(values: &[f64], lag: usize, mu: f64, variance: f64) -> f64 {
    let n = values.len();
    if lag >= n || variance <= 0.0 || !variance.is_finite() {
        return 0.0;
    }
    let pairs = n - lag;
    let covariance: f64 = values[..pairs]
        .iter()
        .zip(values[lag..].iter())
        .map(|(a, b)| (a - mu) * (b - mu))
        .sum();
    covariance / (pairs as f64 * variance)
}

/// Autocorrelation function for lags `0..=max_lag`.
pub fn autocorrelation_function(values: &[f64], max_lag: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mu = mean(values);
    let variance = population_variance(values);
    (0..=max_lag.min(values.len() - 1))
        .map(|lag| autocorrelation_at(values, lag, mu, variance))
        .collect()
}

/// Discrete periodogram `|Σ x[t]·e^{-2πi·f·t/n}|² / n` for integer bins `f = 1..=n/2`.
pub fn periodogram(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return Vec::new();
    }
    let n_f = n as f64;
    (1..=n / 2)
        .map(|freq| {
            let omega = 2.0 * PI * freq as f64 / n_f;
            let (re, im) = values
                .iter()
                .enumerate()
                .fold((0.0, 0.0), |(re, im), (t, x)| {
                    let angle = omega * t as f64;
                    (re + x * angle.cos(), im - x * angle.sin())
                });
            (re * re + im * im) / n_f
        })
        .collect()
}
