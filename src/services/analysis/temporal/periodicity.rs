use crate::services::analysis::stats::descriptive::{mean, population_variance};
use crate::services::analysis::stats::spectral::{
    autocorrelation_at, autocorrelation_function, periodogram,
};
use crate::time::WindowDuration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strengths closer than this are treated as tied; the shorter period then wins
/// so harmonics (48h for a 24h cycle) do not shadow the fundamental.
const STRENGTH_TIE_EPSILON: f64 = 1e-6;

const MIN_CYCLES: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicityReport {
    pub detected_periods: Vec<String>,
    pub periodicity_strength: BTreeMap<String, f64>,
    pub dominant_frequency: Option<String>,
    pub spectral_density: Vec<f64>,
    pub autocorrelation_function: Vec<f64>,
    pub sample_interval_seconds: i64,
}

/// Autocorrelation strength of one candidate period, in samples.
///
/// Needs at least two full cycles of data, so every lagged pair spans a whole cycle;
/// anti-correlation counts as no periodicity.
pub fn period_strength(values: &[f64], period_samples: usize, mu: f64, variance: f64) -> f64 {
    if period_samples == 0 || values.len() < MIN_CYCLES * period_samples {
        return 0.0;
    }
    autocorrelation_at(values, period_samples, mu, variance).clamp(0.0, 1.0)
}

pub fn detect_periods(
    values: &[f64],
    sample_interval_seconds: i64,
    candidate_periods: &[WindowDuration],
    significance_threshold: f64,
    max_autocorrelation_lag: usize,
) -> PeriodicityReport {
    let mu = mean(values);
    let variance = population_variance(values);

    let mut candidates: Vec<(&WindowDuration, f64)> = candidate_periods
        .iter()
        .map(|period| {
            let samples = period.to_samples(sample_interval_seconds);
            (period, period_strength(values, samples, mu, variance))
        })
        .collect();

    let periodicity_strength: BTreeMap<String, f64> = candidates
        .iter()
        .map(|(period, strength)| (period.label().to_string(), *strength))
        .collect();

    let detected_periods: Vec<String> = candidates
        .iter()
        .filter(|(_, strength)| *strength > significance_threshold)
        .map(|(period, _)| period.label().to_string())
        .collect();

    candidates.sort_by_key(|(period, _)| period.seconds());
    let mut dominant: Option<(&WindowDuration, f64)> = None;
    for (period, strength) in candidates {
        match dominant {
            Some((_, best)) if strength <= best + STRENGTH_TIE_EPSILON => {}
            _ => dominant = Some((period, strength)),
        }
    }

    let max_lag = (values.len() / 4).min(max_autocorrelation_lag);

    PeriodicityReport {
        detected_periods,
        periodicity_strength,
        dominant_frequency: dominant.map(|(period, _)| period.label().to_string()),
        spectral_density: periodogram(values),
        autocorrelation_function: autocorrelation_function(values, max_lag),
        sample_interval_seconds,
    }
}
