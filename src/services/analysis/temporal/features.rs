use super::types::{FeatureType, TemporalFeatureSet};
use crate::error::{EngineError, EngineResult};
use crate::services::analysis::stats::descriptive::{mean, std_dev};
use crate::time::{day_of_week, hour_of_day};
use chrono::{DateTime, Utc};
use std::f64::consts::PI;

pub fn lag_feature(values: &[f64], lag: usize) -> Vec<f64> {
    (0..values.len())
        .map(|idx| if idx >= lag { values[idx - lag] } else { 0.0 })
        .collect()
}

/// Trailing mean and population std over `values[max(0, i-W+1)..=i]`.
pub fn rolling_mean_std(values: &[f64], window: usize) -> (Vec<f64>, Vec<f64>) {
    let window = window.max(1);
    (0..values.len())
        .map(|idx| {
            let slice = &values[(idx + 1).saturating_sub(window)..=idx];
            (mean(slice), std_dev(slice))
        })
        .unzip()
}

fn cyclic(position: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * position / period;
    (angle.sin(), angle.cos())
}

/// First difference with a leading 0.
pub fn momentum(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if !values.is_empty() {
        out.push(0.0);
    }
    out.extend(values.windows(2).map(|pair| pair[1] - pair[0]));
    out
}

/// Derives the requested feature families from a timestamp-ordered series.
/// An empty `feature_types` selects every family.
pub fn generate_features(
    samples: &[(DateTime<Utc>, f64)],
    feature_types: &[FeatureType],
    lag_periods: &[usize],
    rolling_windows: &[usize],
) -> EngineResult<TemporalFeatureSet> {
    if rolling_windows.contains(&0) {
        return Err(EngineError::validation("rolling windows must be at least 1 point"));
    }
    let wants = |kind: FeatureType| feature_types.is_empty() || feature_types.contains(&kind);
    let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
    let mut features = TemporalFeatureSet::default();

    if wants(FeatureType::Lag) {
        for lag in lag_periods {
            features
                .lag_features
                .insert(format!("lag_{lag}"), lag_feature(&values, *lag));
        }
    }

    if wants(FeatureType::Rolling) {
        for window in rolling_windows {
            let (means, stds) = rolling_mean_std(&values, *window);
            features
                .rolling_features
                .insert(format!("rolling_mean_{window}"), means);
            features
                .rolling_features
                .insert(format!("rolling_std_{window}"), stds);
        }
    }

    if wants(FeatureType::Seasonal) {
        let (hour_sin, hour_cos): (Vec<f64>, Vec<f64>) = samples
            .iter()
            .map(|(ts, _)| cyclic(hour_of_day(*ts) as f64, 24.0))
            .unzip();
        let (dow_sin, dow_cos): (Vec<f64>, Vec<f64>) = samples
            .iter()
            .map(|(ts, _)| cyclic(day_of_week(*ts) as f64, 7.0))
            .unzip();
        let seasonal = &mut features.seasonal_features;
        seasonal.insert("hour_sin".to_string(), hour_sin);
        seasonal.insert("hour_cos".to_string(), hour_cos);
        seasonal.insert("day_of_week_sin".to_string(), dow_sin);
        seasonal.insert("day_of_week_cos".to_string(), dow_cos);
    }

    if wants(FeatureType::Trend) {
        features.trend_features.insert(
            "linear_trend".to_string(),
            (0..values.len()).map(|idx| idx as f64).collect(),
        );
        features
            .trend_features
            .insert("momentum".to_string(), momentum(&values));
    }

    Ok(features)
}
