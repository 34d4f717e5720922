use super::types::SeasonalGranularity;
use crate::services::analysis::stats::descriptive::{linear_fit, population_variance};
use crate::time::{day_of_week, hour_of_day, iso_week};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalDecomposition {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
    pub seasonal_strengths: BTreeMap<String, f64>,
    pub dominant_seasonality: Option<String>,
    /// Granularity whose bucket means fill `seasonal`.
    pub seasonal_granularity: SeasonalGranularity,
}

fn bucket_of(ts: DateTime<Utc>, granularity: SeasonalGranularity) -> u32 {
    match granularity {
        SeasonalGranularity::Hourly => hour_of_day(ts),
        SeasonalGranularity::Daily => day_of_week(ts),
        SeasonalGranularity::Weekly => iso_week(ts),
    }
}

/// Mean of `values` per calendar bucket.
fn bucket_means(
    values: &[f64],
    timestamps: &[DateTime<Utc>],
    granularity: SeasonalGranularity,
) -> BTreeMap<u32, f64> {
    let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for (value, ts) in values.iter().zip(timestamps.iter()) {
        let entry = sums.entry(bucket_of(*ts, granularity)).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(bucket, (sum, count))| (bucket, sum / count as f64))
        .collect()
}

/// Additive decomposition `value = trend + seasonal + residual`.
///
/// The trend is the OLS line over sequence index; the seasonal term is the mean of the
/// detrended values sharing a calendar bucket. Hour-of-day is used when requested (or
/// when nothing is requested), otherwise the first requested granularity.
pub fn decompose(
    values: &[f64],
    timestamps: &[DateTime<Utc>],
    components: &[SeasonalGranularity],
) -> SeasonalDecomposition {
    let n = values.len().min(timestamps.len());
    let values = &values[..n];
    let timestamps = &timestamps[..n];

    let mut components: Vec<SeasonalGranularity> = components.to_vec();
    if components.is_empty() {
        components.push(SeasonalGranularity::Hourly);
    }
    components.sort();
    components.dedup();

    let fit = linear_fit(values);
    let trend: Vec<f64> = (0..n).map(|idx| fit.at(idx)).collect();
    let detrended: Vec<f64> = values
        .iter()
        .zip(trend.iter())
        .map(|(v, t)| v - t)
        .collect();

    let mut seasonal_strengths = BTreeMap::new();
    let mut dominant: Option<(SeasonalGranularity, f64)> = None;
    for granularity in &components {
        let means: Vec<f64> = bucket_means(&detrended, timestamps, *granularity)
            .into_values()
            .collect();
        let strength = population_variance(&means);
        seasonal_strengths.insert(granularity.as_str().to_string(), strength);
        match dominant {
            Some((_, best)) if strength <= best => {}
            _ => dominant = Some((*granularity, strength)),
        }
    }

    let seasonal_granularity = if components.contains(&SeasonalGranularity::Hourly) {
        SeasonalGranularity::Hourly
    } else {
        components[0]
    };
    let means = bucket_means(&detrended, timestamps, seasonal_granularity);
    let seasonal: Vec<f64> = timestamps
        .iter()
        .map(|ts| {
            means
                .get(&bucket_of(*ts, seasonal_granularity))
                .copied()
                .unwrap_or(0.0)
        })
        .collect();
    let residual: Vec<f64> = (0..n).map(|idx| values[idx] - trend[idx] - seasonal[idx]).collect();

    SeasonalDecomposition {
        trend,
        seasonal,
        residual,
        seasonal_strengths,
        dominant_seasonality: dominant
            .filter(|(_, strength)| *strength > 0.0)
            .map(|(granularity, _)| granularity.as_str().to_string()),
        seasonal_granularity,
    }
}
