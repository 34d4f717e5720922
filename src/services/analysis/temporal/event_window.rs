use crate::services::analysis::stats::descriptive::population_variance;
use crate::services::analysis::stats::hypothesis::{
    minimum_detectable_effect, pooled_t_test, statistical_power,
};
use crate::time::WindowDuration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const STATIONARY_VARIANCE_RATIO: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideStationarity {
    /// `max(var_first_half, var_second_half) / min(...)`; `None` with fewer than four
    /// points or when only one half is flat.
    pub variance_ratio: Option<f64>,
    pub stationary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityCheck {
    pub pre_event: SideStationarity,
    pub post_event: SideStationarity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventWindowOptimization {
    pub optimal_pre_window_seconds: i64,
    pub optimal_post_window_seconds: i64,
    pub pre_window_points: usize,
    pub post_window_points: usize,
    pub effect_size: f64,
    pub statistical_power: f64,
    pub effect_detectability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stationarity: Option<StationarityCheck>,
}

/// Variance ratio between the first and second half of `values`.
pub fn side_stationarity(values: &[f64]) -> SideStationarity {
    if values.len() < 4 {
        return SideStationarity {
            variance_ratio: None,
            stationary: false,
        };
    }
    let (first, second) = values.split_at(values.len() / 2);
    let a = population_variance(first);
    let b = population_variance(second);
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let variance_ratio = if lo > 0.0 {
        Some(hi / lo)
    } else if hi == 0.0 {
        Some(1.0)
    } else {
        None
    };
    SideStationarity {
        variance_ratio,
        stationary: variance_ratio.is_some_and(|r| r <= STATIONARY_VARIANCE_RATIO),
    }
}

fn quarter(len: usize) -> usize {
    if len == 0 {
        0
    } else {
        (len / 4).max(1)
    }
}

/// Picks a pre- and post-event window of a quarter of the points available on each
/// side (at least one), within `max_pre` before and `max_post` after the event.
///
/// The pre window is the points closest to the event; so is the post window.
pub fn optimize_event_windows(
    samples: &[(DateTime<Utc>, f64)],
    event: DateTime<Utc>,
    max_pre: &WindowDuration,
    max_post: &WindowDuration,
    check_stationarity: bool,
) -> EventWindowOptimization {
    let earliest = max_pre.before(event);
    let latest = max_post.after(event);
    let pre_side: Vec<(DateTime<Utc>, f64)> = samples
        .iter()
        .copied()
        .filter(|(ts, _)| *ts >= earliest && *ts < event)
        .collect();
    let post_side: Vec<(DateTime<Utc>, f64)> = samples
        .iter()
        .copied()
        .filter(|(ts, _)| *ts >= event && *ts <= latest)
        .collect();

    let pre = &pre_side[pre_side.len() - quarter(pre_side.len())..];
    let post = &post_side[..quarter(post_side.len())];
    let pre_values: Vec<f64> = pre.iter().map(|(_, v)| *v).collect();
    let post_values: Vec<f64> = post.iter().map(|(_, v)| *v).collect();

    let effect_size = pooled_t_test(&pre_values, &post_values)
        .map(|c| c.effect_size())
        .unwrap_or(0.0);
    let effect_detectability = match minimum_detectable_effect(pre.len(), post.len()) {
        Some(mde) if mde > 0.0 => (effect_size / mde).min(1.0),
        _ => 0.0,
    };

    let stationarity = check_stationarity.then(|| StationarityCheck {
        pre_event: side_stationarity(&pre_side.iter().map(|(_, v)| *v).collect::<Vec<_>>()),
        post_event: side_stationarity(&post_side.iter().map(|(_, v)| *v).collect::<Vec<_>>()),
    });

    EventWindowOptimization {
        optimal_pre_window_seconds: pre
            .first()
            .map(|(ts, _)| (event - *ts).num_seconds())
            .unwrap_or(0),
        optimal_post_window_seconds: post
            .last()
            .map(|(ts, _)| (*ts - event).num_seconds())
            .unwrap_or(0),
        pre_window_points: pre.len(),
        post_window_points: post.len(),
        effect_size,
        statistical_power: statistical_power(effect_size, pre.len(), post.len()),
        effect_detectability,
        stationarity,
    }
}
