use crate::services::analysis::stats::descriptive::mean;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactTiming {
    pub baseline_value: f64,
    pub minimum_value: Option<f64>,
    pub minimum_at: Option<DateTime<Utc>>,
    /// Seconds from the event to the first point deviating beyond the onset threshold.
    pub onset_delay_seconds: Option<i64>,
    /// Seconds from the event to partial and full recovery.
    pub partial_recovery_seconds: Option<i64>,
    pub full_recovery_seconds: Option<i64>,
    /// Onset to full recovery, or to the last observation when the metric never recovered.
    pub impact_duration_seconds: Option<i64>,
    pub recovered: bool,
    /// Baseline-to-minimum drop per hour of recovery.
    pub recovery_rate: Option<f64>,
    pub impact_severity: f64,
}

fn relative_deviation(value: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        (value - baseline).abs()
    } else {
        ((value - baseline) / baseline).abs()
    }
}

/// Onset, recovery and severity of the post-event response relative to the pre-event mean.
///
/// `post` must be ordered by timestamp. Recovery is only searched for once an onset
/// has been seen, starting from the later of the onset and the minimum.
pub fn impact_timing(
    pre_values: &[f64],
    post: &[(DateTime<Utc>, f64)],
    event: DateTime<Utc>,
    baseline_threshold: f64,
    recovery_threshold: f64,
) -> ImpactTiming {
    let baseline = mean(pre_values);
    let seconds_from_event = |idx: usize| (post[idx].0 - event).num_seconds();

    let minimum = post
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (idx, (_, value))| match best {
            Some((_, lowest)) if *value >= lowest => best,
            _ => Some((idx, *value)),
        });
    let impact_severity = match minimum {
        Some((_, lowest)) if baseline != 0.0 => (baseline - lowest).abs() / baseline.abs(),
        _ => 0.0,
    };

    let onset = post
        .iter()
        .position(|(_, value)| relative_deviation(*value, baseline) > baseline_threshold);

    let mut timing = ImpactTiming {
        baseline_value: baseline,
        minimum_value: minimum.map(|(_, value)| value),
        minimum_at: minimum.map(|(idx, _)| post[idx].0),
        onset_delay_seconds: onset.map(seconds_from_event),
        partial_recovery_seconds: None,
        full_recovery_seconds: None,
        impact_duration_seconds: None,
        recovered: false,
        recovery_rate: None,
        impact_severity,
    };

    let (Some(onset_idx), Some((min_idx, lowest))) = (onset, minimum) else {
        return timing;
    };

    let search_from = onset_idx.max(min_idx);
    let first_reaching = |level: f64| {
        post[search_from..]
            .iter()
            .position(|(_, value)| *value >= level)
            .map(|offset| search_from + offset)
    };
    let partial = first_reaching(recovery_threshold * baseline);
    let full = first_reaching(baseline);

    timing.partial_recovery_seconds = partial.map(seconds_from_event);
    timing.full_recovery_seconds = full.map(seconds_from_event);
    timing.recovered = full.is_some();

    let end_idx = full.unwrap_or(post.len() - 1);
    timing.impact_duration_seconds = Some((post[end_idx].0 - post[onset_idx].0).num_seconds());

    timing.recovery_rate = full.or(partial).and_then(|recovery_idx| {
        let hours = (post[recovery_idx].0 - post[min_idx].0).num_seconds() as f64 / 3_600.0;
        (hours > 0.0).then(|| (baseline - lowest) / hours)
    });

    timing
}
