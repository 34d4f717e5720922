use super::types::{GapRecord, InterpolatedValue, InterpolationMethod};
use crate::error::EngineResult;
use crate::time::WindowDuration;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Consecutive samples further apart than this multiple of the expected interval
/// bracket a gap.
const GAP_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    pub detected_gaps: Vec<GapRecord>,
    pub interpolated_values: Vec<InterpolatedValue>,
    pub data_completeness: f64,
    pub interpolation_quality: f64,
}

fn fill_value(method: InterpolationMethod, before: f64, after: f64) -> f64 {
    match method {
        InterpolationMethod::Linear => (before + after) / 2.0,
        // At the midpoint both boundaries are equally near; ties go to the earlier one.
        InterpolationMethod::ForwardFill | InterpolationMethod::Nearest => before,
    }
}

/// Finds gaps in a timestamp-ordered `(timestamp, value)` sequence and fills the
/// ones no longer than `max_gap_size` with a single value at their midpoint.
pub fn handle_gaps(
    samples: &[(DateTime<Utc>, f64)],
    expected_interval: &WindowDuration,
    method: InterpolationMethod,
    max_gap_size: &WindowDuration,
) -> EngineResult<GapReport> {
    expected_interval.ensure_positive("expected_interval")?;

    let threshold_seconds = GAP_FACTOR * expected_interval.seconds() as f64;
    let mut detected_gaps = Vec::new();
    let mut interpolated_values = Vec::new();

    for pair in samples.windows(2) {
        let (start, before) = pair[0];
        let (end, after) = pair[1];
        let duration_seconds = (end - start).num_seconds();
        if (duration_seconds as f64) <= threshold_seconds {
            continue;
        }
        detected_gaps.push(GapRecord {
            start,
            end,
            duration_seconds,
        });
        if duration_seconds <= max_gap_size.seconds() {
            interpolated_values.push(InterpolatedValue {
                timestamp: start + Duration::seconds(duration_seconds / 2),
                value: fill_value(method, before, after),
            });
        }
    }

    let span_seconds = match (samples.first(), samples.last()) {
        (Some((first, _)), Some((last, _))) => (*last - *first).num_seconds(),
        _ => 0,
    };
    let data_completeness = if span_seconds > 0 {
        let missing: i64 = detected_gaps.iter().map(|g| g.duration_seconds).sum();
        (1.0 - missing as f64 / span_seconds as f64).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let interpolation_quality = if detected_gaps.is_empty() {
        1.0
    } else {
        interpolated_values.len() as f64 / detected_gaps.len() as f64
    };

    tracing::debug!(
        gaps = detected_gaps.len(),
        interpolated = interpolated_values.len(),
        data_completeness,
        "gap scan complete"
    );

    Ok(GapReport {
        detected_gaps,
        interpolated_values,
        data_completeness,
        interpolation_quality,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hourly_with_hole(hole_hours: i64) -> Vec<(DateTime<Utc>, f64)> {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).single().expect("start");
        let mut samples: Vec<(DateTime<Utc>, f64)> = (0..5)
            .map(|i| (start + Duration::hours(i), 0.5 + 0.1 * i as f64))
            .collect();
        let resume = 4 + hole_hours;
        samples.extend((0..5).map(|i| (start + Duration::hours(resume + i), 1.0)));
        samples
    }

    fn duration(label: &str) -> WindowDuration {
        WindowDuration::parse(label).expect("duration")
    }

    #[test]
    fn small_gap_is_interpolated_at_midpoint() {
        let samples = hourly_with_hole(4);
        let report = handle_gaps(
            &samples,
            &duration("1h"),
            InterpolationMethod::Linear,
            &duration("6h"),
        )
        .expect("report");
        assert_eq!(report.detected_gaps.len(), 1);
        assert_eq!(report.interpolated_values.len(), 1);
        let gap = &report.detected_gaps[0];
        assert_eq!(gap.duration_seconds, 4 * 3_600);
        let filled = &report.interpolated_values[0];
        assert_eq!(filled.timestamp, gap.start + Duration::hours(2));
        assert!((filled.value - 0.95).abs() < 1e-12);
        assert_eq!(report.interpolation_quality, 1.0);
        // 12h span, 4h of it inside the gap.
        assert!((report.data_completeness - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn oversized_gap_is_reported_but_not_filled() {
        let samples = hourly_with_hole(10);
        let report = handle_gaps(
            &samples,
            &duration("1h"),
            InterpolationMethod::Linear,
            &duration("6h"),
        )
        .expect("report");
        assert_eq!(report.detected_gaps.len(), 1);
        assert!(report.interpolated_values.is_empty());
        assert_eq!(report.interpolation_quality, 0.0);
    }

    #[test]
    fn forward_fill_uses_previous_value() {
        let samples = hourly_with_hole(3);
        let report = handle_gaps(
            &samples,
            &duration("1h"),
            InterpolationMethod::ForwardFill,
            &duration("1d"),
        )
        .expect("report");
        assert!((report.interpolated_values[0].value - 0.9).abs() < 1e-12);
    }

    #[test]
    fn regular_series_is_complete() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).single().expect("start");
        let samples: Vec<(DateTime<Utc>, f64)> =
            (0..6).map(|i| (start + Duration::hours(i), 1.0)).collect();
        let report = handle_gaps(
            &samples,
            &duration("1h"),
            InterpolationMethod::Nearest,
            &duration("6h"),
        )
        .expect("report");
        assert!(report.detected_gaps.is_empty());
        assert_eq!(report.data_completeness, 1.0);
        assert_eq!(report.interpolation_quality, 1.0);
    }

    #[test]
    fn zero_expected_interval_is_rejected() {
        let result = handle_gaps(
            &[],
            &duration("0m"),
            InterpolationMethod::Linear,
            &duration("1h"),
        );
        assert!(result.is_err());
    }
}
