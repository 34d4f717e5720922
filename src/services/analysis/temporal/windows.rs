use super::types::{TimeSeriesPoint, TimeWindow, WindowStatistics};
use crate::services::analysis::stats::descriptive::{
    classify_trend, linear_fit, mean, min_max, std_dev,
};
use crate::time::WindowDuration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWindowStatistics {
    pub pre_event: WindowStatistics,
    pub post_event: WindowStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventWindows {
    /// Keyed by the requested window label (e.g. `"6h"`).
    pub pre_event_windows: BTreeMap<String, TimeWindow>,
    pub post_event_windows: BTreeMap<String, TimeWindow>,
    /// window label -> field -> statistics.
    pub statistics: BTreeMap<String, BTreeMap<String, FieldWindowStatistics>>,
}

/// Descriptive statistics for one field's values, in sequence order.
pub fn window_statistics(values: &[f64]) -> WindowStatistics {
    let Some((min, max)) = min_max(values) else {
        return WindowStatistics::empty();
    };
    WindowStatistics {
        mean: mean(values),
        std: std_dev(values),
        min,
        max,
        trend: classify_trend(linear_fit(values).slope),
        count: values.len(),
    }
}

/// Points in `[event - size, event)`.
pub fn pre_event_window(
    series: &[TimeSeriesPoint],
    event: DateTime<Utc>,
    size: &WindowDuration,
) -> TimeWindow {
    let start = size.before(event);
    TimeWindow {
        start,
        end: event,
        points: series
            .iter()
            .filter(|p| p.timestamp >= start && p.timestamp < event)
            .cloned()
            .collect(),
    }
}

/// Points in `[event, event + size]`.
pub fn post_event_window(
    series: &[TimeSeriesPoint],
    event: DateTime<Utc>,
    size: &WindowDuration,
) -> TimeWindow {
    let end = size.after(event);
    TimeWindow {
        start: event,
        end,
        points: series
            .iter()
            .filter(|p| p.timestamp >= event && p.timestamp <= end)
            .cloned()
            .collect(),
    }
}

pub fn build_windows(
    event: DateTime<Utc>,
    window_sizes: &[WindowDuration],
    fields: &[String],
    series: &[TimeSeriesPoint],
) -> EventWindows {
    let mut result = EventWindows {
        pre_event_windows: BTreeMap::new(),
        post_event_windows: BTreeMap::new(),
        statistics: BTreeMap::new(),
    };

    for size in window_sizes {
        let pre = pre_event_window(series, event, size);
        let post = post_event_window(series, event, size);

        let per_field: BTreeMap<String, FieldWindowStatistics> = fields
            .iter()
            .map(|field| {
                (
                    field.clone(),
                    FieldWindowStatistics {
                        pre_event: window_statistics(&pre.values(field)),
                        post_event: window_statistics(&post.values(field)),
                    },
                )
            })
            .collect();

        result.statistics.insert(size.label().to_string(), per_field);
        result.pre_event_windows.insert(size.label().to_string(), pre);
        result.post_event_windows.insert(size.label().to_string(), post);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::analysis::temporal::types::TrendDirection;
    use chrono::{Duration, TimeZone};

    fn hourly(start: DateTime<Utc>, values: &[f64]) -> Vec<TimeSeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(idx, v)| {
                TimeSeriesPoint::new(
                    start + Duration::hours(idx as i64),
                    BTreeMap::from([("sentiment".to_string(), *v)]),
                )
            })
            .collect()
    }

    #[test]
    fn splits_points_around_event() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).single().expect("start");
        let series = hourly(start, &[0.9, 0.8, 0.7, 0.6, 0.2, 0.3, 0.4, 0.5]);
        let event = start + Duration::hours(4);
        let size = WindowDuration::parse("3h").expect("size");

        let windows = build_windows(event, &[size], &["sentiment".to_string()], &series);
        let pre = &windows.pre_event_windows["3h"];
        let post = &windows.post_event_windows["3h"];
        assert_eq!(pre.count(), 3);
        assert_eq!(post.count(), 4);

        let stats = &windows.statistics["3h"]["sentiment"];
        assert!((stats.pre_event.mean - 0.7).abs() < 1e-12);
        assert_eq!(stats.pre_event.trend, TrendDirection::Decreasing);
        assert_eq!(stats.post_event.trend, TrendDirection::Increasing);
        assert!((stats.post_event.min - 0.2).abs() < 1e-12);
        assert!((stats.post_event.max - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_window_yields_zero_statistics() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).single().expect("start");
        let series = hourly(start, &[0.5, 0.6]);
        let event = start + Duration::hours(10);
        let size = WindowDuration::parse("2h").expect("size");

        let windows = build_windows(event, &[size], &["sentiment".to_string()], &series);
        let stats = &windows.statistics["2h"]["sentiment"];
        assert_eq!(stats.pre_event, WindowStatistics::empty());
        assert_eq!(stats.post_event, WindowStatistics::empty());
    }

    #[test]
    fn missing_field_counts_as_empty() {
        let stats = window_statistics(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.trend, TrendDirection::Stable);
        assert_eq!(stats.std, 0.0);
    }
}
