use super::types::{Breakpoint, ChangeType, Segment};
use crate::services::analysis::stats::descriptive::{
    classify_trend, linear_fit, mean, population_variance,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confidence reported for every accepted split. The score is a heuristic, not a
/// likelihood, so no calibrated probability is derived from it.
pub const BREAKPOINT_CONFIDENCE: f64 = 0.85;
/// Minimum fraction of single-line SSE that a split must explain when segmenting
/// recursively.
const MIN_SPLIT_GAIN: f64 = 0.5;
const VARIANCE_RATIO_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakpointReport {
    pub change_points: Vec<Breakpoint>,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SplitCandidate {
    index: usize,
    score: f64,
    reversal: bool,
}

/// Mean shift between the two sides, plus a trend-displacement term when a decline
/// turns into a rise: `|slope_pre - slope_post|` accumulated over the shorter side,
/// which is in the same units as the mean shift.
fn split_score(values: &[f64], index: usize) -> (f64, bool) {
    let (left, right) = values.split_at(index);
    let mean_shift = (mean(left) - mean(right)).abs();
    let slope_left = linear_fit(left).slope;
    let slope_right = linear_fit(right).slope;
    let reversal = slope_left < 0.0 && slope_right > 0.0;
    if !reversal {
        return (mean_shift, false);
    }
    let displacement = (slope_left - slope_right).abs() * left.len().min(right.len()) as f64;
    (mean_shift + displacement, true)
}

fn best_split(values: &[f64], min_segment_length: usize) -> Option<SplitCandidate> {
    let n = values.len();
    let min_len = min_segment_length.max(1);
    if n <= 2 * min_len {
        return None;
    }
    let mut best: Option<SplitCandidate> = None;
    for index in min_len..(n - min_len) {
        let (score, reversal) = split_score(values, index);
        if !score.is_finite() {
            continue;
        }
        match best {
            Some(current) if score <= current.score => {}
            _ => {
                best = Some(SplitCandidate {
                    index,
                    score,
                    reversal,
                })
            }
        }
    }
    best
}

fn classify_change(values: &[f64], split: &SplitCandidate) -> ChangeType {
    if split.reversal {
        return ChangeType::Trend;
    }
    let (left, right) = values.split_at(split.index);
    let var_left = population_variance(left);
    let var_right = population_variance(right);
    let (lo, hi) = if var_left <= var_right {
        (var_left, var_right)
    } else {
        (var_right, var_left)
    };
    let pooled_std = ((var_left + var_right) / 2.0).sqrt();
    let mean_shift = (mean(left) - mean(right)).abs();
    let variance_dominates = if lo > 0.0 {
        hi / lo > VARIANCE_RATIO_THRESHOLD
    } else {
        hi > 0.0
    };
    if variance_dominates && mean_shift < 0.5 * pooled_std {
        ChangeType::Variance
    } else {
        ChangeType::Mean
    }
}

fn segments_for(values: &[f64], cuts: &[usize]) -> Vec<Segment> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut bounds = Vec::with_capacity(cuts.len() + 2);
    bounds.push(0);
    bounds.extend_from_slice(cuts);
    bounds.push(values.len());
    bounds
        .windows(2)
        .map(|pair| {
            let slope = linear_fit(&values[pair[0]..pair[1]]).slope;
            Segment {
                start: pair[0],
                end: pair[1],
                trend: classify_trend(slope),
                slope,
            }
        })
        .collect()
}

fn to_breakpoint(
    values: &[f64],
    split: &SplitCandidate,
    offset: usize,
    timestamps: Option<&[DateTime<Utc>]>,
) -> Breakpoint {
    let location = offset + split.index;
    Breakpoint {
        location,
        timestamp: timestamps.and_then(|ts| ts.get(location).copied()),
        confidence: BREAKPOINT_CONFIDENCE,
        change_type: classify_change(values, split),
    }
}

/// The single dominant breakpoint, scanning splits with at least `min_segment_length`
/// points on both sides.
pub fn find_breakpoint(
    values: &[f64],
    min_segment_length: usize,
    timestamps: Option<&[DateTime<Utc>]>,
) -> BreakpointReport {
    match best_split(values, min_segment_length) {
        Some(split) => BreakpointReport {
            change_points: vec![to_breakpoint(values, &split, 0, timestamps)],
            segments: segments_for(values, &[split.index]),
        },
        None => BreakpointReport {
            change_points: Vec::new(),
            segments: segments_for(values, &[]),
        },
    }
}

/// Recursive binary segmentation: split, then recurse into each side while it still
/// spans `2 × min_segment_length` points and the split explains enough of the
/// piecewise-linear error.
pub fn find_breakpoints(
    values: &[f64],
    min_segment_length: usize,
    max_breakpoints: usize,
    timestamps: Option<&[DateTime<Utc>]>,
) -> BreakpointReport {
    if max_breakpoints <= 1 {
        return find_breakpoint(values, min_segment_length, timestamps);
    }

    let mut change_points: Vec<Breakpoint> = Vec::new();
    let mut pending: Vec<(usize, usize)> = vec![(0, values.len())];
    let mut first = true;
    while let Some((start, end)) = pending.pop() {
        if change_points.len() >= max_breakpoints {
            break;
        }
        let slice = &values[start..end];
        let Some(split) = best_split(slice, min_segment_length) else {
            continue;
        };
        // The top-level split is always reported, matching the single-breakpoint detector.
        if !first && !split_gain_is_material(slice, split.index) {
            continue;
        }
        first = false;
        change_points.push(to_breakpoint(slice, &split, start, timestamps));
        pending.push((start, start + split.index));
        pending.push((start + split.index, end));
    }

    change_points.sort_by_key(|bp| bp.location);
    let cuts: Vec<usize> = change_points.iter().map(|bp| bp.location).collect();
    BreakpointReport {
        segments: segments_for(values, &cuts),
        change_points,
    }
}

fn split_gain_is_material(values: &[f64], index: usize) -> bool {
    let whole = linear_fit(values).sse(values);
    if whole <= 1e-12 {
        return false;
    }
    let (left, right) = values.split_at(index);
    let parts = linear_fit(left).sse(left) + linear_fit(right).sse(right);
    (whole - parts) / whole >= MIN_SPLIT_GAIN
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::analysis::temporal::types::TrendDirection;

    fn decline_then_rise() -> Vec<f64> {
        let mut values: Vec<f64> = (0..20).map(|i| 0.8 - 0.01 * i as f64).collect();
        values.extend((0..20).map(|i| 0.6 + 0.015 * i as f64));
        values
    }

    #[test]
    fn finds_trend_reversal_near_the_turn() {
        let values = decline_then_rise();
        let report = find_breakpoint(&values, 5, None);
        assert_eq!(report.change_points.len(), 1);
        let bp = &report.change_points[0];
        assert!((18..=22).contains(&bp.location), "location {}", bp.location);
        assert_eq!(bp.change_type, ChangeType::Trend);
        assert_eq!(report.segments.len(), 2);
        assert_eq!(report.segments[0].start, 0);
        assert_eq!(report.segments[1].end, 40);
        assert!(report.segments[0].slope < 0.0);
        assert!(report.segments[1].slope > 0.0);
    }

    #[test]
    fn finds_level_shift() {
        let mut values = vec![1.0; 15];
        values.extend(vec![3.0; 15]);
        let report = find_breakpoint(&values, 3, None);
        assert_eq!(report.change_points[0].location, 15);
        assert_eq!(report.change_points[0].change_type, ChangeType::Mean);
        assert_eq!(report.segments[0].trend, TrendDirection::Stable);
    }

    #[test]
    fn too_short_series_has_no_breakpoint() {
        let values = vec![1.0, 2.0, 3.0];
        let report = find_breakpoint(&values, 5, None);
        assert!(report.change_points.is_empty());
        assert_eq!(report.segments.len(), 1);
        assert!(find_breakpoint(&[], 5, None).segments.is_empty());
    }

    #[test]
    fn recursive_segmentation_finds_two_level_shifts() {
        let mut values = vec![0.0; 12];
        values.extend(vec![5.0; 12]);
        values.extend(vec![1.0; 12]);
        let report = find_breakpoints(&values, 4, 5, None);
        let locations: Vec<usize> = report.change_points.iter().map(|bp| bp.location).collect();
        assert_eq!(locations, vec![12, 24]);
        assert_eq!(report.segments.len(), 3);
    }

    #[test]
    fn recursive_segmentation_leaves_straight_lines_alone() {
        let values = decline_then_rise();
        let report = find_breakpoints(&values, 5, 4, None);
        assert_eq!(report.change_points.len(), 1);
    }
}
