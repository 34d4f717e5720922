use super::types::OptimizationCriterion;
use crate::services::analysis::stats::descriptive::{linear_fit, mean, population_variance};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MIN_CONFIDENCE: f64 = 0.51;
const MAX_CONFIDENCE: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct WindowCandidate {
    pub label: String,
    /// Window length in samples.
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSizeRecommendation {
    pub recommended_window: Option<String>,
    pub window_scores: BTreeMap<String, f64>,
    pub confidence: f64,
    pub criterion: OptimizationCriterion,
}

/// Scores each candidate over the leading `samples` values and recommends the best.
///
/// A candidate needing more samples than are available scores 0. Ties keep the
/// earliest candidate.
pub fn choose_window(
    values: &[f64],
    candidates: &[WindowCandidate],
    criterion: OptimizationCriterion,
) -> WindowSizeRecommendation {
    let mut window_scores = BTreeMap::new();
    let mut best: Option<(&str, f64)> = None;

    for candidate in candidates {
        let score = if candidate.samples < 2 || candidate.samples > values.len() {
            0.0
        } else {
            score_window(&values[..candidate.samples], criterion)
        };
        window_scores.insert(candidate.label.clone(), score);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((candidate.label.as_str(), score)),
        }
    }

    let best_score = best.map(|(_, score)| score).unwrap_or(0.0);
    WindowSizeRecommendation {
        recommended_window: best.map(|(label, _)| label.to_string()),
        window_scores,
        confidence: squash_confidence(best_score),
        criterion,
    }
}

pub fn score_window(values: &[f64], criterion: OptimizationCriterion) -> f64 {
    match criterion {
        OptimizationCriterion::SignalToNoiseRatio => {
            let variance = population_variance(values);
            if variance <= 0.0 {
                return 0.0;
            }
            linear_fit(values).slope.abs() / variance.sqrt()
        }
        OptimizationCriterion::TrendStrength => linear_fit(values).r_squared,
        OptimizationCriterion::VarianceStability => variance_stability(values),
    }
}

/// `1 / (1 + CV)` of variances over quarter-length sub-windows.
fn variance_stability(values: &[f64]) -> f64 {
    let chunk = (values.len() / 4).max(2);
    let variances: Vec<f64> = values
        .chunks(chunk)
        .filter(|c| c.len() >= 2)
        .map(population_variance)
        .collect();
    if variances.len() < 2 {
        return 0.0;
    }
    let mu = mean(&variances);
    if mu <= 0.0 {
        // Every sub-window is flat, which is perfectly stable.
        return 1.0;
    }
    let cv = population_variance(&variances).sqrt() / mu;
    1.0 / (1.0 + cv)
}

/// Maps a non-negative score monotonically into `[0.51, 0.95)`.
pub fn squash_confidence(score: f64) -> f64 {
    if !score.is_finite() || score <= 0.0 {
        return MIN_CONFIDENCE;
    }
    MIN_CONFIDENCE + (MAX_CONFIDENCE - MIN_CONFIDENCE) * (1.0 - (-score).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(label: &str, samples: usize) -> WindowCandidate {
        WindowCandidate {
            label: label.to_string(),
            samples,
        }
    }

    #[test]
    fn prefers_window_with_clean_trend() {
        // Clean ramp for 6 samples, then noise.
        let values = vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5, -0.4, 0.6, -0.5, 0.7, -0.6, 0.2];
        let result = choose_window(
            &values,
            &[candidate("6h", 6), candidate("12h", 12)],
            OptimizationCriterion::SignalToNoiseRatio,
        );
        assert_eq!(result.recommended_window.as_deref(), Some("6h"));
        assert!(result.window_scores["6h"] > result.window_scores["12h"]);
        assert!(result.confidence > MIN_CONFIDENCE && result.confidence < MAX_CONFIDENCE);
    }

    #[test]
    fn oversized_candidates_score_zero() {
        let values = vec![1.0, 2.0, 3.0];
        let result = choose_window(
            &values,
            &[candidate("48h", 48)],
            OptimizationCriterion::SignalToNoiseRatio,
        );
        assert_eq!(result.window_scores["48h"], 0.0);
        assert_eq!(result.confidence, MIN_CONFIDENCE);
    }

    #[test]
    fn confidence_is_monotone_and_bounded() {
        let a = squash_confidence(0.1);
        let b = squash_confidence(1.0);
        let c = squash_confidence(100.0);
        assert!(a < b && b < c);
        assert!(c <= MAX_CONFIDENCE);
        assert_eq!(squash_confidence(f64::NAN), MIN_CONFIDENCE);
    }

    #[test]
    fn flat_series_is_perfectly_variance_stable() {
        let values = vec![3.0; 16];
        assert_eq!(score_window(&values, OptimizationCriterion::VarianceStability), 1.0);
        assert_eq!(score_window(&values, OptimizationCriterion::SignalToNoiseRatio), 0.0);
    }
}
