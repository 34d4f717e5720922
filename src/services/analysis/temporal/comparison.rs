use super::types::{ImpactMagnitude, PValueMode};
use crate::services::analysis::stats::hypothesis::pooled_t_test;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const STRONG_EFFECT: f64 = 0.8;
const MODERATE_EFFECT: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub n_before: usize,
    pub n_after: usize,
    /// `mean(after) - mean(before)`.
    pub mean_difference: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub effect_size: f64,
    pub confidence_interval: (f64, f64),
}

impl FieldComparison {
    /// Result for a field with no values on one side: no difference, nothing significant.
    fn insufficient(n_before: usize, n_after: usize) -> Self {
        Self {
            n_before,
            n_after,
            mean_difference: 0.0,
            t_statistic: 0.0,
            p_value: 1.0,
            effect_size: 0.0,
            confidence_interval: (0.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowComparison {
    pub field_comparisons: BTreeMap<String, FieldComparison>,
    pub overall_significance: bool,
    pub impact_magnitude: ImpactMagnitude,
}

pub fn compare(before: &[f64], after: &[f64], mode: PValueMode) -> FieldComparison {
    let Some(result) = pooled_t_test(before, after) else {
        return FieldComparison::insufficient(before.len(), after.len());
    };
    FieldComparison {
        n_before: result.n_before,
        n_after: result.n_after,
        mean_difference: result.mean_difference,
        t_statistic: result.t_statistic,
        p_value: result.p_value(mode),
        effect_size: result.effect_size(),
        confidence_interval: result.confidence_interval(),
    }
}

pub fn classify_magnitude(mean_abs_effect: f64) -> ImpactMagnitude {
    if mean_abs_effect > STRONG_EFFECT {
        ImpactMagnitude::Strong
    } else if mean_abs_effect > MODERATE_EFFECT {
        ImpactMagnitude::Moderate
    } else {
        ImpactMagnitude::Weak
    }
}

/// Compares every field's before/after samples and summarises across fields.
///
/// `per_field` maps a field to its `(before, after)` values.
pub fn compare_fields(
    per_field: &BTreeMap<String, (Vec<f64>, Vec<f64>)>,
    mode: PValueMode,
    alpha: f64,
) -> WindowComparison {
    let field_comparisons: BTreeMap<String, FieldComparison> = per_field
        .iter()
        .map(|(field, (before, after))| (field.clone(), compare(before, after, mode)))
        .collect();

    let overall_significance = field_comparisons.values().any(|c| c.p_value < alpha);
    let mean_abs_effect = if field_comparisons.is_empty() {
        0.0
    } else {
        field_comparisons
            .values()
            .map(|c| c.effect_size.abs())
            .sum::<f64>()
            / field_comparisons.len() as f64
    };

    WindowComparison {
        field_comparisons,
        overall_significance,
        impact_magnitude: classify_magnitude(mean_abs_effect),
    }
}
