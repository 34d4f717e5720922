use super::types::{PValueMode, SignificanceTest};
use crate::error::{EngineError, EngineResult};
use crate::services::analysis::stats::hypothesis::{
    bootstrap_p_value, cohens_d, permutation_p_value, pooled_t_test, resampling_rng,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy)]
pub struct SignificanceSettings {
    pub iterations: usize,
    pub seed: Option<u64>,
    pub p_value_mode: PValueMode,
    pub alpha: f64,
}

impl Default for SignificanceSettings {
    fn default() -> Self {
        Self {
            iterations: 100,
            seed: None,
            p_value_mode: PValueMode::Coarse,
            alpha: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub p_value: f64,
    /// `mean(post) - mean(pre)`.
    pub statistic: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceReport {
    pub is_significant: bool,
    pub p_value: f64,
    pub effect_size: f64,
    pub confidence_level: f64,
    pub test_results: BTreeMap<String, TestOutcome>,
}

/// Runs every requested test on the same pre/post samples and keeps the smallest p-value.
pub fn test_significance(
    pre: &[f64],
    post: &[f64],
    tests: &[SignificanceTest],
    settings: &SignificanceSettings,
) -> EngineResult<SignificanceReport> {
    if tests.is_empty() {
        return Err(EngineError::validation("at least one significance test is required"));
    }

    let comparison = pooled_t_test(pre, post);
    let observed = comparison.map(|c| c.mean_difference).unwrap_or(0.0);
    let effect_size = comparison
        .map(|c| cohens_d(c.mean_difference, c.pooled_variance))
        .unwrap_or(0.0);

    let mut rng = resampling_rng(settings.seed);
    let mut test_results = BTreeMap::new();
    for test in tests {
        let p_value = match test {
            SignificanceTest::Permutation => {
                permutation_p_value(pre, post, settings.iterations, &mut rng)
            }
            SignificanceTest::Bootstrap => {
                bootstrap_p_value(pre, post, settings.iterations, &mut rng)
            }
            SignificanceTest::Parametric => comparison
                .map(|c| c.p_value(settings.p_value_mode))
                .unwrap_or(1.0),
        };
        test_results.insert(
            test.as_str().to_string(),
            TestOutcome {
                p_value,
                statistic: observed,
            },
        );
    }

    let p_value = test_results
        .values()
        .map(|outcome| outcome.p_value)
        .fold(1.0_f64, f64::min);

    Ok(SignificanceReport {
        is_significant: p_value < settings.alpha,
        p_value,
        effect_size,
        confidence_level: 1.0 - p_value,
        test_results,
    })
}
