use super::descriptive::{mean, sample_variance};
use crate::services::analysis::temporal::types::PValueMode;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

/// Two-sided critical value used for the 95% interval and power heuristics.
pub const Z_95: f64 = 1.96;
const Z_POWER_80: f64 = 0.84;

/// Pooled-variance two-sample comparison of `after` against `before`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PooledComparison {
    pub n_before: usize,
    pub n_after: usize,
    pub mean_before: f64,
    pub mean_after: f64,
    pub mean_difference: f64,
    pub pooled_variance: f64,
    pub standard_error: f64,
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
}

impl PooledComparison {
    /// Cohen's d against the pooled standard deviation; never negative.
    pub fn effect_size(&self) -> f64 {
        cohens_d(self.mean_difference, self.pooled_variance)
    }

    pub fn p_value(&self, mode: PValueMode) -> f64 {
        p_value_for_t(self.t_statistic, self.degrees_of_freedom, mode)
    }

    pub fn confidence_interval(&self) -> (f64, f64) {
        let half_width = Z_95 * self.standard_error;
        (
            self.mean_difference - half_width,
            self.mean_difference + half_width,
        )
    }
}

/// Returns `None` when either side is empty.
///
/// A zero pooled variance (or a single observation in total per side) leaves `t = 0`
/// rather than producing an infinite statistic.
pub fn pooled_t_test(before: &[f64], after: &[f64]) -> Option<PooledComparison> {
    let n1 = before.len();
    let n2 = after.len();
    if n1 == 0 || n2 == 0 {
        return None;
    }
    let mean_before = mean(before);
    let mean_after = mean(after);
    let mean_difference = mean_after - mean_before;
    let df = (n1 + n2) as f64 - 2.0;
    let pooled_variance = if df > 0.0 {
        (((n1 - 1) as f64) * sample_variance(before) + ((n2 - 1) as f64) * sample_variance(after))
            / df
    } else {
        0.0
    };
    let standard_error = (pooled_variance * (1.0 / n1 as f64 + 1.0 / n2 as f64)).sqrt();
    let t_statistic = if standard_error > 0.0 && standard_error.is_finite() {
        mean_difference / standard_error
    } else {
        tracing::debug!(n1, n2, "zero pooled variance; t statistic normalised to 0");
        0.0
    };
    Some(PooledComparison {
        n_before: n1,
        n_after: n2,
        mean_before,
        mean_after,
        mean_difference,
        pooled_variance,
        standard_error,
        t_statistic,
        degrees_of_freedom: df.max(0.0),
    })
}

pub fn cohens_d(mean_difference: f64, pooled_variance: f64) -> f64 {
    if pooled_variance <= 0.0 || !pooled_variance.is_finite() || !mean_difference.is_finite() {
        return 0.0;
    }
    mean_difference.abs() / pooled_variance.sqrt()
}

/// Three-bucket p-value classifier: `|t| > 2 → 0.01`, `|t| > 1.96 → 0.05`, else `0.20`.
pub fn coarse_p_value(t: f64) -> f64 {
    let abs_t = t.abs();
    if abs_t > 2.0 {
        0.01
    } else if abs_t > Z_95 {
        0.05
    } else {
        0.20
    }
}

/// Two-sided Student-t p-value; falls back to the coarse buckets when `df` is unusable.
pub fn exact_p_value(t: f64, df: f64) -> f64 {
    if !t.is_finite() || !(df > 0.0) {
        return coarse_p_value(if t.is_finite() { t } else { 0.0 });
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.sf(t.abs())).clamp(f64::MIN_POSITIVE, 1.0),
        Err(_) => coarse_p_value(t),
    }
}

pub fn p_value_for_t(t: f64, df: f64, mode: PValueMode) -> f64 {
    match mode {
        PValueMode::Coarse => coarse_p_value(t),
        PValueMode::Exact => exact_p_value(t, df),
    }
}

/// RNG for resampling tests: seeded when a seed is configured, entropy otherwise.
pub fn resampling_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Fraction of label shuffles of the pooled sample whose absolute mean difference is
/// at least the observed one.
pub fn permutation_p_value(
    before: &[f64],
    after: &[f64],
    iterations: usize,
    rng: &mut StdRng,
) -> f64 {
    if before.is_empty() || after.is_empty() || iterations == 0 {
        return 1.0;
    }
    let observed = (mean(after) - mean(before)).abs();
    let mut pooled: Vec<f64> = before.iter().chain(after.iter()).copied().collect();
    let split = before.len();
    let mut extreme = 0_usize;
    for _ in 0..iterations {
        pooled.shuffle(rng);
        let diff = (mean(&pooled[split..]) - mean(&pooled[..split])).abs();
        if diff >= observed {
            extreme += 1;
        }
    }
    extreme as f64 / iterations as f64
}

/// Like [`permutation_p_value`], but each null replicate draws both groups with
/// replacement from the pooled sample.
pub fn bootstrap_p_value(
    before: &[f64],
    after: &[f64],
    iterations: usize,
    rng: &mut StdRng,
) -> f64 {
    if before.is_empty() || after.is_empty() || iterations == 0 {
        return 1.0;
    }
    let observed = (mean(after) - mean(before)).abs();
    let pooled: Vec<f64> = before.iter().chain(after.iter()).copied().collect();
    let resample = |len: usize, rng: &mut StdRng| -> f64 {
        let total: f64 = (0..len).map(|_| pooled[rng.gen_range(0..pooled.len())]).sum();
        total / len as f64
    };
    let mut extreme = 0_usize;
    for _ in 0..iterations {
        let left = resample(before.len(), rng);
        let right = resample(after.len(), rng);
        if (right - left).abs() >= observed {
            extreme += 1;
        }
    }
    extreme as f64 / iterations as f64
}

/// Approximate power of a two-sided test at alpha 0.05 for standardized effect `d`.
pub fn statistical_power(effect_size: f64, n_before: usize, n_after: usize) -> f64 {
    if n_before == 0 || n_after == 0 || !effect_size.is_finite() {
        return 0.0;
    }
    let Ok(normal) = Normal::new(0.0, 1.0) else {
        return 0.0;
    };
    let se_factor = (1.0 / n_before as f64 + 1.0 / n_after as f64).sqrt();
    let noncentrality = effect_size.abs() / se_factor;
    normal.cdf(noncentrality - Z_95).clamp(0.0, 1.0)
}

/// Smallest standardized effect detectable with 80% power at alpha 0.05.
pub fn minimum_detectable_effect(n_before: usize, n_after: usize) -> Option<f64> {
    if n_before == 0 || n_after == 0 {
        return None;
    }
    Some((Z_95 + Z_POWER_80) * (1.0 / n_before as f64 + 1.0 / n_after as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarse_buckets_match_thresholds() {
        assert_eq!(coarse_p_value(2.5), 0.01);
        assert_eq!(coarse_p_value(-1.98), 0.05);
        assert_eq!(coarse_p_value(1.5), 0.20);
        assert_eq!(coarse_p_value(1.96), 0.20);
    }

    #[test]
    fn exact_p_value_is_two_sided_and_monotone() {
        let p_small = exact_p_value(3.0, 30.0);
        let p_large = exact_p_value(1.0, 30.0);
        assert!(p_small < 0.01);
        assert!(p_large > 0.3);
        assert!((exact_p_value(-3.0, 30.0) - p_small).abs() < 1e-12);
    }

    #[test]
    fn pooled_t_test_detects_shift() {
        let before = [1.0, 1.1, 0.9, 1.05, 0.95];
        let after = [2.0, 2.1, 1.9, 2.05, 1.95];
        let cmp = pooled_t_test(&before, &after).expect("comparison");
        assert!((cmp.mean_difference - 1.0).abs() < 1e-12);
        assert!(cmp.t_statistic > 10.0);
        assert!(cmp.effect_size() > 0.8);
        let (low, high) = cmp.confidence_interval();
        assert!(low < 1.0 && high > 1.0);
    }

    #[test]
    fn zero_variance_is_normalised() {
        let cmp = pooled_t_test(&[1.0, 1.0], &[2.0, 2.0]).expect("comparison");
        assert_eq!(cmp.t_statistic, 0.0);
        assert_eq!(cmp.effect_size(), 0.0);
        assert!(pooled_t_test(&[], &[1.0]).is_none());
    }

    #[test]
    fn permutation_separates_distinct_groups() {
        let mut rng = resampling_rng(Some(7));
        let before: Vec<f64> = (0..20).map(|i| (i % 3) as f64 * 0.01).collect();
        let after: Vec<f64> = (0..20).map(|i| 1.0 + (i % 3) as f64 * 0.01).collect();
        assert!(permutation_p_value(&before, &after, 100, &mut rng) < 0.05);
        assert!(bootstrap_p_value(&before, &after, 100, &mut rng) < 0.05);
    }

    #[test]
    fn permutation_of_identical_groups_is_not_significant() {
        let mut rng = resampling_rng(Some(11));
        let values = [0.5, 0.6, 0.4, 0.55, 0.45, 0.5];
        assert!(permutation_p_value(&values, &values, 100, &mut rng) > 0.5);
    }

    #[test]
    fn power_grows_with_sample_size() {
        let small = statistical_power(0.5, 10, 10);
        let large = statistical_power(0.5, 200, 200);
        assert!(large > small);
        assert!(large > 0.9);
        assert!(minimum_detectable_effect(0, 3).is_none());
    }
}
