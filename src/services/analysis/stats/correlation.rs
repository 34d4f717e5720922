/// Pearson correlation of two equally long, index-aligned slices.
///
/// Returns `None` when fewer than two pairs exist or either side has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let n_f = n as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xx = 0.0;
    let mut sum_yy = 0.0;
    let mut sum_xy = 0.0;
    for (xv, yv) in x.iter().zip(y.iter()).take(n) {
        sum_x += xv;
        sum_y += yv;
        sum_xx += xv * xv;
        sum_yy += yv * yv;
        sum_xy += xv * yv;
    }
    let denom_x = n_f * sum_xx - sum_x * sum_x;
    let denom_y = n_f * sum_yy - sum_y * sum_y;
    if denom_x <= 1e-12 || denom_y <= 1e-12 {
        return None;
    }
    let r = (n_f * sum_xy - sum_x * sum_y) / (denom_x * denom_y).sqrt();
    if !r.is_finite() {
        return None;
    }
    Some(r.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfectly_linear_pairs_correlate() {
        let x: Vec<f64> = (0..8).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 - 2.0 * v).collect();
        let r = pearson(&x, &y).expect("defined");
        assert!((r + 1.0).abs() < 1e-9);
    }

    #[test]
    fn constant_side_is_undefined() {
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0], &[2.0]), None);
    }
}
