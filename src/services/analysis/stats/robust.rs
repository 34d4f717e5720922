fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

pub fn median(values: &[f64]) -> Option<f64> {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return None;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Linear-interpolated quantile, `q` in `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&q) {
        return None;
    }
    let sorted = sorted_finite(values);
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        len => {
            let pos = q * (len as f64 - 1.0);
            let idx = pos.floor() as usize;
            let frac = pos - idx as f64;
            let a = sorted[idx];
            let b = sorted[(idx + 1).min(len - 1)];
            Some(a + (b - a) * frac)
        }
    }
}
