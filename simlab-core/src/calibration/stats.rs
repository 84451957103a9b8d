//! Sample statistics used by calibration.

/// Percentile of a sorted slice using linear interpolation between the two
/// nearest ranks. `p` is in [0, 1]. Returns NaN for an empty slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

pub fn sorted(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.into_iter().collect();
    v.sort_by(f64::total_cmp);
    v
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; 0 for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Least-squares slope of `y = k * sqrt(size)` through the origin:
/// `k = Σ y·√s / Σ s`. `None` when every size is zero.
pub fn sqrt_law_coefficient(points: &[(f64, f64)]) -> Option<f64> {
    let (num, den) = points
        .iter()
        .filter(|(s, _)| *s > 0.0)
        .fold((0.0, 0.0), |(num, den), (s, y)| (num + y * s.sqrt(), den + s));
    (den > 0.0).then(|| num / den)
}

/// Share of `true` values; `None` for an empty iterator.
pub fn rate(flags: impl IntoIterator<Item = bool>) -> Option<f64> {
    let (hits, total) = flags
        .into_iter()
        .fold((0usize, 0usize), |(h, t), f| (h + usize::from(f), t + 1));
    (total > 0).then(|| hits as f64 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_linearly() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&v, 0.0), 1.0);
        assert_eq!(percentile_sorted(&v, 0.5), 3.0);
        assert_eq!(percentile_sorted(&v, 1.0), 5.0);
        assert!((percentile_sorted(&v, 0.9) - 4.6).abs() < 1e-12);
        assert!(percentile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn sqrt_law_recovers_coefficient() {
        let points: Vec<(f64, f64)> = [1.0, 4.0, 9.0, 16.0].iter().map(|s: &f64| (*s, 7.0 * s.sqrt())).collect();
        assert!((sqrt_law_coefficient(&points).unwrap() - 7.0).abs() < 1e-12);
        assert!(sqrt_law_coefficient(&[(0.0, 5.0)]).is_none());
    }

    #[test]
    fn std_dev_matches_sample_formula() {
        assert!((std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.138_089_935).abs() < 1e-8);
        assert_eq!(std_dev(&[1.0]), 0.0);
    }

    #[test]
    fn rate_of_flags() {
        assert_eq!(rate([true, false, false, true]), Some(0.5));
        assert_eq!(rate(std::iter::empty()), None);
    }
}
