use num_complex::Complex64;

/// Infinity norm of a real vector.
pub(crate) fn norm_inf(x: &[f64]) -> f64 {
    x.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
}

/// Largest elementwise distance between two complex vectors.
pub(crate) fn max_abs_diff(a: &[Complex64], b: &[Complex64]) -> f64 {
    a.iter()
        .zip(b)
        .fold(0.0_f64, |m, (a, b)| m.max((a - b).norm()))
}
