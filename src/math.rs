//! Numerically stable log-domain helpers shared by the mixture factors and
//! the discrete engine.

/// Compute `log(sum_i exp(v_i))` without overflow.
///
/// The maximum element is factored out before exponentiating, so the result
/// is exact for inputs whose raw exponentials would overflow or underflow.
/// Returns negative infinity for an empty slice.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Stable softmax: `exp(v_i) / sum_j exp(v_j)`.
///
/// The maximum element is subtracted before exponentiating. The output sums
/// to one and is invariant under adding a constant to every input.
pub fn exp_normalize(values: &[f64]) -> Vec<f64> {
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let unnormalized: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let total: f64 = unnormalized.iter().sum();
    unnormalized.iter().map(|v| v / total).collect()
}
