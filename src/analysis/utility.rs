/// Log-citation transform, `ln(c + 1)`.
pub fn log_citation(citations: f64) -> f64 {
    citations.ln_1p()
}

/// Inverse of [`log_citation`], `exp(x) - 1`.
pub fn inverse_log_citation(x: f64) -> f64 {
    x.exp_m1()
}

/// Population mean and variance from running sums. Returns `None` when `n` is 0.
pub fn mean_variance(sum: f64, sum_squared: f64, n: u64) -> Option<(f64, f64)> {
    if n == 0 {
        return None;
    }
    let n = n as f64;
    let mean = sum / n;
    Some((mean, sum_squared / n - mean * mean))
}

/// Relative tolerance below which a variance computed from running sums is
/// treated as zero. `E[x^2] - E[x]^2` rarely lands on exactly 0.0 for
/// identical values.
pub const VARIANCE_TOLERANCE: f64 = 1e-12;

/// True when `variance` is zero up to rounding, or not a usable number.
pub fn is_degenerate_variance(variance: f64, mean: f64) -> bool {
    !variance.is_finite() || variance <= VARIANCE_TOLERANCE * (1.0 + mean * mean)
}

/// `numerator` per million units of `fund`. Returns `None` for a zero fund.
pub fn per_million(numerator: f64, fund: f64) -> Option<f64> {
    if fund > 0.0 {
        Some(numerator / fund * 1e6)
    } else {
        None
    }
}
