//! Returns and realized volatility.
//!
//! RET[i] = C[i+1] / C[i] - 1 (the undefined leading value is dropped)
//! STD = sqrt(sum((x - mean)^2) / (n - 1))
//! VOL(n) = STD(last n returns) * sqrt(252)

use super::TRADING_DAYS_PER_YEAR;

/// Simple returns between consecutive values. Output length is `len - 1`.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (ddof = 1). `None` below two observations or
/// when the result is not finite.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    let std = (ss / (values.len() - 1) as f64).sqrt();
    std.is_finite().then_some(std)
}

/// Annualized sample volatility of a return slice.
pub fn annualized_volatility(returns: &[f64]) -> Option<f64> {
    sample_std(returns).map(|s| s * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Annualized volatility of the trailing `window` returns.
pub fn trailing_volatility(returns: &[f64], window: usize) -> Option<f64> {
    if window < 2 || returns.len() < window {
        return None;
    }
    annualized_volatility(&returns[returns.len() - window..])
}
