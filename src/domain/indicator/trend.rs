//! Linear-regression trend measures.

use std::fmt;
use std::str::FromStr;

/// What the trend check reports when the window cannot be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsufficientDataPolicy {
    #[default]
    Allow,
    Block,
}

impl InsufficientDataPolicy {
    fn passes(self) -> bool {
        matches!(self, InsufficientDataPolicy::Allow)
    }
}

impl FromStr for InsufficientDataPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(InsufficientDataPolicy::Allow),
            "block" => Ok(InsufficientDataPolicy::Block),
            other => Err(format!("expected 'allow' or 'block', got '{other}'")),
        }
    }
}

impl fmt::Display for InsufficientDataPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsufficientDataPolicy::Allow => write!(f, "allow"),
            InsufficientDataPolicy::Block => write!(f, "block"),
        }
    }
}

/// Least-squares fit `y = slope * x + intercept` with x = 0..n.
fn fit_line(values: &[f64]) -> Option<(f64, f64)> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n_f;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    (slope.is_finite() && intercept.is_finite()).then_some((slope, intercept))
}

pub fn regression_slope(values: &[f64]) -> Option<f64> {
    fit_line(values).map(|(slope, _)| slope)
}

/// Binary trend check: positive slope over the trailing `window` closes.
pub fn is_uptrend(closes: &[f64], window: usize, policy: InsufficientDataPolicy) -> bool {
    if window < 2 || closes.len() < window {
        return policy.passes();
    }
    match regression_slope(&closes[closes.len() - window..]) {
        Some(slope) => slope > 0.0,
        None => policy.passes(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
    Sideways,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Uptrend => write!(f, "uptrend"),
            TrendDirection::Downtrend => write!(f, "downtrend"),
            TrendDirection::Sideways => write!(f, "sideways"),
        }
    }
}

/// Research-only trend description. Not used inside the simulation loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendReport {
    pub direction: TrendDirection,
    pub slope: f64,
    pub r_squared: f64,
    /// |slope| normalized by the last price.
    pub strength: f64,
}

pub fn detect_trend(closes: &[f64], window: usize, r_squared_threshold: f64) -> TrendReport {
    let sideways = TrendReport {
        direction: TrendDirection::Sideways,
        slope: 0.0,
        r_squared: 0.0,
        strength: 0.0,
    };
    if closes.len() < window {
        return sideways;
    }
    let y: Vec<f64> = closes[closes.len() - window..]
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    let Some((slope, intercept)) = fit_line(&y) else {
        return sideways;
    };

    let y_mean = y.iter().sum::<f64>() / y.len() as f64;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (i, v) in y.iter().enumerate() {
        let pred = slope * i as f64 + intercept;
        ss_res += (v - pred) * (v - pred);
        ss_tot += (v - y_mean) * (v - y_mean);
    }
    let r_squared = if ss_tot != 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    let direction = if r_squared < r_squared_threshold {
        TrendDirection::Sideways
    } else if slope > 0.0 {
        TrendDirection::Uptrend
    } else {
        TrendDirection::Downtrend
    };
    let last = closes[closes.len() - 1];

    TrendReport {
        direction,
        slope,
        r_squared,
        strength: slope.abs() / last,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn slope_of_straight_line() {
        let values: Vec<f64> = (0..10).map(|i| 3.0 + 2.0 * i as f64).collect();
        assert_relative_eq!(regression_slope(&values).unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn slope_needs_two_points() {
        assert!(regression_slope(&[1.0]).is_none());
    }

    #[test]
    fn uptrend_uses_trailing_window() {
        // falling early, rising over the last five
        let closes = [10.0, 9.0, 8.0, 7.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert!(is_uptrend(&closes, 5, InsufficientDataPolicy::Block));
        assert!(!is_uptrend(&closes[..5], 5, InsufficientDataPolicy::Allow));
    }

    #[test]
    fn flat_series_is_not_uptrend() {
        assert!(!is_uptrend(&[5.0; 6], 6, InsufficientDataPolicy::Allow));
    }

    #[test]
    fn insufficient_data_follows_policy() {
        let closes = [1.0, 2.0];
        assert!(is_uptrend(&closes, 5, InsufficientDataPolicy::Allow));
        assert!(!is_uptrend(&closes, 5, InsufficientDataPolicy::Block));
    }

    #[test]
    fn non_finite_data_follows_policy() {
        let closes = [1.0, f64::NAN, 3.0];
        assert!(is_uptrend(&closes, 3, InsufficientDataPolicy::Allow));
        assert!(!is_uptrend(&closes, 3, InsufficientDataPolicy::Block));
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Block".parse::<InsufficientDataPolicy>(), Ok(InsufficientDataPolicy::Block));
        assert_eq!(" allow ".parse::<InsufficientDataPolicy>(), Ok(InsufficientDataPolicy::Allow));
        assert!("maybe".parse::<InsufficientDataPolicy>().is_err());
    }

    #[test]
    fn detect_trend_classifies_clean_lines() {
        let up: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let report = detect_trend(&up, 20, 0.2);
        assert_eq!(report.direction, TrendDirection::Uptrend);
        assert_relative_eq!(report.r_squared, 1.0, epsilon = 1e-9);
        assert_relative_eq!(report.strength, 1.0 / 119.0, epsilon = 1e-12);

        let down: Vec<f64> = up.iter().rev().copied().collect();
        assert_eq!(detect_trend(&down, 20, 0.2).direction, TrendDirection::Downtrend);
    }

    #[test]
    fn detect_trend_low_fit_is_sideways() {
        let noisy = [100.0, 105.0, 95.0, 104.0, 96.0, 103.0, 97.0, 100.5];
        let report = detect_trend(&noisy, 8, 0.5);
        assert_eq!(report.direction, TrendDirection::Sideways);
    }

    #[test]
    fn detect_trend_short_input_is_sideways() {
        let report = detect_trend(&[1.0, 2.0], 5, 0.2);
        assert_eq!(report.direction, TrendDirection::Sideways);
        assert_eq!(report.strength, 0.0);
    }
}
