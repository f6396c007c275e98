//! Performance metrics from the portfolio value curve.
//!
//! With V the value curve of length N and R its simple returns:
//! CAGR   = (V[-1] / V[0])^(252 / N) - 1
//! Sharpe = mean(R) * 252 / (std(R, ddof = 1) * sqrt(252))
//! MaxDD  = min(V[t] / max(V[0..=t]) - 1)

use super::backtest::{BacktestResult, RunDiagnostics};
use super::indicator::volatility::{mean, pct_change, sample_std};
use super::indicator::TRADING_DAYS_PER_YEAR;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub initial_value: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub volatility: f64,
    /// Zero or negative.
    pub max_drawdown: f64,
    pub calmar: f64,
    pub total_trades: usize,
    pub time_in_cash_pct: f64,
    pub used_market_vol_window: Option<usize>,
    pub diagnostics: RunDiagnostics,
}

impl Metrics {
    pub fn compute(result: &BacktestResult) -> Self {
        let values: Vec<f64> = result
            .portfolio
            .value_curve
            .iter()
            .map(|p| p.total_value)
            .collect();
        let diagnostics = result.diagnostics.clone();

        if values.is_empty() {
            return Metrics::degenerate(result.portfolio.initial_capital, diagnostics);
        }

        let returns = pct_change(&values);
        let max_drawdown = max_drawdown(&values);
        let cagr = cagr(&values);
        let time_in_cash_pct = if diagnostics.processed_dates > 0 {
            diagnostics.risk_free_days as f64 / diagnostics.processed_dates as f64 * 100.0
        } else {
            0.0
        };

        Metrics {
            initial_value: values[0],
            final_value: values[values.len() - 1],
            total_return: values[values.len() - 1] / values[0] - 1.0,
            cagr,
            sharpe: sharpe_ratio(&returns),
            sortino: sortino_ratio(&returns),
            volatility: sample_std(&returns)
                .map(|s| s * TRADING_DAYS_PER_YEAR.sqrt())
                .unwrap_or(0.0),
            max_drawdown,
            calmar: if max_drawdown < 0.0 {
                cagr / max_drawdown.abs()
            } else {
                0.0
            },
            total_trades: result.portfolio.trades.len(),
            time_in_cash_pct,
            used_market_vol_window: diagnostics.used_market_vol_window,
            diagnostics,
        }
    }

    /// Zero metrics for a run that processed no dates.
    pub fn degenerate(initial_capital: f64, diagnostics: RunDiagnostics) -> Self {
        Metrics {
            initial_value: initial_capital,
            final_value: initial_capital,
            total_return: 0.0,
            cagr: 0.0,
            sharpe: 0.0,
            sortino: 0.0,
            volatility: 0.0,
            max_drawdown: 0.0,
            calmar: 0.0,
            total_trades: 0,
            time_in_cash_pct: 0.0,
            used_market_vol_window: None,
            diagnostics,
        }
    }
}

pub fn cagr(values: &[f64]) -> f64 {
    let n = values.len();
    if n <= 1 {
        return 0.0;
    }
    let growth = values[n - 1] / values[0];
    let result = growth.powf(TRADING_DAYS_PER_YEAR / n as f64) - 1.0;
    if result.is_finite() { result } else { 0.0 }
}

/// Annualized Sharpe ratio with a zero risk-free rate.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let (Some(m), Some(std)) = (mean(returns), sample_std(returns)) else {
        return 0.0;
    };
    if std == 0.0 {
        return 0.0;
    }
    (m * TRADING_DAYS_PER_YEAR) / (std * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Like [`sharpe_ratio`] but the denominator only uses negative returns.
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let (Some(m), Some(std)) = (mean(returns), sample_std(&downside)) else {
        return 0.0;
    };
    if std == 0.0 {
        return 0.0;
    }
    (m * TRADING_DAYS_PER_YEAR) / (std * TRADING_DAYS_PER_YEAR.sqrt())
}

pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &v in values {
        if v > peak {
            peak = v;
        }
        let dd = v / peak - 1.0;
        if dd < worst {
            worst = dd;
        }
    }
    worst
}
