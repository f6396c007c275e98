//! Parameter grid search over the dual momentum strategy.
//!
//! Every combination of the grid runs a full simulation against the same
//! shared input. Combinations breaking the volatility window rule
//! (`base_vol_window < market_vol_window`) are skipped or run depending on
//! `skip_invalid_windows`; simulation errors are counted, not propagated.

use itertools::iproduct;
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;

use crate::domain::backtest::{run_backtest, BacktestConfig, BacktestInput};
use crate::domain::error::DualMomError;
use crate::domain::indicator::volatility::{mean, sample_std};
use crate::domain::metrics::Metrics;
use crate::domain::strategy::{DualMomentumStrategy, StrategyParams, MIN_WINDOW_GAP};

/// Number of per-combination errors echoed to the log.
const LOGGED_FAILURES: usize = 5;

/// Candidate values per tunable parameter. An empty list means "keep the
/// base parameter value".
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub base_lookback: Vec<usize>,
    pub base_vol_window: Vec<usize>,
    pub market_vol_window: Vec<usize>,
    pub max_vol_threshold: Vec<f64>,
    pub market_vol_threshold: Vec<f64>,
    pub rvi_high_exit_threshold: Vec<f64>,
    pub rvi_low_multiplier: Vec<f64>,
    pub rvi_high_multiplier: Vec<f64>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        ParamGrid {
            base_lookback: vec![20, 25, 30],
            base_vol_window: vec![8, 10, 12],
            market_vol_window: vec![21, 30, 40],
            max_vol_threshold: vec![0.30, 0.35, 0.40],
            market_vol_threshold: vec![0.30, 0.35, 0.40],
            rvi_high_exit_threshold: Vec::new(),
            rvi_low_multiplier: Vec::new(),
            rvi_high_multiplier: Vec::new(),
        }
    }
}

fn or_base<T: Copy>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

impl ParamGrid {
    /// Cartesian product of the grid, empty lists filled from `base`.
    pub fn combinations(&self, base: &StrategyParams) -> Vec<ParamSet> {
        let lookbacks = or_base(&self.base_lookback, base.base_lookback);
        let vol_windows = or_base(&self.base_vol_window, base.base_vol_window);
        let market_windows = or_base(&self.market_vol_window, base.effective_market_vol_window());
        let max_vols = or_base(&self.max_vol_threshold, base.max_vol_threshold);
        let market_vols = or_base(&self.market_vol_threshold, base.effective_market_vol_threshold());
        let exits = or_base(&self.rvi_high_exit_threshold, base.rvi_high_exit_threshold);
        let low_mults = or_base(&self.rvi_low_multiplier, base.rvi_low_multiplier);
        let high_mults = or_base(&self.rvi_high_multiplier, base.rvi_high_multiplier);

        iproduct!(
            &lookbacks,
            &vol_windows,
            &market_windows,
            &max_vols,
            &market_vols,
            &exits,
            &low_mults,
            &high_mults
        )
        .map(|(&lb, &vw, &mw, &mv, &mkv, &exit, &low, &high)| ParamSet {
            base_lookback: lb,
            base_vol_window: vw,
            market_vol_window: mw,
            max_vol_threshold: mv,
            market_vol_threshold: mkv,
            rvi_high_exit_threshold: exit,
            rvi_low_multiplier: low,
            rvi_high_multiplier: high,
        })
        .collect()
    }

    /// True when no pairing of the window lists can satisfy the window rule.
    pub fn all_windows_invalid(&self, base: &StrategyParams) -> bool {
        let min_asset = or_base(&self.base_vol_window, base.base_vol_window)
            .into_iter()
            .min();
        let max_market = or_base(&self.market_vol_window, base.effective_market_vol_window())
            .into_iter()
            .max();
        matches!((min_asset, max_market), (Some(a), Some(m)) if a >= m)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCheck {
    Valid,
    SmallGap,
    Invalid,
}

/// One point of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSet {
    pub base_lookback: usize,
    pub base_vol_window: usize,
    pub market_vol_window: usize,
    pub max_vol_threshold: f64,
    pub market_vol_threshold: f64,
    pub rvi_high_exit_threshold: f64,
    pub rvi_low_multiplier: f64,
    pub rvi_high_multiplier: f64,
}

impl ParamSet {
    pub fn apply(&self, base: &StrategyParams) -> StrategyParams {
        StrategyParams {
            base_lookback: self.base_lookback,
            base_vol_window: self.base_vol_window,
            market_vol_window: Some(self.market_vol_window),
            max_vol_threshold: self.max_vol_threshold,
            market_vol_threshold: Some(self.market_vol_threshold),
            rvi_high_exit_threshold: self.rvi_high_exit_threshold,
            rvi_low_multiplier: self.rvi_low_multiplier,
            rvi_high_multiplier: self.rvi_high_multiplier,
            ..base.clone()
        }
    }

    pub fn window_check(&self) -> WindowCheck {
        if self.base_vol_window >= self.market_vol_window {
            WindowCheck::Invalid
        } else if self.market_vol_window - self.base_vol_window < MIN_WINDOW_GAP {
            WindowCheck::SmallGap
        } else {
            WindowCheck::Valid
        }
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lookback={} vol={} market_vol={} max_vol={:.2} market_thr={:.2} exit={:.1} low_mult={:.2} high_mult={:.2}",
            self.base_lookback,
            self.base_vol_window,
            self.market_vol_window,
            self.max_vol_threshold,
            self.market_vol_threshold,
            self.rvi_high_exit_threshold,
            self.rvi_low_multiplier,
            self.rvi_high_multiplier
        )
    }
}

/// Tunable parameters, addressable by name for sensitivity analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunedParam {
    BaseLookback,
    BaseVolWindow,
    MarketVolWindow,
    MaxVolThreshold,
    MarketVolThreshold,
    RviHighExitThreshold,
    RviLowMultiplier,
    RviHighMultiplier,
}

impl TunedParam {
    pub const ALL: [TunedParam; 8] = [
        TunedParam::BaseLookback,
        TunedParam::BaseVolWindow,
        TunedParam::MarketVolWindow,
        TunedParam::MaxVolThreshold,
        TunedParam::MarketVolThreshold,
        TunedParam::RviHighExitThreshold,
        TunedParam::RviLowMultiplier,
        TunedParam::RviHighMultiplier,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TunedParam::BaseLookback => "base_lookback",
            TunedParam::BaseVolWindow => "base_vol_window",
            TunedParam::MarketVolWindow => "market_vol_window",
            TunedParam::MaxVolThreshold => "max_vol_threshold",
            TunedParam::MarketVolThreshold => "market_vol_threshold",
            TunedParam::RviHighExitThreshold => "rvi_high_exit_threshold",
            TunedParam::RviLowMultiplier => "rvi_low_multiplier",
            TunedParam::RviHighMultiplier => "rvi_high_multiplier",
        }
    }

    pub fn value(self, set: &ParamSet) -> f64 {
        match self {
            TunedParam::BaseLookback => set.base_lookback as f64,
            TunedParam::BaseVolWindow => set.base_vol_window as f64,
            TunedParam::MarketVolWindow => set.market_vol_window as f64,
            TunedParam::MaxVolThreshold => set.max_vol_threshold,
            TunedParam::MarketVolThreshold => set.market_vol_threshold,
            TunedParam::RviHighExitThreshold => set.rvi_high_exit_threshold,
            TunedParam::RviLowMultiplier => set.rvi_low_multiplier,
            TunedParam::RviHighMultiplier => set.rvi_high_multiplier,
        }
    }
}

impl FromStr for TunedParam {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TunedParam::ALL
            .into_iter()
            .find(|p| p.name() == s.trim())
            .ok_or_else(|| format!("unknown parameter '{s}'"))
    }
}

/// Metric used to rank results, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMetric {
    #[default]
    Sharpe,
    Cagr,
    Calmar,
    Sortino,
    FinalValue,
    MaxDrawdown,
}

impl SortMetric {
    fn key(self, m: &Metrics) -> f64 {
        match self {
            SortMetric::Sharpe => m.sharpe,
            SortMetric::Cagr => m.cagr,
            SortMetric::Calmar => m.calmar,
            SortMetric::Sortino => m.sortino,
            SortMetric::FinalValue => m.final_value,
            // drawdowns are negative, shallowest ranks first
            SortMetric::MaxDrawdown => m.max_drawdown,
        }
    }
}

impl FromStr for SortMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sharpe" => Ok(SortMetric::Sharpe),
            "cagr" => Ok(SortMetric::Cagr),
            "calmar" => Ok(SortMetric::Calmar),
            "sortino" => Ok(SortMetric::Sortino),
            "final_value" => Ok(SortMetric::FinalValue),
            "max_drawdown" => Ok(SortMetric::MaxDrawdown),
            other => Err(format!("unknown sort metric '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizeOptions {
    pub skip_invalid_windows: bool,
    pub sort_by: SortMetric,
    pub parallel: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        OptimizeOptions {
            skip_invalid_windows: true,
            sort_by: SortMetric::Sharpe,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationRow {
    pub params: ParamSet,
    pub metrics: Metrics,
}

#[derive(Debug, Clone)]
pub struct OptimizationReport {
    /// Successful runs, sorted by the requested metric.
    pub rows: Vec<OptimizationRow>,
    pub total_combinations: usize,
    pub invalid_combinations: usize,
    pub failed_combinations: usize,
}

/// Run every combination of `grid` against `input`.
pub fn optimize(
    input: &BacktestInput,
    base: &StrategyParams,
    grid: &ParamGrid,
    config: &BacktestConfig,
    options: &OptimizeOptions,
) -> Result<OptimizationReport, DualMomError> {
    let combinations = grid.combinations(base);
    let total = combinations.len();

    if !options.skip_invalid_windows && grid.all_windows_invalid(base) {
        return Err(DualMomError::ConfigInvalid {
            section: "optimize".to_string(),
            key: "base_vol_window".to_string(),
            reason: "every base_vol_window is >= every market_vol_window".to_string(),
        });
    }

    let mut invalid = 0;
    let mut runnable = Vec::with_capacity(total);
    for set in combinations {
        match set.window_check() {
            WindowCheck::Invalid if options.skip_invalid_windows => invalid += 1,
            WindowCheck::SmallGap => {
                tracing::warn!(
                    base_vol_window = set.base_vol_window,
                    market_vol_window = set.market_vol_window,
                    "window gap below {MIN_WINDOW_GAP} days"
                );
                runnable.push(set);
            }
            _ => runnable.push(set),
        }
    }

    tracing::info!(
        total,
        invalid,
        runnable = runnable.len(),
        parallel = options.parallel,
        "testing parameter combinations"
    );

    let run = |set: &ParamSet| run_combination(input, base, config, set);
    let outcomes: Vec<Result<OptimizationRow, DualMomError>> = if options.parallel {
        runnable.par_iter().map(run).collect()
    } else {
        runnable.iter().map(run).collect()
    };

    let mut rows = Vec::with_capacity(outcomes.len());
    let mut failed = 0;
    for (set, outcome) in runnable.iter().zip(outcomes) {
        match outcome {
            Ok(row) => rows.push(row),
            Err(e) => {
                failed += 1;
                if failed <= LOGGED_FAILURES {
                    tracing::warn!(params = %set, error = %e, "combination failed");
                }
            }
        }
    }

    if invalid > 0 {
        tracing::warn!(invalid, total, "combinations skipped by the window rule");
    }
    if failed > 0 {
        tracing::warn!(failed, total, "combinations failed");
    }

    if rows.is_empty() {
        let reason = if invalid == total {
            format!("all {total} combinations break base_vol_window < market_vol_window")
        } else {
            format!("{total} combinations attempted, {failed} failed")
        };
        return Err(DualMomError::NoValidCombinations { reason });
    }

    sort_results(&mut rows, options.sort_by);
    let sharpes: Vec<f64> = rows.iter().map(|r| r.metrics.sharpe).collect();
    tracing::info!(
        successful = rows.len(),
        best_sharpe = sharpes.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        worst_sharpe = sharpes.iter().copied().fold(f64::INFINITY, f64::min),
        median_sharpe = median(&sharpes).unwrap_or(0.0),
        "optimization finished"
    );

    Ok(OptimizationReport {
        rows,
        total_combinations: total,
        invalid_combinations: invalid,
        failed_combinations: failed,
    })
}

fn run_combination(
    input: &BacktestInput,
    base: &StrategyParams,
    config: &BacktestConfig,
    set: &ParamSet,
) -> Result<OptimizationRow, DualMomError> {
    let strategy = DualMomentumStrategy::from_params(set.apply(base));
    let result = run_backtest(input, &strategy, config)?;
    Ok(OptimizationRow {
        params: *set,
        metrics: Metrics::compute(&result),
    })
}

/// Stable sort, best first.
pub fn sort_results(rows: &mut [OptimizationRow], sort_by: SortMetric) {
    rows.sort_by(|a, b| {
        let (va, vb) = (sort_by.key(&a.metrics), sort_by.key(&b.metrics));
        vb.partial_cmp(&va).unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Risk limits for [`filter_optimal`]. `max_drawdown` is a positive fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLimits {
    pub max_drawdown: f64,
    pub min_sharpe: f64,
    pub min_cagr: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        RiskLimits {
            max_drawdown: 0.25,
            min_sharpe: 0.7,
            min_cagr: 0.10,
        }
    }
}

/// Rows within the risk limits, best Sharpe first.
pub fn filter_optimal(rows: &[OptimizationRow], limits: &RiskLimits) -> Vec<OptimizationRow> {
    let mut kept: Vec<OptimizationRow> = rows
        .iter()
        .filter(|r| {
            r.metrics.max_drawdown.abs() <= limits.max_drawdown
                && r.metrics.sharpe >= limits.min_sharpe
                && r.metrics.cagr >= limits.min_cagr
        })
        .cloned()
        .collect();
    sort_results(&mut kept, SortMetric::Sharpe);
    kept
}

/// Metric summary for all rows sharing one value of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityRow {
    pub value: f64,
    pub combinations: usize,
    pub sharpe_mean: f64,
    pub sharpe_median: f64,
    pub sharpe_max: f64,
    pub sharpe_min: f64,
    /// `None` with fewer than two combinations.
    pub sharpe_std: Option<f64>,
    pub cagr_mean: f64,
    pub cagr_max: f64,
    pub max_drawdown_mean: f64,
    pub max_drawdown_min: f64,
}

/// Group rows by the value of `param`, highest mean Sharpe first.
pub fn analyze_sensitivity(rows: &[OptimizationRow], param: TunedParam) -> Vec<SensitivityRow> {
    let mut values: Vec<f64> = rows.iter().map(|r| param.value(&r.params)).collect();
    values.sort_by(f64::total_cmp);
    values.dedup();

    let mut summary: Vec<SensitivityRow> = values
        .into_iter()
        .map(|value| {
            let group: Vec<&Metrics> = rows
                .iter()
                .filter(|r| param.value(&r.params) == value)
                .map(|r| &r.metrics)
                .collect();
            let sharpe: Vec<f64> = group.iter().map(|m| m.sharpe).collect();
            let cagr: Vec<f64> = group.iter().map(|m| m.cagr).collect();
            let dd: Vec<f64> = group.iter().map(|m| m.max_drawdown).collect();
            SensitivityRow {
                value,
                combinations: group.len(),
                sharpe_mean: mean(&sharpe).unwrap_or(0.0),
                sharpe_median: median(&sharpe).unwrap_or(0.0),
                sharpe_max: sharpe.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                sharpe_min: sharpe.iter().copied().fold(f64::INFINITY, f64::min),
                sharpe_std: sample_std(&sharpe),
                cagr_mean: mean(&cagr).unwrap_or(0.0),
                cagr_max: cagr.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                max_drawdown_mean: mean(&dd).unwrap_or(0.0),
                max_drawdown_min: dd.iter().copied().fold(f64::INFINITY, f64::min),
            }
        })
        .collect();

    summary.sort_by(|a, b| {
        b.sharpe_mean
            .partial_cmp(&a.sharpe_mean)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    summary
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}
