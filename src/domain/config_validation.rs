//! Configuration validation and typed config builders.
//!
//! Values are read as strings and parsed strictly: a present but malformed
//! value is an error, an absent one takes the documented default.

use chrono::NaiveTime;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::DualMomError;
use crate::domain::execution::{CostModel, CostSchedule};
use crate::domain::indicator::trend::InsufficientDataPolicy;
use crate::domain::optimizer::{OptimizeOptions, ParamGrid, RiskLimits, SortMetric};
use crate::domain::strategy::{StrategyMetadata, StrategyParams};
use crate::domain::universe::{parse_tickers, Universe};
use crate::ports::config_port::ConfigPort;

/// Keys accepted in the `[strategy]` section.
pub const STRATEGY_KEYS: [&str; 17] = [
    "base_lookback",
    "base_vol_window",
    "market_vol_window",
    "max_vol_threshold",
    "market_vol_threshold",
    "risk_free_ticker",
    "use_rvi_adaptation",
    "bare_mode",
    "use_absolute_momentum",
    "rvi_high_exit_threshold",
    "rvi_low_threshold",
    "rvi_medium_threshold",
    "rvi_low_multiplier",
    "rvi_high_multiplier",
    "use_trend_filter",
    "trend_window",
    "trend_filter_on_insufficient_data",
];

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> DualMomError {
    DualMomError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Parse `[section] key`, `None` when absent or blank.
pub fn parse_value<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, DualMomError>
where
    T: FromStr,
    T::Err: Display,
{
    match config.get_string(section, key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(section, key, format!("cannot parse '{}': {e}", raw.trim()))),
        _ => Ok(None),
    }
}

pub fn parse_flag(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<bool>, DualMomError> {
    match config.get_string(section, key) {
        Some(raw) if !raw.trim().is_empty() => match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            other => Err(invalid(section, key, format!("expected a boolean, got '{other}'"))),
        },
        _ => Ok(None),
    }
}

/// Comma-separated list, empty when absent.
pub fn parse_list<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Vec<T>, DualMomError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = config.get_string(section, key) else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|e| invalid(section, key, format!("cannot parse '{s}': {e}")))
        })
        .collect()
}

fn required_string(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, DualMomError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(DualMomError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn optional_ticker(config: &dyn ConfigPort, key: &str) -> Option<String> {
    config
        .get_string("backtest", key)
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), DualMomError> {
    required_string(config, "backtest", "data_dir")?;
    build_universe(config)?;
    build_backtest_config(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), DualMomError> {
    validate_strategy_keys(config)?;
    let params = build_strategy_params(config)?;
    validate_strategy_params(&params)?;
    build_metadata(config)?;
    Ok(())
}

pub fn validate_optimize_config(config: &dyn ConfigPort) -> Result<(), DualMomError> {
    let grid = build_param_grid(config)?;
    if grid.base_lookback.contains(&0) {
        return Err(invalid("optimize", "base_lookback", "lookbacks must be at least 1"));
    }
    if grid.base_vol_window.iter().chain(&grid.market_vol_window).any(|w| *w < 2) {
        return Err(invalid("optimize", "base_vol_window", "windows must be at least 2"));
    }
    build_optimize_options(config)?;
    build_risk_limits(config)?;
    Ok(())
}

fn validate_strategy_keys(config: &dyn ConfigPort) -> Result<(), DualMomError> {
    match config
        .keys("strategy")
        .into_iter()
        .find(|k| !STRATEGY_KEYS.contains(&k.as_str()))
    {
        Some(key) => Err(invalid("strategy", &key, "unknown strategy parameter")),
        None => Ok(()),
    }
}

fn validate_strategy_params(p: &StrategyParams) -> Result<(), DualMomError> {
    if p.base_lookback < 1 {
        return Err(invalid("strategy", "base_lookback", "base_lookback must be at least 1"));
    }
    if p.base_vol_window < 2 {
        return Err(invalid("strategy", "base_vol_window", "base_vol_window must be at least 2"));
    }
    if matches!(p.market_vol_window, Some(w) if w < 2) {
        return Err(invalid(
            "strategy",
            "market_vol_window",
            "market_vol_window must be at least 2",
        ));
    }
    if p.max_vol_threshold <= 0.0 {
        return Err(invalid(
            "strategy",
            "max_vol_threshold",
            "max_vol_threshold must be positive",
        ));
    }
    if matches!(p.market_vol_threshold, Some(t) if t <= 0.0) {
        return Err(invalid(
            "strategy",
            "market_vol_threshold",
            "market_vol_threshold must be positive",
        ));
    }
    if p.rvi_low_threshold > p.rvi_medium_threshold {
        return Err(invalid(
            "strategy",
            "rvi_low_threshold",
            "rvi_low_threshold must not exceed rvi_medium_threshold",
        ));
    }
    if p.rvi_low_multiplier <= 0.0 || p.rvi_high_multiplier <= 0.0 {
        return Err(invalid(
            "strategy",
            "rvi_low_multiplier",
            "window multipliers must be positive",
        ));
    }
    if p.trend_window < 2 {
        return Err(invalid("strategy", "trend_window", "trend_window must be at least 2"));
    }
    Ok(())
}

pub fn build_strategy_params(config: &dyn ConfigPort) -> Result<StrategyParams, DualMomError> {
    let d = StrategyParams::default();
    let s = "strategy";
    let risk_free_ticker = config
        .get_string(s, "risk_free_ticker")
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .or_else(|| optional_ticker(config, "risk_free_ticker"))
        .unwrap_or(d.risk_free_ticker);

    Ok(StrategyParams {
        base_lookback: parse_value(config, s, "base_lookback")?.unwrap_or(d.base_lookback),
        base_vol_window: parse_value(config, s, "base_vol_window")?.unwrap_or(d.base_vol_window),
        market_vol_window: parse_value(config, s, "market_vol_window")?,
        max_vol_threshold: parse_value(config, s, "max_vol_threshold")?
            .unwrap_or(d.max_vol_threshold),
        market_vol_threshold: parse_value(config, s, "market_vol_threshold")?,
        risk_free_ticker,
        use_rvi_adaptation: parse_flag(config, s, "use_rvi_adaptation")?
            .unwrap_or(d.use_rvi_adaptation),
        bare_mode: parse_flag(config, s, "bare_mode")?.unwrap_or(d.bare_mode),
        use_absolute_momentum: parse_flag(config, s, "use_absolute_momentum")?
            .unwrap_or(d.use_absolute_momentum),
        rvi_high_exit_threshold: parse_value(config, s, "rvi_high_exit_threshold")?
            .unwrap_or(d.rvi_high_exit_threshold),
        rvi_low_threshold: parse_value(config, s, "rvi_low_threshold")?
            .unwrap_or(d.rvi_low_threshold),
        rvi_medium_threshold: parse_value(config, s, "rvi_medium_threshold")?
            .unwrap_or(d.rvi_medium_threshold),
        rvi_low_multiplier: parse_value(config, s, "rvi_low_multiplier")?
            .unwrap_or(d.rvi_low_multiplier),
        rvi_high_multiplier: parse_value(config, s, "rvi_high_multiplier")?
            .unwrap_or(d.rvi_high_multiplier),
        use_trend_filter: parse_flag(config, s, "use_trend_filter")?.unwrap_or(d.use_trend_filter),
        trend_window: parse_value(config, s, "trend_window")?.unwrap_or(d.trend_window),
        trend_filter_on_insufficient_data: parse_value::<InsufficientDataPolicy>(
            config,
            s,
            "trend_filter_on_insufficient_data",
        )?
        .unwrap_or(d.trend_filter_on_insufficient_data),
    })
}

pub fn build_metadata(config: &dyn ConfigPort) -> Result<StrategyMetadata, DualMomError> {
    let text = |key: &str| {
        config
            .get_string("metadata", key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    Ok(StrategyMetadata {
        name: text("name"),
        version: text("version"),
        notes: text("notes"),
        trend_r_squared_threshold: parse_value(config, "metadata", "trend_r_squared_threshold")?,
    })
}

/// Universe from `[backtest] tickers`, with the risk-free ticker from
/// `[strategy]` or `[backtest]`.
pub fn build_universe(config: &dyn ConfigPort) -> Result<Universe, DualMomError> {
    let raw = required_string(config, "backtest", "tickers")?;
    let tickers = parse_tickers(&raw).map_err(|e| invalid("backtest", "tickers", e.to_string()))?;
    let risk_free = build_strategy_params(config)?.risk_free_ticker;
    Universe::new(tickers, &risk_free).map_err(|e| invalid("backtest", "risk_free_ticker", e.to_string()))
}

pub fn benchmark_ticker(config: &dyn ConfigPort) -> Option<String> {
    optional_ticker(config, "benchmark_ticker")
}

pub fn index_ticker(config: &dyn ConfigPort) -> Option<String> {
    optional_ticker(config, "index_ticker")
}

fn build_schedule(
    config: &dyn ConfigPort,
    default_key: &str,
    overrides_section: &str,
) -> Result<CostSchedule, DualMomError> {
    let default: f64 = parse_value(config, "backtest", default_key)?.unwrap_or(0.0);
    if default < 0.0 {
        return Err(invalid("backtest", default_key, format!("{default_key} must be non-negative")));
    }
    let mut per_ticker = BTreeMap::new();
    for key in config.keys(overrides_section) {
        let rate: f64 = parse_value(config, overrides_section, &key)?.unwrap_or(default);
        if rate < 0.0 {
            return Err(invalid(overrides_section, &key, "rate must be non-negative"));
        }
        per_ticker.insert(key.to_uppercase(), rate);
    }
    Ok(CostSchedule { default, per_ticker })
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, DualMomError> {
    let initial_capital: f64 = parse_value(config, "backtest", "initial_capital")?.unwrap_or(100_000.0);
    if initial_capital.is_nan() || initial_capital <= 0.0 {
        return Err(invalid("backtest", "initial_capital", "initial_capital must be positive"));
    }

    let time_filter = match config.get_string("backtest", "time_filter") {
        Some(raw) if !raw.trim().is_empty() => Some(
            NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S")
                .map_err(|_| invalid("backtest", "time_filter", "expected HH:MM:SS"))?,
        ),
        _ => None,
    };

    let costs = CostModel {
        commission: build_schedule(config, "commission_pct", "commission")?,
        slippage: build_schedule(config, "slippage_bps", "slippage")?,
        use_slippage: parse_flag(config, "backtest", "use_slippage")?.unwrap_or(false),
    };
    check_cost_total(&costs)?;

    Ok(BacktestConfig {
        initial_capital,
        costs,
        time_filter,
    })
}

/// A sell at a combined cost of 100% or more would leave no proceeds.
fn check_cost_total(costs: &CostModel) -> Result<(), DualMomError> {
    const REASON: &str = "combined commission and slippage must be below 100%";
    let too_high = |fraction: f64| fraction.is_nan() || fraction >= 1.0;

    if too_high(costs.default_cost_fraction()) {
        return Err(invalid("backtest", "commission_pct", REASON));
    }
    for ticker in costs.override_tickers() {
        if too_high(costs.cost_fraction(ticker)) {
            let section = if costs.commission.per_ticker.contains_key(ticker) {
                "commission"
            } else {
                "slippage"
            };
            return Err(invalid(section, ticker, REASON));
        }
    }
    Ok(())
}

/// Grid from `[optimize]`; absent keys leave the defaults.
pub fn build_param_grid(config: &dyn ConfigPort) -> Result<ParamGrid, DualMomError> {
    let d = ParamGrid::default();
    let o = "optimize";
    let or_default = |values: Vec<usize>, fallback: Vec<usize>| {
        if values.is_empty() { fallback } else { values }
    };
    let or_default_f = |values: Vec<f64>, fallback: Vec<f64>| {
        if values.is_empty() { fallback } else { values }
    };
    Ok(ParamGrid {
        base_lookback: or_default(parse_list(config, o, "base_lookback")?, d.base_lookback),
        base_vol_window: or_default(parse_list(config, o, "base_vol_window")?, d.base_vol_window),
        market_vol_window: or_default(parse_list(config, o, "market_vol_window")?, d.market_vol_window),
        max_vol_threshold: or_default_f(parse_list(config, o, "max_vol_threshold")?, d.max_vol_threshold),
        market_vol_threshold: or_default_f(
            parse_list(config, o, "market_vol_threshold")?,
            d.market_vol_threshold,
        ),
        rvi_high_exit_threshold: parse_list(config, o, "rvi_high_exit_threshold")?,
        rvi_low_multiplier: parse_list(config, o, "rvi_low_multiplier")?,
        rvi_high_multiplier: parse_list(config, o, "rvi_high_multiplier")?,
    })
}

pub fn build_optimize_options(config: &dyn ConfigPort) -> Result<OptimizeOptions, DualMomError> {
    let d = OptimizeOptions::default();
    Ok(OptimizeOptions {
        skip_invalid_windows: parse_flag(config, "optimize", "skip_invalid_windows")?
            .unwrap_or(d.skip_invalid_windows),
        sort_by: parse_value::<SortMetric>(config, "optimize", "sort_by")?.unwrap_or(d.sort_by),
        parallel: d.parallel,
    })
}

pub fn build_risk_limits(config: &dyn ConfigPort) -> Result<RiskLimits, DualMomError> {
    let d = RiskLimits::default();
    let limits = RiskLimits {
        max_drawdown: parse_value(config, "optimize", "max_drawdown_limit")?.unwrap_or(d.max_drawdown),
        min_sharpe: parse_value(config, "optimize", "min_sharpe")?.unwrap_or(d.min_sharpe),
        min_cagr: parse_value(config, "optimize", "min_cagr")?.unwrap_or(d.min_cagr),
    };
    if limits.max_drawdown < 0.0 {
        return Err(invalid(
            "optimize",
            "max_drawdown_limit",
            "max_drawdown_limit is a positive fraction",
        ));
    }
    Ok(limits)
}
