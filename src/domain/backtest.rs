//! Day-by-day rotation simulator.
//!
//! For each date in the union of all asset dates:
//! 1. skip the date unless every asset has a bar on it
//! 2. slice history up to the date, read the latest index value
//! 3. run the signal pipeline
//! 4. on a change of asset, sell everything then buy the new asset with all cash
//! 5. revalue at raw closes and append to the value curve

use chrono::{NaiveDate, NaiveTime};
use std::collections::{BTreeMap, HashMap};

use crate::domain::error::{DualMomError, SeriesError};
use crate::domain::indicator::trend::{detect_trend, TrendReport};
use crate::domain::execution::{buy_all, sell_all, CostModel};
use crate::domain::logic::History;
use crate::domain::market_filter::FilterStage;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::portfolio::Portfolio;
use crate::domain::regime::RegimeLevel;
use crate::domain::series::{build_unified_timeline, closes, filter_by_time, TimeSeries};
use crate::domain::strategy::DualMomentumStrategy;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub costs: CostModel,
    /// Keep only rows stamped with this time of day.
    pub time_filter: Option<NaiveTime>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100_000.0,
            costs: CostModel::free(),
            time_filter: None,
        }
    }
}

/// Immutable market data for one or many simulation runs.
#[derive(Debug, Clone)]
pub struct BacktestInput {
    /// Tradable tickers, the risk-free ticker included.
    pub assets: Vec<TimeSeries>,
    pub benchmark: Option<TimeSeries>,
    /// Volatility index; its close is the reading.
    pub volatility_index: Option<TimeSeries>,
}

impl BacktestInput {
    /// Build series from raw bars, applying the optional time-of-day filter
    /// to every one of them first.
    pub fn from_bars(
        assets: Vec<(String, Vec<OhlcvBar>)>,
        benchmark: Option<(String, Vec<OhlcvBar>)>,
        volatility_index: Option<(String, Vec<OhlcvBar>)>,
        time_filter: Option<NaiveTime>,
    ) -> Result<Self, SeriesError> {
        let build = |(ticker, bars): (String, Vec<OhlcvBar>)| {
            let bars = match time_filter {
                Some(t) => filter_by_time(bars, t),
                None => bars,
            };
            TimeSeries::new(ticker, bars)
        };
        Ok(BacktestInput {
            assets: assets.into_iter().map(&build).collect::<Result<_, _>>()?,
            benchmark: benchmark.map(&build).transpose()?,
            volatility_index: volatility_index.map(&build).transpose()?,
        })
    }

    pub fn asset(&self, ticker: &str) -> Option<&TimeSeries> {
        self.assets.iter().find(|s| s.ticker == ticker)
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.assets.iter().map(|s| s.ticker.as_str()).collect()
    }
}

/// What happened on one processed date.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub selected: String,
    pub held: String,
    pub regime: RegimeLevel,
    pub stage: FilterStage,
    pub index_value: Option<f64>,
    pub market_vol: Option<f64>,
    pub used_market_vol_window: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunDiagnostics {
    pub processed_dates: usize,
    pub skipped_dates: usize,
    pub low_regime_days: usize,
    pub medium_regime_days: usize,
    pub high_regime_days: usize,
    pub rvi_triggers: usize,
    pub volatility_triggers: usize,
    pub risk_free_days: usize,
    /// Last window the market volatility check actually used.
    pub used_market_vol_window: Option<usize>,
}

impl RunDiagnostics {
    fn record_regime(&mut self, level: RegimeLevel) {
        match level {
            RegimeLevel::Low => self.low_regime_days += 1,
            RegimeLevel::Medium => self.medium_regime_days += 1,
            RegimeLevel::High => self.high_regime_days += 1,
        }
    }

    fn record_stage(&mut self, stage: FilterStage) {
        match stage {
            FilterStage::Rvi => self.rvi_triggers += 1,
            FilterStage::Volatility => self.volatility_triggers += 1,
            FilterStage::None => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
    pub days: Vec<DayRecord>,
    pub diagnostics: RunDiagnostics,
    pub risk_free_ticker: String,
}

pub fn run_backtest(
    input: &BacktestInput,
    strategy: &DualMomentumStrategy,
    config: &BacktestConfig,
) -> Result<BacktestResult, DualMomError> {
    let risk_free = strategy.risk_free_ticker();
    if input.asset(risk_free).is_none() {
        return Err(DualMomError::UnknownTicker {
            ticker: risk_free.to_string(),
        });
    }

    let timeline = build_unified_timeline(&input.assets);
    tracing::info!(
        assets = input.assets.len(),
        dates = timeline.len(),
        benchmark = input.benchmark.is_some(),
        volatility_index = input.volatility_index.is_some(),
        "starting simulation"
    );

    let mut portfolio = Portfolio::new(config.initial_capital, risk_free);
    let mut days = Vec::with_capacity(timeline.len());
    let mut diagnostics = RunDiagnostics::default();

    for &date in &timeline {
        if let Some(missing) = input.assets.iter().find(|s| !s.has_date(date)) {
            tracing::debug!(%date, ticker = %missing.ticker, "date skipped, missing bar");
            diagnostics.skipped_dates += 1;
            continue;
        }

        let history: History<'_> = input
            .assets
            .iter()
            .map(|s| (s.ticker.as_str(), s.history_until(date)))
            .collect();
        let benchmark = input.benchmark.as_ref().map(|b| b.history_until(date));
        let index_value = input
            .volatility_index
            .as_ref()
            .and_then(|s| s.latest_until(date))
            .map(|bar| bar.close);

        let signal = strategy.generate_signal(&history, benchmark, index_value);
        tracing::debug!(
            %date,
            selected = %signal.selected,
            regime = %signal.regime.level,
            stage = %signal.filter.stage,
            "{}",
            signal.filter.rationale
        );

        let prices = closing_prices(input, date);

        if signal.selected != portfolio.current_asset {
            let previous = portfolio.current_asset.clone();
            sell_all(&mut portfolio, &previous, date, &prices, &config.costs);
            if portfolio.quantity(&previous) > 0.0 {
                tracing::warn!(
                    %date,
                    held = %previous,
                    wanted = %signal.selected,
                    "switch deferred, holding unchanged"
                );
            } else {
                buy_all(&mut portfolio, &signal.selected, date, &prices, &config.costs);
                tracing::debug!(%date, from = %previous, to = %signal.selected, "switched");
                portfolio.current_asset = signal.selected.clone();
            }
        }

        let total_value = portfolio.total_value(&prices);
        portfolio.record_value(date, total_value);

        diagnostics.processed_dates += 1;
        diagnostics.record_regime(signal.regime.level);
        diagnostics.record_stage(signal.filter.stage);
        if portfolio.current_asset == risk_free {
            diagnostics.risk_free_days += 1;
        }
        if signal.filter.used_window.is_some() {
            diagnostics.used_market_vol_window = signal.filter.used_window;
        }

        days.push(DayRecord {
            date,
            selected: signal.selected,
            held: portfolio.current_asset.clone(),
            regime: signal.regime.level,
            stage: signal.filter.stage,
            index_value: signal.filter.index_value,
            market_vol: signal.filter.realized_vol,
            used_market_vol_window: signal.filter.used_window,
        });
    }

    tracing::info!(
        processed = diagnostics.processed_dates,
        skipped = diagnostics.skipped_dates,
        trades = portfolio.trades.len(),
        final_value = portfolio.final_value(),
        "simulation finished"
    );

    Ok(BacktestResult {
        portfolio,
        days,
        diagnostics,
        risk_free_ticker: risk_free.to_string(),
    })
}

fn closing_prices(input: &BacktestInput, date: NaiveDate) -> HashMap<&str, f64> {
    input
        .assets
        .iter()
        .filter_map(|s| s.get_bar(date).map(|bar| (s.ticker.as_str(), bar.close)))
        .collect()
}

/// Number of processed days each ticker was held.
pub fn holding_days(days: &[DayRecord]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for day in days {
        *counts.entry(day.held.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Trend description of each asset over its last `window` closes.
pub fn trend_summary(
    input: &BacktestInput,
    window: usize,
    r_squared_threshold: f64,
) -> Vec<(String, TrendReport)> {
    input
        .assets
        .iter()
        .map(|s| {
            let report = detect_trend(&closes(s.bars()), window, r_squared_threshold);
            (s.ticker.clone(), report)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::trend::TrendDirection;
    use crate::domain::strategy::StrategyParams;

    fn make_bar(ticker: &str, date: NaiveDate, close: f64) -> OhlcvBar {
        OhlcvBar {
            ticker: ticker.into(),
            date,
            time: None,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i)
    }

    fn series(ticker: &str, closes: &[f64]) -> (String, Vec<OhlcvBar>) {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| make_bar(ticker, day(i as i64), c))
            .collect();
        (ticker.to_string(), bars)
    }

    fn bare_strategy(lookback: usize) -> DualMomentumStrategy {
        DualMomentumStrategy::new(StrategyParams {
            base_lookback: lookback,
            bare_mode: true,
            use_rvi_adaptation: false,
            market_vol_window: Some(30),
            ..StrategyParams::default()
        })
        .0
    }

    #[test]
    fn unknown_risk_free_ticker_is_fatal() {
        let input = BacktestInput::from_bars(vec![series("AAA", &[1.0, 2.0])], None, None, None)
            .unwrap();
        let err = run_backtest(&input, &bare_strategy(2), &BacktestConfig::default()).unwrap_err();
        assert!(matches!(err, DualMomError::UnknownTicker { .. }));
    }

    #[test]
    fn unpriced_holding_blocks_switch() {
        let input = BacktestInput::from_bars(
            vec![
                series("AAA", &[100.0, 110.0, 0.0, 130.0]),
                series("BBB", &[100.0, 101.0, 102.0, 103.0]),
                series("LQDT", &[1.0, 1.0, 1.0, 1.0]),
            ],
            None,
            None,
            None,
        )
        .unwrap();
        let result = run_backtest(&input, &bare_strategy(2), &BacktestConfig::default()).unwrap();

        assert_eq!(result.days[1].held, "AAA");
        assert_eq!(result.days[2].selected, "BBB");
        assert_eq!(result.days[2].held, "AAA");
        assert_eq!(result.portfolio.current_asset, "AAA");
        assert!(result.portfolio.quantity("AAA") > 0.0);
        assert_eq!(result.portfolio.trades.len(), 1);
    }

    #[test]
    fn switches_into_rising_asset() {
        let input = BacktestInput::from_bars(
            vec![
                series("AAA", &[100.0, 110.0, 121.0, 133.1]),
                series("LQDT", &[1.0, 1.0, 1.0, 1.0]),
            ],
            None,
            None,
            None,
        )
        .unwrap();
        let config = BacktestConfig {
            initial_capital: 1000.0,
            ..BacktestConfig::default()
        };
        let result = run_backtest(&input, &bare_strategy(2), &config).unwrap();

        // day 0 has no momentum, day 1 buys AAA at 110
        assert_eq!(result.portfolio.trades.len(), 1);
        assert_eq!(result.portfolio.trades[0].date, day(1));
        assert_eq!(result.portfolio.value_curve.len(), 4);
        let last = result.portfolio.value_curve.last().unwrap().total_value;
        assert!((last - 1000.0 * 133.1 / 110.0).abs() < 1e-6);
        assert_eq!(result.diagnostics.risk_free_days, 1);
    }

    #[test]
    fn time_filter_applies_before_alignment() {
        let mut bars = series("AAA", &[1.0, 2.0]).1;
        bars[1].time = NaiveTime::from_hms_opt(10, 0, 0);
        let input = BacktestInput::from_bars(
            vec![("AAA".into(), bars), series("LQDT", &[1.0, 1.0])],
            None,
            None,
            Some(NaiveTime::MIN),
        )
        .unwrap();

        assert_eq!(input.asset("AAA").unwrap().len(), 1);
        let result = run_backtest(&input, &bare_strategy(2), &BacktestConfig::default()).unwrap();
        assert_eq!(result.diagnostics.processed_dates, 1);
        assert_eq!(result.diagnostics.skipped_dates, 1);
    }

    #[test]
    fn holding_days_counts_each_ticker() {
        let input = BacktestInput::from_bars(
            vec![
                series("AAA", &[100.0, 110.0, 121.0]),
                series("LQDT", &[1.0, 1.0, 1.0]),
            ],
            None,
            None,
            None,
        )
        .unwrap();
        let result = run_backtest(&input, &bare_strategy(2), &BacktestConfig::default()).unwrap();
        let counts = holding_days(&result.days);
        assert_eq!(counts.get("LQDT"), Some(&1));
        assert_eq!(counts.get("AAA"), Some(&2));
    }

    #[test]
    fn trend_summary_per_asset() {
        let input = BacktestInput::from_bars(
            vec![
                series("AAA", &[100.0, 101.0, 102.0, 103.0, 104.0]),
                series("BBB", &[104.0, 103.0, 102.0, 101.0, 100.0]),
            ],
            None,
            None,
            None,
        )
        .unwrap();
        let trends = trend_summary(&input, 5, 0.2);
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].0, "AAA");
        assert_eq!(trends[0].1.direction, TrendDirection::Uptrend);
        assert_eq!(trends[1].1.direction, TrendDirection::Downtrend);
    }
}
