//! End-to-end simulation tests against in-memory series.

mod common;

use approx::assert_relative_eq;
use common::*;
use dualmom::adapters::file_config_adapter::FileConfigAdapter;
use dualmom::cli::{execute_backtest, prepare_run};
use dualmom::domain::backtest::{BacktestConfig, BacktestInput};
use dualmom::domain::error::DualMomError;
use dualmom::domain::execution::{CostModel, CostSchedule};
use dualmom::domain::indicator::volatility::pct_change;
use dualmom::domain::market_filter::FilterStage;
use dualmom::domain::metrics::{cagr, max_drawdown, sharpe_ratio, Metrics};
use dualmom::domain::optimizer::{optimize, OptimizeOptions, ParamGrid};
use dualmom::domain::position::TradeAction;
use dualmom::domain::strategy::StrategyParams;

/// AAA rises for 20 days then falls; BBB does the opposite.
fn rotating_input() -> BacktestInput {
    let mut aaa = drifting(20, 100.0, 0.01, 0.002);
    aaa.extend(drifting(20, aaa[19] * 0.99, -0.01, 0.002));
    let mut bbb = drifting(20, 100.0, -0.01, 0.002);
    bbb.extend(drifting(20, bbb[19] * 1.01, 0.01, 0.002));
    input_of(vec![
        series("AAA", &aaa),
        series("BBB", &bbb),
        series("LQDT", &drifting(40, 1.0, 0.0002, 0.0)),
    ])
}

fn costly_config() -> BacktestConfig {
    BacktestConfig {
        initial_capital: 100_000.0,
        costs: CostModel {
            commission: CostSchedule::flat(0.1),
            slippage: CostSchedule::flat(5.0),
            use_slippage: true,
        },
        time_filter: None,
    }
}

mod alignment {
    use super::*;

    #[test]
    fn dates_missing_from_any_asset_are_absent_from_value_curve() {
        let lqdt: Vec<_> = generate_bars("LQDT", &flat(12, 1.0))
            .into_iter()
            .filter(|b| b.date != day(3) && b.date != day(7))
            .collect();
        let input = BacktestInput::from_bars(
            vec![
                series("AAA", &drifting(12, 100.0, 0.01, 0.0)),
                ("LQDT".to_string(), lqdt),
            ],
            None,
            None,
            None,
        )
        .unwrap();

        let result = simulate(&input, bare_params(2), &BacktestConfig::default());

        let dates: Vec<_> = result.portfolio.value_curve.iter().map(|p| p.date).collect();
        assert_eq!(dates.len(), 10);
        assert!(!dates.contains(&day(3)));
        assert!(!dates.contains(&day(7)));
        assert_eq!(result.diagnostics.processed_dates, 10);
        assert_eq!(result.diagnostics.skipped_dates, 2);
    }

    #[test]
    fn no_common_date_yields_degenerate_metrics() {
        let lqdt: Vec<_> = (0..5).map(|i| make_bar("LQDT", day(10 + i), 1.0)).collect();
        let input = BacktestInput::from_bars(
            vec![series("AAA", &flat(5, 100.0)), ("LQDT".to_string(), lqdt)],
            None,
            None,
            None,
        )
        .unwrap();

        let result = simulate(&input, bare_params(2), &BacktestConfig::default());
        let metrics = Metrics::compute(&result);

        assert!(result.portfolio.value_curve.is_empty());
        assert_eq!(metrics.final_value, 100_000.0);
        assert_eq!(metrics.sharpe, 0.0);
        assert_eq!(metrics.cagr, 0.0);
        assert_eq!(metrics.diagnostics.skipped_dates, 10);
    }
}

mod portfolio_accounting {
    use super::*;

    #[test]
    fn every_trade_balances_cash_and_positions() {
        let result = simulate(&rotating_input(), bare_params(3), &costly_config());

        assert!(result.portfolio.trades.len() >= 3);
        for trade in &result.portfolio.trades {
            assert_relative_eq!(
                trade.total_value_after,
                trade.cash_balance_after + trade.position_value_after,
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn switching_fully_liquidates_before_buying() {
        let result = simulate(&rotating_input(), bare_params(3), &costly_config());
        let trades = &result.portfolio.trades;

        assert_eq!(trades[0].action, TradeAction::Buy);
        for (i, trade) in trades.iter().enumerate().skip(1) {
            if trade.action == TradeAction::Buy {
                let sell = &trades[i - 1];
                assert_eq!(sell.action, TradeAction::Sell);
                assert_eq!(sell.date, trade.date);
                assert_ne!(sell.ticker, trade.ticker);
                assert_relative_eq!(sell.position_value_after, 0.0, epsilon = 1e-9);
            }
        }
        assert!(result.portfolio.open_positions().count() <= 1);
    }

    #[test]
    fn costs_reduce_final_value() {
        let input = rotating_input();
        let free = simulate(&input, bare_params(3), &BacktestConfig::default());
        let costly = simulate(&input, bare_params(3), &costly_config());

        assert_eq!(free.portfolio.trades.len(), costly.portfolio.trades.len());
        assert!(costly.portfolio.final_value() < free.portfolio.final_value());
        let buy = &costly.portfolio.trades[0];
        assert_relative_eq!(
            buy.execution_price,
            buy.market_price * (1.0 + 0.001 + 0.0005),
            epsilon = 1e-9
        );
    }
}

mod selection_scenarios {
    use super::*;

    #[test]
    fn declining_assets_with_trend_filter_stay_in_risk_free() {
        let mut assets: Vec<_> = ["AAA", "BBB", "CCC", "DDD"]
            .iter()
            .enumerate()
            .map(|(k, t)| series(t, &drifting(30, 100.0 + k as f64 * 10.0, -0.01, 0.002)))
            .collect();
        assets.push(series("LQDT", &flat(30, 1.0)));
        let input = input_of(assets);
        let params = StrategyParams {
            base_lookback: 10,
            base_vol_window: 10,
            market_vol_window: Some(30),
            max_vol_threshold: 1.0,
            use_trend_filter: true,
            trend_window: 15,
            use_rvi_adaptation: false,
            ..StrategyParams::default()
        };

        let result = simulate(&input, params, &BacktestConfig::default());

        assert_eq!(result.days.len(), 30);
        assert!(result.days.iter().all(|d| d.selected == "LQDT"));
        assert!(result.portfolio.trades.is_empty());
    }

    #[test]
    fn adaptive_trend_filter_follows_lookback() {
        let input = input_of(vec![
            series("AAA", &drifting(30, 100.0, 0.01, 0.002)),
            series("LQDT", &flat(30, 1.0)),
        ]);
        let params = StrategyParams {
            base_lookback: 10,
            base_vol_window: 10,
            market_vol_window: Some(30),
            use_trend_filter: true,
            use_rvi_adaptation: true,
            ..StrategyParams::default()
        };
        assert_eq!(params.trend_window, 60);

        let result = simulate(&input, params, &BacktestConfig::default());

        // ten returns are needed for the volatility window
        assert!(result.days[..10].iter().all(|d| d.selected == "LQDT"));
        assert!(result.days[10..].iter().all(|d| d.selected == "AAA"));
    }

    #[test]
    fn equal_momentum_breaks_ties_by_ticker_name() {
        let mut path = flat(5, 100.0);
        path.extend(flat(5, 120.0));
        // listed out of order on purpose
        let input = input_of(vec![
            series("ZZZ", &path),
            series("AAA", &path),
            series("LQDT", &flat(10, 1.0)),
        ]);

        let result = simulate(&input, bare_params(10), &BacktestConfig::default());

        let last = result.days.last().unwrap();
        assert_eq!(last.selected, "AAA");
        assert_eq!(result.portfolio.trades.len(), 1);
        assert_eq!(result.portfolio.trades[0].ticker, "AAA");
    }

    #[test]
    fn short_history_selects_risk_free() {
        let input = input_of(vec![
            series("AAA", &drifting(15, 100.0, 0.01, 0.002)),
            series("LQDT", &flat(15, 1.0)),
        ]);
        let params = StrategyParams {
            base_lookback: 20,
            base_vol_window: 10,
            market_vol_window: Some(30),
            ..StrategyParams::default()
        };

        let result = simulate(&input, params, &BacktestConfig::default());

        assert_eq!(result.days.len(), 15);
        assert!(result.days.iter().all(|d| d.selected == "LQDT"));
    }

    #[test]
    fn index_above_exit_threshold_forces_risk_free() {
        let closes = drifting(20, 100.0, 0.01, 0.0);
        let index: Vec<f64> = (0..20).map(|i| if i == 12 { 40.0 } else { 20.0 }).collect();
        let input = BacktestInput::from_bars(
            vec![series("AAA", &closes), series("LQDT", &flat(20, 1.0))],
            None,
            Some(series("RVI", &index)),
            None,
        )
        .unwrap();

        let result = simulate(&input, bare_params(5), &BacktestConfig::default());

        let blocked = &result.days[12];
        assert_eq!(blocked.stage, FilterStage::Rvi);
        assert_eq!(blocked.selected, "LQDT");
        assert_eq!(blocked.held, "LQDT");
        assert_eq!(blocked.index_value, Some(40.0));
        assert_eq!(result.days[11].selected, "AAA");
        assert_eq!(result.days[13].selected, "AAA");
        assert_eq!(result.diagnostics.rvi_triggers, 1);
        assert_eq!(result.diagnostics.high_regime_days, 1);
    }
}

mod determinism {
    use super::*;

    #[test]
    fn identical_runs_are_bit_identical() {
        let input = rotating_input();
        let a = simulate(&input, bare_params(3), &costly_config());
        let b = simulate(&input, bare_params(3), &costly_config());

        assert_eq!(a.portfolio.trades, b.portfolio.trades);
        let (ma, mb) = (Metrics::compute(&a), Metrics::compute(&b));
        assert_eq!(ma, mb);
        assert_eq!(ma.sharpe.to_bits(), mb.sharpe.to_bits());
        assert_eq!(ma.final_value.to_bits(), mb.final_value.to_bits());
    }

    #[test]
    fn parallel_and_sequential_optimization_agree() {
        let input = rotating_input();
        let grid = ParamGrid {
            base_lookback: vec![3, 5],
            base_vol_window: vec![5],
            market_vol_window: vec![20],
            max_vol_threshold: vec![1.0],
            market_vol_threshold: vec![1.0],
            ..ParamGrid::default()
        };
        let base = bare_params(3);
        let parallel = optimize(
            &input,
            &base,
            &grid,
            &BacktestConfig::default(),
            &OptimizeOptions::default(),
        )
        .unwrap();
        let sequential = optimize(
            &input,
            &base,
            &grid,
            &BacktestConfig::default(),
            &OptimizeOptions {
                parallel: false,
                ..OptimizeOptions::default()
            },
        )
        .unwrap();

        assert_eq!(parallel.rows.len(), 2);
        assert_eq!(parallel.total_combinations, 2);
        assert_eq!(parallel.rows, sequential.rows);
    }
}

mod reference_metrics {
    use super::*;

    #[test]
    fn value_curve_matches_reference_computation() {
        let values = [100_000.0, 100_000.0, 101_000.0, 101_500.0, 102_500.0];
        let returns = pct_change(&values);

        assert_relative_eq!(cagr(&values), 2.4712254059887595, epsilon = 1e-9);
        assert_relative_eq!(sharpe_ratio(&returns), 20.708538883150194, epsilon = 1e-9);
        assert_eq!(max_drawdown(&values), 0.0);
    }
}

mod config_pipeline {
    use super::*;

    const CONFIG: &str = "\
[backtest]
tickers = aaa, bbb, lqdt
index_ticker = rvi
initial_capital = 50000

[strategy]
base_lookback = 3
bare_mode = true
base_vol_window = 5
market_vol_window = 20
";

    fn port() -> MockDataPort {
        let input = rotating_input();
        let mut port = MockDataPort::new().with_bars("RVI", generate_bars("RVI", &flat(40, 20.0)));
        for s in &input.assets {
            port = port.with_bars(&s.ticker, s.bars().to_vec());
        }
        port
    }

    #[test]
    fn prepare_and_execute_from_config() {
        let config = FileConfigAdapter::from_string(CONFIG).unwrap();
        let prepared = prepare_run(&port(), &config).unwrap();

        assert_eq!(prepared.universe.tickers, vec!["AAA", "BBB", "LQDT"]);
        assert!(prepared.input.volatility_index.is_some());
        assert!(prepared.input.benchmark.is_none());

        let (result, metrics) = execute_backtest(&prepared).unwrap();
        assert_eq!(metrics.initial_value, 50_000.0);
        assert_eq!(metrics.total_trades, result.portfolio.trades.len());
        assert_eq!(metrics.diagnostics.medium_regime_days, 40);
    }

    #[test]
    fn failing_series_aborts_the_run() {
        let config = FileConfigAdapter::from_string(CONFIG).unwrap();
        let port = port().with_error("BBB", "disk on fire");

        let err = prepare_run(&port, &config).err().unwrap();
        assert!(matches!(err, DualMomError::DataLoad { ref ticker, .. } if ticker == "BBB"));
    }

    #[test]
    fn empty_series_is_a_load_error() {
        let config = FileConfigAdapter::from_string(CONFIG).unwrap();
        let port = port().with_bars("LQDT", Vec::new());

        let err = prepare_run(&port, &config).err().unwrap();
        assert!(err.to_string().contains("no rows"));
    }
}
