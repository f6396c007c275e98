//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{
    holding_days, run_backtest, trend_summary, BacktestConfig, BacktestInput, BacktestResult,
};
use crate::domain::config_validation::{
    benchmark_ticker, build_backtest_config, build_metadata, build_optimize_options,
    build_param_grid, build_risk_limits, build_strategy_params, build_universe, index_ticker,
    validate_backtest_config, validate_optimize_config, validate_strategy_config,
};
use crate::domain::error::DualMomError;
use crate::domain::metrics::Metrics;
use crate::domain::optimizer::{
    analyze_sensitivity, filter_optimal, optimize, OptimizationReport, TunedParam,
};
use crate::domain::strategy::{window_warnings, DualMomentumStrategy, StrategyMetadata, StrategyParams};
use crate::domain::universe::{load_series, load_universe, Universe};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::{BacktestReport, ReportPort};

#[derive(Parser, Debug)]
#[command(name = "dualmom", about = "Regime-adaptive dual momentum rotation backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for CSV reports
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Grid search over the [optimize] section
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Rows to print
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Run combinations one by one
        #[arg(long)]
        sequential: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for ticker(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest_command(&config, output.as_deref())
            }
        }
        Command::Optimize {
            config,
            output,
            top,
            sequential,
        } => run_optimize(&config, output.as_deref(), top, sequential),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, ticker } => run_info(&config, ticker.as_deref()),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = DualMomError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: DualMomError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

/// Everything a simulation needs, resolved from config and data.
pub struct PreparedRun {
    pub universe: Universe,
    pub input: BacktestInput,
    pub params: StrategyParams,
    pub metadata: StrategyMetadata,
    pub backtest: BacktestConfig,
}

/// Build typed config and load all series through `data_port`.
pub fn prepare_run(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
) -> Result<PreparedRun, DualMomError> {
    validate_strategy_config(config)?;
    let universe = build_universe(config)?;
    let params = build_strategy_params(config)?;
    let metadata = build_metadata(config)?;
    let backtest = build_backtest_config(config)?;

    let assets = load_universe(data_port, &universe)?;
    let load_optional = |ticker: Option<String>| -> Result<_, DualMomError> {
        match ticker {
            Some(t) => {
                let bars = load_series(data_port, &t)?;
                Ok(Some((t, bars)))
            }
            None => Ok(None),
        }
    };
    let benchmark = load_optional(benchmark_ticker(config))?;
    let volatility_index = load_optional(index_ticker(config))?;

    let input = BacktestInput::from_bars(assets, benchmark, volatility_index, backtest.time_filter)?;
    Ok(PreparedRun {
        universe,
        input,
        params,
        metadata,
        backtest,
    })
}

/// Run one backtest and compute its metrics.
pub fn execute_backtest(run: &PreparedRun) -> Result<(BacktestResult, Metrics), DualMomError> {
    let (strategy, warnings) = DualMomentumStrategy::new(run.params.clone());
    for w in &warnings {
        eprintln!("warning: {w}");
    }
    let result = run_backtest(&run.input, &strategy, &run.backtest)?;
    let metrics = Metrics::compute(&result);
    Ok((result, metrics))
}

fn csv_data_port(config: &dyn ConfigPort) -> Result<CsvAdapter, DualMomError> {
    let dir = config
        .get_string("backtest", "data_dir")
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| DualMomError::ConfigMissing {
            section: "backtest".into(),
            key: "data_dir".into(),
        })?;
    Ok(CsvAdapter::new(PathBuf::from(dir)))
}

fn run_backtest_command(config_path: &Path, output_dir: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    let data_port = match csv_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let prepared = match prepare_run(&data_port, &adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    if let Some(name) = &prepared.metadata.name {
        eprintln!("Strategy: {name}");
    }
    eprintln!(
        "Running backtest: {} tickers, risk-free {}",
        prepared.universe.count(),
        prepared.universe.risk_free
    );

    let (result, metrics) = match execute_backtest(&prepared) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    print_summary(&result, &metrics);

    let trends = trend_summary(
        &prepared.input,
        prepared.params.trend_window,
        prepared.metadata.trend_r_squared(),
    );
    eprintln!("\n=== Trend (last {} bars) ===", prepared.params.trend_window);
    for (ticker, t) in &trends {
        eprintln!(
            "  {ticker}: {} (R² {:.2}, strength {:.4})",
            t.direction, t.r_squared, t.strength
        );
    }

    if let Some(dir) = output_dir {
        let report = BacktestReport {
            result: &result,
            metrics: &metrics,
            metadata: &prepared.metadata,
            trends: &trends,
        };
        if let Err(e) = CsvReportAdapter::new().write(&report, dir) {
            return fail(e);
        }
        eprintln!("\nReports written to: {}", dir.display());
    }
    ExitCode::SUCCESS
}

fn print_summary(result: &BacktestResult, metrics: &Metrics) {
    let d = &metrics.diagnostics;
    eprintln!("\n=== Results ===");
    eprintln!("Final Value:      {:.2}", metrics.final_value);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("CAGR:             {:.2}%", metrics.cagr * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino);
    eprintln!("Volatility:       {:.2}%", metrics.volatility * 100.0);
    eprintln!("Max Drawdown:     {:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Calmar Ratio:     {:.2}", metrics.calmar);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Time in Cash:     {:.1}%", metrics.time_in_cash_pct);
    match metrics.used_market_vol_window {
        Some(w) => eprintln!("Market Vol Window: {w}"),
        None => eprintln!("Market Vol Window: n/a"),
    }

    eprintln!("\n=== Diagnostics ===");
    eprintln!("Processed dates:  {}", d.processed_dates);
    eprintln!("Skipped dates:    {}", d.skipped_dates);
    eprintln!(
        "Regime days:      low {}, medium {}, high {}",
        d.low_regime_days, d.medium_regime_days, d.high_regime_days
    );
    eprintln!(
        "Filter triggers:  index {}, volatility {}",
        d.rvi_triggers, d.volatility_triggers
    );

    let holdings = holding_days(&result.days);
    if !holdings.is_empty() {
        eprintln!("\n=== Holding Days ===");
        for (ticker, days) in holdings {
            eprintln!("  {ticker}: {days}");
        }
    }
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    if let Err(e) = validate_strategy_config(&adapter) {
        return fail(e);
    }
    eprintln!("Config validated successfully");

    let (universe, params, backtest) = match (
        build_universe(&adapter),
        build_strategy_params(&adapter),
        build_backtest_config(&adapter),
    ) {
        (Ok(u), Ok(p), Ok(b)) => (u, p, b),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return fail(e),
    };

    eprintln!("\nUniverse:");
    eprintln!("  tickers:    {}", universe.tickers.join(", "));
    eprintln!("  risk-free:  {}", universe.risk_free);
    eprintln!(
        "  benchmark:  {}",
        benchmark_ticker(&adapter).unwrap_or_else(|| "none".into())
    );
    eprintln!(
        "  vol index:  {}",
        index_ticker(&adapter).unwrap_or_else(|| "none".into())
    );

    eprintln!("\nStrategy:");
    eprintln!(
        "  mode:       {}",
        DualMomentumStrategy::from_params(params.clone())
            .trading_logic(&params.base_windows())
            .name()
    );
    eprintln!("  lookback:   {}", params.base_lookback);
    eprintln!(
        "  vol windows: asset {}, market {}",
        params.base_vol_window,
        params.effective_market_vol_window()
    );
    eprintln!("  capital:    {:.2}", backtest.initial_capital);

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_optimize(config_path: &Path, output_dir: Option<&Path>, top: usize, sequential: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_backtest_config(&adapter).and_then(|_| validate_optimize_config(&adapter)) {
        return fail(e);
    }
    let data_port = match csv_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let prepared = match prepare_run(&data_port, &adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let settings = build_param_grid(&adapter).and_then(|grid| {
        let options = build_optimize_options(&adapter)?;
        let limits = build_risk_limits(&adapter)?;
        Ok((grid, options, limits))
    });
    let (grid, mut options, limits) = match settings {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    options.parallel = !sequential;

    let report = match optimize(
        &prepared.input,
        &prepared.params,
        &grid,
        &prepared.backtest,
        &options,
    ) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    print_optimization(&report, top);

    let optimal = filter_optimal(&report.rows, &limits);
    eprintln!(
        "\nWithin risk limits (|max_dd| <= {:.0}%, sharpe >= {:.2}, cagr >= {:.0}%): {} of {}",
        limits.max_drawdown * 100.0,
        limits.min_sharpe,
        limits.min_cagr * 100.0,
        optimal.len(),
        report.rows.len()
    );
    if let Some(best) = optimal.first() {
        eprintln!("  best: {}", best.params);
    }

    if let Some(dir) = output_dir {
        if let Err(e) = CsvReportAdapter::new().write_optimization(&report.rows, dir) {
            return fail(e);
        }
        eprintln!("\nOptimization table written to: {}", dir.display());
    }
    ExitCode::SUCCESS
}

fn print_optimization(report: &OptimizationReport, top: usize) {
    eprintln!(
        "\n=== Optimization: {} successful of {} ({} invalid, {} failed) ===",
        report.rows.len(),
        report.total_combinations,
        report.invalid_combinations,
        report.failed_combinations
    );
    for (rank, row) in report.rows.iter().take(top).enumerate() {
        let m = &row.metrics;
        eprintln!(
            "{:>3}. sharpe {:>6.2}  cagr {:>7.2}%  max_dd {:>6.1}%  trades {:>4}  {}",
            rank + 1,
            m.sharpe,
            m.cagr * 100.0,
            m.max_drawdown * 100.0,
            m.total_trades,
            row.params
        );
    }

    for param in TunedParam::ALL {
        let summary = analyze_sensitivity(&report.rows, param);
        if summary.len() < 2 {
            continue;
        }
        eprintln!("\nSensitivity: {}", param.name());
        for s in &summary {
            eprintln!(
                "  {:>8} -> sharpe mean {:.2} (min {:.2}, max {:.2}), cagr mean {:.2}%, n={}",
                s.value,
                s.sharpe_mean,
                s.sharpe_min,
                s.sharpe_max,
                s.cagr_mean * 100.0,
                s.combinations
            );
        }
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    if let Err(e) = validate_strategy_config(&adapter) {
        return fail(e);
    }
    if adapter.has_section("optimize") {
        if let Err(e) = validate_optimize_config(&adapter) {
            return fail(e);
        }
    }

    match build_strategy_params(&adapter) {
        Ok(params) => {
            for w in window_warnings(&params) {
                eprintln!("warning: {w}");
            }
        }
        Err(e) => return fail(e),
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path, ticker: Option<&str>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let data_port = match csv_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let tickers = match resolve_tickers(ticker, &adapter) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };

    for t in &tickers {
        match data_port.get_data_range(t) {
            Ok(Some((first, last, count))) => {
                println!("{t}: {count} bars, {first} to {last}");
            }
            Ok(None) => eprintln!("{t}: no data found"),
            Err(e) => eprintln!("error querying {t}: {e}"),
        }
    }
    ExitCode::SUCCESS
}

/// Tickers for `info`: the override, or the universe plus benchmark and index.
pub fn resolve_tickers(
    ticker_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, DualMomError> {
    if let Some(t) = ticker_override {
        return Ok(vec![t.trim().to_uppercase()]);
    }
    let mut tickers = build_universe(config)?.tickers;
    tickers.extend(benchmark_ticker(config));
    tickers.extend(index_ticker(config));
    Ok(tickers)
}
