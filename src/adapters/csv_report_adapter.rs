//! CSV report writer.
//!
//! A backtest writes `equity.csv`, `trades.csv`, `summary.csv` and
//! `trends.csv` into the output directory; an optimization writes
//! `optimization.csv`.

use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::domain::error::DualMomError;
use crate::domain::metrics::Metrics;
use crate::domain::optimizer::OptimizationRow;
use crate::ports::report_port::{BacktestReport, ReportPort};

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize)]
struct EquityRow<'a> {
    date: String,
    total_value: f64,
    selected: &'a str,
    held: &'a str,
    regime: String,
    filter_stage: String,
    index_value: Option<f64>,
    market_vol: Option<f64>,
    used_market_vol_window: Option<usize>,
}

#[derive(Serialize)]
struct TradeRow<'a> {
    date: String,
    action: String,
    ticker: &'a str,
    execution_price: f64,
    market_price: f64,
    quantity: f64,
    quantity_signed: f64,
    cash_balance_after: f64,
    position_value_after: f64,
    total_value_after: f64,
}

#[derive(Serialize)]
struct SummaryRow {
    metric: &'static str,
    value: String,
}

#[derive(Serialize)]
struct TrendRow<'a> {
    ticker: &'a str,
    direction: String,
    slope: f64,
    r_squared: f64,
    strength: f64,
}

#[derive(Serialize)]
struct OptimizationCsvRow {
    base_lookback: usize,
    base_vol_window: usize,
    market_vol_window: usize,
    max_vol_threshold: f64,
    market_vol_threshold: f64,
    rvi_high_exit_threshold: f64,
    rvi_low_multiplier: f64,
    rvi_high_multiplier: f64,
    used_market_vol_window: Option<usize>,
    total_trades: usize,
    time_in_cash_pct: f64,
    final_value: f64,
    total_return: f64,
    cagr: f64,
    sharpe: f64,
    sortino: f64,
    volatility: f64,
    max_drawdown: f64,
    calmar: f64,
}

fn report_err(e: impl std::fmt::Display) -> DualMomError {
    DualMomError::Report {
        reason: e.to_string(),
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), DualMomError> {
    let mut writer = csv::Writer::from_path(path).map_err(report_err)?;
    for row in rows {
        writer.serialize(row).map_err(report_err)?;
    }
    writer.flush()?;
    Ok(())
}

fn summary_rows(metrics: &Metrics, report: &BacktestReport<'_>) -> Vec<SummaryRow> {
    let d = &metrics.diagnostics;
    let opt = |v: Option<usize>| v.map(|w| w.to_string()).unwrap_or_default();
    let mut rows = vec![
        SummaryRow { metric: "initial_value", value: metrics.initial_value.to_string() },
        SummaryRow { metric: "final_value", value: metrics.final_value.to_string() },
        SummaryRow { metric: "total_return", value: metrics.total_return.to_string() },
        SummaryRow { metric: "cagr", value: metrics.cagr.to_string() },
        SummaryRow { metric: "sharpe", value: metrics.sharpe.to_string() },
        SummaryRow { metric: "sortino", value: metrics.sortino.to_string() },
        SummaryRow { metric: "volatility", value: metrics.volatility.to_string() },
        SummaryRow { metric: "max_drawdown", value: metrics.max_drawdown.to_string() },
        SummaryRow { metric: "calmar", value: metrics.calmar.to_string() },
        SummaryRow { metric: "total_trades", value: metrics.total_trades.to_string() },
        SummaryRow { metric: "time_in_cash_pct", value: metrics.time_in_cash_pct.to_string() },
        SummaryRow { metric: "used_market_vol_window", value: opt(metrics.used_market_vol_window) },
        SummaryRow { metric: "processed_dates", value: d.processed_dates.to_string() },
        SummaryRow { metric: "skipped_dates", value: d.skipped_dates.to_string() },
        SummaryRow { metric: "low_regime_days", value: d.low_regime_days.to_string() },
        SummaryRow { metric: "medium_regime_days", value: d.medium_regime_days.to_string() },
        SummaryRow { metric: "high_regime_days", value: d.high_regime_days.to_string() },
        SummaryRow { metric: "rvi_triggers", value: d.rvi_triggers.to_string() },
        SummaryRow { metric: "volatility_triggers", value: d.volatility_triggers.to_string() },
        SummaryRow { metric: "risk_free_ticker", value: report.result.risk_free_ticker.clone() },
    ];
    let meta = report.metadata;
    for (metric, value) in [
        ("strategy_name", &meta.name),
        ("strategy_version", &meta.version),
        ("strategy_notes", &meta.notes),
    ] {
        if let Some(v) = value {
            rows.push(SummaryRow { metric, value: v.clone() });
        }
    }
    rows
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &BacktestReport<'_>, output_dir: &Path) -> Result<(), DualMomError> {
        fs::create_dir_all(output_dir)?;
        let result = report.result;

        // value curve and day records are appended together, one per processed date
        let equity = result
            .portfolio
            .value_curve
            .iter()
            .zip(&result.days)
            .map(|(point, day)| EquityRow {
                date: point.date.to_string(),
                total_value: point.total_value,
                selected: &day.selected,
                held: &day.held,
                regime: day.regime.to_string(),
                filter_stage: day.stage.to_string(),
                index_value: day.index_value,
                market_vol: day.market_vol,
                used_market_vol_window: day.used_market_vol_window,
            });
        write_rows(&output_dir.join("equity.csv"), equity)?;

        let trades = result.portfolio.trades.iter().map(|t| TradeRow {
            date: t.date.to_string(),
            action: t.action.to_string(),
            ticker: &t.ticker,
            execution_price: t.execution_price,
            market_price: t.market_price,
            quantity: t.quantity,
            quantity_signed: t.quantity_signed,
            cash_balance_after: t.cash_balance_after,
            position_value_after: t.position_value_after,
            total_value_after: t.total_value_after,
        });
        write_rows(&output_dir.join("trades.csv"), trades)?;

        write_rows(&output_dir.join("summary.csv"), summary_rows(report.metrics, report))?;

        let trends = report.trends.iter().map(|(ticker, t)| TrendRow {
            ticker,
            direction: t.direction.to_string(),
            slope: t.slope,
            r_squared: t.r_squared,
            strength: t.strength,
        });
        write_rows(&output_dir.join("trends.csv"), trends)?;

        tracing::info!(dir = %output_dir.display(), "report written");
        Ok(())
    }

    fn write_optimization(
        &self,
        rows: &[OptimizationRow],
        output_dir: &Path,
    ) -> Result<(), DualMomError> {
        fs::create_dir_all(output_dir)?;
        let csv_rows = rows.iter().map(|r| {
            let (p, m) = (&r.params, &r.metrics);
            OptimizationCsvRow {
                base_lookback: p.base_lookback,
                base_vol_window: p.base_vol_window,
                market_vol_window: p.market_vol_window,
                max_vol_threshold: p.max_vol_threshold,
                market_vol_threshold: p.market_vol_threshold,
                rvi_high_exit_threshold: p.rvi_high_exit_threshold,
                rvi_low_multiplier: p.rvi_low_multiplier,
                rvi_high_multiplier: p.rvi_high_multiplier,
                used_market_vol_window: m.used_market_vol_window,
                total_trades: m.total_trades,
                time_in_cash_pct: m.time_in_cash_pct,
                final_value: m.final_value,
                total_return: m.total_return,
                cagr: m.cagr,
                sharpe: m.sharpe,
                sortino: m.sortino,
                volatility: m.volatility,
                max_drawdown: m.max_drawdown,
                calmar: m.calmar,
            }
        });
        write_rows(&output_dir.join("optimization.csv"), csv_rows)?;
        tracing::info!(dir = %output_dir.display(), rows = rows.len(), "optimization table written");
        Ok(())
    }
}
