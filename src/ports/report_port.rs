//! Report generation port trait.

use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::DualMomError;
use crate::domain::indicator::trend::TrendReport;
use crate::domain::metrics::Metrics;
use crate::domain::optimizer::OptimizationRow;
use crate::domain::strategy::StrategyMetadata;

/// Everything a single-run report needs.
pub struct BacktestReport<'a> {
    pub result: &'a BacktestResult,
    pub metrics: &'a Metrics,
    pub metadata: &'a StrategyMetadata,
    pub trends: &'a [(String, TrendReport)],
}

/// Port for writing backtest and optimization reports.
pub trait ReportPort {
    fn write(&self, report: &BacktestReport<'_>, output_dir: &Path) -> Result<(), DualMomError>;

    fn write_optimization(
        &self,
        rows: &[OptimizationRow],
        output_dir: &Path,
    ) -> Result<(), DualMomError>;
}
