//! Dual momentum signal pipeline.
//!
//! Each day: classify the regime from the index reading, adapt the windows,
//! run the market filter with the adapted market window and, unless it
//! fires, ask the trading logic for the best asset.

use crate::domain::indicator::trend::InsufficientDataPolicy;
use crate::domain::logic::{
    AdaptiveMomentum, AssetSelector, BareMomentum, History, TradingLogic,
};
use crate::domain::market_filter::{MarketFilter, MarketFilterResult};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::regime::{RegimeClassifier, RegimeSignal};
use crate::domain::window_adapter::{AdaptedWindows, WindowAdapter};
use std::fmt;

/// Gap between asset and market volatility windows below which a warning is
/// raised.
pub const MIN_WINDOW_GAP: usize = 5;

/// Execution parameters of the strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub base_lookback: usize,
    pub base_vol_window: usize,
    /// Defaults to `base_vol_window` when unset.
    pub market_vol_window: Option<usize>,
    pub max_vol_threshold: f64,
    /// Defaults to `max_vol_threshold` when unset.
    pub market_vol_threshold: Option<f64>,
    pub risk_free_ticker: String,
    pub use_rvi_adaptation: bool,
    pub bare_mode: bool,
    pub use_absolute_momentum: bool,
    pub rvi_high_exit_threshold: f64,
    pub rvi_low_threshold: f64,
    pub rvi_medium_threshold: f64,
    pub rvi_low_multiplier: f64,
    pub rvi_high_multiplier: f64,
    pub use_trend_filter: bool,
    pub trend_window: usize,
    pub trend_filter_on_insufficient_data: InsufficientDataPolicy,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            base_lookback: 20,
            base_vol_window: 20,
            market_vol_window: None,
            max_vol_threshold: 0.3,
            market_vol_threshold: None,
            risk_free_ticker: "LQDT".to_string(),
            use_rvi_adaptation: true,
            bare_mode: false,
            use_absolute_momentum: false,
            rvi_high_exit_threshold: 35.0,
            rvi_low_threshold: 15.0,
            rvi_medium_threshold: 25.0,
            rvi_low_multiplier: 1.2,
            rvi_high_multiplier: 0.7,
            use_trend_filter: false,
            trend_window: 60,
            trend_filter_on_insufficient_data: InsufficientDataPolicy::Allow,
        }
    }
}

impl StrategyParams {
    pub fn effective_market_vol_window(&self) -> usize {
        self.market_vol_window.unwrap_or(self.base_vol_window)
    }

    pub fn effective_market_vol_threshold(&self) -> f64 {
        self.market_vol_threshold.unwrap_or(self.max_vol_threshold)
    }

    pub fn base_windows(&self) -> AdaptedWindows {
        AdaptedWindows {
            lookback_period: self.base_lookback,
            vol_window_asset: self.base_vol_window,
            vol_window_market: self.effective_market_vol_window(),
        }
    }
}

/// R² below which a trend report reads sideways.
pub const DEFAULT_TREND_R_SQUARED: f64 = 0.2;

/// Reporting-only fields. Never read by the simulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyMetadata {
    pub name: Option<String>,
    pub version: Option<String>,
    pub notes: Option<String>,
    pub trend_r_squared_threshold: Option<f64>,
}

impl StrategyMetadata {
    pub fn trend_r_squared(&self) -> f64 {
        self.trend_r_squared_threshold.unwrap_or(DEFAULT_TREND_R_SQUARED)
    }
}

/// Non-fatal findings raised while building a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    MarketWindowDefaulted { window: usize },
    AssetWindowNotBelowMarket { asset: usize, market: usize },
    SmallWindowGap { asset: usize, market: usize },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::MarketWindowDefaulted { window } => write!(
                f,
                "market_vol_window not set, using base_vol_window ({window}) for the market filter"
            ),
            ConfigWarning::AssetWindowNotBelowMarket { asset, market } => write!(
                f,
                "base_vol_window ({asset}) should be smaller than market_vol_window ({market})"
            ),
            ConfigWarning::SmallWindowGap { asset, market } => write!(
                f,
                "market_vol_window ({market}) is only {} days longer than base_vol_window ({asset})",
                market - asset
            ),
        }
    }
}

/// Warnings implied by the volatility window pair.
pub fn window_warnings(params: &StrategyParams) -> Vec<ConfigWarning> {
    let asset = params.base_vol_window;
    let market = params.effective_market_vol_window();
    let mut warnings = Vec::new();
    if params.market_vol_window.is_none() {
        warnings.push(ConfigWarning::MarketWindowDefaulted { window: market });
    } else if asset >= market {
        warnings.push(ConfigWarning::AssetWindowNotBelowMarket { asset, market });
    } else if market - asset < MIN_WINDOW_GAP {
        warnings.push(ConfigWarning::SmallWindowGap { asset, market });
    }
    warnings
}

/// Everything decided for one simulated day.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub selected: String,
    pub regime: RegimeSignal,
    pub windows: AdaptedWindows,
    pub filter: MarketFilterResult,
}

#[derive(Debug, Clone)]
pub struct DualMomentumStrategy {
    params: StrategyParams,
    classifier: RegimeClassifier,
    adapter: WindowAdapter,
    filter: MarketFilter,
}

impl DualMomentumStrategy {
    /// Build the pipeline. Returned warnings are informational.
    pub fn new(params: StrategyParams) -> (Self, Vec<ConfigWarning>) {
        let warnings = window_warnings(&params);
        for w in &warnings {
            tracing::warn!("{w}");
        }
        (Self::from_params(params), warnings)
    }

    /// Same pipeline as [`DualMomentumStrategy::new`] without the window
    /// warnings, for parameters that were already screened.
    pub fn from_params(params: StrategyParams) -> Self {
        DualMomentumStrategy {
            classifier: RegimeClassifier::new(params.rvi_low_threshold, params.rvi_medium_threshold),
            adapter: WindowAdapter::new(
                params.use_rvi_adaptation,
                params.rvi_low_multiplier,
                params.rvi_high_multiplier,
            ),
            filter: MarketFilter::new(
                params.rvi_high_exit_threshold,
                params.effective_market_vol_threshold(),
            ),
            params,
        }
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn risk_free_ticker(&self) -> &str {
        &self.params.risk_free_ticker
    }

    /// Trading logic for one day's adapted windows.
    ///
    /// With regime adaptation on, the trend pre-filter runs over the adapted
    /// lookback instead of the fixed `trend_window`.
    pub fn trading_logic(&self, windows: &AdaptedWindows) -> TradingLogic {
        let p = &self.params;
        let trend_window = if p.use_rvi_adaptation {
            windows.lookback_period
        } else {
            p.trend_window
        };
        let logic = if p.bare_mode {
            TradingLogic::Bare(BareMomentum::new(windows.lookback_period, &p.risk_free_ticker))
        } else {
            TradingLogic::Adaptive(AdaptiveMomentum {
                lookback_period: windows.lookback_period,
                vol_window_asset: windows.vol_window_asset,
                max_vol_threshold: p.max_vol_threshold,
                use_trend_filter: p.use_trend_filter,
                trend_window,
                on_insufficient_trend_data: p.trend_filter_on_insufficient_data,
                risk_free_ticker: p.risk_free_ticker.clone(),
            })
        };
        if p.use_absolute_momentum {
            logic.with_absolute_momentum(windows.lookback_period)
        } else {
            logic
        }
    }

    pub fn generate_signal(
        &self,
        history: &History<'_>,
        benchmark: Option<&[OhlcvBar]>,
        index_value: Option<f64>,
    ) -> Signal {
        let regime = self.classifier.classify(index_value);
        let windows = self.adapter.adapt(regime.level, self.params.base_windows());
        let filter = self
            .filter
            .evaluate(index_value, benchmark, windows.vol_window_market);

        let selected = if filter.triggered {
            self.params.risk_free_ticker.clone()
        } else {
            self.trading_logic(&windows).select_best_asset(history)
        };

        Signal {
            selected,
            regime,
            windows,
            filter,
        }
    }
}
