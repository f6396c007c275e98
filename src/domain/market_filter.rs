//! Two-stage market kill switch.
//!
//! Stage one compares the volatility index reading against
//! `high_exit_threshold`. Stage two compares realized benchmark volatility
//! against `market_vol_threshold`. The first stage that fires decides the
//! outcome; realized volatility is reported whenever it can be computed.

use crate::domain::indicator::volatility::{pct_change, trailing_volatility};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::series::closes;
use std::fmt;

/// Smallest window the volatility stage will evaluate.
pub const MIN_MARKET_VOL_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterStage {
    None,
    Rvi,
    Volatility,
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterStage::None => write!(f, "none"),
            FilterStage::Rvi => write!(f, "rvi"),
            FilterStage::Volatility => write!(f, "volatility"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketFilterResult {
    pub triggered: bool,
    pub stage: FilterStage,
    pub index_value: Option<f64>,
    pub realized_vol: Option<f64>,
    pub used_window: Option<usize>,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketFilter {
    pub high_exit_threshold: f64,
    pub market_vol_threshold: f64,
}

impl MarketFilter {
    pub fn new(high_exit_threshold: f64, market_vol_threshold: f64) -> Self {
        Self {
            high_exit_threshold,
            market_vol_threshold,
        }
    }

    /// Evaluate the filter for one day.
    ///
    /// `benchmark` holds benchmark bars up to and including the day;
    /// `market_window` is the already-adapted volatility window.
    pub fn evaluate(
        &self,
        index_value: Option<f64>,
        benchmark: Option<&[OhlcvBar]>,
        market_window: usize,
    ) -> MarketFilterResult {
        let index_value = index_value.filter(|v| !v.is_nan());
        let (realized_vol, used_window) = match benchmark {
            Some(bars) => realized_market_vol(bars, market_window),
            None => (None, None),
        };

        let mut result = MarketFilterResult {
            triggered: false,
            stage: FilterStage::None,
            index_value,
            realized_vol,
            used_window,
            rationale: String::new(),
        };

        if let Some(v) = index_value {
            if v >= self.high_exit_threshold {
                result.triggered = true;
                result.stage = FilterStage::Rvi;
                result.rationale = format!(
                    "index {v:.2} >= exit threshold {:.2}, trading blocked",
                    self.high_exit_threshold
                );
                return result;
            }
        }

        if let (Some(vol), Some(window)) = (realized_vol, used_window) {
            if vol >= self.market_vol_threshold {
                result.triggered = true;
                result.stage = FilterStage::Volatility;
                result.rationale = format!(
                    "market volatility {vol:.4} >= threshold {:.4} \
                     (requested window {market_window}, used {window}), trading blocked",
                    self.market_vol_threshold
                );
                return result;
            }
        }

        let index_info = match index_value {
            Some(v) => format!("index {v:.2} < {:.2}", self.high_exit_threshold),
            None => "index unavailable".to_string(),
        };
        let vol_info = match realized_vol {
            Some(vol) => format!("market volatility {vol:.4} < {:.4}", self.market_vol_threshold),
            None => "market volatility unavailable".to_string(),
        };
        result.rationale = format!("filter passed: {index_info}, {vol_info}");
        result
    }
}

/// Annualized volatility of benchmark returns over the requested window,
/// falling back to every available return (never fewer than
/// [`MIN_MARKET_VOL_WINDOW`]) when history is short.
pub fn realized_market_vol(bars: &[OhlcvBar], requested: usize) -> (Option<f64>, Option<usize>) {
    if bars.len() < 2 {
        return (None, None);
    }
    let returns = pct_change(&closes(bars));
    let available = returns.len();
    let effective = if available < requested {
        MIN_MARKET_VOL_WINDOW.max(available)
    } else {
        requested
    };
    if effective < MIN_MARKET_VOL_WINDOW {
        return (None, None);
    }
    match trailing_volatility(&returns, effective) {
        Some(vol) => (Some(vol), Some(effective)),
        None => (None, None),
    }
}
