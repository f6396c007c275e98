//! Asset ranking logics.
//!
//! Every logic answers one question per day: given the history of each
//! ticker up to today, which ticker should be held? The risk-free ticker is
//! the fallback whenever no candidate qualifies.
//!
//! Tickers are visited in ascending name order and a later ticker replaces the
//! current best only on a strictly greater score, so ties go to the
//! alphabetically first ticker.

pub mod absolute;
pub mod adaptive;
pub mod bare;

pub use absolute::AbsoluteMomentum;
pub use adaptive::AdaptiveMomentum;
pub use bare::BareMomentum;

use crate::domain::ohlcv::OhlcvBar;
use std::collections::BTreeMap;

/// Per-ticker bars up to and including the evaluation date.
pub type History<'a> = BTreeMap<&'a str, &'a [OhlcvBar]>;

pub trait AssetSelector {
    fn select_best_asset(&self, history: &History<'_>) -> String;
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradingLogic {
    Bare(BareMomentum),
    Adaptive(AdaptiveMomentum),
    Absolute(AbsoluteMomentum),
}

impl TradingLogic {
    pub fn name(&self) -> &'static str {
        match self {
            TradingLogic::Bare(_) => "bare",
            TradingLogic::Adaptive(_) => "adaptive",
            TradingLogic::Absolute(_) => "absolute",
        }
    }

    pub fn risk_free_ticker(&self) -> &str {
        match self {
            TradingLogic::Bare(l) => &l.risk_free_ticker,
            TradingLogic::Adaptive(l) => &l.risk_free_ticker,
            TradingLogic::Absolute(l) => &l.risk_free_ticker,
        }
    }

    /// Wrap this logic in the absolute momentum check.
    pub fn with_absolute_momentum(self, lookback_period: usize) -> TradingLogic {
        let risk_free_ticker = self.risk_free_ticker().to_string();
        TradingLogic::Absolute(AbsoluteMomentum::new(self, lookback_period, risk_free_ticker))
    }
}

impl AssetSelector for TradingLogic {
    fn select_best_asset(&self, history: &History<'_>) -> String {
        match self {
            TradingLogic::Bare(l) => l.select_best_asset(history),
            TradingLogic::Adaptive(l) => l.select_best_asset(history),
            TradingLogic::Absolute(l) => l.select_best_asset(history),
        }
    }
}

/// (C[-1] - C[-n]) / C[-n]. `None` when fewer than `n` bars exist or `n` is 0.
pub fn momentum(bars: &[OhlcvBar], lookback: usize) -> Option<f64> {
    let (start, end) = lookback_closes(bars, lookback)?;
    Some((end - start) / start)
}

/// C[-1] / C[-n] - 1, same availability rules as [`momentum`].
pub fn trailing_return(bars: &[OhlcvBar], lookback: usize) -> Option<f64> {
    let (start, end) = lookback_closes(bars, lookback)?;
    Some(end / start - 1.0)
}

fn lookback_closes(bars: &[OhlcvBar], lookback: usize) -> Option<(f64, f64)> {
    if lookback == 0 || bars.len() < lookback {
        return None;
    }
    let start = bars[bars.len() - lookback].close;
    let end = bars[bars.len() - 1].close;
    Some((start, end))
}
