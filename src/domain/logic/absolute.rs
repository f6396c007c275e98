//! Absolute momentum check layered on top of another logic.

use super::{trailing_return, AssetSelector, History, TradingLogic};

/// Holds the inner logic's pick only while it beats the risk-free ticker
/// over the same lookback.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsoluteMomentum {
    pub inner: Box<TradingLogic>,
    pub lookback_period: usize,
    pub risk_free_ticker: String,
}

impl AbsoluteMomentum {
    pub fn new(
        inner: TradingLogic,
        lookback_period: usize,
        risk_free_ticker: impl Into<String>,
    ) -> Self {
        Self {
            inner: Box::new(inner),
            lookback_period,
            risk_free_ticker: risk_free_ticker.into(),
        }
    }
}

impl AssetSelector for AbsoluteMomentum {
    fn select_best_asset(&self, history: &History<'_>) -> String {
        let candidate = self.inner.select_best_asset(history);
        if candidate == self.risk_free_ticker {
            return candidate;
        }

        let candidate_return = history
            .get(candidate.as_str())
            .and_then(|bars| trailing_return(bars, self.lookback_period));
        let risk_free_return = history
            .get(self.risk_free_ticker.as_str())
            .and_then(|bars| trailing_return(bars, self.lookback_period));

        match (candidate_return, risk_free_return) {
            (Some(asset), Some(rf)) if asset > rf => candidate,
            _ => self.risk_free_ticker.clone(),
        }
    }
}
