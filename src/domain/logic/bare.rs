//! Pure relative momentum: highest simple return over the lookback wins.

use super::{momentum, AssetSelector, History};

#[derive(Debug, Clone, PartialEq)]
pub struct BareMomentum {
    pub lookback_period: usize,
    pub risk_free_ticker: String,
}

impl BareMomentum {
    pub fn new(lookback_period: usize, risk_free_ticker: impl Into<String>) -> Self {
        Self {
            lookback_period,
            risk_free_ticker: risk_free_ticker.into(),
        }
    }
}

impl AssetSelector for BareMomentum {
    fn select_best_asset(&self, history: &History<'_>) -> String {
        let mut best_score = f64::NEG_INFINITY;
        let mut best_ticker = self.risk_free_ticker.as_str();

        for (&ticker, bars) in history {
            if ticker == self.risk_free_ticker {
                continue;
            }
            let Some(score) = momentum(bars, self.lookback_period) else {
                continue;
            };
            if score > best_score {
                best_score = score;
                best_ticker = ticker;
            }
        }

        best_ticker.to_string()
    }
}
