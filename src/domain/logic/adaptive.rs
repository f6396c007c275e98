//! Volatility-filtered momentum with an optional trend pre-filter.
//!
//! score = momentum(lookback) / VOL(vol_window_asset)
//!
//! Candidates are rejected when history is short, when the trend check
//! fails, or when volatility is undefined or above `max_vol_threshold`.

use super::{momentum, AssetSelector, History};
use crate::domain::indicator::trend::{is_uptrend, InsufficientDataPolicy};
use crate::domain::indicator::volatility::{pct_change, trailing_volatility};
use crate::domain::series::closes;

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveMomentum {
    pub lookback_period: usize,
    pub vol_window_asset: usize,
    pub max_vol_threshold: f64,
    pub use_trend_filter: bool,
    pub trend_window: usize,
    pub on_insufficient_trend_data: InsufficientDataPolicy,
    pub risk_free_ticker: String,
}

impl AdaptiveMomentum {
    fn min_required_length(&self) -> usize {
        let base = self.lookback_period.max(self.vol_window_asset);
        if self.use_trend_filter {
            base.max(self.trend_window)
        } else {
            base
        }
    }

    /// Risk-adjusted score, `None` when the candidate is rejected.
    pub fn score(&self, bars: &[crate::domain::ohlcv::OhlcvBar]) -> Option<f64> {
        if bars.len() < self.min_required_length() {
            return None;
        }
        let prices = closes(bars);
        if self.use_trend_filter
            && !is_uptrend(&prices, self.trend_window, self.on_insufficient_trend_data)
        {
            return None;
        }

        let mom = momentum(bars, self.lookback_period)?;
        let returns = pct_change(&prices);
        let vol = trailing_volatility(&returns, self.vol_window_asset)?;
        if vol > self.max_vol_threshold {
            return None;
        }
        Some(if vol > 0.0 { mom / vol } else { f64::NEG_INFINITY })
    }
}

impl AssetSelector for AdaptiveMomentum {
    fn select_best_asset(&self, history: &History<'_>) -> String {
        let mut best_score = f64::NEG_INFINITY;
        let mut best_ticker = self.risk_free_ticker.as_str();

        for (&ticker, bars) in history {
            if ticker == self.risk_free_ticker {
                continue;
            }
            let Some(score) = self.score(bars) else {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::logic::test_support::{bars, drifting};

    fn logic() -> AdaptiveMomentum {
        AdaptiveMomentum {
            lookback_period: 10,
            vol_window_asset: 10,
            max_vol_threshold: 0.5,
            use_trend_filter: false,
            trend_window: 15,
            on_insufficient_trend_data: InsufficientDataPolicy::Allow,
            risk_free_ticker: "LQDT".into(),
        }
    }

    #[test]
    fn prefers_better_risk_adjusted_return() {
        // same drift, B twice as noisy
        let a = bars("AAA", &drifting(30, 100.0, 0.002, 0.002));
        let b = bars("BBB", &drifting(30, 100.0, 0.002, 0.004));
        let history = History::from([("AAA", &a[..]), ("BBB", &b[..])]);

        assert_eq!(logic().select_best_asset(&history), "AAA");
    }

    #[test]
    fn rejects_volatility_above_threshold() {
        let wild = bars("AAA", &drifting(30, 100.0, 0.01, 0.05));
        let history = History::from([("AAA", &wild[..])]);
        let mut l = logic();
        l.max_vol_threshold = 0.3;

        assert!(l.score(&wild).is_none());
        assert_eq!(l.select_best_asset(&history), "LQDT");
    }

    #[test]
    fn zero_volatility_is_never_selected() {
        let flat = bars("AAA", &[100.0; 30]);
        let history = History::from([("AAA", &flat[..])]);

        assert_eq!(logic().score(&flat), Some(f64::NEG_INFINITY));
        assert_eq!(logic().select_best_asset(&history), "LQDT");
    }

    #[test]
    fn requires_longest_window_of_history() {
        let mut l = logic();
        l.vol_window_asset = 20;
        // 20 bars give 19 returns, not enough for a 20-return window
        let a = bars("AAA", &drifting(20, 100.0, 0.002, 0.002));
        assert!(l.score(&a).is_none());

        let a = bars("AAA", &drifting(21, 100.0, 0.002, 0.002));
        assert!(l.score(&a).is_some());
    }

    #[test]
    fn trend_filter_rejects_declining_assets() {
        let mut l = logic();
        l.use_trend_filter = true;
        let falling = bars("AAA", &drifting(30, 100.0, -0.01, 0.001));
        let history = History::from([("AAA", &falling[..])]);

        assert_eq!(l.select_best_asset(&history), "LQDT");
    }

    #[test]
    fn trend_window_extends_required_history() {
        let mut l = logic();
        l.use_trend_filter = true;
        l.trend_window = 25;
        let a = bars("AAA", &drifting(20, 100.0, 0.003, 0.001));
        assert!(l.score(&a).is_none());

        l.use_trend_filter = false;
        assert!(l.score(&a).is_some());
    }

    #[test]
    fn risk_free_is_skipped() {
        let rf = bars("LQDT", &drifting(30, 1.0, 0.01, 0.001));
        let history = History::from([("LQDT", &rf[..])]);
        assert_eq!(logic().select_best_asset(&history), "LQDT");
    }
}
