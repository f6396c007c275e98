//! Regime-dependent scaling of lookback and volatility windows.

use crate::domain::regime::RegimeLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptedWindows {
    pub lookback_period: usize,
    pub vol_window_asset: usize,
    pub vol_window_market: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowAdapter {
    pub enabled: bool,
    /// Applied in the low regime; lengthens windows.
    pub low_multiplier: f64,
    /// Applied in the high regime; shortens windows.
    pub high_multiplier: f64,
}

impl WindowAdapter {
    pub fn new(enabled: bool, low_multiplier: f64, high_multiplier: f64) -> Self {
        Self {
            enabled,
            low_multiplier,
            high_multiplier,
        }
    }

    pub fn multiplier(&self, level: RegimeLevel) -> f64 {
        if !self.enabled {
            return 1.0;
        }
        match level {
            RegimeLevel::Low => self.low_multiplier,
            RegimeLevel::Medium => 1.0,
            RegimeLevel::High => self.high_multiplier,
        }
    }

    pub fn adapt(&self, level: RegimeLevel, base: AdaptedWindows) -> AdaptedWindows {
        let m = self.multiplier(level);
        AdaptedWindows {
            lookback_period: scale(base.lookback_period, m),
            vol_window_asset: scale(base.vol_window_asset, m),
            vol_window_market: scale(base.vol_window_market, m),
        }
    }
}

/// Truncates toward zero.
fn scale(window: usize, multiplier: f64) -> usize {
    (window as f64 * multiplier) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AdaptedWindows {
        AdaptedWindows {
            lookback_period: 20,
            vol_window_asset: 15,
            vol_window_market: 25,
        }
    }

    #[test]
    fn medium_keeps_windows() {
        let adapter = WindowAdapter::new(true, 1.2, 0.7);
        assert_eq!(adapter.adapt(RegimeLevel::Medium, base()), base());
    }

    #[test]
    fn low_lengthens_with_truncation() {
        let adapter = WindowAdapter::new(true, 1.2, 0.7);
        let w = adapter.adapt(RegimeLevel::Low, base());
        // 24.0, 18.0, 30.0
        assert_eq!(w.lookback_period, 24);
        assert_eq!(w.vol_window_asset, 18);
        assert_eq!(w.vol_window_market, 30);
    }

    #[test]
    fn high_shortens_with_truncation() {
        let adapter = WindowAdapter::new(true, 1.2, 0.7);
        let w = adapter.adapt(RegimeLevel::High, base());
        // 14.0, 10.5 -> 10, 17.5 -> 17
        assert_eq!(w.lookback_period, 14);
        assert_eq!(w.vol_window_asset, 10);
        assert_eq!(w.vol_window_market, 17);
    }

    #[test]
    fn disabled_adapter_ignores_regime() {
        let adapter = WindowAdapter::new(false, 1.2, 0.7);
        assert_eq!(adapter.multiplier(RegimeLevel::High), 1.0);
        assert_eq!(adapter.adapt(RegimeLevel::Low, base()), base());
    }
}
