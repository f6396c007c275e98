//! OHLCV bar representation.

use chrono::{NaiveDate, NaiveTime};

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub ticker: String,
    pub date: NaiveDate,
    /// Time of day for intraday sources; `None` for plain daily rows.
    pub time: Option<NaiveTime>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// Time of day used by the time filter. Daily rows count as midnight.
    pub fn time_of_day(&self) -> NaiveTime {
        self.time.unwrap_or(NaiveTime::MIN)
    }

    /// close / prev_close - 1
    pub fn return_from(&self, prev_close: f64) -> f64 {
        self.close / prev_close - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> OhlcvBar {
        OhlcvBar {
            ticker: "SBER".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            time: None,
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn daily_bar_is_midnight() {
        let bar = sample_bar();
        assert_eq!(bar.time_of_day(), NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn intraday_bar_keeps_time() {
        let bar = OhlcvBar {
            time: NaiveTime::from_hms_opt(18, 45, 0),
            ..sample_bar()
        };
        assert_eq!(bar.time_of_day(), NaiveTime::from_hms_opt(18, 45, 0).unwrap());
    }

    #[test]
    fn return_from_previous_close() {
        let bar = sample_bar();
        // 105 / 100 - 1 = 0.05
        assert!((bar.return_from(100.0) - 0.05).abs() < 1e-12);
    }
}
