//! Data access port trait.

use crate::domain::error::DualMomError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// All bars of `ticker`, ascending by date and time.
    fn fetch_series(&self, ticker: &str) -> Result<Vec<OhlcvBar>, DualMomError>;

    /// First date, last date and row count, `None` for an empty series.
    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, DualMomError> {
        let bars = self.fetch_series(ticker)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}
