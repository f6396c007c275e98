//! Per-ticker price series and the unified simulation timeline.

use crate::domain::error::SeriesError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::{NaiveDate, NaiveTime};
use std::collections::{BTreeSet, HashMap};

/// Ordered bars for one ticker. Dates are strictly increasing.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub ticker: String,
    bars: Vec<OhlcvBar>,
    date_index: HashMap<NaiveDate, usize>,
}

impl TimeSeries {
    pub fn new(ticker: impl Into<String>, bars: Vec<OhlcvBar>) -> Result<Self, SeriesError> {
        let ticker = ticker.into();
        for bar in &bars {
            if bar.ticker != ticker {
                return Err(SeriesError::MixedTickers {
                    ticker,
                    found: bar.ticker.clone(),
                });
            }
        }
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(SeriesError::NotIncreasing {
                    ticker,
                    previous: pair[0].date,
                    date: pair[1].date,
                });
            }
        }
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Ok(Self {
            ticker,
            bars,
            date_index,
        })
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    pub fn has_date(&self, date: NaiveDate) -> bool {
        self.date_index.contains_key(&date)
    }

    /// All bars dated on or before `date`.
    pub fn history_until(&self, date: NaiveDate) -> &[OhlcvBar] {
        let end = self.bars.partition_point(|b| b.date <= date);
        &self.bars[..end]
    }

    /// Most recent bar dated on or before `date`.
    pub fn latest_until(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.history_until(date).last()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.bars.first(), self.bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        }
    }
}

/// Keep only rows stamped with `time`. Rows without a time count as midnight.
pub fn filter_by_time(bars: Vec<OhlcvBar>, time: NaiveTime) -> Vec<OhlcvBar> {
    bars.into_iter()
        .filter(|bar| bar.time_of_day() == time)
        .collect()
}

/// Sorted union of every date present in any of the series.
pub fn build_unified_timeline<'a, I>(series: I) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = &'a TimeSeries>,
{
    let unique_dates: BTreeSet<NaiveDate> = series
        .into_iter()
        .flat_map(|ts| ts.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}

/// Closing prices of a bar slice, in order.
pub fn closes(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}
