//! Portfolio state and value tracking.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use super::position::{Position, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioValuePoint {
    pub date: NaiveDate,
    pub total_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    /// Ticker the rotation currently points at.
    pub current_asset: String,
    pub positions: BTreeMap<String, Position>,
    pub trades: Vec<Trade>,
    pub value_curve: Vec<PortfolioValuePoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64, starting_asset: impl Into<String>) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            current_asset: starting_asset.into(),
            positions: BTreeMap::new(),
            trades: Vec::new(),
            value_curve: Vec::new(),
        }
    }

    pub fn quantity(&self, ticker: &str) -> f64 {
        self.positions.get(ticker).map_or(0.0, |p| p.quantity)
    }

    /// Tickers with a non-zero holding.
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values().filter(|p| p.is_open())
    }

    pub fn set_quantity(&mut self, ticker: &str, quantity: f64) {
        if quantity > 0.0 {
            self.positions.insert(
                ticker.to_string(),
                Position {
                    ticker: ticker.to_string(),
                    quantity,
                },
            );
        } else {
            self.positions.remove(ticker);
        }
    }

    /// Market value of all holdings. Holdings without a price count as zero.
    pub fn position_value(&self, prices: &HashMap<&str, f64>) -> f64 {
        self.positions
            .values()
            .filter_map(|pos| {
                prices
                    .get(pos.ticker.as_str())
                    .map(|&price| pos.market_value(price))
            })
            .sum()
    }

    pub fn total_value(&self, prices: &HashMap<&str, f64>) -> f64 {
        self.cash + self.position_value(prices)
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn record_value(&mut self, date: NaiveDate, total_value: f64) {
        self.value_curve.push(PortfolioValuePoint { date, total_value });
    }

    pub fn final_value(&self) -> f64 {
        self.value_curve
            .last()
            .map_or(self.initial_capital, |p| p.total_value)
    }
}
