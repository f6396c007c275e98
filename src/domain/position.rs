//! Positions and the trade log.

use chrono::NaiveDate;
use std::fmt;

/// Holding in one ticker. Quantities are fractional; the whole cash balance
/// is invested on every buy.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub ticker: String,
    pub quantity: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn is_open(&self) -> bool {
        self.quantity > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            TradeAction::Buy => 1.0,
            TradeAction::Sell => -1.0,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub date: NaiveDate,
    pub action: TradeAction,
    pub ticker: String,
    /// Price after commission and slippage.
    pub execution_price: f64,
    /// Raw close.
    pub market_price: f64,
    pub quantity: f64,
    pub quantity_signed: f64,
    pub cash_balance_after: f64,
    pub position_value_after: f64,
    pub total_value_after: f64,
}
