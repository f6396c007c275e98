//! Transaction costs and order execution.
//!
//! Commission is a percent of the price, slippage is in basis points:
//! buy  = raw * (1 + commission / 100 + slippage / 10_000)
//! sell = raw * (1 - commission / 100 - slippage / 10_000)

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::portfolio::Portfolio;
use super::position::{Trade, TradeAction};

/// A scalar rate with optional per-ticker overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostSchedule {
    pub default: f64,
    pub per_ticker: BTreeMap<String, f64>,
}

impl CostSchedule {
    pub fn flat(rate: f64) -> Self {
        CostSchedule {
            default: rate,
            per_ticker: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, ticker: &str, rate: f64) -> Self {
        self.per_ticker.insert(ticker.to_string(), rate);
        self
    }

    pub fn rate_for(&self, ticker: &str) -> f64 {
        self.per_ticker.get(ticker).copied().unwrap_or(self.default)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostModel {
    /// Percent of price.
    pub commission: CostSchedule,
    /// Basis points of price.
    pub slippage: CostSchedule,
    pub use_slippage: bool,
}

impl CostModel {
    pub fn free() -> Self {
        CostModel::default()
    }

    fn combine(&self, commission_pct: f64, slippage_bps: f64) -> f64 {
        let slippage = if self.use_slippage {
            slippage_bps / 10_000.0
        } else {
            0.0
        };
        commission_pct / 100.0 + slippage
    }

    /// Price fraction paid on each side of a trade in `ticker`.
    pub fn cost_fraction(&self, ticker: &str) -> f64 {
        self.combine(self.commission.rate_for(ticker), self.slippage.rate_for(ticker))
    }

    /// Cost fraction for tickers without overrides.
    pub fn default_cost_fraction(&self) -> f64 {
        self.combine(self.commission.default, self.slippage.default)
    }

    /// Tickers with an override in either schedule.
    pub fn override_tickers(&self) -> BTreeSet<&str> {
        self.commission
            .per_ticker
            .keys()
            .chain(self.slippage.per_ticker.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn buy_price(&self, ticker: &str, raw_price: f64) -> f64 {
        raw_price * (1.0 + self.cost_fraction(ticker))
    }

    pub fn sell_price(&self, ticker: &str, raw_price: f64) -> f64 {
        raw_price * (1.0 - self.cost_fraction(ticker))
    }
}

fn usable_price(price: Option<f64>) -> Option<f64> {
    price.filter(|p| p.is_finite() && *p > 0.0)
}

/// Liquidate the whole holding in `ticker`. Returns `None` when nothing is
/// held or the day's price is unusable.
pub fn sell_all(
    portfolio: &mut Portfolio,
    ticker: &str,
    date: NaiveDate,
    prices: &HashMap<&str, f64>,
    costs: &CostModel,
) -> Option<Trade> {
    let quantity = portfolio.quantity(ticker);
    if quantity <= 0.0 {
        return None;
    }
    let Some(market_price) = usable_price(prices.get(ticker).copied()) else {
        tracing::warn!(%date, ticker, "no usable price, sell leg skipped");
        return None;
    };

    let execution_price = costs.sell_price(ticker, market_price);
    portfolio.cash += quantity * execution_price;
    portfolio.set_quantity(ticker, 0.0);

    let trade = fill(
        portfolio,
        date,
        TradeAction::Sell,
        ticker,
        execution_price,
        market_price,
        quantity,
        prices,
    );
    portfolio.record_trade(trade.clone());
    Some(trade)
}

/// Invest the whole cash balance in `ticker`. Returns `None` when there is no
/// cash, another holding is still open, or the day's price is unusable.
pub fn buy_all(
    portfolio: &mut Portfolio,
    ticker: &str,
    date: NaiveDate,
    prices: &HashMap<&str, f64>,
    costs: &CostModel,
) -> Option<Trade> {
    if portfolio.cash <= 0.0 {
        return None;
    }
    if let Some(open) = portfolio.open_positions().find(|p| p.ticker != ticker) {
        tracing::warn!(%date, ticker, held = %open.ticker, "previous holding still open, buy leg skipped");
        return None;
    }
    let Some(market_price) = usable_price(prices.get(ticker).copied()) else {
        tracing::warn!(%date, ticker, "no usable price, buy leg skipped");
        return None;
    };

    let execution_price = costs.buy_price(ticker, market_price);
    let quantity = portfolio.cash / execution_price;
    portfolio.cash -= quantity * execution_price;
    let held = portfolio.quantity(ticker);
    portfolio.set_quantity(ticker, held + quantity);

    let trade = fill(
        portfolio,
        date,
        TradeAction::Buy,
        ticker,
        execution_price,
        market_price,
        quantity,
        prices,
    );
    portfolio.record_trade(trade.clone());
    Some(trade)
}

#[allow(clippy::too_many_arguments)]
fn fill(
    portfolio: &Portfolio,
    date: NaiveDate,
    action: TradeAction,
    ticker: &str,
    execution_price: f64,
    market_price: f64,
    quantity: f64,
    prices: &HashMap<&str, f64>,
) -> Trade {
    let position_value_after = portfolio.position_value(prices);
    Trade {
        date,
        action,
        ticker: ticker.to_string(),
        execution_price,
        market_price,
        quantity,
        quantity_signed: quantity * action.sign(),
        cash_balance_after: portfolio.cash,
        position_value_after,
        total_value_after: portfolio.cash + position_value_after,
    }
}
