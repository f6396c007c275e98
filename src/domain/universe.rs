//! Tradable universe: ticker list parsing and data loading.

use crate::domain::error::DualMomError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use std::collections::HashSet;

/// Tickers the rotation chooses from. The risk-free ticker is always a member.
#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub tickers: Vec<String>,
    pub risk_free: String,
}

impl Universe {
    pub fn new(tickers: Vec<String>, risk_free: &str) -> Result<Self, UniverseError> {
        let risk_free = risk_free.trim().to_uppercase();
        if !tickers.contains(&risk_free) {
            return Err(UniverseError::MissingRiskFree(risk_free));
        }
        Ok(Universe { tickers, risk_free })
    }

    pub fn count(&self) -> usize {
        self.tickers.len()
    }

    /// Tickers other than the risk-free one.
    pub fn risky(&self) -> impl Iterator<Item = &str> {
        self.tickers
            .iter()
            .map(String::as_str)
            .filter(|t| *t != self.risk_free)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),

    #[error("risk-free ticker {0} is not in the ticker list")]
    MissingRiskFree(String),
}

pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

/// Load every ticker of the universe. Any missing or empty series is fatal.
pub fn load_universe(
    data_port: &dyn DataPort,
    universe: &Universe,
) -> Result<Vec<(String, Vec<OhlcvBar>)>, DualMomError> {
    universe
        .tickers
        .iter()
        .map(|ticker| load_series(data_port, ticker).map(|bars| (ticker.clone(), bars)))
        .collect()
}

/// Load one series, rejecting empty ones.
pub fn load_series(data_port: &dyn DataPort, ticker: &str) -> Result<Vec<OhlcvBar>, DualMomError> {
    let bars = data_port.fetch_series(ticker)?;
    if bars.is_empty() {
        return Err(DualMomError::DataLoad {
            ticker: ticker.to_string(),
            reason: "no rows".to_string(),
        });
    }
    tracing::info!(ticker, bars = bars.len(), "loaded series");
    Ok(bars)
}
