#![allow(dead_code)]

use chrono::NaiveDate;
use dualmom::domain::backtest::{BacktestInput, BacktestResult, run_backtest, BacktestConfig};
use dualmom::domain::error::DualMomError;
pub use dualmom::domain::ohlcv::OhlcvBar;
use dualmom::domain::strategy::{DualMomentumStrategy, StrategyParams};
use dualmom::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(&self, ticker: &str) -> Result<Vec<OhlcvBar>, DualMomError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(DualMomError::DataLoad {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(ticker).cloned().unwrap_or_default())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Day `i` counted from 2024-01-01.
pub fn day(i: usize) -> NaiveDate {
    date(2024, 1, 1) + chrono::Duration::days(i as i64)
}

pub fn make_bar(ticker: &str, date: NaiveDate, close: f64) -> OhlcvBar {
    OhlcvBar {
        ticker: ticker.to_string(),
        date,
        time: None,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000.0,
    }
}

/// Consecutive daily bars starting on 2024-01-01.
pub fn generate_bars(ticker: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(ticker, day(i), c))
        .collect()
}

/// Geometric path with an alternating wiggle so volatility is non-zero.
pub fn drifting(n: usize, start: f64, daily: f64, wiggle: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(n);
    let mut price = start;
    for i in 0..n {
        out.push(price);
        let w = if i % 2 == 0 { wiggle } else { -wiggle };
        price *= 1.0 + daily + w;
    }
    out
}

pub fn flat(n: usize, price: f64) -> Vec<f64> {
    vec![price; n]
}

pub fn series(ticker: &str, closes: &[f64]) -> (String, Vec<OhlcvBar>) {
    (ticker.to_string(), generate_bars(ticker, closes))
}

pub fn input_of(assets: Vec<(String, Vec<OhlcvBar>)>) -> BacktestInput {
    BacktestInput::from_bars(assets, None, None, None).unwrap()
}

pub fn bare_params(lookback: usize) -> StrategyParams {
    StrategyParams {
        base_lookback: lookback,
        base_vol_window: 10,
        market_vol_window: Some(30),
        bare_mode: true,
        ..StrategyParams::default()
    }
}

pub fn simulate(input: &BacktestInput, params: StrategyParams, config: &BacktestConfig) -> BacktestResult {
    let (strategy, _) = DualMomentumStrategy::new(params);
    run_backtest(input, &strategy, config).unwrap()
}

pub const INI_TEMPLATE: &str = "\
[backtest]
data_dir = {data_dir}
tickers = AAA,BBB,LQDT
benchmark_ticker = IDX
index_ticker = RVI
initial_capital = 100000
commission_pct = 0.05

[strategy]
base_lookback = 10
base_vol_window = 10
market_vol_window = 30
max_vol_threshold = 1.0
market_vol_threshold = 1.0

[metadata]
name = Integration run
";

/// Write `{TICKER}.csv` files for the template universe into `dir`.
pub fn write_csv_universe(dir: &std::path::Path, n: usize) {
    let files: [(&str, Vec<f64>); 5] = [
        ("AAA", drifting(n, 100.0, 0.004, 0.003)),
        ("BBB", drifting(n, 50.0, -0.002, 0.003)),
        ("LQDT", drifting(n, 1.0, 0.0003, 0.0)),
        ("IDX", drifting(n, 3000.0, 0.001, 0.002)),
        ("RVI", flat(n, 20.0)),
    ];
    for (ticker, closes) in files {
        let mut content = String::from("TRADEDATE,OPEN,HIGH,LOW,CLOSE,VOLUME\n");
        for (i, c) in closes.iter().enumerate() {
            content.push_str(&format!("{},{c},{c},{c},{c},1000\n", day(i)));
        }
        std::fs::write(dir.join(format!("{ticker}.csv")), content).unwrap();
    }
}
