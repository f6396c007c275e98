//! Numeric helpers over closing-price slices.
//!
//! - [`volatility`]: simple returns, sample standard deviation, trailing
//!   annualized volatility
//! - [`trend`]: least-squares slope, the binary uptrend check used by the
//!   trading logic, and the R² trend report used for research output

pub mod trend;
pub mod volatility;

/// Annualization constant shared by volatility and performance metrics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
