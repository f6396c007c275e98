//! Domain error types.

use chrono::NaiveDate;

/// Reasons a price series is rejected at construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("{ticker}: date {date} is not after previous date {previous}")]
    NotIncreasing {
        ticker: String,
        previous: NaiveDate,
        date: NaiveDate,
    },

    #[error("{ticker}: bar belongs to {found}")]
    MixedTickers { ticker: String, found: String },
}

/// Top-level error type for dualmom.
#[derive(Debug, thiserror::Error)]
pub enum DualMomError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("failed to load data for {ticker}: {reason}")]
    DataLoad { ticker: String, reason: String },

    #[error("{ticker}: missing required column {column}")]
    MissingColumn { ticker: String, column: String },

    #[error(transparent)]
    InvalidSeries(#[from] SeriesError),

    #[error("ticker {ticker} is not part of the configured universe")]
    UnknownTicker { ticker: String },

    #[error("no parameter combination produced a result: {reason}")]
    NoValidCombinations { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&DualMomError> for std::process::ExitCode {
    fn from(err: &DualMomError) -> Self {
        let code: u8 = match err {
            DualMomError::Io(_) | DualMomError::Report { .. } => 1,
            DualMomError::ConfigParse { .. }
            | DualMomError::ConfigMissing { .. }
            | DualMomError::ConfigInvalid { .. }
            | DualMomError::UnknownTicker { .. } => 2,
            DualMomError::DataLoad { .. }
            | DualMomError::MissingColumn { .. }
            | DualMomError::InvalidSeries(_) => 3,
            DualMomError::NoValidCombinations { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
