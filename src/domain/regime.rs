//! Volatility regime classification from the volatility index reading.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegimeLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RegimeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegimeLevel::Low => write!(f, "low"),
            RegimeLevel::Medium => write!(f, "medium"),
            RegimeLevel::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeSignal {
    pub index_value: Option<f64>,
    pub level: RegimeLevel,
}

/// Maps an index reading onto a level using two ascending bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeClassifier {
    pub low_threshold: f64,
    pub medium_threshold: f64,
}

impl RegimeClassifier {
    pub fn new(low_threshold: f64, medium_threshold: f64) -> Self {
        Self {
            low_threshold,
            medium_threshold,
        }
    }

    /// `< low` is Low, `< medium` is Medium, anything else High.
    /// A missing or NaN reading is Medium.
    pub fn level(&self, index_value: Option<f64>) -> RegimeLevel {
        match index_value {
            Some(v) if v.is_nan() => RegimeLevel::Medium,
            Some(v) if v < self.low_threshold => RegimeLevel::Low,
            Some(v) if v < self.medium_threshold => RegimeLevel::Medium,
            Some(_) => RegimeLevel::High,
            None => RegimeLevel::Medium,
        }
    }

    pub fn classify(&self, index_value: Option<f64>) -> RegimeSignal {
        RegimeSignal {
            index_value,
            level: self.level(index_value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> RegimeClassifier {
        RegimeClassifier::new(15.0, 25.0)
    }

    #[test]
    fn below_low_is_low() {
        assert_eq!(classifier().level(Some(10.0)), RegimeLevel::Low);
    }

    #[test]
    fn bounds_are_exclusive_upwards() {
        let c = classifier();
        assert_eq!(c.level(Some(15.0)), RegimeLevel::Medium);
        assert_eq!(c.level(Some(24.99)), RegimeLevel::Medium);
        assert_eq!(c.level(Some(25.0)), RegimeLevel::High);
        assert_eq!(c.level(Some(80.0)), RegimeLevel::High);
    }

    #[test]
    fn missing_reading_is_medium() {
        let c = classifier();
        assert_eq!(c.level(None), RegimeLevel::Medium);
        assert_eq!(c.level(Some(f64::NAN)), RegimeLevel::Medium);
    }

    #[test]
    fn classify_keeps_reading() {
        let signal = classifier().classify(Some(12.5));
        assert_eq!(signal.index_value, Some(12.5));
        assert_eq!(signal.level, RegimeLevel::Low);
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(RegimeLevel::High.to_string(), "high");
    }
}
