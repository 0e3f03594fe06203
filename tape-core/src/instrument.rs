//! Instrument definitions for the price tape

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TapeError;

/// Instruments the tape knows how to quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Instrument {
    /// E-mini S&P 500
    ES,
    /// E-mini Nasdaq-100
    NQ,
    /// E-mini Dow
    YM,
}

impl Instrument {
    /// Every known instrument, in declaration order
    pub const ALL: [Instrument; 3] = [Instrument::ES, Instrument::NQ, Instrument::YM];

    /// Get the ticker symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Instrument::ES => "ES",
            Instrument::NQ => "NQ",
            Instrument::YM => "YM",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl std::str::FromStr for Instrument {
    type Err = TapeError;

    /// Symbols are matched exactly; `es` is not `ES`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ES" => Ok(Instrument::ES),
            "NQ" => Ok(Instrument::NQ),
            "YM" => Ok(Instrument::YM),
            _ => Err(TapeError::unknown_instrument(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_symbols() {
        for instrument in Instrument::ALL {
            assert_eq!(instrument.symbol().parse::<Instrument>(), Ok(instrument));
        }
    }

    #[test]
    fn test_parse_unknown_symbol() {
        assert_eq!(
            "ZZ".parse::<Instrument>(),
            Err(TapeError::UnknownInstrument("ZZ".to_string()))
        );
        assert!("es".parse::<Instrument>().is_err());
    }
}
