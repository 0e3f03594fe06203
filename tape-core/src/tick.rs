//! Tick and bar data structures

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single timestamped trade price observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// When the price was observed
    pub timestamp: DateTime<Utc>,
    /// Observed price
    pub price: Decimal,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self { timestamp, price }
    }
}

/// OHLC aggregation of the ticks within one calendar minute
///
/// A gap-filled bar has `tick_count == 0` and all four prices equal to the
/// previous bar's close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinuteBar {
    /// Start of the minute (seconds and below truncated)
    pub minute: DateTime<Utc>,
    /// First price in the minute
    pub open: Decimal,
    /// Highest price in the minute
    pub high: Decimal,
    /// Lowest price in the minute
    pub low: Decimal,
    /// Last price in the minute
    pub close: Decimal,
    /// Number of ticks that fell into the minute
    pub tick_count: u32,
}

impl MinuteBar {
    /// Build a flat bar for a minute with no trades
    pub fn flat(minute: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            minute,
            open: price,
            high: price,
            low: price,
            close: price,
            tick_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_flat_bar() {
        let minute = DateTime::from_timestamp(1_700_000_040, 0).unwrap();
        let bar = MinuteBar::flat(minute, dec!(101.25));

        assert_eq!(bar.tick_count, 0);
        assert_eq!(bar.open, dec!(101.25));
        assert_eq!(bar.high, bar.low);
        assert_eq!(bar.close, bar.open);
    }
}
