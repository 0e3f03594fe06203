//! Tick source abstraction
//!
//! The analytics core never talks to a storage engine directly. Anything that
//! can answer "ticks for this instrument within this window" plugs in here.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::{TapeError, TapeResult};
use crate::instrument::Instrument;
use crate::tick::Tick;

/// How far back a tick query reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickWindow {
    /// Every tick newer than `now - minutes`
    Minutes(u32),
    /// The newest `count` ticks
    Count(u32),
}

impl TickWindow {
    /// Elapsed-minutes lookback; must be positive
    pub fn minutes(minutes: i64) -> TapeResult<Self> {
        positive(minutes, "minutes").map(TickWindow::Minutes)
    }

    /// Maximum tick count; must be positive
    pub fn count(count: i64) -> TapeResult<Self> {
        positive(count, "limit").map(TickWindow::Count)
    }

    /// The raw window size
    pub fn size(&self) -> u32 {
        match self {
            TickWindow::Minutes(n) | TickWindow::Count(n) => *n,
        }
    }
}

fn positive(value: i64, name: &str) -> TapeResult<u32> {
    if value <= 0 {
        return Err(TapeError::invalid_window(format!("{} must be positive", name)));
    }
    u32::try_from(value)
        .map_err(|_| TapeError::invalid_window(format!("{} is too large: {}", name, value)))
}

/// Upstream provider of tick history
///
/// Implementations must be idempotent and free of side effects on read.
#[async_trait]
pub trait TickSource: Send + Sync {
    /// Ticks for `instrument` inside `window`, ascending by timestamp
    async fn fetch(&self, instrument: Instrument, window: TickWindow) -> TapeResult<Vec<Tick>>;

    /// Most recent price, if the instrument has traded at all
    async fn fetch_latest_price(&self, instrument: Instrument) -> TapeResult<Option<Decimal>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_must_be_positive() {
        assert_eq!(TickWindow::minutes(5), Ok(TickWindow::Minutes(5)));
        assert_eq!(TickWindow::count(3).map(|w| w.size()), Ok(3));
        assert!(matches!(TickWindow::minutes(0), Err(TapeError::InvalidWindow(_))));
        assert!(matches!(TickWindow::count(-2), Err(TapeError::InvalidWindow(_))));
    }

    #[test]
    fn test_window_overflow() {
        assert!(TickWindow::minutes(i64::from(u32::MAX) + 1).is_err());
    }
}
