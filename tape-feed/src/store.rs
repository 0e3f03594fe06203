//! In-memory tick store
//!
//! One ascending tick vector per registered instrument. Reads never mutate,
//! so `fetch` is idempotent for a fixed clock.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tape_core::{Instrument, TapeError, TapeResult, Tick, TickSource, TickWindow};
use tracing::debug;

/// Tick tape held in memory
#[derive(Debug, Default)]
pub struct MemoryTickStore {
    tapes: RwLock<HashMap<Instrument, Vec<Tick>>>,
}

impl MemoryTickStore {
    /// Create an empty store with no instruments registered
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given instruments registered
    pub fn with_instruments<I>(instruments: I) -> Self
    where
        I: IntoIterator<Item = Instrument>,
    {
        let store = Self::new();
        for instrument in instruments {
            store.register(instrument);
        }
        store
    }

    /// Register an instrument; returns false if it was already present
    pub fn register(&self, instrument: Instrument) -> bool {
        let mut tapes = self.tapes.write();
        if tapes.contains_key(&instrument) {
            return false;
        }
        tapes.insert(instrument, Vec::new());
        debug!("Registered instrument {}", instrument);
        true
    }

    /// Registered instruments, sorted
    pub fn instruments(&self) -> Vec<Instrument> {
        let mut instruments: Vec<_> = self.tapes.read().keys().copied().collect();
        instruments.sort();
        instruments
    }

    /// Append a tick, keeping the tape ascending by timestamp
    ///
    /// A tick older than the tape's tail is inserted after every tick with an
    /// equal or earlier timestamp.
    pub fn append(&self, instrument: Instrument, tick: Tick) -> TapeResult<()> {
        let mut tapes = self.tapes.write();
        let tape = tapes
            .get_mut(&instrument)
            .ok_or_else(|| not_registered(instrument))?;

        match tape.last() {
            Some(last) if last.timestamp > tick.timestamp => {
                let at = tape.partition_point(|t| t.timestamp <= tick.timestamp);
                tape.insert(at, tick);
            }
            _ => tape.push(tick),
        }
        Ok(())
    }

    /// Answer a window query against an explicit clock
    pub fn fetch_at(
        &self,
        instrument: Instrument,
        window: TickWindow,
        now: DateTime<Utc>,
    ) -> TapeResult<Vec<Tick>> {
        let tapes = self.tapes.read();
        let tape = tapes
            .get(&instrument)
            .ok_or_else(|| not_registered(instrument))?;

        let ticks = match window {
            TickWindow::Minutes(minutes) => {
                let cutoff = now - TimeDelta::minutes(i64::from(minutes));
                let from = tape.partition_point(|t| t.timestamp < cutoff);
                &tape[from..]
            }
            TickWindow::Count(count) => {
                let from = tape.len().saturating_sub(count as usize);
                &tape[from..]
            }
        };

        Ok(ticks.to_vec())
    }
}

fn not_registered(instrument: Instrument) -> TapeError {
    TapeError::not_found(format!("Instrument {} not found in store", instrument))
}

#[async_trait]
impl TickSource for MemoryTickStore {
    async fn fetch(&self, instrument: Instrument, window: TickWindow) -> TapeResult<Vec<Tick>> {
        self.fetch_at(instrument, window, Utc::now())
    }

    async fn fetch_latest_price(&self, instrument: Instrument) -> TapeResult<Option<Decimal>> {
        let tapes = self.tapes.read();
        let tape = tapes
            .get(&instrument)
            .ok_or_else(|| not_registered(instrument))?;
        Ok(tape.last().map(|t| t.price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn seeded() -> MemoryTickStore {
        let store = MemoryTickStore::with_instruments([Instrument::ES]);
        store.append(Instrument::ES, Tick::new(at(0), dec!(100))).unwrap();
        store.append(Instrument::ES, Tick::new(at(120), dec!(100.25))).unwrap();
        store.append(Instrument::ES, Tick::new(at(240), dec!(100.5))).unwrap();
        store
    }

    #[test]
    fn test_minutes_window() {
        let store = seeded();

        let ticks = store
            .fetch_at(Instrument::ES, TickWindow::Minutes(3), at(300))
            .unwrap();

        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].price, dec!(100.25));
        assert_eq!(ticks[1].price, dec!(100.5));
    }

    #[test]
    fn test_count_window() {
        let store = seeded();

        let ticks = store.fetch_at(Instrument::ES, TickWindow::Count(1), at(300)).unwrap();
        assert_eq!(ticks, vec![Tick::new(at(240), dec!(100.5))]);

        let all = store.fetch_at(Instrument::ES, TickWindow::Count(50), at(300)).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_unregistered_instrument() {
        let store = seeded();

        let result = store.fetch_at(Instrument::NQ, TickWindow::Count(1), at(0));
        assert!(matches!(result, Err(TapeError::NotFound(_))));
        assert!(store.append(Instrument::YM, Tick::new(at(0), dec!(1))).is_err());
    }

    #[test]
    fn test_late_tick_keeps_order() {
        let store = seeded();
        store.append(Instrument::ES, Tick::new(at(60), dec!(99.75))).unwrap();

        let ticks = store.fetch_at(Instrument::ES, TickWindow::Count(10), at(300)).unwrap();
        assert!(ticks.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(ticks[1].price, dec!(99.75));
    }

    #[test]
    fn test_register_is_idempotent() {
        let store = MemoryTickStore::new();
        assert!(store.register(Instrument::NQ));
        assert!(!store.register(Instrument::NQ));
        assert_eq!(store.instruments(), vec![Instrument::NQ]);
    }

    #[tokio::test]
    async fn test_latest_price() {
        let store = seeded();
        store.register(Instrument::NQ);

        assert_eq!(store.fetch_latest_price(Instrument::ES).await, Ok(Some(dec!(100.5))));
        assert_eq!(store.fetch_latest_price(Instrument::NQ).await, Ok(None));
    }
}
