//! AR(1) price tape generator
//!
//! Background service that keeps every registered instrument ticking. Each
//! move is one tick size up or down; the chance of repeating the previous
//! direction is governed by a shared autoregressive coefficient that is
//! redrawn at random intervals, so the tape drifts between trending and
//! mean-reverting regimes.

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tape_core::{Instrument, Tick, TickSource};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::store::MemoryTickStore;

/// Configuration for the price generator
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Price used when an instrument has no history
    pub starting_price: Decimal,
    /// Price grid step
    pub tick_size: Decimal,
    /// Time between ticks of one instrument
    pub tick_interval: Duration,
    /// Lower bound of the autoregressive coefficient
    pub coefficient_min: f64,
    /// Upper bound of the autoregressive coefficient
    pub coefficient_max: f64,
    /// Shortest time a coefficient stays in force
    pub regime_min: Duration,
    /// Longest time a coefficient stays in force
    pub regime_max: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            starting_price: Decimal::from(100),
            tick_size: Decimal::new(25, 2),
            tick_interval: Duration::from_secs(10),
            coefficient_min: -0.8,
            coefficient_max: 0.8,
            regime_min: Duration::from_secs(100),
            regime_max: Duration::from_secs(10_000),
        }
    }
}

/// Generates ticks into a [`MemoryTickStore`]
pub struct PriceGenerator {
    store: Arc<MemoryTickStore>,
    config: FeedConfig,
    coefficient: Mutex<f64>,
}

impl PriceGenerator {
    /// Create a new PriceGenerator with a neutral coefficient
    pub fn new(store: Arc<MemoryTickStore>, config: FeedConfig) -> Self {
        Self {
            store,
            config,
            coefficient: Mutex::new(0.0),
        }
    }

    /// Current autoregressive coefficient
    pub fn coefficient(&self) -> f64 {
        *self.coefficient.lock()
    }

    /// Replace the coefficient, clamped to the configured bounds
    pub fn set_coefficient(&self, phi: f64) {
        let phi = phi.clamp(self.config.coefficient_min, self.config.coefficient_max);
        *self.coefficient.lock() = phi;
    }

    /// Draw the next move direction (+1 or -1)
    ///
    /// `P(up) = (1 + phi * previous) / 2`, clamped to [0, 1].
    pub fn next_direction<R: Rng>(phi: f64, previous: i8, rng: &mut R) -> i8 {
        let p_up = ((1.0 + phi * f64::from(previous)) * 0.5).clamp(0.0, 1.0);
        if rng.random::<f64>() < p_up {
            1
        } else {
            -1
        }
    }

    /// Snap `current` down to the tick grid and move it `direction` ticks
    pub fn next_price(current: Decimal, tick_size: Decimal, direction: i8) -> Decimal {
        let ticks = (current / tick_size).trunc();
        (ticks + Decimal::from(direction)) * tick_size
    }

    /// Spawn the regime task and one ticking task per registered instrument
    pub fn start(self: Arc<Self>, handle: &Handle) -> Vec<JoinHandle<()>> {
        let mut tasks = vec![handle.spawn(Arc::clone(&self).run_regime())];
        for instrument in self.store.instruments() {
            tasks.push(handle.spawn(Arc::clone(&self).run_instrument(instrument)));
        }
        info!("Price generation started for {:?}", self.store.instruments());
        tasks
    }

    /// Redraw the coefficient forever, sleeping a random time in between
    pub async fn run_regime(self: Arc<Self>) {
        let mut rng = StdRng::from_os_rng();
        let min = self.config.regime_min.as_secs_f64();
        let max = self.config.regime_max.as_secs_f64().max(min);

        loop {
            let phi = rng.random_range(self.config.coefficient_min..=self.config.coefficient_max);
            self.set_coefficient(phi);
            info!("Autoregressive coefficient changed to {:.3}", phi);

            sleep(Duration::from_secs_f64(rng.random_range(min..=max))).await;
        }
    }

    /// Emit one tick per interval for `instrument`, resuming from its latest price
    pub async fn run_instrument(self: Arc<Self>, instrument: Instrument) {
        let mut rng = StdRng::from_os_rng();

        let mut price = match self.store.fetch_latest_price(instrument).await {
            Ok(Some(price)) => price,
            Ok(None) => self.config.starting_price,
            Err(e) => {
                warn!("Not generating prices for {}: {}", instrument, e);
                return;
            }
        };
        let mut previous: i8 = if rng.random::<bool>() { 1 } else { -1 };

        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let direction = Self::next_direction(self.coefficient(), previous, &mut rng);
            price = Self::next_price(price, self.config.tick_size, direction);
            previous = direction;

            if let Err(e) = self.store.append(instrument, Tick::new(Utc::now(), price)) {
                warn!("Failed to append tick for {}: {}", instrument, e);
                continue;
            }
            debug!("{} ticked to {}", instrument, price);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tape_core::TickWindow;

    #[test]
    fn test_full_persistence_repeats_direction() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(PriceGenerator::next_direction(1.0, 1, &mut rng), 1);
            assert_eq!(PriceGenerator::next_direction(1.0, -1, &mut rng), -1);
            assert_eq!(PriceGenerator::next_direction(-1.0, 1, &mut rng), -1);
        }
    }

    #[test]
    fn test_next_price_snaps_to_grid() {
        assert_eq!(PriceGenerator::next_price(dec!(100), dec!(0.25), 1), dec!(100.25));
        assert_eq!(PriceGenerator::next_price(dec!(100.10), dec!(0.25), 1), dec!(100.25));
        assert_eq!(PriceGenerator::next_price(dec!(100.10), dec!(0.25), -1), dec!(99.75));
    }

    #[test]
    fn test_coefficient_is_clamped() {
        let generator = PriceGenerator::new(Arc::new(MemoryTickStore::new()), FeedConfig::default());
        generator.set_coefficient(3.0);
        assert_eq!(generator.coefficient(), 0.8);
        generator.set_coefficient(-3.0);
        assert_eq!(generator.coefficient(), -0.8);
    }

    #[tokio::test]
    async fn test_instrument_task_appends_grid_ticks() {
        let store = Arc::new(MemoryTickStore::with_instruments([Instrument::ES]));
        store
            .append(Instrument::ES, Tick::new(Utc::now(), dec!(200)))
            .unwrap();
        let config = FeedConfig {
            tick_interval: Duration::from_millis(5),
            ..FeedConfig::default()
        };
        let generator = Arc::new(PriceGenerator::new(store.clone(), config));

        let task = tokio::spawn(generator.run_instrument(Instrument::ES));
        sleep(Duration::from_millis(100)).await;
        task.abort();

        let ticks = store.fetch_at(Instrument::ES, TickWindow::Count(1000), Utc::now()).unwrap();
        assert!(ticks.len() >= 3, "only {} ticks", ticks.len());
        for pair in ticks.windows(2) {
            assert_eq!((pair[1].price - pair[0].price).abs(), dec!(0.25));
        }
    }
}
