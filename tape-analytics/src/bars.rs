//! Minute Bar Aggregator
//!
//! Streams an ascending tick sequence into one-minute OHLC bars. Input order
//! is the caller's job: a tick whose minute is earlier than the bar being
//! built is an error, never silently re-sorted.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tape_core::{MinuteBar, Tick};

use crate::error::AnalyticsError;

/// Truncate a timestamp to the start of its minute
pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}

/// In-progress bar
#[derive(Debug, Clone, Copy)]
struct BarBuilder {
    minute: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    tick_count: u32,
}

impl BarBuilder {
    fn open(minute: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            minute,
            open: price,
            high: price,
            low: price,
            close: price,
            tick_count: 1,
        }
    }

    fn update(&mut self, price: Decimal) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
        self.tick_count += 1;
    }

    fn finish(self) -> MinuteBar {
        MinuteBar {
            minute: self.minute,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            tick_count: self.tick_count,
        }
    }
}

/// Iterator adapter turning ticks into minute bars
///
/// Consumes its input once. After yielding an error it yields nothing more.
pub struct MinuteBars<I> {
    ticks: I,
    fill_missing_minutes: bool,
    current: Option<BarBuilder>,
    ready: VecDeque<MinuteBar>,
    failed: bool,
}

impl<I> MinuteBars<I>
where
    I: Iterator<Item = Tick>,
{
    pub fn new(ticks: I, fill_missing_minutes: bool) -> Self {
        Self {
            ticks,
            fill_missing_minutes,
            current: None,
            ready: VecDeque::new(),
            failed: false,
        }
    }

    /// Close the in-progress bar and queue it, plus flat bars for any silent minutes
    fn advance_to(&mut self, minute: DateTime<Utc>, price: Decimal) {
        let Some(done) = self.current.replace(BarBuilder::open(minute, price)) else {
            return;
        };
        let done = done.finish();
        let last_close = done.close;
        let mut gap = done.minute + TimeDelta::minutes(1);
        self.ready.push_back(done);

        if self.fill_missing_minutes {
            while gap < minute {
                self.ready.push_back(MinuteBar::flat(gap, last_close));
                gap += TimeDelta::minutes(1);
            }
        }
    }
}

impl<I> Iterator for MinuteBars<I>
where
    I: Iterator<Item = Tick>,
{
    type Item = Result<MinuteBar, AnalyticsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(bar) = self.ready.pop_front() {
                return Some(Ok(bar));
            }
            if self.failed {
                return None;
            }

            let Some(tick) = self.ticks.next() else {
                return self.current.take().map(|bar| Ok(bar.finish()));
            };
            let minute = truncate_to_minute(tick.timestamp);

            match self.current.as_ref().map(|bar| bar.minute) {
                None => self.current = Some(BarBuilder::open(minute, tick.price)),
                Some(current) if minute < current => {
                    self.failed = true;
                    self.current = None;
                    return Some(Err(AnalyticsError::UnorderedTicks {
                        current,
                        got: minute,
                    }));
                }
                Some(current) if minute == current => {
                    if let Some(bar) = self.current.as_mut() {
                        bar.update(tick.price);
                    }
                }
                Some(_) => self.advance_to(minute, tick.price),
            }
        }
    }
}

/// Aggregate a whole tick sequence into bars
pub fn minute_bars<T>(ticks: T, fill_missing_minutes: bool) -> Result<Vec<MinuteBar>, AnalyticsError>
where
    T: IntoIterator<Item = Tick>,
{
    MinuteBars::new(ticks.into_iter(), fill_missing_minutes).collect()
}

/// Bar closes as floats, the input series for both estimators
pub fn closing_prices(bars: &[MinuteBar]) -> Vec<f64> {
    bars.iter().filter_map(|bar| bar.close.to_f64()).collect()
}
