//! Analytics for the tick tape
//!
//! Turns an ordered tick stream into minute bars and runs the two
//! map-reduce estimators (rescaled-range Hurst exponent and normalized
//! permutation entropy) on the bar closes over a dedicated CPU pool.

pub mod bars;
pub mod entropy;
pub mod error;
pub mod hurst;
pub mod pool;

pub use bars::{closing_prices, minute_bars, MinuteBars};
pub use entropy::{EntropyConfig, PermutationEntropy};
pub use error::AnalyticsError;
pub use hurst::{HurstConfig, HurstEstimator};
pub use pool::CpuPool;
