//! Hurst exponent via rescaled-range (R/S) analysis
//!
//! The series is differenced, cut into non-overlapping chunks for a set of
//! log-spaced window sizes, and the mean R/S of each window is regressed
//! against the window size on a log-log scale. The slope is the exponent.
//!
//! Each window is an independent unit of work on the [`CpuPool`]; results are
//! gathered back in window order, so the estimate does not depend on how many
//! workers ran it.

use tracing::debug;

use crate::error::AnalyticsError;
use crate::pool::CpuPool;

/// Fewest usable windows the regression will accept
const MIN_WINDOWS: usize = 5;

/// Tunables for the R/S estimator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HurstConfig {
    /// Minimum number of differenced points
    pub min_points: usize,
    /// Smallest window size
    pub min_window: usize,
    /// Largest window size, half the differenced series when unset
    pub max_window: Option<usize>,
    /// Target number of log-spaced window sizes
    pub num_windows: usize,
}

impl Default for HurstConfig {
    fn default() -> Self {
        Self {
            min_points: 500,
            min_window: 10,
            max_window: None,
            num_windows: 20,
        }
    }
}

/// Rescaled-range Hurst estimator
#[derive(Debug, Clone, Default)]
pub struct HurstEstimator {
    config: HurstConfig,
}

impl HurstEstimator {
    pub fn new(config: HurstConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HurstConfig {
        &self.config
    }

    /// Estimate the Hurst exponent of a bar-close series
    ///
    /// `parallelism` caps how many partitions the window set is split into.
    pub fn estimate(
        &self,
        closes: &[f64],
        pool: &CpuPool,
        parallelism: usize,
    ) -> Result<f64, AnalyticsError> {
        let data = first_differences(closes);
        let n = data.len();

        if n < self.config.min_points {
            return Err(AnalyticsError::insufficient(format!(
                "not enough minute points: {} < {}",
                n, self.config.min_points
            )));
        }

        let max_window = self
            .config
            .max_window
            .unwrap_or_else(|| (self.config.min_window + 1).max(n / 2));
        let windows = log_spaced_windows(self.config.min_window, max_window, self.config.num_windows);

        if windows.len() < MIN_WINDOWS {
            return Err(AnalyticsError::insufficient(format!(
                "only {} distinct window sizes, need {}",
                windows.len(),
                MIN_WINDOWS
            )));
        }

        debug!(
            "R/S over {} points, {} windows ({}..={}), parallelism {}",
            n,
            windows.len(),
            windows[0],
            windows[windows.len() - 1],
            parallelism
        );

        let data = &data;
        let results = pool.map_ordered(windows, parallelism, |w| {
            (w, rescaled_range_mean(data, w))
        });

        let (xs, ys): (Vec<f64>, Vec<f64>) = results
            .into_iter()
            .filter_map(|(w, rs)| rs.map(|rs| (w, rs)))
            .filter(|(_, rs)| *rs > 0.0 && rs.is_finite())
            .map(|(w, rs)| ((w as f64).ln(), rs.ln()))
            .unzip();

        if xs.len() < MIN_WINDOWS {
            return Err(AnalyticsError::insufficient(format!(
                "only {} valid (window, R/S) points, need {}",
                xs.len(),
                MIN_WINDOWS
            )));
        }

        regression_slope(&xs, &ys)
    }
}

/// First differences of a series
pub fn first_differences(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

/// Log-spaced, sorted, de-duplicated window sizes between two bounds
pub fn log_spaced_windows(min_window: usize, max_window: usize, count: usize) -> Vec<usize> {
    let min_w = min_window.max(2);
    let max_w = max_window.max(min_w + 1);

    if count <= 1 {
        return vec![min_w];
    }

    let a = (min_w as f64).log10();
    let b = (max_w as f64).log10();

    let mut windows: Vec<usize> = (0..count)
        .map(|i| {
            let t = i as f64 / (count - 1) as f64;
            10f64.powf(a + (b - a) * t).round_ties_even() as usize
        })
        .filter(|&w| w >= 2)
        .collect();

    windows.sort_unstable();
    windows.dedup();
    windows
}

/// Mean rescaled range of the full non-overlapping chunks of size `window`
///
/// `None` when the window does not fit the data or no chunk is usable.
pub fn rescaled_range_mean(series: &[f64], window: usize) -> Option<f64> {
    if window < 2 || window >= series.len() {
        return None;
    }

    let rs_values: Vec<f64> = series
        .chunks_exact(window)
        .filter_map(chunk_rescaled_range)
        .collect();

    if rs_values.is_empty() {
        return None;
    }

    Some(rs_values.iter().sum::<f64>() / rs_values.len() as f64)
}

/// Range of the mean-centred cumulative walk over the sample standard deviation
fn chunk_rescaled_range(chunk: &[f64]) -> Option<f64> {
    let len = chunk.len() as f64;
    let mean = chunk.iter().sum::<f64>() / len;

    let mut cum = 0.0;
    let mut cum_min = 0.0_f64;
    let mut cum_max = 0.0_f64;
    let mut sq = 0.0;
    for v in chunk {
        let dev = v - mean;
        cum += dev;
        cum_min = cum_min.min(cum);
        cum_max = cum_max.max(cum);
        sq += dev * dev;
    }

    let range = cum_max - cum_min;
    let stdev = (sq / (len - 1.0)).sqrt();

    if stdev > 0.0 && range.is_finite() && stdev.is_finite() {
        Some(range / stdev)
    } else {
        None
    }
}

/// Ordinary least squares slope of `ys` on `xs`
pub fn regression_slope(xs: &[f64], ys: &[f64]) -> Result<f64, AnalyticsError> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return Err(AnalyticsError::DegenerateRegression(
            "need at least 2 points for regression".to_string(),
        ));
    }

    let mx = xs[..n].iter().sum::<f64>() / n as f64;
    let my = ys[..n].iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        num += dx * (y - my);
        den += dx * dx;
    }

    if den == 0.0 {
        return Err(AnalyticsError::DegenerateRegression(
            "variance of x is zero".to_string(),
        ));
    }

    Ok(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Price path whose unit moves follow a sign-persistent AR(1) chain
    fn ar_walk(phi: f64, len: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut price = 1000.0;
        let mut prev: f64 = if rng.random::<f64>() < 0.5 { 1.0 } else { -1.0 };
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            let p_up = ((1.0 + phi * prev) * 0.5).clamp(0.0, 1.0);
            let step = if rng.random::<f64>() < p_up { 1.0 } else { -1.0 };
            price += step * 0.25;
            prev = step;
            out.push(price);
        }
        out
    }

    #[test]
    fn test_log_spaced_windows() {
        let windows = log_spaced_windows(10, 1000, 20);

        assert_eq!(windows.first(), Some(&10));
        assert_eq!(windows.last(), Some(&1000));
        assert!(windows.windows(2).all(|w| w[0] < w[1]));
        assert!(windows.len() <= 20);
    }

    #[test]
    fn test_log_spaced_windows_dedup_and_bounds() {
        // A narrow range collapses to few distinct sizes
        assert_eq!(log_spaced_windows(2, 3, 20), vec![2, 3]);
        assert_eq!(log_spaced_windows(0, 0, 1), vec![2]);
    }

    #[test]
    fn test_regression_slope() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [3.0, 5.0, 7.0, 9.0];
        assert!((regression_slope(&xs, &ys).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_regression_degenerate() {
        assert!(matches!(
            regression_slope(&[1.0], &[1.0]),
            Err(AnalyticsError::DegenerateRegression(_))
        ));
        assert!(matches!(
            regression_slope(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]),
            Err(AnalyticsError::DegenerateRegression(_))
        ));
    }

    #[test]
    fn test_rescaled_range_mean_window_too_large() {
        let series = vec![1.0, -1.0, 1.0, -1.0];
        assert_eq!(rescaled_range_mean(&series, 4), None);
        assert_eq!(rescaled_range_mean(&series, 10), None);
    }

    #[test]
    fn test_rescaled_range_flat_chunks_excluded() {
        let series = vec![0.5; 40];
        assert_eq!(rescaled_range_mean(&series, 10), None);
    }

    #[test]
    fn test_rescaled_range_known_chunk() {
        // deviations +1,-1,+1,-1: walk 1,0,1,0 -> range 1, stdev sqrt(4/3)
        let series = vec![1.0, -1.0, 1.0, -1.0, 1.0];
        let rs = rescaled_range_mean(&series, 4).unwrap();
        assert!((rs - 1.0 / (4.0_f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_insufficient_points() {
        let pool = CpuPool::new(2).unwrap();
        let closes = ar_walk(0.0, 500, 7);

        let result = HurstEstimator::default().estimate(&closes, &pool, 2);

        assert!(matches!(result, Err(AnalyticsError::InsufficientData(_))));
    }

    #[test]
    fn test_min_points_boundary_accepted() {
        let pool = CpuPool::new(2).unwrap();
        // 501 closes difference to exactly 500 points
        let closes = ar_walk(0.0, 501, 7);

        let h = HurstEstimator::default().estimate(&closes, &pool, 2).unwrap();

        assert!(h.is_finite(), "H = {}", h);
    }

    #[test]
    fn test_too_few_distinct_windows() {
        let pool = CpuPool::new(1).unwrap();
        let closes = ar_walk(0.0, 30, 5);

        let capped = HurstEstimator::new(HurstConfig {
            min_points: 10,
            min_window: 10,
            max_window: Some(12),
            num_windows: 20,
        });
        match capped.estimate(&closes, &pool, 1) {
            Err(AnalyticsError::InsufficientData(msg)) => {
                assert!(msg.contains("distinct window sizes"), "{}", msg)
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }

        // Derived upper bound of max(11, 21 / 2) leaves only 10 and 11
        let derived = HurstEstimator::new(HurstConfig {
            min_points: 10,
            min_window: 10,
            max_window: None,
            num_windows: 20,
        });
        assert!(matches!(
            derived.estimate(&closes[..22], &pool, 1),
            Err(AnalyticsError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_random_walk_near_one_half() {
        let pool = CpuPool::new(4).unwrap();
        let closes = ar_walk(0.0, 5001, 42);

        let h = HurstEstimator::default().estimate(&closes, &pool, 4).unwrap();

        assert!((0.4..0.75).contains(&h), "H = {}", h);
    }

    #[test]
    fn test_persistence_orders_estimates() {
        let pool = CpuPool::new(4).unwrap();
        let estimator = HurstEstimator::default();

        let trending = estimator.estimate(&ar_walk(0.8, 5001, 3), &pool, 4).unwrap();
        let reverting = estimator.estimate(&ar_walk(-0.8, 5001, 3), &pool, 4).unwrap();

        assert!(trending > reverting, "{} <= {}", trending, reverting);
    }

    #[test]
    fn test_worker_count_does_not_change_result() {
        let closes = ar_walk(0.3, 3001, 11);
        let estimator = HurstEstimator::default();

        let single = estimator.estimate(&closes, &CpuPool::new(1).unwrap(), 1).unwrap();
        let many = estimator.estimate(&closes, &CpuPool::new(8).unwrap(), 8).unwrap();

        assert_eq!(single.to_bits(), many.to_bits());
    }
}
