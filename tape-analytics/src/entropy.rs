//! Normalized permutation entropy
//!
//! Formula: H = -sum p(pi) * ln p(pi) / ln(m!)
//!
//! Every start index contributes one ordinal pattern: the order of its `m`
//! delay-embedded samples, ties broken by embedding index. Pattern counting is
//! split into contiguous index ranges on the [`CpuPool`] and the partial
//! histograms are summed. Integer counts make the merge exact, so the result
//! is identical for any worker count.

use tracing::debug;

use crate::error::AnalyticsError;
use crate::pool::CpuPool;

/// Largest embedding dimension accepted (8! = 40320 patterns)
pub const MAX_DIMENSION: usize = 8;

/// Tunables for the permutation entropy estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntropyConfig {
    /// Embedding dimension `m`
    pub dimension: usize,
    /// Time delay `tau`
    pub delay: usize,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            dimension: 3,
            delay: 1,
        }
    }
}

/// Permutation entropy estimator
#[derive(Debug, Clone, Copy)]
pub struct PermutationEntropy {
    config: EntropyConfig,
}

impl Default for PermutationEntropy {
    fn default() -> Self {
        Self {
            config: EntropyConfig::default(),
        }
    }
}

impl PermutationEntropy {
    /// Validate the configuration and build an estimator
    pub fn new(config: EntropyConfig) -> Result<Self, AnalyticsError> {
        if config.dimension < 2 {
            return Err(AnalyticsError::invalid("m must be >= 2"));
        }
        if config.dimension > MAX_DIMENSION {
            return Err(AnalyticsError::invalid(format!("m must be <= {}", MAX_DIMENSION)));
        }
        if config.delay < 1 {
            return Err(AnalyticsError::invalid("tau must be >= 1"));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> EntropyConfig {
        self.config
    }

    /// Estimate the normalized permutation entropy of `series`, in [0, 1]
    pub fn estimate(
        &self,
        series: &[f64],
        pool: &CpuPool,
        parallelism: usize,
    ) -> Result<f64, AnalyticsError> {
        let EntropyConfig { dimension: m, delay: tau } = self.config;
        let tail = (m - 1)
            .checked_mul(tau)
            .filter(|&tail| tail < series.len())
            .ok_or_else(|| {
                AnalyticsError::insufficient(format!(
                    "series of {} points too short for m={} and tau={}",
                    series.len(),
                    m,
                    tau
                ))
            })?;
        let total = series.len() - tail;

        let parallelism = pool.effective_parallelism(parallelism);
        let ranges = start_ranges(total, parallelism);
        debug!(
            "Permutation entropy over {} patterns in {} chunks, parallelism {}",
            total,
            ranges.len(),
            parallelism
        );

        let partials = pool.map_ordered(ranges, parallelism, |(start, end)| {
            count_patterns(&series[start..end + tail], end - start, m, tau)
        });

        let mut counts = vec![0u64; factorial(m)];
        for partial in partials {
            for (slot, c) in counts.iter_mut().zip(partial) {
                *slot += c;
            }
        }

        Ok(normalized_entropy(&counts, total as u64))
    }
}

/// Contiguous `[start, end)` ranges of pattern start indices
///
/// Each range holds about `total / (parallelism * 4)` starts.
fn start_ranges(total: usize, parallelism: usize) -> Vec<(usize, usize)> {
    let chunk = (total / parallelism.saturating_mul(4).max(1)).max(1);
    (0..total)
        .step_by(chunk)
        .map(|start| (start, (start + chunk).min(total)))
        .collect()
}

/// Histogram of ordinal patterns for the first `starts` start indices of `segment`
///
/// `segment` must carry `(m - 1) * tau` samples past the last start.
pub fn count_patterns(segment: &[f64], starts: usize, m: usize, tau: usize) -> Vec<u64> {
    let mut counts = vec![0u64; factorial(m)];
    let mut scratch: Vec<(f64, usize)> = Vec::with_capacity(m);

    for i in 0..starts {
        scratch.clear();
        scratch.extend((0..m).map(|k| (segment[i + k * tau], k)));
        counts[ordinal_pattern_rank(&mut scratch)] += 1;
    }

    counts
}

/// Lexicographic rank of the ordinal pattern of `(value, embedding index)` pairs
///
/// Sorts the pairs in place by value, then by index, and ranks the resulting
/// permutation of embedding indices (the identity ranks 0).
pub fn ordinal_pattern_rank(samples: &mut [(f64, usize)]) -> usize {
    samples.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let m = samples.len();
    let mut rank = 0;
    for i in 0..m {
        let smaller = samples[i + 1..]
            .iter()
            .filter(|(_, k)| *k < samples[i].1)
            .count();
        rank = rank * (m - i) + smaller;
    }
    rank
}

/// Shannon entropy of a histogram divided by its maximum `ln(bins)`
pub fn normalized_entropy(counts: &[u64], total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }

    let h: f64 = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.ln()
        })
        .sum();

    let h_max = (counts.len() as f64).ln();
    if h_max > 0.0 && h > 0.0 {
        h / h_max
    } else {
        0.0
    }
}

fn factorial(n: usize) -> usize {
    (1..=n).product()
}
