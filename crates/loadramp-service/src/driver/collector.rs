//! Sample collection and batch summarization.

use loadramp_core::{HistogramBucket, LatencyPercentile, LoadSummary};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Percentiles reported in every summary.
pub const LATENCY_PERCENTILES: [u8; 7] = [10, 25, 50, 75, 90, 95, 99];

const HISTOGRAM_BUCKETS: usize = 10;

/// Outcome of a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub latency: Duration,
    /// Response status, or the error that prevented a response.
    pub outcome: Result<u16, String>,
}

impl Sample {
    pub fn response(latency: Duration, status: u16) -> Self {
        Self {
            latency,
            outcome: Ok(status),
        }
    }

    pub fn error(latency: Duration, error: impl Into<String>) -> Self {
        Self {
            latency,
            outcome: Err(error.into()),
        }
    }
}

/// Accumulates request samples for one batch and turns them into a
/// [`LoadSummary`].
///
/// Only requests that produced a response contribute latencies; failed
/// requests are tallied by error message.
#[derive(Debug)]
pub struct SampleCollector {
    started: Instant,
    latencies_secs: Vec<f64>,
    status_codes: BTreeMap<u16, u64>,
    errors: BTreeMap<String, u64>,
}

impl SampleCollector {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            latencies_secs: Vec::new(),
            status_codes: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, sample: Sample) {
        match sample.outcome {
            Ok(status) => {
                self.latencies_secs.push(sample.latency.as_secs_f64());
                *self.status_codes.entry(status).or_insert(0) += 1;
            }
            Err(error) => {
                *self.errors.entry(error).or_insert(0) += 1;
            }
        }
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = Sample>) {
        for sample in samples {
            self.record(sample);
        }
    }

    /// Number of samples recorded so far.
    pub fn len(&self) -> usize {
        self.latencies_secs.len() + self.errors.values().sum::<u64>() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summarize using the wall time elapsed since the collector was created.
    pub fn finish(self) -> LoadSummary {
        let total = self.started.elapsed();
        self.summarize(total)
    }

    /// Summarize as if the batch took `total`.
    pub fn summarize(mut self, total: Duration) -> LoadSummary {
        self.latencies_secs.sort_by(f64::total_cmp);
        let lats = &self.latencies_secs;

        let total_secs = total.as_secs_f64();
        let success_count = lats.len() as u64;
        let error_count = self.errors.values().sum();

        let (fastest_secs, slowest_secs, average_secs) = match (lats.first(), lats.last()) {
            (Some(&fastest), Some(&slowest)) => {
                let sum: f64 = lats.iter().sum();
                (fastest, slowest, sum / lats.len() as f64)
            }
            _ => (0.0, 0.0, 0.0),
        };

        let rps = if total_secs > 0.0 {
            lats.len() as f64 / total_secs
        } else {
            0.0
        };

        LoadSummary {
            total_secs,
            fastest_secs,
            slowest_secs,
            average_secs,
            rps,
            success_count,
            error_count,
            histogram: histogram(lats, fastest_secs, slowest_secs),
            latency_distribution: percentiles(lats),
            status_codes: self.status_codes,
            errors: self.errors,
        }
    }
}

impl Default for SampleCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Equal-width buckets from `fastest` to `slowest`; the last mark is
/// `slowest` itself. `lats` must be sorted.
fn histogram(lats: &[f64], fastest: f64, slowest: f64) -> Vec<HistogramBucket> {
    if lats.is_empty() {
        return Vec::new();
    }

    let width = (slowest - fastest) / HISTOGRAM_BUCKETS as f64;
    let mut marks: Vec<f64> = (0..HISTOGRAM_BUCKETS)
        .map(|i| fastest + width * i as f64)
        .collect();
    marks.push(slowest);

    let mut counts = vec![0u64; marks.len()];
    let mut bucket = 0;
    for &latency in lats {
        while latency > marks[bucket] && bucket < marks.len() - 1 {
            bucket += 1;
        }
        counts[bucket] += 1;
    }

    let total = lats.len() as f64;
    marks
        .into_iter()
        .zip(counts)
        .map(|(mark_secs, count)| HistogramBucket {
            mark_secs,
            count,
            frequency: count as f64 / total,
        })
        .collect()
}

/// Latency at each percentile, by rank: sample `i` of `n` has rank
/// `i * 100 / n`, and each sample claims at most the next unfilled
/// percentile its rank reaches. Small batches therefore omit the upper
/// percentiles instead of repeating one sample for several of them.
/// `lats` must be sorted.
fn percentiles(lats: &[f64]) -> Vec<LatencyPercentile> {
    let mut distribution = Vec::with_capacity(LATENCY_PERCENTILES.len());
    let mut targets = LATENCY_PERCENTILES.iter().peekable();
    for (i, &latency) in lats.iter().enumerate() {
        let Some(&&percentage) = targets.peek() else {
            break;
        };
        if i * 100 / lats.len() >= percentage as usize {
            distribution.push(LatencyPercentile {
                percentage,
                latency_secs: latency,
            });
            targets.next();
        }
    }
    distribution
}
