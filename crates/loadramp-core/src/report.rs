//! Step reports and the run results they make up.

use crate::error::CoreResult;
use crate::sequence::{Sequence, SequenceCache};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One latency histogram bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Bucket upper bound in seconds.
    pub mark_secs: f64,
    /// Number of responses at or below the mark and above the previous one.
    pub count: u64,
    /// `count` over the number of responses.
    pub frequency: f64,
}

/// Latency observed at a given percentile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyPercentile {
    pub percentage: u8,
    pub latency_secs: f64,
}

/// Summary of one batch as produced by a load driver.
///
/// Every field defaults, so a driver that had nothing to measure may encode
/// an empty object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSummary {
    /// Wall time of the batch in seconds.
    pub total_secs: f64,
    pub fastest_secs: f64,
    pub slowest_secs: f64,
    pub average_secs: f64,
    /// Responses per second over `total_secs`.
    pub rps: f64,
    /// Requests that produced a response, whatever its status.
    pub success_count: u64,
    /// Requests that failed before a response arrived.
    pub error_count: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub errors: BTreeMap<String, u64>,
    pub histogram: Vec<HistogramBucket>,
    pub latency_distribution: Vec<LatencyPercentile>,
}

impl LoadSummary {
    /// Decode a summary from a driver's raw output.
    pub fn decode(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    pub fn total_requests(&self) -> u64 {
        self.success_count + self.error_count
    }
}

/// Result of one ramp step: the driver summary stamped with the
/// concurrency level and target URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub concurrency: i64,
    pub url: String,
    pub summary: LoadSummary,
    #[serde(skip)]
    sequences: SequenceCache,
}

impl StepReport {
    pub fn new(concurrency: i64, url: impl Into<String>, summary: LoadSummary) -> Self {
        Self {
            concurrency,
            url: url.into(),
            summary,
            sequences: SequenceCache::default(),
        }
    }

    /// Density curve of the latency histogram, computed on first access.
    pub fn density_sequence(&self) -> &Sequence {
        self.sequences.density(&self.summary.histogram)
    }

    /// Cumulative curve of the latency histogram, computed on first access
    /// from the memoized density curve.
    pub fn cumulative_sequence(&self) -> &Sequence {
        self.sequences.cumulative(&self.summary.histogram)
    }

    pub fn has_density_sequence(&self) -> bool {
        self.sequences.is_density_computed()
    }

    pub fn has_cumulative_sequence(&self) -> bool {
        self.sequences.is_cumulative_computed()
    }
}

/// Ordered step reports of one run, by increasing concurrency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunResult {
    reports: Vec<StepReport>,
}

impl RunResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: StepReport) {
        self.reports.push(report);
    }

    pub fn reports(&self) -> &[StepReport] {
        &self.reports
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StepReport> {
        self.reports.iter()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Concurrency levels of the recorded steps, in order.
    pub fn concurrency_levels(&self) -> Vec<i64> {
        self.reports.iter().map(|r| r.concurrency).collect()
    }

    pub fn into_reports(self) -> Vec<StepReport> {
        self.reports
    }

    /// Encode as the canonical JSON array stored for a run.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode a stored run.
    pub fn decode(raw: &[u8]) -> CoreResult<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

impl From<Vec<StepReport>> for RunResult {
    fn from(reports: Vec<StepReport>) -> Self {
        Self { reports }
    }
}

impl<'a> IntoIterator for &'a RunResult {
    type Item = &'a StepReport;
    type IntoIter = std::slice::Iter<'a, StepReport>;

    fn into_iter(self) -> Self::IntoIter {
        self.reports.iter()
    }
}
