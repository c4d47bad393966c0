//! Density and cumulative curves derived from a latency histogram.

use crate::report::HistogramBucket;
use once_cell::sync::OnceCell;
use serde::{Serialize, Serializer};
use std::time::Duration;

/// One point of a sequence: a latency label and its value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SequencePoint {
    #[serde(rename = "latency_secs", serialize_with = "serialize_secs")]
    pub latency: Duration,
    pub value: f64,
}

/// Ordered `(latency, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Sequence {
    points: Vec<SequencePoint>,
}

impl Sequence {
    /// Density curve: one point per histogram bucket, in bucket order.
    pub fn density(histogram: &[HistogramBucket]) -> Self {
        let points = histogram
            .iter()
            .map(|bucket| SequencePoint {
                latency: mark_to_duration(bucket.mark_secs),
                value: bucket.frequency,
            })
            .collect();
        Self { points }
    }

    /// Cumulative curve: running sum of the density values, same labels.
    pub fn cumulative(density: &Sequence) -> Self {
        let mut total = 0.0;
        let points = density
            .points
            .iter()
            .map(|point| {
                total += point.value;
                SequencePoint {
                    latency: point.latency,
                    value: total,
                }
            })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[SequencePoint] {
        &self.points
    }

    pub fn labels(&self) -> impl Iterator<Item = Duration> + '_ {
        self.points.iter().map(|p| p.latency)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Compute-once cells holding the sequences of one report.
///
/// Derived state: it never takes part in equality or serialization.
#[derive(Debug, Clone, Default)]
pub(crate) struct SequenceCache {
    density: OnceCell<Sequence>,
    cumulative: OnceCell<Sequence>,
}

impl SequenceCache {
    pub(crate) fn density(&self, histogram: &[HistogramBucket]) -> &Sequence {
        self.density.get_or_init(|| Sequence::density(histogram))
    }

    pub(crate) fn cumulative(&self, histogram: &[HistogramBucket]) -> &Sequence {
        self.cumulative
            .get_or_init(|| Sequence::cumulative(self.density(histogram)))
    }

    pub(crate) fn is_density_computed(&self) -> bool {
        self.density.get().is_some()
    }

    pub(crate) fn is_cumulative_computed(&self) -> bool {
        self.cumulative.get().is_some()
    }
}

impl PartialEq for SequenceCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

fn mark_to_duration(mark_secs: f64) -> Duration {
    Duration::try_from_secs_f64(mark_secs).unwrap_or_default()
}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}
