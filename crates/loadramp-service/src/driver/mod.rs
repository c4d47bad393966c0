//! Load drivers: the component that actually issues a batch of requests.
//!
//! The ramp engine only sees [`LoadDriver`]; [`HttpLoadDriver`] is the
//! default implementation.

mod collector;
mod http;

pub use collector::{Sample, SampleCollector, LATENCY_PERCENTILES};
pub use http::{DriverConfig, HttpLoadDriver};

use async_trait::async_trait;
use bytes::Bytes;
use loadramp_core::RequestTemplate;
use tokio_util::sync::CancellationToken;

/// Issues one batch of requests at a fixed concurrency.
///
/// Implementations keep `concurrency` requests in flight until their request
/// budget is spent or `cancel` fires, then return one encoded
/// [`loadramp_core::LoadSummary`]. Cancellation must make the call return
/// promptly with whatever was measured so far.
#[async_trait]
pub trait LoadDriver: Send + Sync {
    async fn run(
        &self,
        request: &RequestTemplate,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Bytes;

    /// Highest concurrency this driver accepts, if bounded. Ramps peaking
    /// above it are rejected before their first step.
    fn max_concurrency(&self) -> Option<usize> {
        None
    }
}
