//! Persists run results under their run name.

use crate::error::{RampError, ServiceError};
use bytes::Bytes;
use loadramp_core::{CoreError, RunResult};
use loadramp_storage::RunStore;
use std::sync::Arc;

pub struct RunRecorder {
    store: Arc<dyn RunStore>,
}

impl RunRecorder {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    /// Check that the store accepts `name` before anything is measured.
    pub fn check_name(&self, name: &str) -> Result<(), RampError> {
        self.store.validate_key(name).map_err(|e| {
            let reason = match e {
                CoreError::ValidationError(msg) => msg,
                other => other.to_string(),
            };
            RampError::Configuration(format!("run name `{}` cannot be stored: {}", name, reason))
        })
    }

    /// Encode `result` and store it under `name`, replacing any previous run.
    ///
    /// An empty result is not written and records zero bytes.
    pub async fn record(&self, name: &str, result: &RunResult) -> Result<usize, ServiceError> {
        if result.is_empty() {
            tracing::debug!(run = name, "nothing to record");
            return Ok(0);
        }

        let encoded = result.encode().map_err(ServiceError::Encode)?;
        let written = self
            .store
            .set(name, Bytes::from(encoded))
            .await
            .map_err(ServiceError::Store)?;

        tracing::info!(run = name, steps = result.len(), bytes = written, "run recorded");
        Ok(written)
    }
}
