//! Service layer for ramp runs: executes plans, records their results and
//! serves stored runs back. Shared by the REST API and tests.
//!
//! Decoded runs are kept in a view cache keyed by run name, so the derived
//! latency curves of a report are computed once and reused across reads.
//! Recording a run drops its cached view; the cache can also be flushed
//! explicitly.

use crate::driver::LoadDriver;
use crate::engine::RampEngine;
use crate::error::ServiceError;
use crate::recorder::RunRecorder;
use bytes::Bytes;
use loadramp_core::{RampPlan, RunResult};
use loadramp_storage::RunStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct RampService {
    engine: RampEngine,
    recorder: RunRecorder,
    views: RwLock<HashMap<String, Arc<RunResult>>>,
}

impl RampService {
    pub fn new(driver: Arc<dyn LoadDriver>, store: Arc<dyn RunStore>) -> Self {
        Self {
            engine: RampEngine::new(driver),
            recorder: RunRecorder::new(store),
            views: RwLock::new(HashMap::new()),
        }
    }

    /// True while a ramp is executing.
    pub fn is_busy(&self) -> bool {
        self.engine.is_busy()
    }

    /// Run `plan` and store its reports under the plan name.
    ///
    /// A name the store cannot hold is rejected before any step runs.
    /// Reports gathered before a cancellation or decode failure are still
    /// stored; the execution error is returned after the write is attempted.
    pub async fn execute(
        &self,
        plan: &RampPlan,
        cancel: &CancellationToken,
    ) -> Result<RunResult, ServiceError> {
        self.recorder.check_name(plan.name())?;

        let (reports, failure) = self.engine.run(plan, cancel).await?.into_parts();

        match failure {
            None => {
                self.record(plan.name(), &reports).await?;
                Ok(reports)
            }
            Some(err) => {
                if let Err(record_err) = self.record(plan.name(), &reports).await {
                    tracing::warn!(
                        run = plan.name(),
                        steps = reports.len(),
                        "Failed to record partial run: {}",
                        record_err
                    );
                }
                Err(ServiceError::Execute(err))
            }
        }
    }

    async fn record(&self, name: &str, reports: &RunResult) -> Result<usize, ServiceError> {
        let written = self.recorder.record(name, reports).await?;
        if written > 0 {
            self.flush_view(name);
        }
        Ok(written)
    }

    /// Names of all stored runs, sorted.
    pub async fn list_runs(&self) -> Result<Vec<String>, ServiceError> {
        let keys = self
            .recorder
            .store()
            .keys()
            .await
            .map_err(ServiceError::Load)?;
        Ok(keys.into_iter().collect())
    }

    /// Stored run, decoded. Served from the view cache once loaded.
    pub async fn load_run(&self, name: &str) -> Result<Arc<RunResult>, ServiceError> {
        let cached = self.views.read().get(name).cloned();
        if let Some(view) = cached {
            return Ok(view);
        }

        let raw = self.load_raw(name).await?;
        let view = Arc::new(RunResult::decode(&raw).map_err(ServiceError::Load)?);
        self.views
            .write()
            .insert(name.to_string(), Arc::clone(&view));
        tracing::debug!(run = name, "run view cached");
        Ok(view)
    }

    /// Drop the cached view of `name`. True if one was cached.
    pub fn flush_view(&self, name: &str) -> bool {
        self.views.write().remove(name).is_some()
    }

    /// Drop every cached view, returning how many there were.
    pub fn flush_views(&self) -> usize {
        let mut views = self.views.write();
        let flushed = views.len();
        views.clear();
        flushed
    }

    /// Number of runs with a cached view.
    pub fn cached_views(&self) -> usize {
        self.views.read().len()
    }

    /// Stored run exactly as written.
    pub async fn load_raw(&self, name: &str) -> Result<Bytes, ServiceError> {
        self.recorder
            .store()
            .get(name)
            .await
            .map_err(ServiceError::Load)
    }
}
