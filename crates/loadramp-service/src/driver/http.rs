//! HTTP load driver built on `reqwest`.

use super::collector::{Sample, SampleCollector};
use super::LoadDriver;
use async_trait::async_trait;
use bytes::Bytes;
use loadramp_core::{LoadSummary, RequestTemplate};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Knobs shared by every batch the driver runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Upper bound on requests issued by one batch.
    pub max_requests: u64,
    /// Timeout applied to each individual request.
    pub request_timeout: Duration,
    /// Upper bound on workers in one batch.
    pub max_concurrency: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_requests: 1_000_000,
            request_timeout: Duration::from_secs(20),
            max_concurrency: 10_000,
        }
    }
}

/// Request parts resolved once per batch.
struct PreparedRequest {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Bytes,
}

impl PreparedRequest {
    fn from_template(template: &RequestTemplate) -> Result<Self, String> {
        let method = Method::from_bytes(template.method().as_bytes())
            .map_err(|e| format!("invalid method `{}`: {}", template.method(), e))?;

        let mut headers = HeaderMap::new();
        for (name, value) in template.headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| format!("invalid header name `{}`: {}", name, e))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| format!("invalid value for header `{}`: {}", name, e))?;
            headers.append(name, value);
        }

        Ok(Self {
            method,
            url: template.url().to_string(),
            headers,
            body: template.body().clone(),
        })
    }
}

/// Keeps `concurrency` workers issuing the same request until the batch
/// budget is spent or the step is cancelled.
pub struct HttpLoadDriver {
    client: Client,
    config: DriverConfig,
}

impl HttpLoadDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: DriverConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Run one batch and summarize it.
    pub async fn run_batch(
        &self,
        template: &RequestTemplate,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> LoadSummary {
        let mut collector = SampleCollector::new();

        let request = match PreparedRequest::from_template(template) {
            Ok(request) => Arc::new(request),
            Err(message) => {
                tracing::warn!(url = template.url(), "Request template rejected: {}", message);
                collector.record(Sample::error(Duration::ZERO, message));
                return collector.finish();
            }
        };

        let budget = Arc::new(AtomicU64::new(self.config.max_requests));
        let mut workers = JoinSet::new();
        for _ in 0..concurrency.clamp(1, self.config.max_concurrency.max(1)) {
            workers.spawn(worker(
                self.client.clone(),
                Arc::clone(&request),
                self.config.request_timeout,
                Arc::clone(&budget),
                cancel.clone(),
            ));
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(samples) => collector.extend(samples),
                Err(e) => tracing::error!("Load worker failed: {}", e),
            }
        }

        tracing::debug!(
            url = template.url(),
            concurrency,
            samples = collector.len(),
            cancelled = cancel.is_cancelled(),
            "batch finished"
        );
        collector.finish()
    }
}

impl Default for HttpLoadDriver {
    fn default() -> Self {
        Self::new(DriverConfig::default())
    }
}

#[async_trait]
impl LoadDriver for HttpLoadDriver {
    async fn run(
        &self,
        request: &RequestTemplate,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Bytes {
        let summary = self.run_batch(request, concurrency, cancel).await;
        match serde_json::to_vec(&summary) {
            Ok(encoded) => Bytes::from(encoded),
            Err(e) => {
                tracing::error!("Failed to encode batch summary: {}", e);
                Bytes::new()
            }
        }
    }

    fn max_concurrency(&self) -> Option<usize> {
        Some(self.config.max_concurrency)
    }
}

/// Take one request from the shared budget. False once it is spent.
fn claim(budget: &AtomicU64) -> bool {
    budget
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
        .is_ok()
}

async fn worker(
    client: Client,
    request: Arc<PreparedRequest>,
    timeout: Duration,
    budget: Arc<AtomicU64>,
    cancel: CancellationToken,
) -> Vec<Sample> {
    let mut samples = Vec::new();

    while !cancel.is_cancelled() && claim(&budget) {
        let started = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = send(&client, &request, timeout) => outcome,
        };
        samples.push(Sample {
            latency: started.elapsed(),
            outcome,
        });
    }

    samples
}

/// Send the request and drain the response body.
async fn send(client: &Client, request: &PreparedRequest, timeout: Duration) -> Result<u16, String> {
    let response = client
        .request(request.method.clone(), &request.url)
        .headers(request.headers.clone())
        .body(request.body.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status().as_u16();
    response.bytes().await.map_err(|e| e.to_string())?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn test_claim_stops_at_zero() {
        let budget = AtomicU64::new(2);
        assert!(claim(&budget));
        assert!(claim(&budget));
        assert!(!claim(&budget));
        assert_eq!(budget.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_driver_reports_concurrency_cap() {
        let driver = HttpLoadDriver::new(DriverConfig {
            max_concurrency: 64,
            ..DriverConfig::default()
        });
        assert_eq!(LoadDriver::max_concurrency(&driver), Some(64));
    }

    #[test]
    fn test_invalid_template_is_reported() {
        let template = RequestTemplate::new("BAD METHOD", "http://localhost/");
        assert!(PreparedRequest::from_template(&template).is_err());

        let template = RequestTemplate::get("http://localhost/").with_header("X-Ok", "yes");
        let prepared = PreparedRequest::from_template(&template).unwrap();
        assert_eq!(prepared.headers["x-ok"], "yes");
    }

    #[tokio::test]
    async fn test_batch_respects_budget() {
        let url = serve(Router::new().route("/", get(|| async { "ok" }))).await;
        let driver = HttpLoadDriver::new(DriverConfig {
            max_requests: 25,
            request_timeout: Duration::from_secs(5),
            ..DriverConfig::default()
        });

        let summary = driver
            .run_batch(&RequestTemplate::get(url), 4, CancellationToken::new())
            .await;

        assert_eq!(summary.total_requests(), 25);
        assert_eq!(summary.status_codes[&200u16], 25);
        assert_eq!(summary.histogram.len(), 11);
    }

    #[tokio::test]
    async fn test_cancellation_returns_partial_batch() {
        let url = serve(Router::new().route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                "slow"
            }),
        ))
        .await;
        let driver = HttpLoadDriver::new(DriverConfig {
            max_requests: u64::MAX,
            request_timeout: Duration::from_secs(5),
            ..DriverConfig::default()
        });

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let encoded = driver
            .run(&RequestTemplate::get(url), 2, cancel)
            .await;
        assert!(started.elapsed() < Duration::from_secs(3));

        let summary = LoadSummary::decode(&encoded).unwrap();
        assert!(summary.success_count > 0);
        assert_eq!(summary.error_count, 0);
    }

    #[tokio::test]
    async fn test_connection_errors_are_tallied() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let driver = HttpLoadDriver::new(DriverConfig {
            max_requests: 3,
            request_timeout: Duration::from_secs(1),
            ..DriverConfig::default()
        });
        let summary = driver
            .run_batch(
                &RequestTemplate::get(format!("http://{}/", addr)),
                1,
                CancellationToken::new(),
            )
            .await;

        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.error_count, 3);
        assert!(summary.histogram.is_empty());
    }
}
