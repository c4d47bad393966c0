//! Ramp plans: the immutable description of one load test.

use crate::error::{CoreError, CoreResult};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// HTTP request shared, unmodified, by every step of a ramp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    method: String,
    url: String,
    headers: BTreeMap<String, String>,
    body: Bytes,
}

impl RequestTemplate {
    /// Create a template for `method url` with no headers and an empty body.
    ///
    /// An empty method defaults to `GET`.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        let method = method.into().trim().to_ascii_uppercase();
        Self {
            method: if method.is_empty() {
                "GET".to_string()
            } else {
                method
            },
            url: url.into(),
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    /// Shorthand for a `GET` template.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Set a header, replacing any previous value with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Merge every header from a `Name: value` text block.
    pub fn with_header_block(mut self, block: &str) -> Self {
        self.headers.extend(parse_headers(block));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Parse a text block of `Name: value` lines into headers.
///
/// Carriage returns are dropped, blank lines are skipped and so is any line
/// whose first `:` is missing or at position 0. Later duplicates win.
pub fn parse_headers(block: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    let cleaned = block.trim_matches(' ').replace('\r', "");

    for line in cleaned.split('\n') {
        let Some(index) = line.find(':') else {
            continue;
        };
        if index < 1 {
            continue;
        }
        let name = line[..index].trim_matches(' ');
        let value = line[index + 1..].trim_matches(' ');
        if name.is_empty() {
            continue;
        }
        headers.insert(name.to_string(), value.to_string());
    }

    headers
}

/// Immutable description of one concurrency ramp.
///
/// Concurrency iterates from `min_concurrency` (inclusive) to
/// `max_concurrency` (exclusive) in increments of `step`.
#[derive(Debug, Clone, PartialEq)]
pub struct RampPlan {
    name: String,
    min_concurrency: i64,
    max_concurrency: i64,
    step: i64,
    request: RequestTemplate,
    step_timeout: Option<Duration>,
    step_delay: Duration,
    deadline: Option<Duration>,
}

impl RampPlan {
    /// Start building a plan stored under `name`.
    pub fn builder(name: impl Into<String>, request: RequestTemplate) -> RampPlanBuilder {
        RampPlanBuilder {
            plan: RampPlan {
                name: name.into(),
                min_concurrency: 1,
                max_concurrency: 1,
                step: 1,
                request,
                step_timeout: None,
                step_delay: Duration::ZERO,
                deadline: None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_concurrency(&self) -> i64 {
        self.min_concurrency
    }

    pub fn max_concurrency(&self) -> i64 {
        self.max_concurrency
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    pub fn request(&self) -> &RequestTemplate {
        &self.request
    }

    /// Deadline applied to each step's driver call, if any.
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout
    }

    /// Delay observed before every step, the first one included.
    pub fn step_delay(&self) -> Duration {
        self.step_delay
    }

    /// Deadline for the whole ramp, measured from the moment it starts running.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Check the ramp parameters.
    ///
    /// A non-positive step would never terminate. A ramp that runs at least
    /// one step must start from a positive concurrency.
    pub fn validate(&self) -> CoreResult<()> {
        if self.step <= 0 {
            return Err(CoreError::ValidationError(format!(
                "step must be > 0, got {}",
                self.step
            )));
        }

        if self.min_concurrency < self.max_concurrency && self.min_concurrency < 1 {
            return Err(CoreError::ValidationError(format!(
                "min concurrency must be > 0, got {}",
                self.min_concurrency
            )));
        }

        Ok(())
    }

    /// Concurrency levels visited by the ramp, in order.
    ///
    /// Yields nothing when `step <= 0` or `min >= max`.
    pub fn concurrency_levels(&self) -> ConcurrencyLevels {
        ConcurrencyLevels {
            next: Some(self.min_concurrency),
            max: self.max_concurrency,
            step: self.step,
        }
    }

    /// Highest concurrency level the ramp visits, without walking the levels.
    pub fn peak_concurrency(&self) -> Option<i64> {
        if self.step <= 0 || self.min_concurrency >= self.max_concurrency {
            return None;
        }
        let (min, max, step) = (
            i128::from(self.min_concurrency),
            i128::from(self.max_concurrency),
            i128::from(self.step),
        );
        let last = min + (max - 1 - min) / step * step;
        i64::try_from(last).ok()
    }

    /// Number of steps the ramp runs: `ceil((max - min) / step)`.
    pub fn step_count(&self) -> usize {
        self.concurrency_levels().count()
    }
}

impl fmt::Display for RampPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} C: {} [{}-{}], step timeout: {:?}, delay: {:?}",
            self.name,
            self.step,
            self.min_concurrency,
            self.max_concurrency,
            self.step_timeout.unwrap_or_default(),
            self.step_delay
        )
    }
}

/// Builder for [`RampPlan`].
#[derive(Debug, Clone)]
pub struct RampPlanBuilder {
    plan: RampPlan,
}

impl RampPlanBuilder {
    /// Concurrency bounds: `min` inclusive, `max` exclusive.
    pub fn concurrency(mut self, min: i64, max: i64) -> Self {
        self.plan.min_concurrency = min;
        self.plan.max_concurrency = max;
        self
    }

    pub fn step(mut self, step: i64) -> Self {
        self.plan.step = step;
        self
    }

    /// Per-step deadline. A zero duration disables it.
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.plan.step_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.plan.step_delay = delay;
        self
    }

    /// Deadline for the whole ramp. A zero duration disables it.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.plan.deadline = (!deadline.is_zero()).then_some(deadline);
        self
    }

    pub fn build(self) -> RampPlan {
        self.plan
    }
}

/// Iterator over the concurrency levels of a ramp.
#[derive(Debug, Clone)]
pub struct ConcurrencyLevels {
    next: Option<i64>,
    max: i64,
    step: i64,
}

impl Iterator for ConcurrencyLevels {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.step <= 0 {
            return None;
        }
        let current = self.next.filter(|c| *c < self.max)?;
        self.next = current.checked_add(self.step);
        Some(current)
    }
}
