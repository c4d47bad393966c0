//! Core domain types for loadramp: ramp plans, step reports and the
//! statistics derived from them.

pub mod error;
pub mod plan;
pub mod report;
pub mod sequence;

pub use error::{CoreError, CoreResult};
pub use plan::{parse_headers, ConcurrencyLevels, RampPlan, RampPlanBuilder, RequestTemplate};
pub use report::{HistogramBucket, LatencyPercentile, LoadSummary, RunResult, StepReport};
pub use sequence::{Sequence, SequencePoint};
