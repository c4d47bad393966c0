pub mod health; // Liveness probe
pub mod runs;

pub use health::health_handler;
pub use runs::{create_run, download_run, flush_cache, flush_cached_run, get_run, list_runs};
