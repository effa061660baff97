//! Telemetry metric name constants.
//!
//! Centralised metric names for astrofusion operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `astrofusion_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `source`: data source, "weather" or "swapi"
//! - `outcome`: pipeline result, "ok", "unauthorized", "limited", "not_found", "error"
//! - `status`: upstream call result, "ok" or "error"

/// Total fusion requests handled by the pipeline.
///
/// Labels: `outcome`.
pub const REQUESTS_TOTAL: &str = "astrofusion_requests_total";

/// Total upstream calls.
///
/// Labels: `source`, `status` ("ok" | "error").
pub const UPSTREAM_REQUESTS_TOTAL: &str = "astrofusion_upstream_requests_total";

/// Upstream call duration in seconds.
///
/// Labels: `source`.
pub const UPSTREAM_DURATION_SECONDS: &str = "astrofusion_upstream_duration_seconds";

/// Total fresh cache reads.
///
/// Labels: `source`.
pub const CACHE_HITS_TOTAL: &str = "astrofusion_cache_hits_total";

/// Total absent or stale cache reads.
///
/// Labels: `source`.
pub const CACHE_MISSES_TOTAL: &str = "astrofusion_cache_misses_total";

/// Total requests rejected by the rate limiter.
pub const RATE_LIMITED_TOTAL: &str = "astrofusion_rate_limited_total";

/// Total history records appended.
pub const HISTORY_APPENDS_TOTAL: &str = "astrofusion_history_appends_total";
