//! Pipeline metrics collection.

use metrics::{counter, gauge};

/// Metric name constants for consistency.
pub mod names {
    /// Cache lookups that found a report.
    pub const CACHE_HITS_TOTAL: &str = "analysis_cache_hits_total";

    /// Cache lookups that found nothing.
    pub const CACHE_MISSES_TOTAL: &str = "analysis_cache_misses_total";

    /// Batches drained from the queue, by outcome.
    pub const BATCHES_TOTAL: &str = "batches_total";

    /// Current number of batches waiting in the queue.
    pub const QUEUE_DEPTH: &str = "batch_queue_depth";
}

/// Record a cache lookup.
pub fn record_cache_lookup(hit: bool) {
    let name = if hit {
        names::CACHE_HITS_TOTAL
    } else {
        names::CACHE_MISSES_TOTAL
    };
    counter!(name).increment(1);
}

/// Record a drained batch by outcome.
pub fn record_batch(outcome: &str) {
    counter!(
        names::BATCHES_TOTAL,
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record the queue depth after a push or pop.
pub fn record_queue_depth(depth: usize) {
    gauge!(names::QUEUE_DEPTH).set(depth as f64);
}
