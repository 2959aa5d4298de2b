//! Analysis metrics collection.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Total remote analysis requests by status.
    pub const REQUESTS_TOTAL: &str = "analysis_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "analysis_retries_total";
}

/// Record a completed remote analysis request.
pub fn record_request(status: &str) {
    counter!(
        names::REQUESTS_TOTAL,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}
