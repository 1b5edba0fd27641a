//! Provider and credential metrics.

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const PROVIDER_CALLS_TOTAL: &str = "amssvc_provider_calls_total";
    pub const CREDENTIAL_REFRESH_TOTAL: &str = "amssvc_credential_refresh_total";
}

/// Record the outcome of one provider call.
pub fn record_provider_call(operation: &str, success: bool) {
    let labels = [
        ("operation", operation.to_string()),
        ("outcome", outcome(success).to_string()),
    ];
    counter!(names::PROVIDER_CALLS_TOTAL, &labels).increment(1);
}

/// Record the outcome of one credential refresh attempt.
pub fn record_credential_refresh(success: bool) {
    let labels = [("outcome", outcome(success).to_string())];
    counter!(names::CREDENTIAL_REFRESH_TOTAL, &labels).increment(1);
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}
