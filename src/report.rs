//! Reporting of audit-local failures
//!
//! When a store write fails the observer hands an `AuditFailure` to the
//! configured reporter and returns normally. Nothing is retried.

use crate::error::AuditError;
use crate::types::AuditDirection;

/// A store write that did not succeed
#[derive(Debug)]
pub struct AuditFailure {
    pub direction: AuditDirection,
    pub message_id: String,
    pub message_type: String,
    /// Name of the store that failed
    pub store: String,
    pub error: AuditError,
}

/// Receives audit failures
///
/// Called inline from the observer hook; implementations should be quick
/// and must not panic.
pub trait AuditFailureReporter: Send + Sync {
    fn report(&self, failure: AuditFailure);
}

/// Logs failures as `tracing` warnings
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFailureReporter;

impl AuditFailureReporter for TracingFailureReporter {
    fn report(&self, failure: AuditFailure) {
        tracing::warn!(
            direction = %failure.direction,
            message_id = %failure.message_id,
            message_type = %failure.message_type,
            store = %failure.store,
            error = %failure.error,
            "Failed to record audit message"
        );
    }
}

/// Forward failures to a closure
impl<F> AuditFailureReporter for F
where
    F: Fn(AuditFailure) + Send + Sync,
{
    fn report(&self, failure: AuditFailure) {
        self(failure)
    }
}
