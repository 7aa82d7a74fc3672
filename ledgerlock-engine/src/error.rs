//! Error types for escrow orchestration
//!
//! The taxonomy mirrors the lifecycle: clock-format and clock-availability
//! failures are distinct from the three terminal step failures, and
//! cancellation is its own kind so callers can tell an abort from a fault.

use thiserror::Error;

/// Main error type for escrow operations
#[derive(Error, Debug)]
pub enum EscrowError {
    /// The remote clock returned text no known format accepts.
    /// Always carries the raw input for diagnostics.
    #[error("malformed ledger time {raw:?}: {reason}")]
    MalformedTime { raw: String, reason: String },

    /// The ledger clock could not be queried or parsed. Retryable up to
    /// the poller's consecutive-failure bound, then surfaced.
    #[error("ledger clock unavailable: {0}")]
    ClockUnavailable(String),

    /// Escrow creation was rejected, either before or by the ledger
    #[error("escrow creation failed: {0}")]
    CreationFailed(String),

    /// The wait for the finish deadline gave up
    #[error("deadline wait failed: {0}")]
    DeadlineWaitFailed(String),

    /// Escrow finish was rejected by the ledger
    #[error("escrow finish failed: {0}")]
    FinishFailed(String),

    /// The flow was aborted by an external cancellation signal
    #[error("escrow flow cancelled")]
    Cancelled,
}

impl EscrowError {
    /// Create a malformed-time error carrying the raw clock text
    pub fn malformed_time<S: Into<String>>(raw: S, reason: S) -> Self {
        Self::MalformedTime {
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    /// Create a clock-unavailable error
    pub fn clock_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::ClockUnavailable(msg.into())
    }

    /// Create a creation-failed error
    pub fn creation_failed<S: Into<String>>(msg: S) -> Self {
        Self::CreationFailed(msg.into())
    }

    /// Create a deadline-wait error
    pub fn deadline_wait<S: Into<String>>(msg: S) -> Self {
        Self::DeadlineWaitFailed(msg.into())
    }

    /// Create a finish-failed error
    pub fn finish_failed<S: Into<String>>(msg: S) -> Self {
        Self::FinishFailed(msg.into())
    }
}
