//! Error handling for the encoder core
//!
//! Mirrors the taxonomy used throughout this crate's sibling codecs: a single
//! `thiserror`-derived enum, constructor helpers, and a recoverability/category
//! classification the scheduler uses to decide whether to keep draining frames
//! or abort the stream outright.

use thiserror::Error;

/// Result type alias for encoder operations
pub type Result<T> = std::result::Result<T, EncoderError>;

/// Errors the encoder core can surface to its host.
#[derive(Error, Debug)]
pub enum EncoderError {
    /// Bad channel/acmod/lfe combination, sample rate, bitrate, bandwidth code,
    /// quality, or unsupported sample-format enum.
    #[error("Invalid encoder configuration: {details}")]
    ConfigInvalid { details: String },

    /// The requested bitrate cannot hold even the minimum-SNR allocation.
    /// Fatal to the current frame and to the encoder as a whole.
    #[error("Bit budget infeasible at minimum SNR offsets: {details}")]
    BudgetInfeasible { details: String },

    /// The host handed the core a sample count per channel other than 1,536.
    #[error("Input frame size mismatch: expected {expected} samples/channel, got {actual}")]
    InputFormatMismatch { expected: usize, actual: usize },

    /// The bit-packer exceeded the frame's committed bit budget. Indicates a
    /// bit-counting bug in the two-pass allocation/packing design and is fatal.
    #[error("Internal bit-packer assertion failed: {details}")]
    InternalAssertion { details: String },

    /// A worker thread panicked or the scheduler's ring got into an
    /// inconsistent state.
    #[error("Frame scheduler failure: {reason}")]
    SchedulerFailed { reason: String },

    /// Internal error that should not occur in correct operation.
    #[error("Internal error: {message} (this is a bug, please report it)")]
    InternalError { message: String },
}

impl EncoderError {
    /// Create a new invalid-configuration error.
    pub fn config_invalid(details: impl Into<String>) -> Self {
        Self::ConfigInvalid { details: details.into() }
    }

    /// Create a new budget-infeasible error.
    pub fn budget_infeasible(details: impl Into<String>) -> Self {
        Self::BudgetInfeasible { details: details.into() }
    }

    /// Create a new internal-assertion error.
    pub fn internal_assertion(details: impl Into<String>) -> Self {
        Self::InternalAssertion { details: details.into() }
    }

    /// Create a new scheduler-failure error.
    pub fn scheduler_failed(reason: impl Into<String>) -> Self {
        Self::SchedulerFailed { reason: reason.into() }
    }

    /// Create a new internal error.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError { message: message.into() }
    }

    /// Whether the caller can reasonably retry after this error.
    ///
    /// Configuration and internal-assertion errors are never recoverable —
    /// they indicate a caller or implementation bug. `BudgetInfeasible` is
    /// fatal to the stream (the chosen bitrate simply cannot carry the
    /// content) but is not an implementation bug. `InputFormatMismatch` is
    /// recoverable: the caller can resubmit correctly-sized input.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ConfigInvalid { .. }
            | Self::InternalAssertion { .. }
            | Self::InternalError { .. } => false,
            Self::BudgetInfeasible { .. } | Self::SchedulerFailed { .. } => false,
            Self::InputFormatMismatch { .. } => true,
        }
    }

    /// Get the error category, used by the scheduler to group ABORT causes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigInvalid { .. } => ErrorCategory::Configuration,
            Self::BudgetInfeasible { .. } => ErrorCategory::Allocation,
            Self::InputFormatMismatch { .. } => ErrorCategory::Processing,
            Self::InternalAssertion { .. } => ErrorCategory::Packing,
            Self::SchedulerFailed { .. } => ErrorCategory::Scheduling,
            Self::InternalError { .. } => ErrorCategory::Internal,
        }
    }
}

/// Error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration and parameter errors.
    Configuration,
    /// Bit-allocation search failures.
    Allocation,
    /// Per-frame DSP/processing errors.
    Processing,
    /// Bit-packer errors.
    Packing,
    /// Frame-scheduler/worker-pool errors.
    Scheduling,
    /// Internal library errors.
    Internal,
}
