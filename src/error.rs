use chrono::NaiveDate;
use thiserror::Error;

/// Error taxonomy for the tuning pipeline.
///
/// Only `InvalidConfiguration` is treated as fail-fast at the public API
/// boundary; everything else is recovered locally or converted into a
/// report entry by the workflow.
#[derive(Debug, Error)]
pub enum TunerError {
    /// A source had no data for a date. The pipeline continues with
    /// whatever data it did get.
    #[error("no data available for {date} from {origin}")]
    DataUnavailable { date: NaiveDate, origin: String },

    /// A prediction and its result could not be paired up, or paired
    /// series disagree on length. Reported as a diagnostic, never fatal.
    #[error("alignment mismatch: {0}")]
    AlignmentMismatch(String),

    /// Below the minimum sample for a computation (ML optimization,
    /// a CV fold). Short-circuits only that computation.
    #[error("insufficient sample: {have} games, need at least {need}")]
    InsufficientSample { have: usize, need: usize },

    /// The parameter backend could not be read or written. Triggers an
    /// automatic rollback and surfaces as a hard step failure.
    #[error("parameter persistence failed: {0}")]
    ParameterPersistence(String),

    /// Malformed adjustment map or unknown strategy name. Rejected
    /// before any mutation takes place.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, TunerError>;

impl TunerError {
    /// True when the workflow should substitute a fallback and keep going.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TunerError::InvalidConfiguration(_))
    }
}
