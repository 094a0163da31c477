use thiserror::Error;

/// Errors raised while analyzing an observed devtools log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// No record carried enough timing data for even a coarse RTT
    /// estimate.
    #[error("no timing information available in the record set")]
    NoTimingData,
}
