use thiserror::Error;

use crate::types::Timestamp;

#[derive(Debug, Error)]
pub enum PeriodError {
    #[error("Invalid segment: begin {begin} is after end {end}")]
    InvalidSegment { begin: Timestamp, end: Timestamp },

    #[error("Time period not found: {name}")]
    PeriodNotFound { name: String },

    #[error("Time period already registered: {name}")]
    DuplicatePeriod { name: String },

    #[error("Update policy error: {0}")]
    Policy(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PeriodError {
    /// Short, stable error code used as a structured log field.
    pub fn code(&self) -> &'static str {
        match self {
            PeriodError::InvalidSegment { .. } => "INVALID_SEGMENT",
            PeriodError::PeriodNotFound { .. } => "PERIOD_NOT_FOUND",
            PeriodError::DuplicatePeriod { .. } => "DUPLICATE_PERIOD",
            PeriodError::Policy(_) => "POLICY_ERROR",
            PeriodError::Config(_) => "CONFIG_ERROR",
            PeriodError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// True for failures reported by an update policy. These are logged where
    /// the policy ran, so callers need not log them again.
    pub fn is_policy(&self) -> bool {
        matches!(self, PeriodError::Policy(_))
    }
}

pub type Result<T> = std::result::Result<T, PeriodError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_policy_errors_report_is_policy() {
        assert!(PeriodError::Policy("down".to_string()).is_policy());
        assert!(!PeriodError::Config("bad".to_string()).is_policy());
        assert!(!PeriodError::PeriodNotFound { name: "x".to_string() }.is_policy());
    }
}
