use thiserror::Error;
use tperiod_core::{PeriodError, Timestamp};

/// Errors reported by an [`UpdatePolicy`](crate::policy::UpdatePolicy).
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy could not compute segments for the requested window.
    #[error("Policy failed: {0}")]
    Failed(String),

    /// The policy returned a segment whose begin is after its end.
    #[error("Policy returned malformed segment: {begin} > {end}")]
    Malformed { begin: Timestamp, end: Timestamp },

    /// The policy was built from an invalid definition.
    #[error("Invalid policy definition: {0}")]
    InvalidDefinition(String),
}

impl From<PolicyError> for PeriodError {
    fn from(e: PolicyError) -> Self {
        PeriodError::Policy(e.to_string())
    }
}
