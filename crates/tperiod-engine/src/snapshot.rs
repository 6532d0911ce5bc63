use serde::{Deserialize, Serialize};
use tperiod_core::{PeriodName, Segment, Timestamp};

/// Point-in-time view of a period, for logs and diagnostics.
///
/// Not a durable format: fields may change between releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSnapshot {
    pub name: PeriodName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Kind of the update policy backing the period.
    pub policy: String,
    pub valid_begin: Option<Timestamp>,
    pub valid_end: Option<Timestamp>,
    /// Result of `is_inside` at the instant the snapshot was taken.
    pub is_inside: bool,
    /// Sorted by `begin`.
    pub segments: Vec<Segment>,
}
