use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PeriodError, Result};

/// Every instant the engine handles is a UTC wall-clock time.
pub type Timestamp = DateTime<Utc>;

/// Format used when a timestamp is rendered into a log line.
pub const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Unique identifier of a time period (e.g. `"24x7"`, `"business-hours"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeriodName(pub String);

impl PeriodName {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PeriodName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PeriodName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One contiguous stretch of active time, `[begin, end)`.
///
/// Fields are public so update policies can build segments directly; the
/// store rejects any value with `begin > end` before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub begin: Timestamp,
    pub end: Timestamp,
}

impl Segment {
    /// Build a segment, rejecting `begin > end`.
    pub fn new(begin: Timestamp, end: Timestamp) -> Result<Self> {
        let segment = Self { begin, end };
        segment.validate()?;
        Ok(segment)
    }

    pub fn is_well_formed(&self) -> bool {
        self.begin <= self.end
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_well_formed() {
            Ok(())
        } else {
            Err(PeriodError::InvalidSegment {
                begin: self.begin,
                end: self.end,
            })
        }
    }

    /// Open-interval membership: a timestamp on either boundary is outside.
    pub fn contains(&self, ts: Timestamp) -> bool {
        ts > self.begin && ts < self.end
    }

    /// True when `[begin, end]` lies entirely within this segment.
    pub fn covers(&self, begin: Timestamp, end: Timestamp) -> bool {
        self.begin <= begin && self.end >= end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.begin
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' <-> '{}'",
            self.begin.format(LOG_TIME_FORMAT),
            self.end.format(LOG_TIME_FORMAT)
        )
    }
}
