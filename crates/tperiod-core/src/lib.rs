//! `tperiod-core` — shared vocabulary for the time-period engine.
//!
//! Holds the [`Timestamp`] and [`Segment`] types every other crate speaks,
//! the workspace-wide [`PeriodError`], and the figment-backed
//! [`config::TperiodConfig`].

pub mod config;
pub mod error;
pub mod types;

pub use error::{PeriodError, Result};
pub use types::{PeriodName, Segment, Timestamp};
