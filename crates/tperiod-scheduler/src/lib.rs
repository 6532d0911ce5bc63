//! `tperiod-scheduler` — background refresher for live time periods.
//!
//! # Overview
//!
//! [`Refresher`] ticks on a fixed cadence (300 s by default). Each tick walks
//! the [`PeriodRegistry`](tperiod_engine::PeriodRegistry) and, per period,
//! purges history older than the retention window and rolls the validity
//! window forward to `now + horizon`.
//!
//! Every period is refreshed on its own blocking task, so a policy that hangs
//! stalls only its own period. A period whose previous refresh is still
//! running is skipped until that refresh returns.

pub mod engine;
pub mod error;

pub use engine::{Refresher, RefresherHandle};
pub use error::{Result, SchedulerError};
