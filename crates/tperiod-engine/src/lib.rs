//! `tperiod-engine` — interval algebra behind every time period.
//!
//! # Overview
//!
//! A [`TimePeriod`] owns a [`store::SegmentStore`] behind its own mutex and an
//! [`UpdatePolicy`] that computes fresh segments for a window on demand.
//! [`TimePeriod::update_region`] calls the policy outside the lock and splices
//! the result in under it, so slow policies never block queries.
//!
//! [`PeriodRegistry`] maps names to live periods; it is what the refresher in
//! `tperiod-scheduler` fans out over and what other subsystems query by name.
//!
//! # Known limitations kept on purpose
//!
//! | Operation        | Behaviour                                                     |
//! |------------------|---------------------------------------------------------------|
//! | `add_segment`    | single pass, first match; a bridging range merges only once   |
//! | `remove_segment` | clamps straddling segments, never splits an enclosing one     |
//! | `is_inside`      | fail-open: outside the validity window everything is active   |

pub mod error;
pub mod period;
pub mod policy;
pub mod registry;
pub mod snapshot;
pub mod store;

pub use error::PolicyError;
pub use period::{RefreshGuard, TimePeriod, UpdateOutcome};
pub use policy::{build_policy, AlwaysPolicy, FnPolicy, NeverPolicy, UpdatePolicy, WeeklyPolicy};
pub use registry::PeriodRegistry;
pub use snapshot::PeriodSnapshot;
pub use store::SegmentStore;
