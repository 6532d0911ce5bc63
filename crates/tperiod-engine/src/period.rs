use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Duration;
use tperiod_core::types::LOG_TIME_FORMAT;
use tperiod_core::{PeriodError, PeriodName, Result, Segment, Timestamp};
use tracing::{debug, error, info, instrument, warn};

use crate::error::PolicyError;
use crate::policy::UpdatePolicy;
use crate::snapshot::PeriodSnapshot;
use crate::store::SegmentStore;

/// What [`TimePeriod::update_region`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The window was already covered; the policy was not consulted.
    Skipped,
    /// The window `[begin, end]` was recomputed and spliced in.
    Updated {
        begin: Timestamp,
        end: Timestamp,
        segments: usize,
    },
}

/// A named set of active intervals, kept up to date by its [`UpdatePolicy`].
///
/// All reads and writes go through one per-period mutex; periods never share
/// a lock, so they mutate and answer queries independently of each other.
pub struct TimePeriod {
    name: PeriodName,
    alias: Option<String>,
    policy: Arc<dyn UpdatePolicy>,
    store: Mutex<SegmentStore>,
    /// Set while a background refresh of this period is in flight.
    refreshing: AtomicBool,
}

impl std::fmt::Debug for TimePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimePeriod")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("policy", &self.policy.kind())
            .finish_non_exhaustive()
    }
}

impl TimePeriod {
    pub fn new(name: impl Into<PeriodName>, policy: Arc<dyn UpdatePolicy>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            policy,
            store: Mutex::new(SegmentStore::new()),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn name(&self) -> &PeriodName {
        &self.name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn policy_kind(&self) -> &str {
        self.policy.kind()
    }

    pub fn valid_begin(&self) -> Option<Timestamp> {
        self.store().valid_begin()
    }

    pub fn valid_end(&self) -> Option<Timestamp> {
        self.store().valid_end()
    }

    /// Copy of the stored segments, in store order.
    pub fn segments(&self) -> Vec<Segment> {
        self.store().segments().to_vec()
    }

    // --- mutations -----------------------------------------------------------

    pub fn add_segment(&self, begin: Timestamp, end: Timestamp) -> Result<()> {
        debug!(
            period = %self.name,
            begin = %begin.format(LOG_TIME_FORMAT),
            end = %end.format(LOG_TIME_FORMAT),
            "adding segment"
        );
        self.store().add(begin, end)
    }

    pub fn remove_segment(&self, begin: Timestamp, end: Timestamp) -> Result<()> {
        debug!(
            period = %self.name,
            begin = %begin.format(LOG_TIME_FORMAT),
            end = %end.format(LOG_TIME_FORMAT),
            "removing segment"
        );
        self.store().remove(begin, end)
    }

    pub fn purge_segments(&self, cutoff: Timestamp) {
        debug!(
            period = %self.name,
            cutoff = %cutoff.format(LOG_TIME_FORMAT),
            "purging segments"
        );
        self.store().purge(cutoff);
    }

    /// Recompute `[begin, end]` with the update policy and splice the result in.
    ///
    /// Unless `clear_existing` is set, the window is first trimmed so it starts
    /// at the current validity end, and nothing happens if it ends before it.
    ///
    /// The policy runs without the period lock held. If it fails, or returns a
    /// segment with `begin > end`, the stored segments are left untouched and
    /// the error is returned. Policy errors are logged here, once.
    #[instrument(skip(self), fields(period = %self.name, policy = self.policy.kind()))]
    pub fn update_region(
        &self,
        mut begin: Timestamp,
        end: Timestamp,
        clear_existing: bool,
    ) -> Result<UpdateOutcome> {
        if !clear_existing {
            let valid_end = self.store().valid_end();
            if let Some(valid_end) = valid_end {
                if begin < valid_end {
                    begin = valid_end;
                }
                if end < valid_end {
                    debug!("window already covered, skipping update");
                    return Ok(UpdateOutcome::Skipped);
                }
            }
        }
        Segment::new(begin, end)?;

        let fresh = match self.compute(begin, end) {
            Ok(fresh) => fresh,
            Err(e @ PolicyError::Malformed { .. }) => {
                warn!(error = %e, "rejected update policy output; keeping existing segments");
                return Err(e.into());
            }
            Err(e) => {
                error!(error = %e, "update policy failed; keeping existing segments");
                return Err(e.into());
            }
        };

        let count = fresh.len();
        {
            let mut store = self.store();
            store.replace_region(begin, end, &fresh)?;
        }

        debug!(
            begin = %begin.format(LOG_TIME_FORMAT),
            end = %end.format(LOG_TIME_FORMAT),
            segments = count,
            "region updated"
        );
        Ok(UpdateOutcome::Updated {
            begin,
            end,
            segments: count,
        })
    }

    /// Fill the next `horizon` from `now`, discarding anything stored there.
    ///
    /// Called once when the period is registered.
    pub fn start(&self, now: Timestamp, horizon: Duration) -> Result<UpdateOutcome> {
        info!(period = %self.name, policy = self.policy.kind(), "pre-filling time period");
        let end = shift(now, horizon)?;
        let outcome = self.update_region(now, end, true);
        self.dump();
        outcome
    }

    /// One background maintenance pass: forget history older than `retention`
    /// and roll the validity window forward to `now + horizon`.
    ///
    /// A period that has never been filled is reconciled from `now`.
    pub fn refresh(
        &self,
        now: Timestamp,
        retention: Duration,
        horizon: Duration,
    ) -> Result<UpdateOutcome> {
        let cutoff = shift(now, -retention)?;
        let end = shift(now, horizon)?;
        let valid_end = {
            let mut store = self.store();
            store.purge(cutoff);
            store.valid_end()
        };

        let outcome = self.update_region(valid_end.unwrap_or(now), end, false);
        self.dump();
        outcome
    }

    // --- queries -------------------------------------------------------------

    /// Whether `ts` falls inside an active segment.
    ///
    /// Instants outside the validity window count as active.
    pub fn is_inside(&self, ts: Timestamp) -> bool {
        self.store().is_inside(ts)
    }

    /// The next segment boundary strictly after `ts`, if any.
    pub fn find_next_transition(&self, ts: Timestamp) -> Option<Timestamp> {
        self.store().find_next_transition(ts)
    }

    pub fn snapshot(&self, now: Timestamp) -> PeriodSnapshot {
        let store = self.store();
        let mut segments = store.segments().to_vec();
        segments.sort_by_key(|s| s.begin);
        PeriodSnapshot {
            name: self.name.clone(),
            alias: self.alias.clone(),
            policy: self.policy.kind().to_string(),
            valid_begin: store.valid_begin(),
            valid_end: store.valid_end(),
            is_inside: store.is_inside(now),
            segments,
        }
    }

    /// Log the validity window and every segment at debug level.
    pub fn dump(&self) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }

        let store = self.store();
        debug!(
            period = %self.name,
            valid_begin = %fmt_bound(store.valid_begin()),
            valid_end = %fmt_bound(store.valid_end()),
            segments = store.len(),
            "dumping time period"
        );
        for seg in store.segments() {
            debug!(period = %self.name, segment = %seg, "segment");
        }
    }

    // --- background refresh bookkeeping --------------------------------------

    /// Claim the period for a background refresh.
    ///
    /// Returns `None` while an earlier refresh is still running; the claim is
    /// released when the guard drops.
    pub fn try_begin_refresh(self: &Arc<Self>) -> Option<RefreshGuard> {
        self.refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(RefreshGuard {
            period: Arc::clone(self),
        })
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    // --- private helpers -----------------------------------------------------

    fn compute(
        &self,
        begin: Timestamp,
        end: Timestamp,
    ) -> std::result::Result<Vec<Segment>, PolicyError> {
        let fresh = self.policy.compute(begin, end)?;
        if let Some(bad) = fresh.iter().find(|s| !s.is_well_formed()) {
            return Err(PolicyError::Malformed {
                begin: bad.begin,
                end: bad.end,
            });
        }
        Ok(fresh)
    }

    fn store(&self) -> MutexGuard<'_, SegmentStore> {
        // Store operations validate before mutating, so a panic elsewhere
        // cannot leave a half-applied change behind.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive claim on a period's background refresh; see
/// [`TimePeriod::try_begin_refresh`].
pub struct RefreshGuard {
    period: Arc<TimePeriod>,
}

impl RefreshGuard {
    pub fn period(&self) -> &Arc<TimePeriod> {
        &self.period
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.period.refreshing.store(false, Ordering::Release);
    }
}

/// `ts + delta`, or a config error when the result leaves the representable range.
fn shift(ts: Timestamp, delta: Duration) -> Result<Timestamp> {
    ts.checked_add_signed(delta).ok_or_else(|| {
        PeriodError::Config(format!(
            "window of {}s from {} is out of range",
            delta.num_seconds(),
            ts.format(LOG_TIME_FORMAT)
        ))
    })
}

fn fmt_bound(bound: Option<Timestamp>) -> String {
    bound
        .map(|ts| ts.format(LOG_TIME_FORMAT).to_string())
        .unwrap_or_else(|| "unset".to_string())
}
