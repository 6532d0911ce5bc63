use std::sync::Arc;

use chrono::Duration;
use dashmap::{mapref::entry::Entry, DashMap};
use tperiod_core::config::PeriodConfig;
use tperiod_core::{PeriodError, Result, Timestamp};
use tracing::{info, warn};

use crate::period::TimePeriod;
use crate::policy::build_policy;
use crate::snapshot::PeriodSnapshot;

/// Every live time period, keyed by name.
///
/// Owned by the application's composition root and shared as
/// `Arc<PeriodRegistry>` with the refresher and with query callers. Lookups
/// hand out `Arc<TimePeriod>` clones, so no map shard stays locked while a
/// period is queried or refreshed.
pub struct PeriodRegistry {
    periods: DashMap<String, Arc<TimePeriod>>,
}

impl PeriodRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            periods: DashMap::new(),
        }
    }

    /// Build a registry from configuration, pre-filling every period.
    pub fn from_config(
        periods: &[PeriodConfig],
        now: Timestamp,
        horizon: Duration,
    ) -> Result<Self> {
        let registry = Self::new();
        for cfg in periods {
            let policy = build_policy(&cfg.policy)?;
            let mut period = TimePeriod::new(cfg.name.as_str(), policy);
            if let Some(ref alias) = cfg.alias {
                period = period.with_alias(alias.clone());
            }
            registry.register(period, now, horizon)?;
        }
        Ok(registry)
    }

    /// Pre-fill `period` for `[now, now + horizon]` and add it.
    ///
    /// A failed pre-fill is logged and the period is registered anyway: it
    /// answers fail-open until the refresher fills it. A name that is already
    /// taken is rejected with `DuplicatePeriod`.
    pub fn register(
        &self,
        period: TimePeriod,
        now: Timestamp,
        horizon: Duration,
    ) -> Result<Arc<TimePeriod>> {
        let name = period.name().to_string();
        if self.periods.contains_key(&name) {
            return Err(PeriodError::DuplicatePeriod { name });
        }

        let period = Arc::new(period);
        // The policy runs here, outside any map shard lock.
        prefill(&period, now, horizon);

        match self.periods.entry(name.clone()) {
            Entry::Occupied(_) => Err(PeriodError::DuplicatePeriod { name }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&period));
                info!(period = %name, policy = period.policy_kind(), "time period registered");
                Ok(period)
            }
        }
    }

    /// Pre-fill `period` and swap it in, returning the instance it replaced.
    ///
    /// Used on configuration reload.
    pub fn replace(
        &self,
        period: TimePeriod,
        now: Timestamp,
        horizon: Duration,
    ) -> Option<Arc<TimePeriod>> {
        let name = period.name().to_string();
        let period = Arc::new(period);
        prefill(&period, now, horizon);
        let previous = self.periods.insert(name.clone(), period);
        info!(period = %name, replaced = previous.is_some(), "time period replaced");
        previous
    }

    /// Remove a period by name. Returns `None` if the name is not registered.
    pub fn unregister(&self, name: &str) -> Option<Arc<TimePeriod>> {
        let removed = self.periods.remove(name).map(|(_, period)| period);
        if removed.is_some() {
            info!(period = %name, "time period unregistered");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Result<Arc<TimePeriod>> {
        self.periods
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| PeriodError::PeriodNotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.periods.contains_key(name)
    }

    /// Registered names, sorted for deterministic output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.periods.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Every live period, cloned out of the map so callers hold no shard lock.
    pub fn periods(&self) -> Vec<Arc<TimePeriod>> {
        self.periods.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Name-addressed [`TimePeriod::is_inside`].
    pub fn is_inside(&self, name: &str, ts: Timestamp) -> Result<bool> {
        Ok(self.get(name)?.is_inside(ts))
    }

    /// Name-addressed [`TimePeriod::find_next_transition`].
    pub fn find_next_transition(&self, name: &str, ts: Timestamp) -> Result<Option<Timestamp>> {
        Ok(self.get(name)?.find_next_transition(ts))
    }

    /// Snapshot every period at `now`, sorted by name.
    pub fn snapshots(&self, now: Timestamp) -> Vec<PeriodSnapshot> {
        let mut snapshots: Vec<PeriodSnapshot> =
            self.periods().iter().map(|p| p.snapshot(now)).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// [`snapshots`](Self::snapshots) rendered as pretty-printed JSON.
    pub fn snapshots_json(&self, now: Timestamp) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshots(now))?)
    }
}

/// Pre-fill a period about to be registered. Policy failures were already
/// logged by `update_region`.
fn prefill(period: &TimePeriod, now: Timestamp, horizon: Duration) {
    match period.start(now, horizon) {
        Err(e) if !e.is_policy() => {
            warn!(
                period = %period.name(),
                error = %e,
                code = e.code(),
                "pre-fill failed; period fails open until next refresh"
            );
        }
        _ => {}
    }
}

impl Default for PeriodRegistry {
    fn default() -> Self {
        Self::new()
    }
}
