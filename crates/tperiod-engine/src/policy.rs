use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use tperiod_core::config::{PolicyConfig, WindowConfig};
use tperiod_core::{Segment, Timestamp};

use crate::error::PolicyError;

/// Computes the active segments of a period for a requested window.
///
/// Implementations only compute: they never touch the segment store. The
/// engine may call `compute` for the same window more than once and treats the
/// answers as interchangeable. Calls run on a blocking thread, so an
/// implementation is free to do slow work.
pub trait UpdatePolicy: Send + Sync {
    /// Short label for logs (e.g. `"weekly"`).
    fn kind(&self) -> &str;

    /// Return the active sub-ranges of `[begin, end]`, possibly none.
    fn compute(&self, begin: Timestamp, end: Timestamp) -> Result<Vec<Segment>, PolicyError>;
}

/// Active across every requested window.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPolicy;

impl UpdatePolicy for AlwaysPolicy {
    fn kind(&self) -> &str {
        "always"
    }

    fn compute(&self, begin: Timestamp, end: Timestamp) -> Result<Vec<Segment>, PolicyError> {
        Ok(vec![Segment { begin, end }])
    }
}

/// Never active.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverPolicy;

impl UpdatePolicy for NeverPolicy {
    fn kind(&self) -> &str {
        "never"
    }

    fn compute(&self, _begin: Timestamp, _end: Timestamp) -> Result<Vec<Segment>, PolicyError> {
        Ok(Vec::new())
    }
}

/// Adapts a closure into an [`UpdatePolicy`].
pub struct FnPolicy<F> {
    kind: String,
    f: F,
}

impl<F> FnPolicy<F>
where
    F: Fn(Timestamp, Timestamp) -> Result<Vec<Segment>, PolicyError> + Send + Sync,
{
    pub fn new(kind: impl Into<String>, f: F) -> Self {
        Self {
            kind: kind.into(),
            f,
        }
    }
}

impl<F> UpdatePolicy for FnPolicy<F>
where
    F: Fn(Timestamp, Timestamp) -> Result<Vec<Segment>, PolicyError> + Send + Sync,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    fn compute(&self, begin: Timestamp, end: Timestamp) -> Result<Vec<Segment>, PolicyError> {
        (self.f)(begin, end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Window {
    day: Option<Weekday>,
    start: NaiveTime,
    end: NaiveTime,
}

/// Active inside a fixed set of weekly time-of-day windows (UTC).
#[derive(Debug, Clone)]
pub struct WeeklyPolicy {
    windows: Vec<Window>,
}

impl WeeklyPolicy {
    pub fn new(windows: &[WindowConfig]) -> Result<Self, PolicyError> {
        let windows = windows
            .iter()
            .map(|w| {
                let day = w.day.map(weekday_from_index).transpose()?;
                let start = time_of_day(w.start_hour, w.start_minute)?;
                let end = time_of_day(w.end_hour, w.end_minute)?;
                Ok(Window { day, start, end })
            })
            .collect::<Result<Vec<_>, PolicyError>>()?;
        Ok(Self { windows })
    }
}

impl UpdatePolicy for WeeklyPolicy {
    fn kind(&self) -> &str {
        "weekly"
    }

    fn compute(&self, begin: Timestamp, end: Timestamp) -> Result<Vec<Segment>, PolicyError> {
        let mut segments = Vec::new();

        // Start one day early so a window running past midnight into `begin`
        // is picked up.
        let mut day = (begin - Duration::days(1)).date_naive();
        let last = end.date_naive();

        while day <= last {
            for window in &self.windows {
                if window.day.is_some_and(|d| d != day.weekday()) {
                    continue;
                }

                let start = Utc.from_utc_datetime(&day.and_time(window.start));
                let mut stop = Utc.from_utc_datetime(&day.and_time(window.end));
                if stop <= start {
                    // Runs past midnight into the next day.
                    stop += Duration::days(1);
                }

                let seg_begin = start.max(begin);
                let seg_end = stop.min(end);
                if seg_begin < seg_end {
                    segments.push(Segment {
                        begin: seg_begin,
                        end: seg_end,
                    });
                }
            }

            day = day
                .succ_opt()
                .ok_or_else(|| PolicyError::Failed(format!("date overflow after {day}")))?;
        }

        segments.sort_by_key(|s| s.begin);
        Ok(segments)
    }
}

/// Build the policy a configured period asks for.
pub fn build_policy(config: &PolicyConfig) -> Result<Arc<dyn UpdatePolicy>, PolicyError> {
    let policy: Arc<dyn UpdatePolicy> = match config {
        PolicyConfig::Always => Arc::new(AlwaysPolicy),
        PolicyConfig::Never => Arc::new(NeverPolicy),
        PolicyConfig::Weekly { windows } => Arc::new(WeeklyPolicy::new(windows)?),
    };
    Ok(policy)
}

/// ISO weekday numbering: 0 = Monday … 6 = Sunday.
fn weekday_from_index(index: u8) -> Result<Weekday, PolicyError> {
    const DAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
    DAYS.get(index as usize)
        .copied()
        .ok_or_else(|| PolicyError::InvalidDefinition(format!("weekday out of range: {index}")))
}

fn time_of_day(hour: u8, minute: u8) -> Result<NaiveTime, PolicyError> {
    NaiveTime::from_hms_opt(hour as u32, minute as u32, 0).ok_or_else(|| {
        PolicyError::InvalidDefinition(format!("invalid time of day: {hour:02}:{minute:02}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).single().expect("valid date")
    }

    fn window(day: Option<u8>, sh: u8, sm: u8, eh: u8, em: u8) -> WindowConfig {
        WindowConfig {
            day,
            start_hour: sh,
            start_minute: sm,
            end_hour: eh,
            end_minute: em,
        }
    }

    #[test]
    fn always_covers_window() {
        let (b, e) = (at(2026, 3, 2, 0, 0), at(2026, 3, 3, 0, 0));
        assert_eq!(AlwaysPolicy.compute(b, e).unwrap(), vec![Segment { begin: b, end: e }]);
    }

    #[test]
    fn never_is_empty() {
        let (b, e) = (at(2026, 3, 2, 0, 0), at(2026, 3, 3, 0, 0));
        assert!(NeverPolicy.compute(b, e).unwrap().is_empty());
    }

    #[test]
    fn daily_window_repeats_each_day() {
        let policy = WeeklyPolicy::new(&[window(None, 9, 0, 17, 0)]).unwrap();
        // 2026-03-02 is a Monday.
        let segs = policy
            .compute(at(2026, 3, 2, 0, 0), at(2026, 3, 4, 0, 0))
            .unwrap();
        assert_eq!(
            segs,
            vec![
                Segment { begin: at(2026, 3, 2, 9, 0), end: at(2026, 3, 2, 17, 0) },
                Segment { begin: at(2026, 3, 3, 9, 0), end: at(2026, 3, 3, 17, 0) },
            ]
        );
    }

    #[test]
    fn weekday_filter_selects_single_day() {
        // Wednesday only.
        let policy = WeeklyPolicy::new(&[window(Some(2), 8, 30, 12, 0)]).unwrap();
        let segs = policy
            .compute(at(2026, 3, 2, 0, 0), at(2026, 3, 9, 0, 0))
            .unwrap();
        assert_eq!(
            segs,
            vec![Segment { begin: at(2026, 3, 4, 8, 30), end: at(2026, 3, 4, 12, 0) }]
        );
    }

    #[test]
    fn segments_are_clipped_to_request() {
        let policy = WeeklyPolicy::new(&[window(None, 9, 0, 17, 0)]).unwrap();
        let segs = policy
            .compute(at(2026, 3, 2, 12, 0), at(2026, 3, 2, 15, 0))
            .unwrap();
        assert_eq!(
            segs,
            vec![Segment { begin: at(2026, 3, 2, 12, 0), end: at(2026, 3, 2, 15, 0) }]
        );
    }

    #[test]
    fn overnight_window_crosses_midnight() {
        let policy = WeeklyPolicy::new(&[window(None, 22, 0, 2, 0)]).unwrap();
        let segs = policy
            .compute(at(2026, 3, 2, 0, 0), at(2026, 3, 3, 0, 0))
            .unwrap();
        assert_eq!(
            segs,
            vec![
                // Tail of the window that started the evening before.
                Segment { begin: at(2026, 3, 2, 0, 0), end: at(2026, 3, 2, 2, 0) },
                Segment { begin: at(2026, 3, 2, 22, 0), end: at(2026, 3, 3, 0, 0) },
            ]
        );
    }

    #[test]
    fn rejects_invalid_definition() {
        assert!(WeeklyPolicy::new(&[window(Some(7), 9, 0, 10, 0)]).is_err());
        assert!(WeeklyPolicy::new(&[window(None, 25, 0, 10, 0)]).is_err());
    }

    #[test]
    fn fn_policy_delegates() {
        let policy = FnPolicy::new("fixed", |b, _e| Ok(vec![Segment { begin: b, end: b }]));
        let b = at(2026, 3, 2, 0, 0);
        assert_eq!(policy.kind(), "fixed");
        assert_eq!(policy.compute(b, b).unwrap().len(), 1);
    }

    #[test]
    fn build_policy_matches_config_kind() {
        assert_eq!(build_policy(&PolicyConfig::Always).unwrap().kind(), "always");
        assert_eq!(build_policy(&PolicyConfig::Never).unwrap().kind(), "never");
        let weekly = PolicyConfig::Weekly { windows: vec![window(None, 1, 0, 2, 0)] };
        assert_eq!(build_policy(&weekly).unwrap().kind(), "weekly");
    }
}
