// End-to-end behaviour of a period through its public API, including the
// merge and removal limitations callers are expected to rely on.

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration};
use tperiod_core::{Segment, Timestamp};
use tperiod_engine::{
    FnPolicy, NeverPolicy, PeriodRegistry, PolicyError, TimePeriod, UpdateOutcome,
};

fn ts(secs: i64) -> Timestamp {
    DateTime::from_timestamp(secs, 0).expect("valid timestamp")
}

fn seg(begin: i64, end: i64) -> Segment {
    Segment {
        begin: ts(begin),
        end: ts(end),
    }
}

#[test]
fn documented_walkthrough() {
    let period = TimePeriod::new("walkthrough", Arc::new(NeverPolicy));
    period.add_segment(ts(100), ts(200)).unwrap();

    // Right-overlap extension.
    period.add_segment(ts(150), ts(300)).unwrap();
    assert_eq!(period.segments(), vec![seg(100, 300)]);

    assert!(period.is_inside(ts(250)));
    assert!(!period.is_inside(ts(300)));

    // A removal range strictly inside the segment does not split it.
    period.remove_segment(ts(120), ts(180)).unwrap();
    assert_eq!(period.segments(), vec![seg(100, 300)]);

    period.purge_segments(ts(150));
    assert_eq!(period.segments(), vec![seg(100, 300)]);
    assert_eq!(period.valid_begin(), Some(ts(150)));
}

#[test]
fn invalid_segments_are_rejected_without_mutation() {
    let period = TimePeriod::new("strict", Arc::new(NeverPolicy));
    period.add_segment(ts(100), ts(200)).unwrap();

    assert_eq!(period.add_segment(ts(300), ts(250)).unwrap_err().code(), "INVALID_SEGMENT");
    assert_eq!(period.remove_segment(ts(180), ts(120)).unwrap_err().code(), "INVALID_SEGMENT");
    assert_eq!(period.segments(), vec![seg(100, 200)]);
    assert_eq!(period.valid_begin(), Some(ts(100)));
    assert_eq!(period.valid_end(), Some(ts(200)));
}

#[test]
fn transitions_walk_the_boundaries_in_order() {
    let period = TimePeriod::new("steps", Arc::new(NeverPolicy));
    period.add_segment(ts(500), ts(600)).unwrap();
    period.add_segment(ts(100), ts(200)).unwrap();
    period.add_segment(ts(300), ts(400)).unwrap();

    let mut cursor = ts(0);
    let mut seen = Vec::new();
    while let Some(next) = period.find_next_transition(cursor) {
        seen.push(next);
        cursor = next;
    }
    assert_eq!(
        seen,
        vec![ts(100), ts(200), ts(300), ts(400), ts(500), ts(600)]
    );
}

#[test]
fn rolling_refresh_keeps_window_moving() {
    // Active for the first half of every 100-second block.
    let policy = FnPolicy::new("blocks", |begin: Timestamp, end: Timestamp| {
        let mut out = Vec::new();
        let mut block = begin.timestamp() / 100 * 100;
        while block < end.timestamp() {
            let b = ts(block).max(begin);
            let e = ts(block + 50).min(end);
            if b < e {
                out.push(Segment { begin: b, end: e });
            }
            block += 100;
        }
        Ok::<_, PolicyError>(out)
    });
    let registry = PeriodRegistry::new();
    let period = registry
        .register(TimePeriod::new("blocks", Arc::new(policy)), ts(0), Duration::seconds(300))
        .unwrap();

    assert!(registry.is_inside("blocks", ts(25)).unwrap());
    assert!(!registry.is_inside("blocks", ts(75)).unwrap());
    assert_eq!(period.valid_end(), Some(ts(300)));

    let outcome = period
        .refresh(ts(250), Duration::seconds(100), Duration::seconds(300))
        .unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            begin: ts(300),
            end: ts(550),
            segments: 3
        }
    );
    assert_eq!(period.valid_begin(), Some(ts(150)));
    assert_eq!(period.valid_end(), Some(ts(550)));
    // History before the purge cutoff is gone and reported fail-open.
    assert!(period.is_inside(ts(75)));
    assert!(period.is_inside(ts(425)));
    assert!(!period.is_inside(ts(475)));

    let mut segs = period.segments();
    segs.sort_by_key(|s| s.begin);
    assert_eq!(
        segs,
        vec![
            // Ends exactly at the purge cutoff, so it is kept.
            seg(100, 150),
            seg(200, 250),
            seg(300, 350),
            seg(400, 450),
            seg(500, 550),
        ]
    );
}

#[test]
fn concurrent_mutation_and_queries() {
    let period = Arc::new(TimePeriod::new("busy", Arc::new(NeverPolicy)));
    period.add_segment(ts(0), ts(10)).unwrap();

    thread::scope(|s| {
        for worker in 0..4i64 {
            let period = Arc::clone(&period);
            s.spawn(move || {
                for i in 0..200i64 {
                    let base = 1_000 + (worker * 200 + i) * 10;
                    period.add_segment(ts(base), ts(base + 5)).unwrap();
                }
            });
        }
        for _ in 0..4 {
            let period = Arc::clone(&period);
            s.spawn(move || {
                for i in 0..500i64 {
                    let _ = period.is_inside(ts(i));
                    let _ = period.find_next_transition(ts(i));
                }
            });
        }
    });

    let segs = period.segments();
    assert_eq!(segs.len(), 1 + 4 * 200);
    assert!(segs.iter().all(|s| s.begin <= s.end));
    assert!(period.is_inside(ts(5)));
    assert!(!period.is_inside(ts(1_007)));
}
