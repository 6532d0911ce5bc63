use tperiod_core::{Result, Segment, Timestamp};

/// Segments and validity bounds of a single time period.
///
/// The store itself is not synchronised; [`TimePeriod`](crate::TimePeriod)
/// wraps it in a mutex and every public operation there holds that lock.
#[derive(Debug, Clone, Default)]
pub struct SegmentStore {
    valid_begin: Option<Timestamp>,
    valid_end: Option<Timestamp>,
    /// Unordered; insertion order carries no meaning.
    segments: Vec<Segment>,
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid_begin(&self) -> Option<Timestamp> {
        self.valid_begin
    }

    pub fn valid_end(&self) -> Option<Timestamp> {
        self.valid_end
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Merge `[begin, end]` into the store.
    ///
    /// Single pass, first match: the first segment that contains, right-overlaps
    /// or left-overlaps the new range absorbs it and the scan stops. A range that
    /// bridges two segments therefore merges with only one of them.
    pub fn add(&mut self, begin: Timestamp, end: Timestamp) -> Result<()> {
        Segment::new(begin, end)?;
        self.widen(begin, end);

        for seg in self.segments.iter_mut() {
            if seg.covers(begin, end) {
                return Ok(());
            }

            if seg.begin <= begin && seg.end >= begin {
                seg.end = end;
                return Ok(());
            }

            if seg.begin >= begin && seg.begin <= end {
                seg.begin = begin;
                return Ok(());
            }
        }

        self.segments.push(Segment { begin, end });
        Ok(())
    }

    /// Cut `[begin, end]` out of the store.
    ///
    /// Contained segments are dropped and straddling ones clamped to the range
    /// boundary. A segment that encloses the whole range is left as it is.
    pub fn remove(&mut self, begin: Timestamp, end: Timestamp) -> Result<()> {
        Segment::new(begin, end)?;
        self.widen(begin, end);

        self.segments.retain_mut(|seg| {
            if seg.begin >= begin && seg.end <= end {
                return false;
            }

            if seg.end < begin || seg.begin > end {
                return true;
            }

            if seg.begin > begin && seg.begin < end {
                seg.begin = end;
            }

            if seg.end > begin && seg.end < end {
                seg.end = begin;
            }

            true
        });
        Ok(())
    }

    /// Forget every segment that ended before `cutoff` and raise the validity
    /// start to `cutoff`.
    ///
    /// No-op while the store has never been filled or when `cutoff` is already
    /// behind the validity start.
    pub fn purge(&mut self, cutoff: Timestamp) {
        let Some(valid_begin) = self.valid_begin else {
            return;
        };
        if cutoff < valid_begin {
            return;
        }

        self.valid_begin = Some(cutoff);
        self.segments.retain(|seg| seg.end >= cutoff);
    }

    /// Replace the contents of `[begin, end]` with `fresh`.
    ///
    /// Everything is validated before the first mutation, so an error leaves
    /// the store untouched.
    pub fn replace_region(
        &mut self,
        begin: Timestamp,
        end: Timestamp,
        fresh: &[Segment],
    ) -> Result<()> {
        Segment::new(begin, end)?;
        for seg in fresh {
            seg.validate()?;
        }

        self.remove(begin, end)?;
        for seg in fresh {
            self.add(seg.begin, seg.end)?;
        }
        Ok(())
    }

    /// Fail-open membership test.
    ///
    /// Anything outside `[valid_begin, valid_end]`, or any instant while either
    /// bound is unset, counts as inside.
    pub fn is_inside(&self, ts: Timestamp) -> bool {
        match (self.valid_begin, self.valid_end) {
            (Some(vb), Some(ve)) if ts >= vb && ts <= ve => {
                self.segments.iter().any(|seg| seg.contains(ts))
            }
            _ => true,
        }
    }

    /// Smallest segment boundary strictly after `ts`.
    pub fn find_next_transition(&self, ts: Timestamp) -> Option<Timestamp> {
        self.segments
            .iter()
            .flat_map(|seg| [seg.begin, seg.end])
            .filter(|&boundary| boundary > ts)
            .min()
    }

    fn widen(&mut self, begin: Timestamp, end: Timestamp) {
        if self.valid_begin.map_or(true, |vb| begin < vb) {
            self.valid_begin = Some(begin);
        }
        if self.valid_end.map_or(true, |ve| end > ve) {
            self.valid_end = Some(end);
        }
    }
}
