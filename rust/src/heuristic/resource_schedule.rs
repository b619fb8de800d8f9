//! Resource timeline tracking with sorted, non-overlapping busy periods.

use crate::calendar::Calendar;
use crate::models::Time;

/// Tracks busy periods for a resource using sorted, non-overlapping intervals.
///
/// Busy periods are half-open `[start, end)` and cover both calendar
/// blackouts and committed assignments. Invariant: sorted by start, with
/// overlapping or touching periods merged, which enables binary search.
#[derive(Clone, Debug)]
pub struct ResourceSchedule {
    /// Resource id (for debugging)
    pub resource_id: String,
    busy_periods: Vec<(Time, Time)>,
}

impl ResourceSchedule {
    /// Create a resource schedule seeded with the resource's blackouts.
    pub fn new(resource_id: impl Into<String>, calendar: &Calendar) -> Self {
        Self {
            resource_id: resource_id.into(),
            busy_periods: Self::merge_periods(calendar.blackouts().to_vec()),
        }
    }

    /// Merge overlapping or touching periods into a sorted, non-overlapping list.
    fn merge_periods(mut periods: Vec<(Time, Time)>) -> Vec<(Time, Time)> {
        periods.sort_unstable();
        let mut merged: Vec<(Time, Time)> = Vec::with_capacity(periods.len());

        for (start, end) in periods {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }

        merged
    }

    /// Add a busy period, merging with existing periods if they overlap or touch.
    pub fn add_busy_period(&mut self, start: Time, end: Time) {
        if start >= end {
            return;
        }

        // Find insertion point using binary search
        let idx = self.busy_periods.partition_point(|&(s, _)| s < start);

        let mut new_start = start;
        let mut new_end = end;
        let mut merge_start = idx;
        let mut merge_end = idx;

        if idx > 0 {
            let (prev_start, prev_end) = self.busy_periods[idx - 1];
            if prev_end >= start {
                new_start = prev_start;
                new_end = new_end.max(prev_end);
                merge_start = idx - 1;
            }
        }

        while merge_end < self.busy_periods.len() {
            let (next_start, next_end) = self.busy_periods[merge_end];
            if next_start <= new_end {
                new_end = new_end.max(next_end);
                merge_end += 1;
            } else {
                break;
            }
        }

        self.busy_periods.drain(merge_start..merge_end);
        self.busy_periods.insert(merge_start, (new_start, new_end));
    }

    /// Earliest start at or after `from` of a contiguous free slot of
    /// `duration` units.
    ///
    /// The timeline is unbounded, so a slot always exists.
    pub fn earliest_slot(&self, from: Time, duration: Time) -> Time {
        let mut candidate = from;
        let mut idx = self.busy_periods.partition_point(|&(_, end)| end <= candidate);

        while let Some(&(busy_start, busy_end)) = self.busy_periods.get(idx) {
            if candidate + duration <= busy_start {
                return candidate;
            }
            candidate = candidate.max(busy_end);
            idx += 1;
        }

        candidate
    }
}
