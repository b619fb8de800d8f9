//! Resource calendars: validated blackout ranges and date conversion.

use chrono::{Days, NaiveDate};

use crate::error::ScheduleError;
use crate::models::{Time, UnavailableRange, MAX_TIME};

/// Unavailable periods of one resource.
///
/// Blackouts are stored half-open (`[start, end)`), sorted by start and
/// pairwise disjoint. The resource is available everywhere else.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Calendar {
    blackouts: Vec<(Time, Time)>,
}

impl Calendar {
    /// Calendar with no blackouts.
    pub fn always_available() -> Self {
        Self::default()
    }

    /// Build a calendar from inclusive unavailable ranges of `resource_id`.
    ///
    /// Ranges must have `start_day <= end_day`, must end before `MAX_TIME`
    /// and must not overlap each other; adjacent ranges are fine.
    pub fn from_ranges(
        resource_id: &str,
        ranges: &[&UnavailableRange],
    ) -> Result<Self, ScheduleError> {
        let mut blackouts: Vec<(Time, Time)> = Vec::with_capacity(ranges.len());
        for range in ranges {
            if range.end_day < range.start_day {
                return Err(ScheduleError::MalformedCalendar {
                    resource: resource_id.to_string(),
                    reason: format!(
                        "range [{}, {}] ends before it starts",
                        range.start_day, range.end_day
                    ),
                });
            }
            let blocked = range
                .half_open()
                .filter(|&(_, end)| end <= MAX_TIME)
                .ok_or_else(|| ScheduleError::MalformedCalendar {
                    resource: resource_id.to_string(),
                    reason: format!(
                        "range [{}, {}] ends after day {}",
                        range.start_day,
                        range.end_day,
                        MAX_TIME - 1
                    ),
                })?;
            blackouts.push(blocked);
        }
        blackouts.sort_unstable();

        for pair in blackouts.windows(2) {
            let (prev_start, prev_end) = pair[0];
            let (next_start, next_end) = pair[1];
            if next_start < prev_end {
                return Err(ScheduleError::MalformedCalendar {
                    resource: resource_id.to_string(),
                    reason: format!(
                        "ranges [{}, {}] and [{}, {}] overlap",
                        prev_start,
                        prev_end - 1,
                        next_start,
                        next_end - 1
                    ),
                });
            }
        }

        Ok(Self { blackouts })
    }

    /// Half-open blackout intervals, sorted.
    pub fn blackouts(&self) -> &[(Time, Time)] {
        &self.blackouts
    }

    /// Whether `[start, end)` avoids every blackout.
    pub fn is_free(&self, start: Time, end: Time) -> bool {
        let idx = self.blackouts.partition_point(|&(_, b_end)| b_end <= start);
        match self.blackouts.get(idx) {
            Some(&(b_start, _)) => end <= b_start,
            None => true,
        }
    }

    /// First time unit after the last blackout (0 when there are none).
    pub fn clear_from(&self) -> Time {
        self.blackouts.last().map(|&(_, end)| end.max(0)).unwrap_or(0)
    }
}

/// Day offset of `date` relative to `epoch` (negative before the epoch).
pub fn day_offset(epoch: NaiveDate, date: NaiveDate) -> Time {
    (date - epoch).num_days()
}

/// Calendar date at `offset` days after `epoch`.
///
/// Returns `None` if the offset is negative or outside chrono's date range.
pub fn date_at(epoch: NaiveDate, offset: Time) -> Option<NaiveDate> {
    let days = u64::try_from(offset).ok()?;
    epoch.checked_add_days(Days::new(days))
}

impl UnavailableRange {
    /// Build an unavailable range from inclusive calendar dates.
    pub fn from_dates(
        resource_id: impl Into<String>,
        epoch: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self::new(resource_id, day_offset(epoch, start), day_offset(epoch, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_from_ranges_sorts() {
        let a = UnavailableRange::new("R", 10, 12);
        let b = UnavailableRange::new("R", 2, 4);
        let cal = Calendar::from_ranges("R", &[&a, &b]).unwrap();
        assert_eq!(cal.blackouts(), &[(2, 5), (10, 13)]);
        assert_eq!(cal.clear_from(), 13);
    }

    #[test]
    fn test_adjacent_ranges_allowed() {
        let a = UnavailableRange::new("R", 2, 4);
        let b = UnavailableRange::new("R", 5, 6);
        assert!(Calendar::from_ranges("R", &[&a, &b]).is_ok());
    }

    #[test]
    fn test_overlapping_ranges_rejected() {
        let a = UnavailableRange::new("R", 2, 4);
        let b = UnavailableRange::new("R", 4, 6);
        let err = Calendar::from_ranges("R", &[&a, &b]).unwrap_err();
        assert!(matches!(err, ScheduleError::MalformedCalendar { .. }));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let a = UnavailableRange::new("R", 5, 3);
        assert!(Calendar::from_ranges("R", &[&a]).is_err());
    }

    #[test]
    fn test_range_past_timeline_rejected() {
        let a = UnavailableRange::new("R", 3, Time::MAX);
        let err = Calendar::from_ranges("R", &[&a]).unwrap_err();
        assert!(matches!(err, ScheduleError::MalformedCalendar { .. }));

        let last = UnavailableRange::new("R", 3, MAX_TIME - 1);
        let cal = Calendar::from_ranges("R", &[&last]).unwrap();
        assert_eq!(cal.clear_from(), MAX_TIME);
    }

    #[test]
    fn test_is_free() {
        let a = UnavailableRange::new("R2", 2, 4);
        let cal = Calendar::from_ranges("R2", &[&a]).unwrap();
        assert!(!cal.is_free(0, 3));
        assert!(cal.is_free(0, 2));
        assert!(!cal.is_free(4, 6));
        assert!(cal.is_free(5, 8));
        assert!(Calendar::always_available().is_free(0, 100));
    }

    #[test]
    fn test_date_conversion() {
        let epoch = d(2025, 1, 1);
        assert_eq!(day_offset(epoch, d(2025, 1, 11)), 10);
        assert_eq!(date_at(epoch, 31), Some(d(2025, 2, 1)));
        assert_eq!(date_at(epoch, -1), None);

        let range = UnavailableRange::from_dates("R", epoch, d(2025, 1, 3), d(2025, 1, 5));
        assert_eq!(range, UnavailableRange::new("R", 2, 4));
    }
}
