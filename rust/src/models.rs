//! Core data types for the scheduling system.
//!
//! All times are whole time units (days) relative to the scheduling epoch
//! (t=0). Intervals are half-open: an assignment occupies `[start, end)`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Time in whole units since the scheduling epoch.
pub type Time = i64;

/// Latest time unit the timeline supports. Durations, blackout ends and the
/// serial bound of a whole problem must stay at or below it, so sums of
/// start times cannot overflow.
pub const MAX_TIME: Time = 1 << 40;

/// Resource capability class.
///
/// Ranks are compared as exact tokens; no case folding or prefix matching.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(String);

impl Rank {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Rank {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A task to be scheduled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub duration: Time,
    #[serde(default)]
    pub predecessors: Vec<String>,
    pub acceptable_ranks: Vec<Rank>,
    /// Secondary tie-break after id; ids are unique, so it never decides
    /// the heuristic's order.
    #[serde(default)]
    pub priority: Option<i32>,
}

impl Task {
    pub fn new(id: impl Into<String>, duration: Time) -> Self {
        Self {
            id: id.into(),
            duration,
            predecessors: Vec::new(),
            acceptable_ranks: Vec::new(),
            priority: None,
        }
    }

    pub fn with_predecessor(mut self, id: impl Into<String>) -> Self {
        self.predecessors.push(id.into());
        self
    }

    pub fn with_rank(mut self, rank: impl Into<Rank>) -> Self {
        self.acceptable_ranks.push(rank.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Whether a resource of `rank` may execute this task.
    pub fn accepts(&self, rank: &Rank) -> bool {
        self.acceptable_ranks.iter().any(|r| r == rank)
    }
}

/// A resource that executes at most one task at a time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub rank: Rank,
}

impl Resource {
    pub fn new(id: impl Into<String>, rank: impl Into<Rank>) -> Self {
        Self {
            id: id.into(),
            rank: rank.into(),
        }
    }
}

/// An inclusive range of days during which a resource is unavailable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableRange {
    pub resource_id: String,
    pub start_day: Time,
    pub end_day: Time,
}

impl UnavailableRange {
    pub fn new(resource_id: impl Into<String>, start_day: Time, end_day: Time) -> Self {
        Self {
            resource_id: resource_id.into(),
            start_day,
            end_day,
        }
    }

    /// The blocked interval in half-open form `[start_day, end_day + 1)`.
    ///
    /// `None` if `end_day + 1` does not fit in `Time`.
    pub fn half_open(&self) -> Option<(Time, Time)> {
        Some((self.start_day, self.end_day.checked_add(1)?))
    }
}

/// A task placed on a resource during `[start, end)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub task_id: String,
    pub resource_id: String,
    pub start: Time,
    pub end: Time,
}

impl Assignment {
    pub fn new(
        task_id: impl Into<String>,
        resource_id: impl Into<String>,
        start: Time,
        end: Time,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            resource_id: resource_id.into(),
            start,
            end,
        }
    }

    pub fn overlaps(&self, start: Time, end: Time) -> bool {
        self.start < end && start < self.end
    }
}

/// A set of assignments, at most one per task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub assignments: Vec<Assignment>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_assignment(&mut self, assignment: Assignment) {
        self.assignments.push(assignment);
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn assignment_for_task(&self, task_id: &str) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.task_id == task_id)
    }

    /// Latest end time, 0 for an empty schedule.
    pub fn makespan(&self) -> Time {
        self.assignments.iter().map(|a| a.end).max().unwrap_or(0)
    }

    /// Sort assignments by task id.
    pub fn sort_by_task(&mut self) {
        self.assignments.sort_by(|a, b| a.task_id.cmp(&b.task_id));
    }
}

/// Why a task was left out of the schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// No resource of any acceptable rank exists.
    NoCompatibleResource,
    /// Every eligible resource's calendar blocks the task up to the planning horizon.
    CalendarBlocked,
    /// An ancestor was removed.
    PredecessorRemoved,
}

impl RemovalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalReason::NoCompatibleResource => "no_compatible_resource",
            RemovalReason::CalendarBlocked => "calendar_blocked",
            RemovalReason::PredecessorRemoved => "predecessor_removed",
        }
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedTask {
    pub task_id: String,
    pub reason: RemovalReason,
}

impl RemovedTask {
    pub fn new(task_id: impl Into<String>, reason: RemovalReason) -> Self {
        Self {
            task_id: task_id.into(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder() {
        let task = Task::new("B", 3)
            .with_predecessor("A")
            .with_rank("welder")
            .with_rank("fitter")
            .with_priority(5);

        assert_eq!(task.predecessors, vec!["A".to_string()]);
        assert!(task.accepts(&Rank::new("fitter")));
        assert!(!task.accepts(&Rank::new("Welder")));
        assert_eq!(task.priority, Some(5));
    }

    #[test]
    fn test_unavailable_half_open() {
        let range = UnavailableRange::new("R2", 2, 4);
        assert_eq!(range.half_open(), Some((2, 5)));
        assert_eq!(UnavailableRange::new("R", 0, Time::MAX).half_open(), None);
    }

    #[test]
    fn test_schedule_queries() {
        let mut schedule = Schedule::new();
        assert_eq!(schedule.makespan(), 0);

        schedule.add_assignment(Assignment::new("B", "R", 2, 5));
        schedule.add_assignment(Assignment::new("A", "R", 0, 2));
        schedule.add_assignment(Assignment::new("C", "Q", 0, 1));

        assert_eq!(schedule.makespan(), 5);
        assert_eq!(schedule.assignment_for_task("C").map(|a| a.end), Some(1));

        schedule.sort_by_task();
        let ids: Vec<&str> = schedule.assignments.iter().map(|a| a.task_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_assignment_overlap_is_half_open() {
        let a = Assignment::new("A", "R", 0, 4);
        assert!(!a.overlaps(4, 8));
        assert!(a.overlaps(3, 8));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&RemovalReason::NoCompatibleResource).unwrap();
        assert_eq!(json, "\"no_compatible_resource\"");

        let task: Task = serde_json::from_str(
            r#"{"id": "E", "duration": 2, "acceptable_ranks": ["Z"]}"#,
        )
        .unwrap();
        assert_eq!(task.acceptable_ranks, vec![Rank::new("Z")]);
        assert!(task.predecessors.is_empty());
        assert_eq!(task.priority, None);
    }
}
