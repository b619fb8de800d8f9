//! Validated, immutable input snapshot for one scheduling run.

use rustc_hash::FxHashMap;

use crate::calendar::Calendar;
use crate::error::ScheduleError;
use crate::interner::{IdIndex, RankTable, RankToken};
use crate::models::{Resource, Task, Time, UnavailableRange, MAX_TIME};

/// The task/resource model of one run.
///
/// Tasks and resources are stored sorted by id, so a task or resource index
/// orders the same way as its id. Ranks are interned to integer tokens and
/// rank compatibility is an exact token comparison.
#[derive(Clone, Debug)]
pub struct ProblemSnapshot {
    tasks: Vec<Task>,
    resources: Vec<Resource>,
    calendars: Vec<Calendar>,
    task_ids: IdIndex,
    resource_ids: IdIndex,
    resource_rank: Vec<RankToken>,
    task_ranks: Vec<Vec<RankToken>>,
    predecessors: Vec<Vec<usize>>,
    successors: Vec<Vec<usize>>,
}

impl ProblemSnapshot {
    /// Validate the input tables and build the snapshot.
    ///
    /// Fails on duplicate ids, non-positive durations, empty rank sets,
    /// self or unknown predecessors, unavailable ranges for unknown
    /// resources, malformed calendars, and problems whose serial bound
    /// passes `MAX_TIME`. Cycles are detected later by the pruner.
    pub fn new(
        mut tasks: Vec<Task>,
        mut resources: Vec<Resource>,
        unavailable: Vec<UnavailableRange>,
    ) -> Result<Self, ScheduleError> {
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        resources.sort_by(|a, b| a.id.cmp(&b.id));

        let task_ids = IdIndex::from_unique(tasks.iter().map(|t| t.id.as_str()))
            .map_err(ScheduleError::DuplicateTask)?;
        for task in &tasks {
            if task.duration <= 0 {
                return Err(ScheduleError::NonPositiveDuration {
                    task: task.id.clone(),
                    duration: task.duration,
                });
            }
            if task.acceptable_ranks.is_empty() {
                return Err(ScheduleError::EmptyRankSet(task.id.clone()));
            }
        }

        let resource_ids = IdIndex::from_unique(resources.iter().map(|r| r.id.as_str()))
            .map_err(ScheduleError::DuplicateResource)?;

        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
        for (idx, task) in tasks.iter().enumerate() {
            for pred_id in &task.predecessors {
                if *pred_id == task.id {
                    return Err(ScheduleError::SelfDependency(task.id.clone()));
                }
                let pred = task_ids.get(pred_id).ok_or_else(|| {
                    ScheduleError::UnknownPredecessor {
                        task: task.id.clone(),
                        predecessor: pred_id.clone(),
                    }
                })?;
                if !predecessors[idx].contains(&pred) {
                    predecessors[idx].push(pred);
                    successors[pred].push(idx);
                }
            }
            predecessors[idx].sort_unstable();
        }
        for succ in &mut successors {
            succ.sort_unstable();
        }

        let mut ranges_by_resource: FxHashMap<usize, Vec<&UnavailableRange>> =
            FxHashMap::default();
        for range in &unavailable {
            let idx = resource_ids
                .get(&range.resource_id)
                .ok_or_else(|| ScheduleError::UnknownResource(range.resource_id.clone()))?;
            ranges_by_resource.entry(idx).or_default().push(range);
        }
        let mut calendars = Vec::with_capacity(resources.len());
        for (idx, resource) in resources.iter().enumerate() {
            let calendar = match ranges_by_resource.get(&idx) {
                Some(ranges) => Calendar::from_ranges(&resource.id, ranges)?,
                None => Calendar::always_available(),
            };
            calendars.push(calendar);
        }

        let clear_from = calendars.iter().map(Calendar::clear_from).max().unwrap_or(0);
        tasks
            .iter()
            .try_fold(clear_from, |total: Time, task| {
                total.checked_add(task.duration).filter(|&t| t <= MAX_TIME)
            })
            .ok_or_else(|| {
                ScheduleError::TimelineOverflow(format!(
                    "serial bound of {} tasks after day {}",
                    tasks.len(),
                    clear_from
                ))
            })?;

        let mut ranks = RankTable::default();
        let resource_rank: Vec<RankToken> = resources.iter().map(|r| ranks.intern(&r.rank)).collect();
        let task_ranks: Vec<Vec<RankToken>> = tasks
            .iter()
            .map(|t| t.acceptable_ranks.iter().map(|rank| ranks.intern(rank)).collect())
            .collect();

        Ok(Self {
            tasks,
            resources,
            calendars,
            task_ids,
            resource_ids,
            resource_rank,
            task_ranks,
            predecessors,
            successors,
        })
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, idx: usize) -> &Task {
        &self.tasks[idx]
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, idx: usize) -> &Resource {
        &self.resources[idx]
    }

    pub fn calendar(&self, resource_idx: usize) -> &Calendar {
        &self.calendars[resource_idx]
    }

    pub fn task_index(&self, id: &str) -> Option<usize> {
        self.task_ids.get(id)
    }

    pub fn resource_index(&self, id: &str) -> Option<usize> {
        self.resource_ids.get(id)
    }

    pub fn predecessors(&self, task_idx: usize) -> &[usize] {
        &self.predecessors[task_idx]
    }

    pub fn successors(&self, task_idx: usize) -> &[usize] {
        &self.successors[task_idx]
    }

    /// Whether resource `resource_idx` has a rank task `task_idx` accepts.
    pub fn is_compatible(&self, task_idx: usize, resource_idx: usize) -> bool {
        self.task_ranks[task_idx].contains(&self.resource_rank[resource_idx])
    }

    /// Rank-compatible resources for a task, in ascending resource id order.
    pub fn eligible_resources(&self, task_idx: usize) -> Vec<usize> {
        (0..self.resources.len())
            .filter(|&r| self.is_compatible(task_idx, r))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn welder(id: &str, duration: i64) -> Task {
        Task::new(id, duration).with_rank("welder")
    }

    #[test]
    fn test_indexes_sorted_by_id() {
        let snapshot = ProblemSnapshot::new(
            vec![welder("C", 1), welder("A", 2).with_rank("fitter"), welder("B", 3)],
            vec![Resource::new("R2", "fitter"), Resource::new("R1", "welder")],
            vec![UnavailableRange::new("R2", 2, 4)],
        )
        .unwrap();

        assert_eq!(snapshot.task(0).id, "A");
        assert_eq!(snapshot.task_index("C"), Some(2));
        assert_eq!(snapshot.resource(0).id, "R1");
        assert_eq!(snapshot.calendar(1).blackouts(), &[(2, 5)]);
        assert!(snapshot.calendar(0).blackouts().is_empty());
        assert_eq!(snapshot.eligible_resources(0), vec![0, 1]);
        assert_eq!(snapshot.eligible_resources(1), vec![0]);
        assert!(!snapshot.is_compatible(1, 1));
    }

    #[test]
    fn test_predecessor_links() {
        let snapshot = ProblemSnapshot::new(
            vec![
                welder("A", 2),
                welder("B", 3).with_predecessor("A").with_predecessor("A"),
                welder("C", 1).with_predecessor("B"),
            ],
            vec![Resource::new("R", "welder")],
            vec![],
        )
        .unwrap();

        assert_eq!(snapshot.predecessors(1), &[0]);
        assert_eq!(snapshot.successors(0), &[1]);
        assert_eq!(snapshot.successors(1), &[2]);
    }

    #[test]
    fn test_input_errors() {
        let res = || vec![Resource::new("R", "welder")];

        let err = ProblemSnapshot::new(vec![welder("A", 1), welder("A", 2)], res(), vec![])
            .unwrap_err();
        assert_eq!(err, ScheduleError::DuplicateTask("A".to_string()));

        let err = ProblemSnapshot::new(vec![welder("A", -1)], res(), vec![]).unwrap_err();
        assert!(matches!(err, ScheduleError::NonPositiveDuration { .. }));

        let err = ProblemSnapshot::new(vec![Task::new("A", 1)], res(), vec![]).unwrap_err();
        assert_eq!(err, ScheduleError::EmptyRankSet("A".to_string()));

        let err = ProblemSnapshot::new(vec![welder("A", 1).with_predecessor("A")], res(), vec![])
            .unwrap_err();
        assert_eq!(err, ScheduleError::SelfDependency("A".to_string()));

        let err = ProblemSnapshot::new(vec![welder("A", 1).with_predecessor("Q")], res(), vec![])
            .unwrap_err();
        assert!(matches!(err, ScheduleError::UnknownPredecessor { .. }));

        let err = ProblemSnapshot::new(
            vec![welder("A", 1)],
            res(),
            vec![UnavailableRange::new("NOPE", 0, 1)],
        )
        .unwrap_err();
        assert_eq!(err, ScheduleError::UnknownResource("NOPE".to_string()));

        let err = ProblemSnapshot::new(
            vec![welder("A", 1)],
            vec![Resource::new("R", "welder"), Resource::new("R", "fitter")],
            vec![],
        )
        .unwrap_err();
        assert_eq!(err, ScheduleError::DuplicateResource("R".to_string()));
    }

    #[test]
    fn test_rejects_times_past_timeline() {
        let res = || vec![Resource::new("R", "welder")];

        let err = ProblemSnapshot::new(
            vec![welder("A", 1)],
            res(),
            vec![UnavailableRange::new("R", 3, Time::MAX)],
        )
        .unwrap_err();
        assert!(matches!(err, ScheduleError::MalformedCalendar { .. }));

        let err = ProblemSnapshot::new(vec![welder("A", Time::MAX)], res(), vec![]).unwrap_err();
        assert!(matches!(err, ScheduleError::TimelineOverflow(_)));
        assert!(err.is_input_error());

        // Each fits on its own; the serial bound does not.
        let err = ProblemSnapshot::new(
            vec![welder("A", MAX_TIME - 10)],
            res(),
            vec![UnavailableRange::new("R", 0, 20)],
        )
        .unwrap_err();
        assert!(matches!(err, ScheduleError::TimelineOverflow(_)));

        assert!(ProblemSnapshot::new(vec![welder("A", MAX_TIME - 10)], res(), vec![]).is_ok());
    }
}
