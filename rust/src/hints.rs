//! Conversion between hint tables and the exact solver's variable form.
//!
//! A hint table is the canonical tabular form of a (possibly partial)
//! schedule: one row per task, sorted by task id, integer times.

use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::models::{Assignment, Schedule, Time};
use crate::problem::ProblemSnapshot;
use crate::solver::CpModel;

/// One row of a hint table.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HintRow {
    pub task_id: String,
    pub resource_id: String,
    pub start: Time,
    pub end: Time,
}

impl HintRow {
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
}

/// Canonical hint table: at most one row per task, sorted by task id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<HintRow>", into = "Vec<HintRow>")]
pub struct HintTable {
    rows: Vec<HintRow>,
}

impl HintTable {
    /// Sort rows by task id; a task appearing twice is an error.
    pub fn canonicalize(mut rows: Vec<HintRow>) -> Result<Self, ScheduleError> {
        rows.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        if let Some(pair) = rows.windows(2).find(|w| w[0].task_id == w[1].task_id) {
            return Err(ScheduleError::InvalidHint(format!(
                "task {} appears more than once",
                pair[0].task_id
            )));
        }
        if let Some(row) = rows.iter().find(|r| r.end < r.start) {
            return Err(ScheduleError::InvalidHint(format!(
                "task {} ends at {} before it starts at {}",
                row.task_id, row.end, row.start
            )));
        }
        Ok(Self { rows })
    }

    pub fn from_schedule(schedule: &Schedule) -> Result<Self, ScheduleError> {
        Self::canonicalize(
            schedule
                .assignments
                .iter()
                .map(|a| HintRow::new(a.task_id.clone(), a.resource_id.clone(), a.start, a.end))
                .collect(),
        )
    }

    pub fn to_schedule(&self) -> Schedule {
        Schedule {
            assignments: self
                .rows
                .iter()
                .map(|r| Assignment::new(r.task_id.clone(), r.resource_id.clone(), r.start, r.end))
                .collect(),
        }
    }

    pub fn rows(&self) -> &[HintRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, task_id: &str) -> Option<&HintRow> {
        self.rows
            .binary_search_by(|r| r.task_id.as_str().cmp(task_id))
            .ok()
            .map(|i| &self.rows[i])
    }

    pub fn makespan(&self) -> Time {
        self.rows.iter().map(|r| r.end).max().unwrap_or(0)
    }
}

impl TryFrom<Vec<HintRow>> for HintTable {
    type Error = ScheduleError;

    fn try_from(rows: Vec<HintRow>) -> Result<Self, Self::Error> {
        Self::canonicalize(rows)
    }
}

impl From<HintTable> for Vec<HintRow> {
    fn from(table: HintTable) -> Self {
        table.rows
    }
}

/// Values for the solver's decision variables, indexed by model task.
///
/// `None` leaves a variable unassigned (a partial hint).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VariableAssignment {
    pub starts: Vec<Option<Time>>,
    pub resources: Vec<Option<usize>>,
}

impl VariableAssignment {
    pub fn unassigned(task_count: usize) -> Self {
        Self {
            starts: vec![None; task_count],
            resources: vec![None; task_count],
        }
    }

    pub fn assigned_count(&self) -> usize {
        self.starts
            .iter()
            .zip(&self.resources)
            .filter(|(s, r)| s.is_some() && r.is_some())
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.assigned_count() == self.starts.len()
    }
}

/// Map a hint table onto the model's variables.
///
/// Rows for tasks that exist in the snapshot but not in the model (removed
/// tasks) are skipped. A task or resource id unknown to the snapshot is an
/// error. The row's end is implied by start and duration and is not used.
pub fn encode(
    table: &HintTable,
    model: &CpModel,
    snapshot: &ProblemSnapshot,
) -> Result<VariableAssignment, ScheduleError> {
    let mut vars = VariableAssignment::unassigned(model.task_count());
    for row in table.rows() {
        let Some(task) = model.task_index(&row.task_id) else {
            if snapshot.task_index(&row.task_id).is_none() {
                return Err(ScheduleError::InvalidHint(format!(
                    "unknown task {}",
                    row.task_id
                )));
            }
            continue;
        };
        let resource = model.resource_index(&row.resource_id).ok_or_else(|| {
            ScheduleError::InvalidHint(format!(
                "task {} hinted on unknown resource {}",
                row.task_id, row.resource_id
            ))
        })?;
        vars.starts[task] = Some(row.start);
        vars.resources[task] = Some(resource);
    }
    Ok(vars)
}

/// Read a hint table back from the solver's variables.
///
/// Tasks with either variable unassigned are left out.
pub fn decode(vars: &VariableAssignment, model: &CpModel) -> HintTable {
    let rows = vars
        .starts
        .iter()
        .zip(&vars.resources)
        .enumerate()
        .filter_map(|(t, pair)| match pair {
            (Some(start), Some(resource)) => Some(HintRow::new(
                model.task_id(t),
                model.resource_id(*resource),
                *start,
                *start + model.duration(t),
            )),
            _ => None,
        })
        .collect();
    // Model tasks are indexed in id order, so rows are already canonical.
    HintTable { rows }
}

/// A single cell-level difference between two hint tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HintDiff {
    OnlyLeft(String),
    OnlyRight(String),
    Resource { task_id: String, left: String, right: String },
    Start { task_id: String, left: Time, right: Time },
    End { task_id: String, left: Time, right: Time },
}

/// Cell-by-cell differences, in task id order.
pub fn diff(left: &HintTable, right: &HintTable) -> Vec<HintDiff> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    let (l, r) = (left.rows(), right.rows());

    while i < l.len() || j < r.len() {
        match (l.get(i), r.get(j)) {
            (Some(a), Some(b)) if a.task_id == b.task_id => {
                if a.resource_id != b.resource_id {
                    out.push(HintDiff::Resource {
                        task_id: a.task_id.clone(),
                        left: a.resource_id.clone(),
                        right: b.resource_id.clone(),
                    });
                }
                if a.start != b.start {
                    out.push(HintDiff::Start {
                        task_id: a.task_id.clone(),
                        left: a.start,
                        right: b.start,
                    });
                }
                if a.end != b.end {
                    out.push(HintDiff::End {
                        task_id: a.task_id.clone(),
                        left: a.end,
                        right: b.end,
                    });
                }
                i += 1;
                j += 1;
            }
            (Some(a), Some(b)) if a.task_id < b.task_id => {
                out.push(HintDiff::OnlyLeft(a.task_id.clone()));
                i += 1;
            }
            (Some(a), None) => {
                out.push(HintDiff::OnlyLeft(a.task_id.clone()));
                i += 1;
            }
            (_, Some(b)) => {
                out.push(HintDiff::OnlyRight(b.task_id.clone()));
                j += 1;
            }
            (None, None) => break,
        }
    }
    out
}
