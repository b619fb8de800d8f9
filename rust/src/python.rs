//! Python bindings.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::NaiveDate;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::calendar;
use crate::config::SolverSettings;
use crate::error::ScheduleError;
use crate::models::{Rank, Resource, Task, Time, UnavailableRange};
use crate::orchestrator::{Orchestrator, SchedulingResult};
use crate::solver::{NoProgress, ProgressListener};

fn to_py_err(err: ScheduleError) -> PyErr {
    if err.is_input_error() {
        PyValueError::new_err(err.to_string())
    } else {
        PyRuntimeError::new_err(err.to_string())
    }
}

/// A task to schedule (PyO3 wrapper).
#[pyclass(name = "Task")]
#[derive(Clone, Debug)]
pub struct PyTask {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    pub duration: Time,
    #[pyo3(get, set)]
    pub acceptable_ranks: Vec<String>,
    #[pyo3(get, set)]
    pub predecessors: Vec<String>,
    #[pyo3(get, set)]
    pub priority: Option<i32>,
}

#[pymethods]
impl PyTask {
    #[new]
    #[pyo3(signature = (id, duration, acceptable_ranks, predecessors=Vec::new(), priority=None))]
    fn new(
        id: String,
        duration: Time,
        acceptable_ranks: Vec<String>,
        predecessors: Vec<String>,
        priority: Option<i32>,
    ) -> Self {
        Self {
            id,
            duration,
            acceptable_ranks,
            predecessors,
            priority,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Task(id={:?}, duration={}, ranks={:?}, predecessors={:?})",
            self.id, self.duration, self.acceptable_ranks, self.predecessors
        )
    }
}

impl From<PyTask> for Task {
    fn from(task: PyTask) -> Self {
        Task {
            id: task.id,
            duration: task.duration,
            predecessors: task.predecessors,
            acceptable_ranks: task.acceptable_ranks.into_iter().map(Rank::new).collect(),
            priority: task.priority,
        }
    }
}

/// A resource of a single rank (PyO3 wrapper).
#[pyclass(name = "Resource")]
#[derive(Clone, Debug)]
pub struct PyResource {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    pub rank: String,
}

#[pymethods]
impl PyResource {
    #[new]
    fn new(id: String, rank: String) -> Self {
        Self { id, rank }
    }

    fn __repr__(&self) -> String {
        format!("Resource(id={:?}, rank={:?})", self.id, self.rank)
    }
}

/// An inclusive range of unavailable days (PyO3 wrapper).
#[pyclass(name = "UnavailableRange")]
#[derive(Clone, Debug)]
pub struct PyUnavailableRange {
    #[pyo3(get, set)]
    pub resource_id: String,
    #[pyo3(get, set)]
    pub start_day: Time,
    #[pyo3(get, set)]
    pub end_day: Time,
}

#[pymethods]
impl PyUnavailableRange {
    #[new]
    fn new(resource_id: String, start_day: Time, end_day: Time) -> Self {
        Self {
            resource_id,
            start_day,
            end_day,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "UnavailableRange(resource_id={:?}, days={}..={})",
            self.resource_id, self.start_day, self.end_day
        )
    }
}

impl From<PyUnavailableRange> for UnavailableRange {
    fn from(range: PyUnavailableRange) -> Self {
        UnavailableRange::new(range.resource_id, range.start_day, range.end_day)
    }
}

/// Solver settings (PyO3 wrapper).
#[pyclass(name = "Settings")]
#[derive(Clone, Debug)]
pub struct PySettings {
    #[pyo3(get, set)]
    pub time_budget_seconds: f64,
    #[pyo3(get, set)]
    pub worker_count: usize,
    #[pyo3(get, set)]
    pub node_limit: Option<u64>,
    #[pyo3(get, set)]
    pub planning_horizon: Option<Time>,
    #[pyo3(get, set)]
    pub verbosity: u8,
}

#[pymethods]
impl PySettings {
    #[new]
    #[pyo3(signature = (time_budget_seconds=10.0, worker_count=1, node_limit=None, planning_horizon=None, verbosity=0))]
    fn new(
        time_budget_seconds: f64,
        worker_count: usize,
        node_limit: Option<u64>,
        planning_horizon: Option<Time>,
        verbosity: u8,
    ) -> Self {
        Self {
            time_budget_seconds,
            worker_count,
            node_limit,
            planning_horizon,
            verbosity,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Settings(time_budget_seconds={}, worker_count={}, node_limit={:?}, planning_horizon={:?})",
            self.time_budget_seconds, self.worker_count, self.node_limit, self.planning_horizon
        )
    }
}

impl From<PySettings> for SolverSettings {
    fn from(settings: PySettings) -> Self {
        SolverSettings {
            time_budget_seconds: settings.time_budget_seconds,
            worker_count: settings.worker_count,
            node_limit: settings.node_limit,
            planning_horizon: settings.planning_horizon,
            verbosity: settings.verbosity,
        }
    }
}

/// One scheduled task (PyO3 wrapper).
#[pyclass(name = "Assignment")]
#[derive(Clone, Debug)]
pub struct PyAssignment {
    #[pyo3(get)]
    pub task_id: String,
    #[pyo3(get)]
    pub resource_id: String,
    #[pyo3(get)]
    pub start: Time,
    #[pyo3(get)]
    pub end: Time,
}

#[pymethods]
impl PyAssignment {
    fn __repr__(&self) -> String {
        format!(
            "Assignment(task_id={:?}, resource_id={:?}, start={}, end={})",
            self.task_id, self.resource_id, self.start, self.end
        )
    }
}

/// Output of `solve_schedule` (PyO3 wrapper).
#[pyclass(name = "SchedulingResult")]
#[derive(Clone, Debug)]
pub struct PySchedulingResult {
    #[pyo3(get)]
    pub assignments: Vec<PyAssignment>,
    /// (task_id, reason) pairs.
    #[pyo3(get)]
    pub removed_tasks: Vec<(String, String)>,
    #[pyo3(get)]
    pub solver_status: String,
    #[pyo3(get)]
    pub objective_value: Option<Time>,
    #[pyo3(get)]
    pub hint_makespan: Time,
    #[pyo3(get)]
    pub horizon: Time,
    #[pyo3(get)]
    pub nodes_explored: u64,
    #[pyo3(get)]
    pub elapsed_ms: u64,
}

#[pymethods]
impl PySchedulingResult {
    fn __repr__(&self) -> String {
        format!(
            "SchedulingResult(status={}, objective={:?}, assignments={}, removed={})",
            self.solver_status,
            self.objective_value,
            self.assignments.len(),
            self.removed_tasks.len()
        )
    }
}

impl From<SchedulingResult> for PySchedulingResult {
    fn from(result: SchedulingResult) -> Self {
        Self {
            assignments: result
                .schedule
                .assignments
                .into_iter()
                .map(|a| PyAssignment {
                    task_id: a.task_id,
                    resource_id: a.resource_id,
                    start: a.start,
                    end: a.end,
                })
                .collect(),
            removed_tasks: result
                .removed_tasks
                .into_iter()
                .map(|r| (r.task_id, r.reason.as_str().to_string()))
                .collect(),
            solver_status: result.solver_status.as_str().to_string(),
            objective_value: result.objective_value,
            hint_makespan: result.diagnostics.hint_makespan,
            horizon: result.diagnostics.horizon,
            nodes_explored: result.diagnostics.nodes_explored,
            elapsed_ms: result.diagnostics.elapsed_ms,
        }
    }
}

/// Forwards improvements to a Python callable `(objective, fraction) -> bool`.
///
/// A falsy return or a raised exception cancels the search; `None` continues.
struct PyProgress {
    callback: PyObject,
}

impl ProgressListener for PyProgress {
    fn on_improved(&mut self, objective: Time, elapsed_fraction: f64) -> bool {
        Python::with_gil(|py| match self.callback.call1(py, (objective, elapsed_fraction)) {
            Ok(ret) if ret.is_none(py) => true,
            Ok(ret) => ret.bind(py).is_truthy().unwrap_or(false),
            Err(err) => {
                err.print(py);
                false
            }
        })
    }
}

/// Schedule tasks on ranked resources.
///
/// # Raises
/// * ValueError for malformed input or cyclic dependencies
/// * RuntimeError if a pipeline stage fails
#[pyfunction]
#[pyo3(signature = (tasks, resources, unavailable=Vec::new(), settings=None, progress=None))]
fn solve_schedule(
    py: Python<'_>,
    tasks: Vec<PyTask>,
    resources: Vec<PyResource>,
    unavailable: Vec<PyUnavailableRange>,
    settings: Option<PySettings>,
    progress: Option<PyObject>,
) -> PyResult<PySchedulingResult> {
    let settings: SolverSettings = settings.map(Into::into).unwrap_or_default();
    let tasks: Vec<Task> = tasks.into_iter().map(Into::into).collect();
    let resources: Vec<Resource> = resources
        .into_iter()
        .map(|r| Resource::new(r.id, r.rank))
        .collect();
    let unavailable: Vec<UnavailableRange> = unavailable.into_iter().map(Into::into).collect();

    let orchestrator = Orchestrator::new(settings);
    let result = py.allow_threads(move || match progress {
        Some(callback) => {
            orchestrator.run_with_progress(tasks, resources, unavailable, &mut PyProgress { callback })
        }
        None => orchestrator.run_with_progress(tasks, resources, unavailable, &mut NoProgress),
    });
    result.map(Into::into).map_err(to_py_err)
}

/// Build an unavailable range from calendar dates, counting days from `epoch`.
#[pyfunction]
fn unavailable_from_dates(
    resource_id: String,
    epoch: NaiveDate,
    start: NaiveDate,
    end: NaiveDate,
) -> PyUnavailableRange {
    let range = UnavailableRange::from_dates(resource_id, epoch, start, end);
    PyUnavailableRange {
        resource_id: range.resource_id,
        start_day: range.start_day,
        end_day: range.end_day,
    }
}

/// Day offset of `date` from `epoch`.
#[pyfunction]
fn day_offset(epoch: NaiveDate, date: NaiveDate) -> Time {
    calendar::day_offset(epoch, date)
}

/// The rcpsp_engine Python module.
#[pymodule]
fn rcpsp_engine(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTask>()?;
    m.add_class::<PyResource>()?;
    m.add_class::<PyUnavailableRange>()?;
    m.add_class::<PySettings>()?;
    m.add_class::<PyAssignment>()?;
    m.add_class::<PySchedulingResult>()?;

    m.add_function(wrap_pyfunction!(solve_schedule, m)?)?;
    m.add_function(wrap_pyfunction!(unavailable_from_dates, m)?)?;
    m.add_function(wrap_pyfunction!(day_offset, m)?)?;

    Ok(())
}
