// Analytics read-side
//
// Aggregates over recorded runs and tracked tasks. Pure functions take
// slices so they can be tested without a store; the async helpers fetch
// the window they need from a store and delegate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::{EngineError, Result};
use crate::run::{RunQuery, RunRecord, RunStatus};
use crate::task::{Task, TaskStatus};
use crate::traits::{RunStore, TaskStore};

/// Number of most recent runs that metrics are computed over
pub const METRICS_WINDOW: usize = 1000;

const TOP_N: usize = 10;

/// Longest date range a trend series may cover, in days
pub const MAX_TREND_DAYS: i64 = 366;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ToolFailures {
    pub tool: String,
    pub fails: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkflowActivity {
    pub workflow: String,
    pub runs: usize,
}

/// Run metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RunMetrics {
    /// Percent of runs with status success
    pub success_rate: f64,
    /// Percent of runs with any other status
    pub failure_rate: f64,
    /// Mean wall time in seconds over finished runs
    pub avg_duration: f64,
    pub top_failed_tools: Vec<ToolFailures>,
    pub most_active_workflows: Vec<WorkflowActivity>,
    pub total_runs: usize,
}

/// One day of the trend series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub total: usize,
    pub success: usize,
    pub error: usize,
}

/// Task overview
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TaskOverview {
    pub overdue_percentage: f64,
    pub active_tasks: usize,
    /// Mean seconds from creation to last update over tasks no longer active
    pub average_response_time: f64,
}

/// Compute run metrics over the given runs
pub fn compute_metrics(runs: &[RunRecord]) -> RunMetrics {
    if runs.is_empty() {
        return RunMetrics::default();
    }

    let total = runs.len();
    let successes = runs
        .iter()
        .filter(|r| r.status == RunStatus::Success)
        .count();

    let durations: Vec<f64> = runs.iter().filter_map(RunRecord::duration_secs).collect();
    let avg_duration = mean(&durations);

    let mut tool_failures: HashMap<String, usize> = HashMap::new();
    let mut workflow_runs: HashMap<String, usize> = HashMap::new();
    for run in runs {
        *workflow_runs.entry(run.workflow_name.clone()).or_default() += 1;
        for tool in run.failed_tools() {
            *tool_failures.entry(tool.to_string()).or_default() += 1;
        }
    }

    RunMetrics {
        success_rate: successes as f64 / total as f64 * 100.0,
        failure_rate: (total - successes) as f64 / total as f64 * 100.0,
        avg_duration,
        top_failed_tools: top_counts(tool_failures)
            .into_iter()
            .map(|(tool, fails)| ToolFailures { tool, fails })
            .collect(),
        most_active_workflows: top_counts(workflow_runs)
            .into_iter()
            .map(|(workflow, runs)| WorkflowActivity { workflow, runs })
            .collect(),
        total_runs: total,
    }
}

/// Runs whose status is not success, in input order, capped at `limit`
pub fn recent_failures(runs: &[RunRecord], limit: usize) -> Vec<RunRecord> {
    runs.iter()
        .filter(|r| r.status != RunStatus::Success)
        .take(limit)
        .cloned()
        .collect()
}

/// Daily run counts for every date in `[start, end]`.
///
/// Runs are bucketed by the UTC date of `started_at`. Pending runs count
/// toward `total` only.
pub fn trend_series(runs: &[RunRecord], start: NaiveDate, end: NaiveDate) -> Result<Vec<TrendPoint>> {
    if start > end {
        return Err(EngineError::validation(format!(
            "start {start} is after end {end}"
        )));
    }
    let span = end.signed_duration_since(start).num_days() + 1;
    if span > MAX_TREND_DAYS {
        return Err(EngineError::validation(format!(
            "range of {span} days exceeds the {MAX_TREND_DAYS} day limit"
        )));
    }

    let mut buckets: BTreeMap<NaiveDate, TrendPoint> = BTreeMap::new();
    let mut next = Some(start);
    while let Some(day) = next.filter(|day| *day <= end) {
        buckets.insert(
            day,
            TrendPoint {
                date: day,
                total: 0,
                success: 0,
                error: 0,
            },
        );
        next = day.succ_opt();
    }

    for run in runs {
        if let Some(point) = buckets.get_mut(&run.started_at.date_naive()) {
            point.total += 1;
            match run.status {
                RunStatus::Success => point.success += 1,
                RunStatus::Error => point.error += 1,
                RunStatus::Pending => {}
            }
        }
    }

    Ok(buckets.into_values().collect())
}

/// Compute the task overview
pub fn task_overview(tasks: &[Task]) -> TaskOverview {
    if tasks.is_empty() {
        return TaskOverview::default();
    }

    let overdue = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Overdue)
        .count();
    let active = tasks.iter().filter(|t| t.status.is_active()).count();
    let response_times: Vec<f64> = tasks
        .iter()
        .filter(|t| !t.status.is_active())
        .map(Task::response_time_secs)
        .collect();

    TaskOverview {
        overdue_percentage: overdue as f64 / tasks.len() as f64 * 100.0,
        active_tasks: active,
        average_response_time: mean(&response_times),
    }
}

// ============================================================================
// Store-backed helpers
// ============================================================================

/// Metrics over the latest `METRICS_WINDOW` runs
pub async fn load_metrics(store: &dyn RunStore) -> Result<RunMetrics> {
    let runs = store.list_runs(&RunQuery::new(METRICS_WINDOW)).await?;
    Ok(compute_metrics(&runs))
}

/// Failed runs among the latest `limit` runs
pub async fn load_recent_failures(store: &dyn RunStore, limit: usize) -> Result<Vec<RunRecord>> {
    let runs = store.list_runs(&RunQuery::new(limit)).await?;
    Ok(recent_failures(&runs, limit))
}

/// Trend series over the latest `METRICS_WINDOW` runs
pub async fn load_trends(
    store: &dyn RunStore,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TrendPoint>> {
    let runs = store.list_runs(&RunQuery::new(METRICS_WINDOW)).await?;
    trend_series(&runs, start, end)
}

/// Overview over every stored task
pub async fn load_task_overview(store: &dyn TaskStore) -> Result<TaskOverview> {
    let tasks = store.list_tasks(None).await?;
    Ok(task_overview(&tasks))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Highest counts first; ties broken by name so output is stable
fn top_counts(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(TOP_N);
    sorted
}
