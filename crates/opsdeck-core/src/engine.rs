// Workflow engine
//
// Runs a named workflow end to end:
//   Planning -> Dispatching -> Finalizing -> Done
//
// Steps execute strictly in order, one single-element batch per step, each
// with bounded retry. A step that exhausts its attempts is recorded as an
// error result and the run moves on. Only an unknown workflow or an invalid
// plan aborts, and both are detected before any router or store call.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::binder::{unresolved_placeholders, Params};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::execution::{Execution, ExecutionResult};
use crate::registry::PlanRegistry;
use crate::router::ToolRouter;
use crate::run::{RunLog, RunStatus};
use crate::traits::RunStore;

/// What the caller gets back from a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RunSummary {
    pub plan_id: String,
    /// One result per plan step, in step order
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub executions: Vec<ExecutionResult>,
    pub params: Params,
    /// None when the run record could not be created
    pub run_id: Option<i64>,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Planning,
    Dispatching,
    Finalizing,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Planning => "planning",
            Phase::Dispatching => "dispatching",
            Phase::Finalizing => "finalizing",
            Phase::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// Executes registered workflows against a tool router and records runs
#[derive(Clone)]
pub struct WorkflowEngine {
    registry: Arc<PlanRegistry>,
    router: Arc<dyn ToolRouter>,
    store: Arc<dyn RunStore>,
    config: EngineConfig,
}

impl WorkflowEngine {
    /// Create a new engine
    pub fn new(
        registry: PlanRegistry,
        router: Arc<dyn ToolRouter>,
        store: Arc<dyn RunStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            router,
            store,
            config,
        }
    }

    /// Registered workflow names
    pub fn list_workflows(&self) -> Vec<String> {
        self.registry.list_workflows()
    }

    /// Run a workflow to completion.
    ///
    /// Fails only with `UnknownWorkflow` or `InvalidPlan` (before any side
    /// effect) or when the router rejects plan registration. Every failure
    /// after dispatch begins is absorbed into the summary.
    pub async fn run(&self, workflow_name: &str, params: Params) -> Result<RunSummary> {
        let mut phase = Phase::Planning;
        debug!(workflow = %workflow_name, phase = %phase, "Run phase");

        let template = self.registry.load_plan(workflow_name)?;
        template.validate()?;
        let plan = template.bind(&params);
        for step in &plan.steps {
            let unresolved = unresolved_placeholders(&step.payload);
            if !unresolved.is_empty() {
                warn!(
                    workflow = %workflow_name,
                    step = %step.step,
                    placeholders = ?unresolved,
                    "Unresolved placeholders left in payload"
                );
            }
        }
        let record = self.router.register_plan(&plan).await?;

        let run_id = best_effort(
            self.store
                .create_run(workflow_name, Utc::now(), RunStatus::Pending)
                .await,
            "create_run",
            workflow_name,
        );
        info!(
            workflow = %workflow_name,
            plan_id = %record.plan_id,
            run_id = ?run_id,
            steps = plan.steps.len(),
            "Run started"
        );

        phase = Phase::Dispatching;
        debug!(workflow = %workflow_name, phase = %phase, "Run phase");

        let mut executions = Vec::with_capacity(plan.steps.len());
        for step in &plan.steps {
            let execution = Execution::from_step(step, &params);
            executions.push(self.dispatch(workflow_name, &step.step, &execution).await);
        }

        phase = Phase::Finalizing;
        debug!(workflow = %workflow_name, phase = %phase, "Run phase");

        let status = RunStatus::from_results(&executions);
        if let Some(id) = run_id {
            let log = RunLog::new(executions.clone(), params.clone()).to_value();
            best_effort(
                self.store.update_run(id, Utc::now(), status, &log).await,
                "update_run",
                workflow_name,
            );
        }

        phase = Phase::Done;
        info!(
            workflow = %workflow_name,
            run_id = ?run_id,
            status = %status,
            phase = %phase,
            "Run finished"
        );

        Ok(RunSummary {
            plan_id: record.plan_id,
            executions,
            params,
            run_id,
            status,
        })
    }

    /// Dispatch one execution with retry. Always yields exactly one result.
    async fn dispatch(&self, workflow: &str, step: &str, execution: &Execution) -> ExecutionResult {
        let policy = &self.config.retry;
        let mut attempt = 1;
        loop {
            let failure = match self
                .router
                .execute_batch(std::slice::from_ref(execution))
                .await
            {
                Ok(mut results) if results.len() == 1 => return results.remove(0),
                Ok(results) => EngineError::execution(format!(
                    "router returned {} results for a single execution",
                    results.len()
                )),
                Err(e) => e,
            };

            if !policy.has_attempts_remaining(attempt) {
                error!(
                    workflow = %workflow,
                    step = %step,
                    tool = %execution.tool,
                    action = %execution.action,
                    attempts = attempt,
                    error = %failure,
                    "Step failed after all attempts"
                );
                return ExecutionResult::failed(execution, failure.to_string());
            }

            attempt += 1;
            let delay = policy.delay_before_attempt(attempt);
            warn!(
                workflow = %workflow,
                step = %step,
                tool = %execution.tool,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Step failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Run store writes are best-effort: a failed write is logged and the run
/// carries on. The summary returned to the caller is authoritative whether
/// or not the record was persisted.
fn best_effort<T>(outcome: Result<T>, operation: &'static str, workflow: &str) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                workflow = %workflow,
                operation = operation,
                error = %e,
                "Run store write failed; continuing"
            );
            None
        }
    }
}
