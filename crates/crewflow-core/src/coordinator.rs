//! Execution coordinator
//!
//! Owns the lifecycle of a single claimed work item: claims it through a
//! single conditional status write, executes it (directly for a task,
//! via the pipeline engine for a team run), and finalizes the terminal
//! status. Holds no in-memory lock across any store or executor call;
//! mutual exclusion between replicas is the claim itself.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditEntry, AuditRecorder};
use crate::engine::{PipelineEngine, RunVerdict};
use crate::executor::{AgentExecutor, AgentInput};
use crate::store::{StatusStore, StoreError};
use crate::types::{WorkItem, WorkStatus};

const DEFAULT_FAULT_RETRY_BUDGET: u32 = 3;
const FAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Actor id stamped on audit entries the orchestrator emits itself
pub const ORCHESTRATOR_ACTOR: &str = "task-runner";

/// Result of a claim attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This coordinator holds the claim and must drive the item to a
    /// terminal status.
    Claimed,
    /// Another coordinator instance won the race. Expected under replica
    /// scale-out; not an error.
    AlreadyClaimed,
    /// The item does not exist in the store.
    NotFound,
}

/// The coordinator - claim, execute, finalize
pub struct ExecutionCoordinator {
    store: Arc<dyn StatusStore>,
    executor: Arc<dyn AgentExecutor>,
    engine: PipelineEngine,
    audit: AuditRecorder,
    /// Idempotent store-write retries before giving up on a finalize.
    fault_retry_budget: u32,
}

impl ExecutionCoordinator {
    pub fn new(
        store: Arc<dyn StatusStore>,
        executor: Arc<dyn AgentExecutor>,
        audit: AuditRecorder,
    ) -> Self {
        let engine = PipelineEngine::new(store.clone(), executor.clone());
        Self {
            store,
            executor,
            engine,
            audit,
            fault_retry_budget: DEFAULT_FAULT_RETRY_BUDGET,
        }
    }

    /// Set the store-fault retry budget
    pub fn with_fault_retry_budget(mut self, budget: u32) -> Self {
        self.fault_retry_budget = budget;
        self
    }

    /// Atomically transition the item from its ready status to `Running`.
    ///
    /// Implemented as one conditional write; concurrent claimers on the
    /// same ready item resolve to exactly one `Claimed`.
    pub async fn claim(&self, item: &WorkItem) -> Result<ClaimOutcome, StoreError> {
        let ready = item.ready_status();
        match self
            .store
            .compare_and_set_status(item, ready, WorkStatus::Running)
            .await
        {
            Ok(true) => {
                if let WorkItem::TeamRun(run_id) = item {
                    self.store.mark_run_started(run_id).await?;
                }
                tracing::info!(item = %item, "work item claimed");
                Ok(ClaimOutcome::Claimed)
            }
            Ok(false) => {
                tracing::debug!(item = %item, "claim lost to another coordinator");
                Ok(ClaimOutcome::AlreadyClaimed)
            }
            Err(StoreError::NotFound(_)) => Ok(ClaimOutcome::NotFound),
            Err(err) => Err(err),
        }
    }

    /// Execute a claimed item to a terminal status.
    ///
    /// Agent failures map to `Failed`; only store faults surface as errors.
    pub async fn execute(
        &self,
        item: &WorkItem,
        cancel: &CancellationToken,
    ) -> Result<WorkStatus, StoreError> {
        match item {
            WorkItem::Task(task_id) => {
                let task = self
                    .store
                    .load_task(task_id)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(task_id.clone()))?;

                if cancel.is_cancelled() {
                    return Ok(WorkStatus::Cancelled);
                }

                match self
                    .executor
                    .invoke(&task.agent_id, AgentInput::for_task(&task))
                    .await
                {
                    Ok(_) => {
                        tracing::info!(task_id = %task.id, agent_id = %task.agent_id, "task completed");
                        Ok(WorkStatus::Completed)
                    }
                    Err(err) => {
                        tracing::error!(
                            task_id = %task.id,
                            agent_id = %task.agent_id,
                            error = %err,
                            "task agent invocation failed"
                        );
                        Ok(WorkStatus::Failed)
                    }
                }
            }
            WorkItem::TeamRun(run_id) => {
                let run = self
                    .store
                    .load_run(run_id)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(run_id.clone()))?;
                let verdict = self.engine.run(&run, cancel).await?;
                Ok(verdict.as_status())
            }
        }
    }

    /// Write the terminal status unconditionally. The claim holder is the
    /// only writer at this point, so the write needs no condition; store
    /// faults are retried with the bounded fault budget.
    pub async fn finalize(&self, item: &WorkItem, status: WorkStatus) -> Result<(), StoreError> {
        debug_assert!(status.is_terminal());

        let mut attempt: u32 = 0;
        loop {
            match self.store.set_status(item, status).await {
                Ok(()) => break,
                Err(err) if attempt < self.fault_retry_budget => {
                    attempt += 1;
                    tracing::warn!(
                        item = %item,
                        status = %status,
                        attempt,
                        error = %err,
                        "finalize write failed; retrying"
                    );
                    sleep(FAULT_RETRY_DELAY).await;
                }
                Err(err) => return Err(err),
            }
        }

        if let WorkItem::TeamRun(run_id) = item {
            self.store.mark_run_finished(run_id).await?;
        }
        tracing::info!(item = %item, status = %status, "work item finalized");
        Ok(())
    }

    /// Drive an already-claimed item to its terminal status, emitting
    /// start and end audit records around the execution. An execution
    /// fault never leaves the item in `Running`: the coordinator still
    /// finalizes it as `Failed`.
    pub async fn run_claimed(
        &self,
        item: &WorkItem,
        cancel: &CancellationToken,
    ) -> Result<WorkStatus, StoreError> {
        let workspace_id = self.workspace_of(item).await?;
        self.audit.record(AuditEntry::new(
            workspace_id.clone(),
            ORCHESTRATOR_ACTOR,
            "run.started",
            serde_json::json!({ "item": item }),
        ));

        let status = match self.execute(item, cancel).await {
            Ok(status) => status,
            Err(err) => {
                tracing::error!(
                    item = %item,
                    error = %err,
                    "execution aborted by infrastructure fault; finalizing as failed"
                );
                WorkStatus::Failed
            }
        };

        self.finalize(item, status).await?;

        let action = match status {
            WorkStatus::Completed => "run.completed",
            WorkStatus::Cancelled => "run.cancelled",
            _ => "run.failed",
        };
        self.audit.record(AuditEntry::new(
            workspace_id,
            ORCHESTRATOR_ACTOR,
            action,
            serde_json::json!({ "item": item, "status": status }),
        ));

        Ok(status)
    }

    async fn workspace_of(&self, item: &WorkItem) -> Result<String, StoreError> {
        match item {
            WorkItem::Task(id) => Ok(self
                .store
                .load_task(id)
                .await?
                .ok_or_else(|| StoreError::NotFound(id.clone()))?
                .workspace_id),
            WorkItem::TeamRun(id) => Ok(self
                .store
                .load_run(id)
                .await?
                .ok_or_else(|| StoreError::NotFound(id.clone()))?
                .workspace_id),
        }
    }
}
