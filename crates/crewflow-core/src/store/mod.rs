//! Store module
//!
//! The StatusStore is the single source of truth for work item status.
//! The orchestrator never assumes a transition succeeded without
//! confirmation: mutual exclusion between coordinator replicas rests
//! entirely on `compare_and_set_status` being a single conditional write.
//!
//! Note: implementations live in the crewflow-stores crate.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{StepExecution, Task, TeamRun, WorkItem, WorkItemKind, WorkStatus};

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Durable record of tasks, team runs, and step executions with atomic
/// compare-and-set status transitions.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn save_task(&self, task: &Task) -> Result<(), StoreError>;

    async fn load_task(&self, task_id: &str) -> Result<Option<Task>, StoreError>;

    async fn save_run(&self, run: &TeamRun) -> Result<(), StoreError>;

    async fn load_run(&self, run_id: &str) -> Result<Option<TeamRun>, StoreError>;

    /// Read the current status of a work item.
    async fn read_status(&self, item: &WorkItem) -> Result<WorkStatus, StoreError>;

    /// Atomically transition `item` from `expected` to `new`.
    ///
    /// Returns `Ok(false)` when the current status no longer matches
    /// `expected` (another coordinator won the race). This is the only
    /// synchronization primitive in the system; implementations must make
    /// the check-and-set a single atomic operation, never read-then-write.
    async fn compare_and_set_status(
        &self,
        item: &WorkItem,
        expected: WorkStatus,
        new: WorkStatus,
    ) -> Result<bool, StoreError>;

    /// Unconditionally write a status. Used only by the claim holder to
    /// finalize an item that has concluded execution.
    async fn set_status(&self, item: &WorkItem, status: WorkStatus) -> Result<(), StoreError>;

    /// List work items of `kind` currently in `status`.
    async fn list_by_status(
        &self,
        kind: WorkItemKind,
        status: WorkStatus,
    ) -> Result<Vec<WorkItem>, StoreError>;

    /// List work items of `kind` that are ready for claiming.
    /// Discovery never mutates state, so duplicate discovery across
    /// watcher replicas is harmless.
    async fn list_ready(&self, kind: WorkItemKind) -> Result<Vec<WorkItem>, StoreError> {
        self.list_by_status(kind, kind.ready_status()).await
    }

    /// Append a new step execution row (attempt start).
    async fn insert_step_execution(&self, execution: &StepExecution) -> Result<(), StoreError>;

    /// Record the outcome of a previously inserted attempt, matched by
    /// (run_id, generation, step_index, attempt).
    async fn update_step_execution(&self, execution: &StepExecution) -> Result<(), StoreError>;

    /// List all step execution rows for a run, across generations,
    /// ordered by (generation, step_index, attempt).
    async fn list_step_executions(&self, run_id: &str) -> Result<Vec<StepExecution>, StoreError>;

    /// Stamp the run's start time (set on successful claim).
    async fn mark_run_started(&self, run_id: &str) -> Result<(), StoreError>;

    /// Stamp the run's finish time (set on finalize).
    async fn mark_run_finished(&self, run_id: &str) -> Result<(), StoreError>;

    /// Bump the run's generation and clear execution timestamps so a rerun
    /// starts a fresh step execution snapshot. Prior rows are retained.
    async fn reset_run_for_rerun(&self, run_id: &str) -> Result<TeamRun, StoreError>;
}
