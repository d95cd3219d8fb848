//! Rerun and cancel control surface
//!
//! Rerun resets a terminal work item back to its ready status so the
//! dispatch watcher picks it up again. Cancel is cooperative for running
//! items: the claim holder's cancellation token is triggered and the
//! engine stops advancing at the next step boundary.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditEntry, AuditRecorder};
use crate::coordinator::ORCHESTRATOR_ACTOR;
use crate::store::{StatusStore, StoreError};
use crate::types::{Task, TeamRun, WorkItem, WorkStatus};

/// Control operation errors
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The item's current status does not permit the requested operation.
    /// Never silently no-ops: callers must see the conflict.
    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a cancel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The item was not yet running and is now terminally `Cancelled`.
    Cancelled,
    /// The item is running; its claim holder has been signalled and will
    /// finalize as `Cancelled` once the in-flight agent call returns.
    CancellationRequested,
}

/// Registry of cancellation tokens for items claimed by this process.
///
/// The coordinator registers a token when it claims an item and releases
/// it after finalize; the controller triggers it on cancel.
#[derive(Default)]
pub struct CancelRegistry {
    tokens: RwLock<HashMap<String, CancellationToken>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a token for a freshly claimed item.
    pub fn register(&self, item: &WorkItem) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(item.to_string(), token.clone());
        }
        token
    }

    /// Drop the token once the item reached a terminal status.
    pub fn release(&self, item: &WorkItem) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.remove(&item.to_string());
        }
    }

    /// Whether this process currently holds a registered claim for the item.
    pub fn is_registered(&self, item: &WorkItem) -> bool {
        match self.tokens.read() {
            Ok(tokens) => tokens.contains_key(&item.to_string()),
            Err(_) => false,
        }
    }

    /// Trigger the item's token. Returns false when this process holds no
    /// claim for the item.
    pub fn cancel(&self, item: &WorkItem) -> bool {
        match self.tokens.read() {
            Ok(tokens) => match tokens.get(&item.to_string()) {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}

/// Rerun / cancel controller
pub struct RunControl {
    store: Arc<dyn StatusStore>,
    cancels: Arc<CancelRegistry>,
    audit: AuditRecorder,
}

impl RunControl {
    pub fn new(
        store: Arc<dyn StatusStore>,
        cancels: Arc<CancelRegistry>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            store,
            cancels,
            audit,
        }
    }

    /// Reset a terminal task back to `Dispatched`.
    ///
    /// Valid only from `Completed`, `Failed`, or `Cancelled`; any other
    /// status is a state conflict.
    pub async fn rerun_task(&self, task_id: &str, actor_id: &str) -> Result<Task, ControlError> {
        let item = WorkItem::task(task_id);
        let current = self.read_existing_status(&item).await?;
        if !current.is_terminal() {
            return Err(ControlError::StateConflict(format!(
                "task {} is {}; rerun requires a terminal status",
                task_id, current
            )));
        }

        let updated = self
            .store
            .compare_and_set_status(&item, current, WorkStatus::Dispatched)
            .await?;
        if !updated {
            return Err(ControlError::StateConflict(format!(
                "task {} changed status concurrently",
                task_id
            )));
        }

        tracing::info!(task_id, actor_id, "task reset for rerun");
        self.audit.record(AuditEntry::new(
            self.task_workspace(task_id).await?,
            actor_id,
            "task.rerun",
            serde_json::json!({ "task_id": task_id, "previous_status": current }),
        ));

        self.store
            .load_task(task_id)
            .await?
            .ok_or_else(|| ControlError::NotFound(task_id.to_string()))
    }

    /// Reset a terminal team run back to `Pending` and start a fresh step
    /// execution generation. Prior attempts are retained for audit.
    pub async fn rerun_team_run(
        &self,
        run_id: &str,
        actor_id: &str,
    ) -> Result<TeamRun, ControlError> {
        let item = WorkItem::team_run(run_id);
        let current = self.read_existing_status(&item).await?;
        if !current.is_terminal() {
            return Err(ControlError::StateConflict(format!(
                "team run {} is {}; rerun requires a terminal status",
                run_id, current
            )));
        }

        let updated = self
            .store
            .compare_and_set_status(&item, current, WorkStatus::Pending)
            .await?;
        if !updated {
            return Err(ControlError::StateConflict(format!(
                "team run {} changed status concurrently",
                run_id
            )));
        }

        let run = self.store.reset_run_for_rerun(run_id).await?;
        tracing::info!(run_id, actor_id, generation = run.generation, "team run reset for rerun");
        self.audit.record(AuditEntry::new(
            run.workspace_id.clone(),
            actor_id,
            "team_run.rerun",
            serde_json::json!({
                "run_id": run_id,
                "previous_status": current,
                "generation": run.generation,
            }),
        ));
        Ok(run)
    }

    /// Cancel a work item.
    ///
    /// Not-yet-running items transition straight to `Cancelled`; running
    /// items are signalled cooperatively and finalize as `Cancelled` once
    /// the in-flight agent call returns. Terminal items conflict.
    pub async fn cancel(
        &self,
        item: &WorkItem,
        actor_id: &str,
    ) -> Result<CancelOutcome, ControlError> {
        let current = self.read_existing_status(item).await?;
        if !current.is_cancellable() {
            return Err(ControlError::StateConflict(format!(
                "{} is {}; cancel requires pending, dispatched, or running",
                item, current
            )));
        }

        let outcome = if current == WorkStatus::Running {
            if !self.cancels.cancel(item) {
                return Err(ControlError::StateConflict(format!(
                    "{} is running but not claimed by this instance",
                    item
                )));
            }
            CancelOutcome::CancellationRequested
        } else {
            let updated = self
                .store
                .compare_and_set_status(item, current, WorkStatus::Cancelled)
                .await?;
            if !updated {
                // The item moved (likely claimed) between read and CAS;
                // fall back to the cooperative path if it is now running.
                if self.store.read_status(item).await? == WorkStatus::Running
                    && self.cancels.cancel(item)
                {
                    CancelOutcome::CancellationRequested
                } else {
                    return Err(ControlError::StateConflict(format!(
                        "{} changed status concurrently",
                        item
                    )));
                }
            } else {
                CancelOutcome::Cancelled
            }
        };

        tracing::info!(item = %item, actor_id, ?outcome, "cancel requested");
        self.audit.record(AuditEntry::new(
            self.item_workspace(item).await?,
            actor_id,
            "work_item.cancel",
            serde_json::json!({ "item": item, "previous_status": current }),
        ));
        Ok(outcome)
    }

    async fn read_existing_status(&self, item: &WorkItem) -> Result<WorkStatus, ControlError> {
        match self.store.read_status(item).await {
            Ok(status) => Ok(status),
            Err(StoreError::NotFound(id)) => Err(ControlError::NotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn task_workspace(&self, task_id: &str) -> Result<String, ControlError> {
        Ok(self
            .store
            .load_task(task_id)
            .await?
            .ok_or_else(|| ControlError::NotFound(task_id.to_string()))?
            .workspace_id)
    }

    async fn item_workspace(&self, item: &WorkItem) -> Result<String, ControlError> {
        match item {
            WorkItem::Task(id) => self.task_workspace(id).await,
            WorkItem::TeamRun(id) => Ok(self
                .store
                .load_run(id)
                .await?
                .ok_or_else(|| ControlError::NotFound(id.to_string()))?
                .workspace_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_registry_roundtrip() {
        let registry = CancelRegistry::new();
        let item = WorkItem::task("t-1");

        let token = registry.register(&item);
        assert!(!token.is_cancelled());
        assert!(registry.cancel(&item));
        assert!(token.is_cancelled());

        registry.release(&item);
        assert!(!registry.cancel(&item));
    }

    #[test]
    fn test_cancel_registry_unknown_item() {
        let registry = CancelRegistry::new();
        assert!(!registry.cancel(&WorkItem::team_run("r-1")));
    }
}
