//! Dispatch watcher
//!
//! Polls the status store for work items in their ready status:
//! `dispatched` tasks and `pending` team runs. The watcher only reads;
//! claiming is the coordinator's job, so two replicas polling the same
//! store never double-execute an item.

use std::sync::Arc;

use crewflow_core::store::{StatusStore, StoreError};
use crewflow_core::types::{WorkItem, WorkItemKind};

/// Polls for ready work items
pub struct DispatchWatcher {
    store: Arc<dyn StatusStore>,
}

impl DispatchWatcher {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    /// One poll: every task and team run currently in its ready status.
    pub async fn poll_ready(&self) -> Result<Vec<WorkItem>, StoreError> {
        let mut ready = self.store.list_ready(WorkItemKind::Task).await?;
        ready.extend(self.store.list_ready(WorkItemKind::TeamRun).await?);
        if !ready.is_empty() {
            tracing::debug!(count = ready.len(), "ready work items found");
        }
        Ok(ready)
    }
}
