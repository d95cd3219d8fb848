//! Stuck-run reaper
//!
//! A `running` item whose claim holder died stays `running` forever: the
//! claim is a status value, not a lease. The reaper sweeps running items
//! and fails those with no status movement inside the configured timeout,
//! so they become visible as failed instead of silently stuck. Items
//! claimed by this process are skipped; their claim holder is alive.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crewflow_config::RunnerConfig;
use crewflow_core::control::CancelRegistry;
use crewflow_core::store::{StatusStore, StoreError};
use crewflow_core::types::{WorkItem, WorkItemKind, WorkStatus};

/// Sweeps abandoned running items
pub struct StuckRunReaper {
    store: Arc<dyn StatusStore>,
    cancels: Arc<CancelRegistry>,
    timeout: chrono::Duration,
    sweep_interval: std::time::Duration,
}

impl StuckRunReaper {
    pub fn new(
        store: Arc<dyn StatusStore>,
        cancels: Arc<CancelRegistry>,
        config: &RunnerConfig,
    ) -> Self {
        let secs = config.reaper_timeout_secs;
        Self {
            store,
            cancels,
            timeout: chrono::Duration::seconds(secs as i64),
            sweep_interval: std::time::Duration::from_secs((secs / 4).max(1)),
        }
    }

    /// One sweep over all running items. Returns the items reaped.
    pub async fn sweep(&self) -> Result<Vec<WorkItem>, StoreError> {
        let mut reaped = Vec::new();
        for kind in [WorkItemKind::Task, WorkItemKind::TeamRun] {
            for item in self.store.list_by_status(kind, WorkStatus::Running).await? {
                if self.cancels.is_registered(&item) {
                    continue;
                }
                let Some(last_activity) = self.last_activity(&item).await? else {
                    continue;
                };
                if Utc::now().signed_duration_since(last_activity) < self.timeout {
                    continue;
                }

                // Conditional write: if the real claim holder finalizes
                // concurrently, it wins and the reap is dropped.
                let reap = self
                    .store
                    .compare_and_set_status(&item, WorkStatus::Running, WorkStatus::Failed)
                    .await?;
                if reap {
                    tracing::warn!(
                        item = %item,
                        last_activity = %last_activity,
                        "stuck running item reaped as failed"
                    );
                    if let WorkItem::TeamRun(run_id) = &item {
                        self.store.mark_run_finished(run_id).await?;
                    }
                    reaped.push(item);
                }
            }
        }
        Ok(reaped)
    }

    async fn last_activity(&self, item: &WorkItem) -> Result<Option<DateTime<Utc>>, StoreError> {
        match item {
            WorkItem::Task(id) => Ok(self.store.load_task(id).await?.map(|t| t.updated_at)),
            WorkItem::TeamRun(id) => Ok(self
                .store
                .load_run(id)
                .await?
                .map(|r| r.started_at.unwrap_or(r.created_at))),
        }
    }

    /// Sweep periodically until the shutdown token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.sweep_interval);
        tracing::info!(
            timeout_secs = self.timeout.num_seconds(),
            "stuck-run reaper started"
        );
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("stuck-run reaper shutting down");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(err) = self.sweep().await {
                        tracing::error!(error = %err, "reaper sweep failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewflow_core::types::Task;
    use crewflow_stores::InMemoryStatusStore;

    fn short_timeout_config() -> RunnerConfig {
        let mut config = RunnerConfig::default();
        config.reaper_timeout_secs = 60;
        config
    }

    fn stale_running_task() -> Task {
        let mut task = Task::new("ws-1", "t", "d", "agent-1", "user-1");
        task.status = WorkStatus::Running;
        task.updated_at = Utc::now() - chrono::Duration::seconds(3600);
        task
    }

    #[test]
    fn test_sweep_fails_stale_running_task() {
        tokio_test::block_on(async {
            let store = Arc::new(InMemoryStatusStore::new());
            let task = stale_running_task();
            store.save_task(&task).await.unwrap();
            let item = WorkItem::task(task.id.clone());

            let reaper = StuckRunReaper::new(
                store.clone(),
                Arc::new(CancelRegistry::new()),
                &short_timeout_config(),
            );
            let reaped = reaper.sweep().await.unwrap();

            assert_eq!(reaped, vec![item.clone()]);
            assert_eq!(store.read_status(&item).await.unwrap(), WorkStatus::Failed);
        });
    }

    #[test]
    fn test_sweep_leaves_fresh_running_task() {
        tokio_test::block_on(async {
            let store = Arc::new(InMemoryStatusStore::new());
            let mut task = Task::new("ws-1", "t", "d", "agent-1", "user-1");
            task.status = WorkStatus::Running;
            store.save_task(&task).await.unwrap();
            let item = WorkItem::task(task.id.clone());

            let reaper = StuckRunReaper::new(
                store.clone(),
                Arc::new(CancelRegistry::new()),
                &short_timeout_config(),
            );
            assert!(reaper.sweep().await.unwrap().is_empty());
            assert_eq!(store.read_status(&item).await.unwrap(), WorkStatus::Running);
        });
    }

    #[test]
    fn test_sweep_skips_locally_claimed_item() {
        tokio_test::block_on(async {
            let store = Arc::new(InMemoryStatusStore::new());
            let task = stale_running_task();
            store.save_task(&task).await.unwrap();
            let item = WorkItem::task(task.id.clone());

            let cancels = Arc::new(CancelRegistry::new());
            let _token = cancels.register(&item);

            let reaper = StuckRunReaper::new(store.clone(), cancels, &short_timeout_config());
            assert!(reaper.sweep().await.unwrap().is_empty());
            assert_eq!(store.read_status(&item).await.unwrap(), WorkStatus::Running);
        });
    }
}
