//! Task runner
//!
//! The poll-claim-execute loop of one runner replica. Each tick polls the
//! dispatch watcher, claims what it can, and spawns one execution task per
//! won claim, bounded by a semaphore. A lost claim is dropped silently;
//! the winning replica owns the item.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crewflow_config::RunnerConfig;
use crewflow_core::audit::AuditRecorder;
use crewflow_core::control::CancelRegistry;
use crewflow_core::coordinator::{ClaimOutcome, ExecutionCoordinator};
use crewflow_core::executor::AgentExecutor;
use crewflow_core::store::StatusStore;

use crate::watcher::DispatchWatcher;

/// One runner replica
pub struct TaskRunner {
    coordinator: Arc<ExecutionCoordinator>,
    cancels: Arc<CancelRegistry>,
    watcher: DispatchWatcher,
    semaphore: Arc<Semaphore>,
    poll_interval: std::time::Duration,
}

impl TaskRunner {
    pub fn new(
        store: Arc<dyn StatusStore>,
        executor: Arc<dyn AgentExecutor>,
        audit: AuditRecorder,
        cancels: Arc<CancelRegistry>,
        config: &RunnerConfig,
    ) -> Self {
        let coordinator = ExecutionCoordinator::new(store.clone(), executor, audit)
            .with_fault_retry_budget(config.fault_retry_budget);
        Self {
            coordinator: Arc::new(coordinator),
            cancels,
            watcher: DispatchWatcher::new(store),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            poll_interval: config.poll_interval(),
        }
    }

    /// One poll cycle: claim every ready item this replica wins and spawn
    /// its execution. Returns once all claims are attempted; executions
    /// continue on their own tasks.
    pub async fn tick(&self) {
        let ready = match self.watcher.poll_ready().await {
            Ok(ready) => ready,
            Err(err) => {
                tracing::error!(error = %err, "dispatch poll failed");
                return;
            }
        };

        for item in ready {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            match self.coordinator.claim(&item).await {
                Ok(ClaimOutcome::Claimed) => {
                    let coordinator = self.coordinator.clone();
                    let cancels = self.cancels.clone();
                    let cancel = cancels.register(&item);
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(err) = coordinator.run_claimed(&item, &cancel).await {
                            tracing::error!(item = %item, error = %err, "execution failed");
                        }
                        cancels.release(&item);
                    });
                }
                Ok(ClaimOutcome::AlreadyClaimed) | Ok(ClaimOutcome::NotFound) => {}
                Err(err) => {
                    tracing::error!(item = %item, error = %err, "claim failed");
                }
            }
        }
    }

    /// Poll until the shutdown token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "task runner started"
        );
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("task runner shutting down");
                    return;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }
}
