//! StatusStore in-memory implementation.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use crewflow_core::store::{StatusStore, StoreError};
use crewflow_core::types::{
    StepExecution, Task, TeamRun, WorkItem, WorkItemKind, WorkStatus,
};

/// In-memory implementation for development and testing.
///
/// `compare_and_set_status` holds the write lock for the full
/// check-and-set, so the transition is atomic with respect to all other
/// status writes through this store.
#[derive(Default)]
pub struct InMemoryStatusStore {
    tasks: RwLock<HashMap<String, Task>>,
    runs: RwLock<HashMap<String, TeamRun>>,
    executions: RwLock<Vec<StepExecution>>,
}

impl InMemoryStatusStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn internal<E: std::fmt::Display>(err: E) -> StoreError {
        StoreError::Internal(err.to_string())
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().map_err(Self::internal)?;
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn load_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        let tasks = self.tasks.read().map_err(Self::internal)?;
        Ok(tasks.get(task_id).cloned())
    }

    async fn save_run(&self, run: &TeamRun) -> Result<(), StoreError> {
        let mut runs = self.runs.write().map_err(Self::internal)?;
        runs.insert(run.id.clone(), run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: &str) -> Result<Option<TeamRun>, StoreError> {
        let runs = self.runs.read().map_err(Self::internal)?;
        Ok(runs.get(run_id).cloned())
    }

    async fn read_status(&self, item: &WorkItem) -> Result<WorkStatus, StoreError> {
        match item {
            WorkItem::Task(id) => {
                let tasks = self.tasks.read().map_err(Self::internal)?;
                tasks
                    .get(id)
                    .map(|t| t.status)
                    .ok_or_else(|| StoreError::NotFound(id.clone()))
            }
            WorkItem::TeamRun(id) => {
                let runs = self.runs.read().map_err(Self::internal)?;
                runs.get(id)
                    .map(|r| r.status)
                    .ok_or_else(|| StoreError::NotFound(id.clone()))
            }
        }
    }

    async fn compare_and_set_status(
        &self,
        item: &WorkItem,
        expected: WorkStatus,
        new: WorkStatus,
    ) -> Result<bool, StoreError> {
        match item {
            WorkItem::Task(id) => {
                let mut tasks = self.tasks.write().map_err(Self::internal)?;
                let task = tasks
                    .get_mut(id)
                    .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                if task.status != expected {
                    return Ok(false);
                }
                task.set_status(new);
                Ok(true)
            }
            WorkItem::TeamRun(id) => {
                let mut runs = self.runs.write().map_err(Self::internal)?;
                let run = runs
                    .get_mut(id)
                    .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                if run.status != expected {
                    return Ok(false);
                }
                run.set_status(new);
                Ok(true)
            }
        }
    }

    async fn set_status(&self, item: &WorkItem, status: WorkStatus) -> Result<(), StoreError> {
        match item {
            WorkItem::Task(id) => {
                let mut tasks = self.tasks.write().map_err(Self::internal)?;
                let task = tasks
                    .get_mut(id)
                    .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                task.set_status(status);
                Ok(())
            }
            WorkItem::TeamRun(id) => {
                let mut runs = self.runs.write().map_err(Self::internal)?;
                let run = runs
                    .get_mut(id)
                    .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                run.set_status(status);
                Ok(())
            }
        }
    }

    async fn list_by_status(
        &self,
        kind: WorkItemKind,
        status: WorkStatus,
    ) -> Result<Vec<WorkItem>, StoreError> {
        match kind {
            WorkItemKind::Task => {
                let tasks = self.tasks.read().map_err(Self::internal)?;
                Ok(tasks
                    .values()
                    .filter(|t| t.status == status)
                    .map(|t| WorkItem::task(t.id.clone()))
                    .collect())
            }
            WorkItemKind::TeamRun => {
                let runs = self.runs.read().map_err(Self::internal)?;
                Ok(runs
                    .values()
                    .filter(|r| r.status == status)
                    .map(|r| WorkItem::team_run(r.id.clone()))
                    .collect())
            }
        }
    }

    async fn insert_step_execution(&self, execution: &StepExecution) -> Result<(), StoreError> {
        let mut executions = self.executions.write().map_err(Self::internal)?;
        executions.push(execution.clone());
        Ok(())
    }

    async fn update_step_execution(&self, execution: &StepExecution) -> Result<(), StoreError> {
        let mut executions = self.executions.write().map_err(Self::internal)?;
        let row = executions
            .iter_mut()
            .find(|r| {
                r.run_id == execution.run_id
                    && r.generation == execution.generation
                    && r.step_index == execution.step_index
                    && r.attempt == execution.attempt
            })
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "step execution {}:{}:{}:{}",
                    execution.run_id, execution.generation, execution.step_index, execution.attempt
                ))
            })?;
        *row = execution.clone();
        Ok(())
    }

    async fn list_step_executions(&self, run_id: &str) -> Result<Vec<StepExecution>, StoreError> {
        let executions = self.executions.read().map_err(Self::internal)?;
        let mut rows: Vec<StepExecution> = executions
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.generation, r.step_index, r.attempt));
        Ok(rows)
    }

    async fn mark_run_started(&self, run_id: &str) -> Result<(), StoreError> {
        let mut runs = self.runs.write().map_err(Self::internal)?;
        let run = runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(run_id.to_string()))?;
        run.started_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_run_finished(&self, run_id: &str) -> Result<(), StoreError> {
        let mut runs = self.runs.write().map_err(Self::internal)?;
        let run = runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(run_id.to_string()))?;
        run.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn reset_run_for_rerun(&self, run_id: &str) -> Result<TeamRun, StoreError> {
        let mut runs = self.runs.write().map_err(Self::internal)?;
        let run = runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(run_id.to_string()))?;
        run.begin_new_generation();
        Ok(run.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewflow_core::types::{PipelineStep, Team};

    fn sample_task() -> Task {
        Task::new("ws-1", "title", "desc", "agent-1", "user-1")
    }

    fn sample_run() -> TeamRun {
        let team = Team::new("ws-1", "crew", "user-1")
            .with_steps(vec![PipelineStep::new("agent-1", "only")]);
        TeamRun::new(&team, "user-1")
    }

    #[test]
    fn test_cas_succeeds_only_from_expected_status() {
        tokio_test::block_on(async {
            let store = InMemoryStatusStore::new();
            let mut task = sample_task();
            task.dispatch();
            store.save_task(&task).await.unwrap();
            let item = WorkItem::task(task.id.clone());

            let claimed = store
                .compare_and_set_status(&item, WorkStatus::Dispatched, WorkStatus::Running)
                .await
                .unwrap();
            assert!(claimed);

            let second = store
                .compare_and_set_status(&item, WorkStatus::Dispatched, WorkStatus::Running)
                .await
                .unwrap();
            assert!(!second);
            assert_eq!(store.read_status(&item).await.unwrap(), WorkStatus::Running);
        });
    }

    #[test]
    fn test_cas_missing_item_is_not_found() {
        tokio_test::block_on(async {
            let store = InMemoryStatusStore::new();
            let err = store
                .compare_and_set_status(
                    &WorkItem::task("ghost"),
                    WorkStatus::Dispatched,
                    WorkStatus::Running,
                )
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::NotFound(_)));
        });
    }

    #[test]
    fn test_list_ready_filters_by_kind_and_status() {
        tokio_test::block_on(async {
            let store = InMemoryStatusStore::new();
            let mut ready = sample_task();
            ready.dispatch();
            let pending = sample_task();
            store.save_task(&ready).await.unwrap();
            store.save_task(&pending).await.unwrap();
            store.save_run(&sample_run()).await.unwrap();

            let ready_tasks = store.list_ready(WorkItemKind::Task).await.unwrap();
            assert_eq!(ready_tasks, vec![WorkItem::task(ready.id.clone())]);

            let ready_runs = store.list_ready(WorkItemKind::TeamRun).await.unwrap();
            assert_eq!(ready_runs.len(), 1);
        });
    }

    #[test]
    fn test_step_execution_rows_sorted_and_updatable() {
        tokio_test::block_on(async {
            let store = InMemoryStatusStore::new();
            let run = sample_run();
            store.save_run(&run).await.unwrap();

            let mut second = StepExecution::started(&run, 0, 2);
            let mut first = StepExecution::started(&run, 0, 1);
            store.insert_step_execution(&second).await.unwrap();
            store.insert_step_execution(&first).await.unwrap();

            first.fail("boom");
            store.update_step_execution(&first).await.unwrap();
            second.succeed(serde_json::json!("ok"));
            store.update_step_execution(&second).await.unwrap();

            let rows = store.list_step_executions(&run.id).await.unwrap();
            assert_eq!(
                rows.iter().map(|r| r.attempt).collect::<Vec<_>>(),
                vec![1, 2]
            );
            assert!(rows[0].error.is_some());
            assert!(rows[1].output.is_some());
        });
    }

    #[test]
    fn test_rerun_reset_bumps_generation_and_keeps_rows() {
        tokio_test::block_on(async {
            let store = InMemoryStatusStore::new();
            let run = sample_run();
            store.save_run(&run).await.unwrap();
            store
                .insert_step_execution(&StepExecution::started(&run, 0, 1))
                .await
                .unwrap();

            let reset = store.reset_run_for_rerun(&run.id).await.unwrap();
            assert_eq!(reset.generation, 2);
            assert!(reset.started_at.is_none());

            let rows = store.list_step_executions(&run.id).await.unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].generation, 1);
        });
    }
}
