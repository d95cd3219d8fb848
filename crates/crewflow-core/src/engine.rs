//! Pipeline step engine
//!
//! Executes the ordered step snapshot of one team run in strict index
//! order: step N+1 never starts before step N reaches a terminal per-step
//! outcome. Each step's failure policy (retry / stop / skip) is handled by
//! an explicit match arm. Cancellation is cooperative and checked before
//! every agent invocation; an invocation already in flight is never
//! interrupted.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::executor::{AgentExecutor, AgentInput};
use crate::store::{StatusStore, StoreError};
use crate::types::{FailurePolicy, StepExecution, TeamRun, WorkStatus};

/// Terminal verdict of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunVerdict {
    /// Every step reached a terminal outcome and no stop-class failure occurred
    Completed,
    /// A stop-policy step failed, or a retry-policy step exhausted its budget
    Failed,
    /// Cancellation was observed at a step boundary
    Cancelled,
}

impl RunVerdict {
    /// Map the verdict onto the work item status set
    pub fn as_status(&self) -> WorkStatus {
        match self {
            RunVerdict::Completed => WorkStatus::Completed,
            RunVerdict::Failed => WorkStatus::Failed,
            RunVerdict::Cancelled => WorkStatus::Cancelled,
        }
    }
}

/// The engine - drives one run's step snapshot to a terminal verdict
pub struct PipelineEngine {
    store: Arc<dyn StatusStore>,
    executor: Arc<dyn AgentExecutor>,
}

impl PipelineEngine {
    pub fn new(store: Arc<dyn StatusStore>, executor: Arc<dyn AgentExecutor>) -> Self {
        Self { store, executor }
    }

    /// Execute the run's steps in order and return its terminal verdict.
    ///
    /// Agent failures are recorded as step outcomes and resolved through
    /// the step's failure policy; only store faults propagate as errors.
    pub async fn run(
        &self,
        run: &TeamRun,
        cancel: &CancellationToken,
    ) -> Result<RunVerdict, StoreError> {
        let mut upstream: Option<serde_json::Value> = None;

        for (step_index, step) in run.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(
                    run_id = %run.id,
                    step_index,
                    "cancellation observed at step boundary"
                );
                return Ok(RunVerdict::Cancelled);
            }

            let max_attempts = step.max_attempts();
            let mut attempt: u32 = 1;

            loop {
                if attempt > 1 && cancel.is_cancelled() {
                    tracing::info!(
                        run_id = %run.id,
                        step_index,
                        attempt,
                        "cancellation observed before retry attempt"
                    );
                    return Ok(RunVerdict::Cancelled);
                }

                let mut execution = StepExecution::started(run, step_index, attempt);
                self.store.insert_step_execution(&execution).await?;
                tracing::info!(
                    run_id = %run.id,
                    step_index,
                    step_name = %step.name,
                    agent_id = %step.agent_id,
                    attempt,
                    "step attempt started"
                );

                let input = AgentInput::for_step(step, upstream.clone());
                match self.executor.invoke(&step.agent_id, input).await {
                    Ok(output) => {
                        execution.succeed(output.payload.clone());
                        self.store.update_step_execution(&execution).await?;
                        tracing::info!(
                            run_id = %run.id,
                            step_index,
                            step_name = %step.name,
                            attempt,
                            "step succeeded"
                        );
                        upstream = Some(output.payload);
                        break;
                    }
                    Err(err) => {
                        execution.fail(err.to_string());
                        self.store.update_step_execution(&execution).await?;

                        match step.on_failure {
                            FailurePolicy::Stop => {
                                tracing::error!(
                                    run_id = %run.id,
                                    step_index,
                                    step_name = %step.name,
                                    error = %err,
                                    "step failed with stop policy; aborting run"
                                );
                                return Ok(RunVerdict::Failed);
                            }
                            FailurePolicy::Skip => {
                                tracing::warn!(
                                    run_id = %run.id,
                                    step_index,
                                    step_name = %step.name,
                                    error = %err,
                                    "step failed with skip policy; advancing"
                                );
                                // The skipped step contributes no upstream
                                // output; the next step sees the last
                                // successful one.
                                break;
                            }
                            FailurePolicy::Retry => {
                                if attempt >= max_attempts {
                                    tracing::error!(
                                        run_id = %run.id,
                                        step_index,
                                        step_name = %step.name,
                                        attempts = attempt,
                                        error = %err,
                                        "retry budget exhausted; aborting run"
                                    );
                                    return Ok(RunVerdict::Failed);
                                }
                                attempt += 1;
                                tracing::warn!(
                                    run_id = %run.id,
                                    step_index,
                                    step_name = %step.name,
                                    next_attempt = attempt,
                                    max_attempts,
                                    error = %err,
                                    "step failed; retrying"
                                );
                            }
                        }
                    }
                }
            }
        }

        Ok(RunVerdict::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::executor::{AgentOutput, ExecutorError};
    use crate::types::{PipelineStep, StepOutcome, Task, Team, WorkItem, WorkItemKind};

    /// Minimal in-memory store sufficient for engine tests.
    #[derive(Default)]
    struct RecordingStore {
        executions: Mutex<Vec<StepExecution>>,
    }

    impl RecordingStore {
        fn rows(&self) -> Vec<StepExecution> {
            self.executions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StatusStore for RecordingStore {
        async fn save_task(&self, _task: &Task) -> Result<(), StoreError> {
            Ok(())
        }
        async fn load_task(&self, _id: &str) -> Result<Option<Task>, StoreError> {
            Ok(None)
        }
        async fn save_run(&self, _run: &TeamRun) -> Result<(), StoreError> {
            Ok(())
        }
        async fn load_run(&self, _id: &str) -> Result<Option<TeamRun>, StoreError> {
            Ok(None)
        }
        async fn read_status(&self, item: &WorkItem) -> Result<WorkStatus, StoreError> {
            Err(StoreError::NotFound(item.id().to_string()))
        }
        async fn compare_and_set_status(
            &self,
            _item: &WorkItem,
            _expected: WorkStatus,
            _new: WorkStatus,
        ) -> Result<bool, StoreError> {
            Ok(true)
        }
        async fn set_status(&self, _item: &WorkItem, _status: WorkStatus) -> Result<(), StoreError> {
            Ok(())
        }
        async fn list_by_status(
            &self,
            _kind: WorkItemKind,
            _status: WorkStatus,
        ) -> Result<Vec<WorkItem>, StoreError> {
            Ok(Vec::new())
        }
        async fn insert_step_execution(&self, execution: &StepExecution) -> Result<(), StoreError> {
            self.executions.lock().unwrap().push(execution.clone());
            Ok(())
        }
        async fn update_step_execution(&self, execution: &StepExecution) -> Result<(), StoreError> {
            let mut rows = self.executions.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|r| {
                    r.run_id == execution.run_id
                        && r.generation == execution.generation
                        && r.step_index == execution.step_index
                        && r.attempt == execution.attempt
                })
                .ok_or_else(|| StoreError::NotFound(execution.run_id.clone()))?;
            *row = execution.clone();
            Ok(())
        }
        async fn list_step_executions(
            &self,
            run_id: &str,
        ) -> Result<Vec<StepExecution>, StoreError> {
            Ok(self
                .executions
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.run_id == run_id)
                .cloned()
                .collect())
        }
        async fn mark_run_started(&self, _run_id: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn mark_run_finished(&self, _run_id: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn reset_run_for_rerun(&self, run_id: &str) -> Result<TeamRun, StoreError> {
            Err(StoreError::NotFound(run_id.to_string()))
        }
    }

    /// Executor scripted per agent id: fail the first N calls, then succeed.
    struct ScriptedExecutor {
        failures: Mutex<HashMap<String, usize>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn new(failures: &[(&str, usize)]) -> Self {
            Self {
                failures: Mutex::new(
                    failures
                        .iter()
                        .map(|(k, v)| (k.to_string(), *v))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls_for(&self, agent_id: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.as_str() == agent_id)
                .count()
        }
    }

    #[async_trait]
    impl AgentExecutor for ScriptedExecutor {
        async fn invoke(
            &self,
            agent_id: &str,
            _input: AgentInput,
        ) -> Result<AgentOutput, ExecutorError> {
            self.calls.lock().unwrap().push(agent_id.to_string());
            let mut failures = self.failures.lock().unwrap();
            if let Some(left) = failures.get_mut(agent_id) {
                if *left > 0 {
                    *left -= 1;
                    return Err(ExecutorError::agent("scripted failure"));
                }
            }
            Ok(AgentOutput::text(format!("{} output", agent_id)))
        }
    }

    fn run_with_steps(steps: Vec<PipelineStep>) -> TeamRun {
        let team = Team::new("ws-1", "crew", "user-1").with_steps(steps);
        TeamRun::new(&team, "user-1")
    }

    #[test]
    fn test_stop_policy_aborts_before_later_steps() {
        tokio_test::block_on(async {
            let store = Arc::new(RecordingStore::default());
            let executor = Arc::new(ScriptedExecutor::new(&[("agent-a", 10)]));
            let engine = PipelineEngine::new(store.clone(), executor.clone());

            let run = run_with_steps(vec![
                PipelineStep::new("agent-a", "a").with_on_failure(FailurePolicy::Stop),
                PipelineStep::new("agent-b", "b")
                    .with_on_failure(FailurePolicy::Retry)
                    .with_max_retries(2),
            ]);
            let verdict = engine.run(&run, &CancellationToken::new()).await.unwrap();

            assert_eq!(verdict, RunVerdict::Failed);
            assert_eq!(executor.calls_for("agent-b"), 0);
            let rows = store.rows();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].step_index, 0);
            assert_eq!(rows[0].outcome, Some(StepOutcome::Failed));
        });
    }

    #[test]
    fn test_skip_policy_advances_and_run_completes() {
        tokio_test::block_on(async {
            let store = Arc::new(RecordingStore::default());
            let executor = Arc::new(ScriptedExecutor::new(&[("agent-a", 10)]));
            let engine = PipelineEngine::new(store.clone(), executor);

            let run = run_with_steps(vec![
                PipelineStep::new("agent-a", "a").with_on_failure(FailurePolicy::Skip),
                PipelineStep::new("agent-b", "b").with_on_failure(FailurePolicy::Stop),
            ]);
            let verdict = engine.run(&run, &CancellationToken::new()).await.unwrap();

            assert_eq!(verdict, RunVerdict::Completed);
            let rows = store.rows();
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].outcome, Some(StepOutcome::Failed));
            assert_eq!(rows[1].outcome, Some(StepOutcome::Succeeded));
        });
    }

    #[test]
    fn test_retry_succeeds_on_third_attempt() {
        tokio_test::block_on(async {
            let store = Arc::new(RecordingStore::default());
            let executor = Arc::new(ScriptedExecutor::new(&[("agent-a", 2)]));
            let engine = PipelineEngine::new(store.clone(), executor.clone());

            let run = run_with_steps(vec![PipelineStep::new("agent-a", "a")
                .with_on_failure(FailurePolicy::Retry)
                .with_max_retries(2)]);
            let verdict = engine.run(&run, &CancellationToken::new()).await.unwrap();

            assert_eq!(verdict, RunVerdict::Completed);
            assert_eq!(executor.calls_for("agent-a"), 3);

            let rows = store.rows();
            assert_eq!(rows.len(), 3);
            assert_eq!(
                rows.iter().map(|r| r.attempt).collect::<Vec<_>>(),
                vec![1, 2, 3]
            );
            assert_eq!(rows[2].outcome, Some(StepOutcome::Succeeded));
        });
    }

    #[test]
    fn test_retry_with_zero_budget_behaves_like_stop() {
        tokio_test::block_on(async {
            let store = Arc::new(RecordingStore::default());
            let executor = Arc::new(ScriptedExecutor::new(&[("agent-a", 10)]));
            let engine = PipelineEngine::new(store.clone(), executor.clone());

            let run = run_with_steps(vec![
                PipelineStep::new("agent-a", "a").with_on_failure(FailurePolicy::Retry),
                PipelineStep::new("agent-b", "b"),
            ]);
            let verdict = engine.run(&run, &CancellationToken::new()).await.unwrap();

            assert_eq!(verdict, RunVerdict::Failed);
            assert_eq!(executor.calls_for("agent-a"), 1);
            assert_eq!(executor.calls_for("agent-b"), 0);
        });
    }

    #[test]
    fn test_retry_exhaustion_aborts_run() {
        tokio_test::block_on(async {
            let store = Arc::new(RecordingStore::default());
            let executor = Arc::new(ScriptedExecutor::new(&[("agent-a", 10)]));
            let engine = PipelineEngine::new(store.clone(), executor.clone());

            let run = run_with_steps(vec![PipelineStep::new("agent-a", "a")
                .with_on_failure(FailurePolicy::Retry)
                .with_max_retries(2)]);
            let verdict = engine.run(&run, &CancellationToken::new()).await.unwrap();

            assert_eq!(verdict, RunVerdict::Failed);
            // initial attempt + 2 retries
            assert_eq!(executor.calls_for("agent-a"), 3);
            assert!(store
                .rows()
                .iter()
                .all(|r| r.outcome == Some(StepOutcome::Failed)));
        });
    }

    #[test]
    fn test_upstream_output_threads_to_next_step() {
        struct EchoUpstream {
            seen: Mutex<Vec<Option<serde_json::Value>>>,
        }

        #[async_trait]
        impl AgentExecutor for EchoUpstream {
            async fn invoke(
                &self,
                agent_id: &str,
                input: AgentInput,
            ) -> Result<AgentOutput, ExecutorError> {
                self.seen.lock().unwrap().push(input.upstream.clone());
                Ok(AgentOutput::new(json!({ "from": agent_id })))
            }
        }

        tokio_test::block_on(async {
            let store = Arc::new(RecordingStore::default());
            let executor = Arc::new(EchoUpstream {
                seen: Mutex::new(Vec::new()),
            });
            let engine = PipelineEngine::new(store, executor.clone());

            let run = run_with_steps(vec![
                PipelineStep::new("agent-a", "a"),
                PipelineStep::new("agent-b", "b"),
            ]);
            engine.run(&run, &CancellationToken::new()).await.unwrap();

            let seen = executor.seen.lock().unwrap().clone();
            assert_eq!(seen[0], None);
            assert_eq!(seen[1], Some(json!({ "from": "agent-a" })));
        });
    }

    #[test]
    fn test_cancel_between_steps_stops_run() {
        struct CancellingExecutor {
            cancel: CancellationToken,
            calls: AtomicUsize,
        }

        #[async_trait]
        impl AgentExecutor for CancellingExecutor {
            async fn invoke(
                &self,
                _agent_id: &str,
                _input: AgentInput,
            ) -> Result<AgentOutput, ExecutorError> {
                let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                if call == 2 {
                    // Cancel arrives while step 2's invocation is in flight.
                    self.cancel.cancel();
                }
                Ok(AgentOutput::text("ok"))
            }
        }

        tokio_test::block_on(async {
            let cancel = CancellationToken::new();
            let store = Arc::new(RecordingStore::default());
            let executor = Arc::new(CancellingExecutor {
                cancel: cancel.clone(),
                calls: AtomicUsize::new(0),
            });
            let engine = PipelineEngine::new(store.clone(), executor.clone());

            let run = run_with_steps(vec![
                PipelineStep::new("agent-a", "a"),
                PipelineStep::new("agent-b", "b"),
                PipelineStep::new("agent-c", "c"),
            ]);
            let verdict = engine.run(&run, &cancel).await.unwrap();

            assert_eq!(verdict, RunVerdict::Cancelled);
            // Step 2's in-flight call completed; step 3 never launched.
            assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
            assert_eq!(store.rows().len(), 2);
        });
    }
}
