//! Team run and step execution records
//!
//! A TeamRun is one execution instance of a Team pipeline. The step list is
//! snapshotted at creation and never changes for the lifetime of the run.
//! StepExecution rows are the append-only per-attempt trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{PipelineStep, Team, TeamId, WorkStatus, WorkspaceId};

/// Type alias for Team Run ID
pub type RunId = String;

/// Terminal outcome of one step execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed,
    Skipped,
}

/// TeamRun - one execution instance of a team pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRun {
    /// Unique identifier for this run
    pub id: RunId,
    /// Team this run was created from
    pub team_id: TeamId,
    /// Workspace this run belongs to
    pub workspace_id: WorkspaceId,
    /// Current lifecycle status (same set as tasks, pipeline-level)
    pub status: WorkStatus,
    /// Rerun generation. Starts at 1 and is bumped by each rerun so step
    /// execution rows from prior generations stay distinguishable.
    #[serde(default = "default_generation")]
    pub generation: u32,
    /// Snapshot of the team's steps, fixed once the run is created
    pub steps: Vec<PipelineStep>,
    /// User that created the run
    pub created_by: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// When a coordinator claimed the run
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal status
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

fn default_generation() -> u32 {
    1
}

impl TeamRun {
    /// Create a new run from a team, snapshotting its current steps.
    /// The run starts in `Pending`, which is the ready status for runs.
    pub fn new(team: &Team, created_by: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            team_id: team.id.clone(),
            workspace_id: team.workspace_id.clone(),
            status: WorkStatus::Pending,
            generation: default_generation(),
            steps: team.steps.clone(),
            created_by: created_by.into(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Update the status
    pub fn set_status(&mut self, status: WorkStatus) {
        self.status = status;
    }

    /// Prepare the run for a fresh execution after a rerun request:
    /// bump the generation and clear execution timestamps. Prior step
    /// execution rows keep their old generation for audit.
    pub fn begin_new_generation(&mut self) {
        self.generation = self.generation.saturating_add(1);
        self.started_at = None;
        self.finished_at = None;
    }
}

/// StepExecution - the record of one attempt of one pipeline step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecution {
    /// Run this attempt belongs to
    pub run_id: RunId,
    /// Run generation this attempt belongs to
    pub generation: u32,
    /// Zero-based index into the run's step snapshot
    pub step_index: usize,
    /// Attempt number, 1-based and monotonically increasing per step
    pub attempt: u32,
    /// Terminal outcome; `None` while the attempt is in flight
    #[serde(default)]
    pub outcome: Option<StepOutcome>,
    /// Agent output payload on success
    #[serde(default)]
    pub output: Option<Value>,
    /// Error message on failure
    #[serde(default)]
    pub error: Option<String>,
    /// When the attempt started
    pub started_at: DateTime<Utc>,
    /// When the attempt reached its outcome
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl StepExecution {
    /// Record the start of an attempt
    pub fn started(run: &TeamRun, step_index: usize, attempt: u32) -> Self {
        Self {
            run_id: run.id.clone(),
            generation: run.generation,
            step_index,
            attempt,
            outcome: None,
            output: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Mark the attempt succeeded with the agent's output payload
    pub fn succeed(&mut self, output: Value) {
        self.outcome = Some(StepOutcome::Succeeded);
        self.output = Some(output);
        self.finished_at = Some(Utc::now());
    }

    /// Mark the attempt failed with an error message
    pub fn fail(&mut self, error: impl Into<String>) {
        self.outcome = Some(StepOutcome::Failed);
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }
}
