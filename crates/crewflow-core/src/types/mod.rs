//! Domain type definitions
//!
//! - Task: single agent-assigned work item
//! - Team: ordered pipeline definition
//! - TeamRun / StepExecution: one execution instance and its step trail
//! - WorkItem / WorkStatus: the unit and lifecycle the orchestrator drives

mod run;
mod task;
mod team;

pub use run::{RunId, StepExecution, StepOutcome, TeamRun};
pub use task::{Priority, Task, TaskId, WorkStatus};
pub use team::{FailurePolicy, PipelineStep, Team, TeamId};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type alias for Workspace ID
pub type WorkspaceId = String;

/// Type alias for Agent ID
pub type AgentId = String;

/// The two kinds of executable work the orchestrator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemKind {
    Task,
    TeamRun,
}

impl WorkItemKind {
    /// The status that makes an item of this kind visible to the dispatch
    /// watcher. Tasks are handed off explicitly; runs are ready as created.
    pub fn ready_status(&self) -> WorkStatus {
        match self {
            WorkItemKind::Task => WorkStatus::Dispatched,
            WorkItemKind::TeamRun => WorkStatus::Pending,
        }
    }
}

/// A reference to one unit of claimable work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum WorkItem {
    Task(TaskId),
    TeamRun(RunId),
}

impl WorkItem {
    pub fn task(id: impl Into<TaskId>) -> Self {
        Self::Task(id.into())
    }

    pub fn team_run(id: impl Into<RunId>) -> Self {
        Self::TeamRun(id.into())
    }

    pub fn id(&self) -> &str {
        match self {
            WorkItem::Task(id) => id,
            WorkItem::TeamRun(id) => id,
        }
    }

    pub fn kind(&self) -> WorkItemKind {
        match self {
            WorkItem::Task(_) => WorkItemKind::Task,
            WorkItem::TeamRun(_) => WorkItemKind::TeamRun,
        }
    }

    /// The status this item must currently hold to be claimable.
    pub fn ready_status(&self) -> WorkStatus {
        self.kind().ready_status()
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::Task(id) => write!(f, "task:{}", id),
            WorkItem::TeamRun(id) => write!(f, "team_run:{}", id),
        }
    }
}
