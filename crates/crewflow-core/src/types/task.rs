//! Task type definitions
//!
//! Task is a single unit of work assigned to one agent, with its own
//! status lifecycle driven by the execution coordinator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AgentId, WorkspaceId};

/// Type alias for Task ID
pub type TaskId = String;

/// Work item lifecycle status, shared by Tasks and Team Runs.
///
/// The status store is the single writer of truth for this field; the
/// orchestrator only proposes transitions via conditional updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    /// Created, not yet ready for execution (or ready, for team runs)
    Pending,
    /// Marked ready for the dispatch watcher to pick up
    Dispatched,
    /// Claimed by a coordinator instance and executing
    Running,
    /// Finished successfully
    Completed,
    /// Finished with a business-level failure
    Failed,
    /// Cancelled before or during execution
    Cancelled,
}

impl WorkStatus {
    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkStatus::Completed | WorkStatus::Failed | WorkStatus::Cancelled
        )
    }

    /// Check if a cancel request is valid in this status
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            WorkStatus::Pending | WorkStatus::Dispatched | WorkStatus::Running
        )
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkStatus::Pending => "pending",
            WorkStatus::Dispatched => "dispatched",
            WorkStatus::Running => "running",
            WorkStatus::Completed => "completed",
            WorkStatus::Failed => "failed",
            WorkStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Task priority as set by the creating user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Task - one unit of work assigned to one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task
    pub id: TaskId,
    /// Workspace this task belongs to
    pub workspace_id: WorkspaceId,
    /// Short title
    pub title: String,
    /// Full description, handed to the agent executor as input
    pub description: String,
    /// The agent assigned to execute this task
    pub agent_id: AgentId,
    /// Priority set at creation
    #[serde(default)]
    pub priority: Priority,
    /// Current lifecycle status
    pub status: WorkStatus,
    /// User that created the task
    pub created_by: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task in `Pending` status
    pub fn new(
        workspace_id: impl Into<WorkspaceId>,
        title: impl Into<String>,
        description: impl Into<String>,
        agent_id: impl Into<AgentId>,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: workspace_id.into(),
            title: title.into(),
            description: description.into(),
            agent_id: agent_id.into(),
            priority: Priority::default(),
            status: WorkStatus::Pending,
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Update the status, bumping the update timestamp
    pub fn set_status(&mut self, status: WorkStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Mark the task ready for the dispatch watcher
    pub fn dispatch(&mut self) {
        self.set_status(WorkStatus::Dispatched);
    }
}
