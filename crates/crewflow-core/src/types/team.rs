//! Team type definitions
//!
//! Team is an ordered, named pipeline definition. Runs snapshot the step
//! list at creation, so editing a team never affects runs already in flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AgentId, WorkspaceId};

/// Type alias for Team ID
pub type TeamId = String;

/// Per-step directive governing pipeline behavior when the step's agent
/// invocation fails.
///
/// Closed variant: new policies are added here and handled explicitly in
/// the step engine, never string-matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Re-attempt the step up to `max_retries` additional times; exhaustion
    /// aborts the run (retry never silently degrades to skip).
    Retry,
    /// Abort the run immediately.
    #[default]
    Stop,
    /// Record the failure and advance to the next step anyway.
    Skip,
}

/// One step definition within a team pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Agent that executes this step
    pub agent_id: AgentId,
    /// Step name (display / audit)
    pub name: String,
    /// Instructions handed to the agent executor
    pub instructions: String,
    /// Description of the expected output, forwarded as executor context
    #[serde(default)]
    pub expected_output: Option<String>,
    /// What to do when the agent invocation fails
    #[serde(default)]
    pub on_failure: FailurePolicy,
    /// Additional attempts allowed under the `Retry` policy.
    /// `0` means exactly one attempt, behaving like `Stop` on failure.
    #[serde(default)]
    pub max_retries: u32,
}

impl PipelineStep {
    /// Create a new step with default (`Stop`) failure handling
    pub fn new(agent_id: impl Into<AgentId>, name: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            instructions: String::new(),
            expected_output: None,
            on_failure: FailurePolicy::default(),
            max_retries: 0,
        }
    }

    /// Set the instructions
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Set the expected output description
    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    /// Set the failure policy
    pub fn with_on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Set the retry budget (only meaningful with `FailurePolicy::Retry`)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Total attempts this step may make before its failure is terminal
    pub fn max_attempts(&self) -> u32 {
        match self.on_failure {
            FailurePolicy::Retry => self.max_retries.saturating_add(1),
            FailurePolicy::Stop | FailurePolicy::Skip => 1,
        }
    }
}

/// Team - a named, ordered pipeline definition owned by a workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Unique identifier for this team
    pub id: TeamId,
    /// Workspace this team belongs to
    pub workspace_id: WorkspaceId,
    /// Display name
    pub name: String,
    /// Ordered pipeline steps
    pub steps: Vec<PipelineStep>,
    /// User that created the team
    pub created_by: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Team {
    /// Create a new team
    pub fn new(
        workspace_id: impl Into<WorkspaceId>,
        name: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: workspace_id.into(),
            name: name.into(),
            steps: Vec::new(),
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the pipeline steps
    pub fn with_steps(mut self, steps: Vec<PipelineStep>) -> Self {
        self.steps = steps;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_attempts_per_policy() {
        let retry = PipelineStep::new("a", "s")
            .with_on_failure(FailurePolicy::Retry)
            .with_max_retries(2);
        assert_eq!(retry.max_attempts(), 3);

        let retry_zero = PipelineStep::new("a", "s").with_on_failure(FailurePolicy::Retry);
        assert_eq!(retry_zero.max_attempts(), 1);

        let stop = PipelineStep::new("a", "s").with_on_failure(FailurePolicy::Stop);
        assert_eq!(stop.max_attempts(), 1);

        let skip = PipelineStep::new("a", "s").with_on_failure(FailurePolicy::Skip);
        assert_eq!(skip.max_attempts(), 1);
    }

    #[test]
    fn test_failure_policy_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&FailurePolicy::Retry).unwrap(),
            "\"retry\""
        );
        let back: FailurePolicy = serde_json::from_str("\"skip\"").unwrap();
        assert_eq!(back, FailurePolicy::Skip);
    }
}
