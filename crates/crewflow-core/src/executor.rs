//! Agent executor seam
//!
//! The orchestrator does not know how an agent invocation produces output.
//! It sequences, retries, and records work around this trait; latency and
//! failure modes are opaque. Transient-infrastructure retries against a
//! flaky provider belong in the adapter implementing this trait, not here.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::types::{PipelineStep, Task};

/// Input payload for one agent invocation
#[derive(Debug, Clone)]
pub struct AgentInput {
    /// Instructions for the agent
    pub instructions: String,
    /// Description of the expected output, if the step declares one
    pub expected_output: Option<String>,
    /// Output of the previous pipeline step, if any
    pub upstream: Option<Value>,
}

impl AgentInput {
    /// Build the input for a standalone task: the task description is the
    /// instruction payload.
    pub fn for_task(task: &Task) -> Self {
        Self {
            instructions: task.description.clone(),
            expected_output: None,
            upstream: None,
        }
    }

    /// Build the input for one pipeline step, threading the prior step's
    /// output forward.
    pub fn for_step(step: &PipelineStep, upstream: Option<Value>) -> Self {
        Self {
            instructions: step.instructions.clone(),
            expected_output: step.expected_output.clone(),
            upstream,
        }
    }
}

/// Output payload of one agent invocation
#[derive(Debug, Clone)]
pub struct AgentOutput {
    pub payload: Value,
}

impl AgentOutput {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// Convenience constructor for plain-text agent output
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            payload: Value::String(text.into()),
        }
    }
}

/// Agent executor error types
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// Business-level failure produced by the agent itself.
    #[error("agent failure: {0}")]
    Agent(String),

    /// Fault in the execution infrastructure (provider down, network).
    /// Adapters may classify a fault as retryable; the orchestrator treats
    /// both classes as a failed invocation for policy purposes.
    #[error("executor infrastructure fault: {message}")]
    Infrastructure { message: String, retryable: bool },
}

impl ExecutorError {
    pub fn agent(message: impl Into<String>) -> Self {
        Self::Agent(message.into())
    }

    pub fn infrastructure(message: impl Into<String>, retryable: bool) -> Self {
        Self::Infrastructure {
            message: message.into(),
            retryable,
        }
    }
}

/// The external capability that turns (agent, input) into output.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn invoke(&self, agent_id: &str, input: AgentInput) -> Result<AgentOutput, ExecutorError>;
}
