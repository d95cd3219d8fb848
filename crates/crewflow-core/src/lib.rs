//! # Crewflow Core
//!
//! Core abstractions and deterministic logic for the Crewflow task runner.
//!
//! This crate contains:
//! - Task / Team / TeamRun / StepExecution definitions and status lifecycle
//! - StatusStore / AgentExecutor / AuditSink seams (async traits)
//! - Pipeline step engine with per-step failure policies
//! - Execution coordinator (claim / execute / finalize)
//! - Rerun and cooperative-cancel control surface
//!
//! This crate does NOT care about:
//! - How an agent invocation actually produces output
//! - Which backend persists status rows
//! - How work becomes visible (dispatch is an upstream concern)

pub mod audit;
pub mod control;
pub mod coordinator;
pub mod engine;
pub mod executor;
pub mod store;
pub mod types;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::audit::{AuditEntry, AuditError, AuditRecorder, AuditSink};
    pub use crate::control::{CancelOutcome, CancelRegistry, ControlError, RunControl};
    pub use crate::coordinator::{ClaimOutcome, ExecutionCoordinator};
    pub use crate::engine::{PipelineEngine, RunVerdict};
    pub use crate::executor::{AgentExecutor, AgentInput, AgentOutput, ExecutorError};
    pub use crate::store::{StatusStore, StoreError};
    pub use crate::types::{
        FailurePolicy, PipelineStep, Priority, RunId, StepExecution, StepOutcome, Task, TaskId,
        Team, TeamId, TeamRun, WorkItem, WorkItemKind, WorkStatus, WorkspaceId,
    };
}

// Re-export key types at crate root
pub use audit::{AuditEntry, AuditRecorder, AuditSink};
pub use control::{CancelRegistry, ControlError, RunControl};
pub use coordinator::{ClaimOutcome, ExecutionCoordinator};
pub use engine::{PipelineEngine, RunVerdict};
pub use executor::{AgentExecutor, AgentInput, AgentOutput, ExecutorError};
pub use store::{StatusStore, StoreError};
pub use types::{
    FailurePolicy, PipelineStep, StepExecution, StepOutcome, Task, Team, TeamRun, WorkItem,
    WorkItemKind, WorkStatus,
};
