//! Audit trail
//!
//! Audit writes are fire-and-forget: each append runs on a detached task
//! whose result is never observed by the calling control flow. A failing
//! sink is logged and swallowed; it must never block or fail a work item.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::types::WorkspaceId;

/// Append-only audit fact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Workspace the audited action happened in
    pub workspace_id: WorkspaceId,
    /// Who performed the action (a user id, or the orchestrator itself)
    pub actor_id: String,
    /// Action tag, e.g. "run.started"
    pub action: String,
    /// Structured detail blob
    pub details: Value,
    /// When the entry was created
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        workspace_id: impl Into<WorkspaceId>,
        actor_id: impl Into<String>,
        action: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            actor_id: actor_id.into(),
            action: action.into(),
            details,
            timestamp: Utc::now(),
        }
    }
}

/// Audit sink error
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AuditError(pub String);

impl AuditError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Append-only audit destination. Best effort by contract.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Fire-and-forget wrapper around an [`AuditSink`].
///
/// `record` spawns the append on its own task and returns immediately.
/// Sink failures are captured inside that task and logged; there is no
/// channel back to the caller, so an error structurally cannot propagate
/// into the work being audited.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Queue an audit entry. Must be called from within a tokio runtime.
    pub fn record(&self, entry: AuditEntry) {
        let sink = self.sink.clone();
        tokio::spawn(async move {
            let action = entry.action.clone();
            let workspace_id = entry.workspace_id.clone();
            if let Err(err) = sink.append(entry).await {
                tracing::warn!(
                    workspace_id = %workspace_id,
                    action = %action,
                    error = %err,
                    "audit append failed; entry dropped"
                );
            }
        });
    }
}
