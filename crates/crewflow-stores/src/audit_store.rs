//! Audit sink implementations.

use async_trait::async_trait;
use std::sync::RwLock;

use crewflow_core::audit::{AuditEntry, AuditError, AuditSink};

/// Append-only in-memory audit store for development and testing.
#[derive(Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditStore {
    /// Create a new in-memory audit store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| AuditError::new(e.to_string()))?;
        entries.push(entry);
        Ok(())
    }
}

/// Audit sink that emits entries as structured log lines. Never fails.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        tracing::info!(
            workspace_id = %entry.workspace_id,
            actor_id = %entry.actor_id,
            action = %entry.action,
            details = %entry.details,
            "audit"
        );
        Ok(())
    }
}
