//! # Crewflow Stores
//!
//! In-memory implementations of the crewflow-core storage seams:
//! - InMemoryStatusStore: tasks, team runs, and step execution rows with
//!   atomic compare-and-set status transitions
//! - InMemoryAuditStore / TracingAuditSink: append-only audit backends
//!
//! These back development and testing; production deployments plug a
//! hosted database behind the same traits.

mod audit_store;
mod status_store;

pub use audit_store::{InMemoryAuditStore, TracingAuditSink};
pub use status_store::InMemoryStatusStore;
