//! # Crewflow Runtime
//!
//! The task runner process around the crewflow-core orchestrator:
//! - DispatchWatcher: polls the status store for ready work items
//! - TaskRunner: claims ready items and drives them concurrently
//! - StuckRunReaper: fails `running` items abandoned by a dead replica
//!
//! Multiple runner replicas may poll the same store; the claim's
//! conditional status write is the only coordination between them.

mod reaper;
mod runner;
mod watcher;

pub use reaper::StuckRunReaper;
pub use runner::TaskRunner;
pub use watcher::DispatchWatcher;
