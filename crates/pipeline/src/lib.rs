//! Command pipeline and the worker-facing coordination API.
//!
//! A command travels `Pending → Validating → (Committed | Rejected |
//! Conflicted)`. Commits go through the versioned aggregate store with
//! optimistic retry, then the resulting event is appended to the log and
//! published on the bus — in that order, so an event is durable before it
//! is visible. Undo is a forward-moving restore command over a bounded
//! per-aggregate history, never a rollback of the log.

pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod pipeline;
pub mod rebuild;

pub use command::{Command, CommandReceipt, CommandState};
pub use config::PipelineConfig;
pub use coordinator::Coordinator;
pub use error::{PipelineError, Result};
pub use pipeline::CommandPipeline;
pub use rebuild::{fold, fold_replay, rebuild_store};
