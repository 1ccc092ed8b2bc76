//! Orchestration: per-repository pipeline plus the worker pool driving it.

pub mod runner;
pub mod scheduler;
pub mod state;

pub use runner::{RepoRunner, RunSettings};
pub use scheduler::{RunResult, run_all};
pub use state::{ChangeStatus, OutcomeRecord, RepoStatus, RunSummary};
