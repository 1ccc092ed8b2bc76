//! Operation runtime.
//!
//! Every playbook step resolves to an [`Operation`] with a two-phase
//! lifecycle: `plan` computes what would change, `apply` makes it so.
//!
//! | Operation | Kind | Notes |
//! |-----------|------|-------|
//! | `files.patch` | file-based | literal replacements, written during plan |
//! | `issue.create` | API-only (hybrid) | needs a working copy only for a `template` file |
//! | `path/to/script.py` | out-of-process | JSON over stdin/stdout, always needs a working copy |
//!
//! An operation that discovers it needs a working copy returns
//! [`PlanOutcome::NeedsWorktree`]; the scheduler clones and retries the step once.

mod external;
mod issue;
mod patch;
mod registry;

pub use external::ScriptOperation;
pub use issue::IssueCreate;
pub use patch::FilesPatch;
pub use registry::OperationRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};

use crate::errors::OperationError;
use crate::github::{RepoHost, Repository};

/// Outcome of a plan phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Noop,
    WouldApply,
    Error,
}

/// Outcome of an apply phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    Applied,
    Noop,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanResult {
    pub status: PlanStatus,
    pub details: Value,
    pub message: Option<String>,
    /// Free-form notes surfaced in the outcome record.
    pub notes: Vec<String>,
    /// Tabular rows surfaced in the outcome record.
    pub rows: Vec<Value>,
}

impl PlanResult {
    fn with_status(status: PlanStatus, details: Value) -> Self {
        Self {
            status,
            details,
            message: None,
            notes: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn noop(details: Value) -> Self {
        Self::with_status(PlanStatus::Noop, details)
    }

    pub fn would_apply(details: Value) -> Self {
        Self::with_status(PlanStatus::WouldApply, details)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::with_status(PlanStatus::Error, Value::Null)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == PlanStatus::Error
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyResult {
    pub status: ApplyStatus,
    pub details: Value,
    pub message: Option<String>,
}

impl ApplyResult {
    pub fn applied(details: Value) -> Self {
        Self {
            status: ApplyStatus::Applied,
            details,
            message: None,
        }
    }

    pub fn noop() -> Self {
        Self {
            status: ApplyStatus::Noop,
            details: Value::Null,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ApplyStatus::Error,
            details: Value::Null,
            message: Some(message.into()),
        }
    }
}

/// Result of planning a step: either a result, or a request for a working copy.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Planned(PlanResult),
    NeedsWorktree,
}

/// Which phase an out-of-process operation is being run for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Plan,
    Apply,
}

/// Everything a step may look at while running against one repository.
pub struct OpContext<'a> {
    pub repo: &'a Repository,
    pub inputs: &'a Map<String, Value>,
    /// Working copy, if one has been cloned for this repository yet.
    pub worktree: Option<&'a Path>,
    pub host: &'a dyn RepoHost,
    pub playbook_name: &'a str,
    pub branch: &'a str,
}

impl OpContext<'_> {
    /// Template context for bodies and titles rendered by this step.
    pub fn template_context(&self) -> Value {
        crate::template::context(self.repo, self.inputs, self.playbook_name, self.branch)
    }
}

#[async_trait]
pub trait Operation: Send + Sync {
    fn id(&self) -> &str;

    /// One-line description for `bulk ops`.
    fn describe(&self) -> &str;

    /// Operations that always need file access skip the lazy negotiation.
    fn requires_worktree(&self) -> bool {
        false
    }

    /// Static input checks run at validation time, before any repository is touched.
    fn check_inputs(&self, _inputs: &Map<String, Value>) -> Result<(), OperationError> {
        Ok(())
    }

    async fn plan(&self, ctx: &OpContext<'_>) -> Result<PlanOutcome, OperationError>;

    async fn apply(
        &self,
        ctx: &OpContext<'_>,
        plan: &PlanResult,
    ) -> Result<ApplyResult, OperationError>;
}

/// Run a step's plan phase, folding failures into an error result.
pub async fn run_plan(op: &dyn Operation, ctx: &OpContext<'_>) -> PlanOutcome {
    if op.requires_worktree() && ctx.worktree.is_none() {
        return PlanOutcome::NeedsWorktree;
    }
    match op.plan(ctx).await {
        Ok(outcome) => outcome,
        Err(e) => PlanOutcome::Planned(PlanResult::error(format!("{:#}", e))),
    }
}

/// Run a step's apply phase, folding failures into an error result.
pub async fn run_apply(op: &dyn Operation, ctx: &OpContext<'_>, plan: &PlanResult) -> ApplyResult {
    match op.apply(ctx, plan).await {
        Ok(result) => result,
        Err(e) => ApplyResult::error(format!("{:#}", e)),
    }
}

/// Read a list-of-strings input that may also be given as a single string.
pub(crate) fn string_list(
    inputs: &Map<String, Value>,
    key: &str,
) -> Result<Vec<String>, OperationError> {
    match inputs.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| OperationError::InvalidInput {
                        field: key.to_string(),
                        message: "expected a list of strings".into(),
                    })
            })
            .collect(),
        Some(_) => Err(OperationError::InvalidInput {
            field: key.to_string(),
            message: "expected a string or list of strings".into(),
        }),
    }
}

/// Join `rel` onto `root`; `None` if it is empty, absolute or climbs out with `..`.
pub(crate) fn contained_path(root: &Path, rel: &str) -> Option<PathBuf> {
    let rel_path = Path::new(rel);
    let escapes = rel_path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if rel.is_empty() || escapes {
        return None;
    }
    Some(root.join(rel_path))
}

/// Read an optional string input.
pub(crate) fn optional_string(
    inputs: &Map<String, Value>,
    key: &str,
) -> Result<Option<String>, OperationError> {
    match inputs.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(OperationError::InvalidInput {
            field: key.to_string(),
            message: "expected a string".into(),
        }),
    }
}
