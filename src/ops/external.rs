//! Out-of-process operations.
//!
//! A script receives `{repo, inputs, mode}` as JSON on stdin, runs with the
//! working copy as its current directory, and prints a single JSON object:
//!
//! ```json
//! { "changes": [{ "path": "a.txt", "before": "...", "after": "..." }],
//!   "rows": [{ "path": "deploy.yml" }],
//!   "notes": ["checked 3 files"] }
//! ```
//!
//! - Exit code 0 = success, anything else = error carrying stderr
//! - `before` in a change is informational; `after` is what gets written
//! - `changes` are written into the working copy, like `files.patch` does during plan
//! - `rows` and `notes` are carried into the outcome record

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{
    ApplyResult, OpContext, Operation, Phase, PlanOutcome, PlanResult, contained_path,
};
use crate::errors::OperationError;
use crate::github::Repository;

#[derive(Debug, Serialize)]
struct ScriptRequest<'a> {
    repo: &'a Repository,
    inputs: &'a Map<String, Value>,
    mode: Phase,
}

#[derive(Debug, Clone, Deserialize)]
struct FileChange {
    path: String,
    after: String,
}

#[derive(Debug, Default, Deserialize)]
struct ScriptResponse {
    #[serde(default)]
    changes: Vec<FileChange>,
    #[serde(default)]
    rows: Vec<Value>,
    #[serde(default)]
    notes: Vec<String>,
}

/// Interpreter for a script, chosen by file extension.
fn interpreter(path: &Path) -> Option<&'static str> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("py") => Some("python3"),
        Some("sh") => Some("sh"),
        Some("js" | "mjs") => Some("node"),
        _ => None,
    }
}

/// Resolve a change path inside the working copy, rejecting escapes.
fn change_path(root: &Path, rel: &str) -> Result<PathBuf, OperationError> {
    contained_path(root, rel).ok_or_else(|| OperationError::InvalidOutput {
        message: format!("change path `{}` must be relative to the working copy", rel),
        stderr: String::new(),
    })
}

/// Write `changes` under `root`; returns the paths whose content actually changed.
fn write_changes(root: &Path, changes: &[FileChange]) -> Result<Vec<String>, OperationError> {
    let mut written = Vec::new();
    for change in changes {
        let path = change_path(root, &change.path)?;
        let current = std::fs::read_to_string(&path).ok();
        if current.as_deref() == Some(change.after.as_str()) {
            continue;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(anyhow::Error::new)?;
        }
        std::fs::write(&path, &change.after).map_err(|e| {
            anyhow::Error::new(e).context(format!("Failed to write {}", change.path))
        })?;
        written.push(change.path.clone());
    }
    Ok(written)
}

/// An operation implemented by a script in any language.
#[derive(Debug, Clone)]
pub struct ScriptOperation {
    id: String,
    path: PathBuf,
}

impl ScriptOperation {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn invoke(
        &self,
        ctx: &OpContext<'_>,
        root: &Path,
        mode: Phase,
    ) -> Result<ScriptResponse, OperationError> {
        let request = serde_json::to_string(&ScriptRequest {
            repo: ctx.repo,
            inputs: ctx.inputs,
            mode,
        })
        .map_err(anyhow::Error::new)?;

        let mut command = match interpreter(&self.path) {
            Some(program) => {
                let mut cmd = Command::new(program);
                cmd.arg(&self.path);
                cmd
            }
            None => Command::new(&self.path),
        };
        debug!(script = %self.path.display(), ?mode, "Running script operation");
        let mut child = command
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("BULK_REPO", &ctx.repo.full_name)
            .spawn()
            .map_err(|e| {
                anyhow::Error::new(e).context(format!("Failed to spawn {}", self.path.display()))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A script may exit without reading stdin; a broken pipe is not our error.
            let _ = stdin.write_all(request.as_bytes()).await;
        }
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| anyhow::Error::new(e).context("Failed to wait for script"))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(OperationError::ScriptFailed {
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }
        if stdout.trim().is_empty() {
            return Ok(ScriptResponse::default());
        }
        serde_json::from_str(stdout.trim()).map_err(|e| OperationError::InvalidOutput {
            message: e.to_string(),
            stderr,
        })
    }
}

#[async_trait]
impl Operation for ScriptOperation {
    fn id(&self) -> &str {
        &self.id
    }

    fn describe(&self) -> &str {
        "External script (JSON over stdin/stdout)"
    }

    fn requires_worktree(&self) -> bool {
        true
    }

    async fn plan(&self, ctx: &OpContext<'_>) -> Result<PlanOutcome, OperationError> {
        let Some(root) = ctx.worktree else {
            return Ok(PlanOutcome::NeedsWorktree);
        };
        let response = self.invoke(ctx, root, Phase::Plan).await?;
        let changed = write_changes(root, &response.changes)?;
        let details = json!({ "changedFiles": changed.len(), "files": changed });

        let mut result = if changed.is_empty() {
            PlanResult::noop(details)
        } else {
            PlanResult::would_apply(details)
        };
        result.rows = response.rows;
        result.notes = response.notes;
        Ok(PlanOutcome::Planned(result))
    }

    async fn apply(
        &self,
        ctx: &OpContext<'_>,
        _plan: &PlanResult,
    ) -> Result<ApplyResult, OperationError> {
        let Some(root) = ctx.worktree else {
            return Err(anyhow::anyhow!("script operations need a working copy").into());
        };
        let response = self.invoke(ctx, root, Phase::Apply).await?;
        let changed = write_changes(root, &response.changes)?;
        if changed.is_empty() {
            Ok(ApplyResult::noop())
        } else {
            Ok(ApplyResult::applied(json!({ "changedFiles": changed.len() })))
        }
    }
}
